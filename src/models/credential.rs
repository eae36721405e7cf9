// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{collections::HashMap, str::FromStr};

/// Raw parameters of one credential as a client sends them, e.g. `username`,
/// `password` or `type`.
pub type CredentialParams = HashMap<String, String>;

/// Represents a set of credentials to be used for scanning to access a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Service to use for accessing a host
    pub service: Service,
    /// Port used for getting access. If missing a standard port is used
    pub port: Option<String>,
    /// Type of the credential to get access. Different services support different types.
    pub credential_type: CredentialType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeInformation {
    pub username: String,
    pub password: String,
}

/// Enum of available services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// SSH, supports [UP](CredentialType::UP) and [USK](CredentialType::USK) as credential types
    SSH,
    /// SMB, supports [UP](CredentialType::UP)
    SMB,
    /// ESXi, supports [UP](CredentialType::UP)
    ESXi,
    /// SNMP, supports [SNMP](CredentialType::SNMP)
    SNMP,
}

impl Service {
    pub fn name(self) -> &'static str {
        match self {
            Service::SSH => "ssh",
            Service::SMB => "smb",
            Service::ESXi => "esxi",
            Service::SNMP => "snmp",
        }
    }
}

impl AsRef<str> for Service {
    fn as_ref(&self) -> &str {
        self.name()
    }
}

impl FromStr for Service {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ssh" => Ok(Service::SSH),
            "smb" => Ok(Service::SMB),
            "esxi" => Ok(Service::ESXi),
            "snmp" => Ok(Service::SNMP),
            _ => Err(()),
        }
    }
}

/// Enum representing the type of credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialType {
    /// User/password credentials.
    UP {
        username: String,
        password: String,
        /// privilege credential only use for SSH service
        privilege: Option<PrivilegeInformation>,
    },
    /// User/ssh-key credentials.
    USK {
        username: String,
        /// Passphrase of the private key
        password: String,
        private_key: String,
        /// privilege credential only use for SSH service
        privilege: Option<PrivilegeInformation>,
    },
    /// SNMP credentials.
    SNMP {
        username: String,
        password: String,
        community: String,
        auth_algorithm: String,
        privacy_password: String,
        privacy_algorithm: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("{service} credential is missing the required field {field}.")]
    MissingField {
        service: &'static str,
        field: &'static str,
    },
    #[error("{service} credential has an invalid {field}: {value}.")]
    InvalidValue {
        service: &'static str,
        field: &'static str,
        value: String,
    },
}

fn param<'a>(params: &'a CredentialParams, key: &str) -> &'a str {
    params.get(key).map(String::as_str).unwrap_or_default()
}

fn required(
    service: Service,
    params: &CredentialParams,
    field: &'static str,
) -> Result<String, CredentialError> {
    match param(params, field) {
        "" => Err(CredentialError::MissingField {
            service: service.name(),
            field,
        }),
        value => Ok(value.to_owned()),
    }
}

fn privilege(params: &CredentialParams) -> Option<PrivilegeInformation> {
    match param(params, "privilege_username") {
        "" => None,
        username => Some(PrivilegeInformation {
            username: username.to_owned(),
            password: param(params, "privilege_password").to_owned(),
        }),
    }
}

fn snmp(params: &CredentialParams) -> Result<CredentialType, CredentialError> {
    let invalid = |field, value: &str| CredentialError::InvalidValue {
        service: "snmp",
        field,
        value: value.to_owned(),
    };
    let username = param(params, "username");
    let community = param(params, "community");
    if username.is_empty() && community.is_empty() {
        return Err(CredentialError::MissingField {
            service: "snmp",
            field: "username",
        });
    }

    let auth_algorithm = param(params, "auth_algorithm");
    if !username.is_empty() && !matches!(auth_algorithm, "md5" | "sha1") {
        return Err(invalid("auth_algorithm", auth_algorithm));
    }
    // if there is a privacy password, a valid privacy algorithm must be provided.
    let privacy_password = param(params, "privacy_password");
    let privacy_algorithm = param(params, "privacy_algorithm");
    match privacy_algorithm {
        "aes" | "des" => {}
        "" if privacy_password.is_empty() => {}
        _ => return Err(invalid("privacy_algorithm", privacy_algorithm)),
    }

    Ok(CredentialType::SNMP {
        username: username.to_owned(),
        password: param(params, "password").to_owned(),
        community: community.to_owned(),
        auth_algorithm: auth_algorithm.to_owned(),
        privacy_password: privacy_password.to_owned(),
        privacy_algorithm: privacy_algorithm.to_owned(),
    })
}

impl Credential {
    /// Builds a credential out of the parameters a client sent for a service.
    ///
    /// Returns `Ok(None)` for services that are not supported. A credential that
    /// lacks a required field or carries an invalid algorithm is an error.
    pub fn from_params(
        service: &str,
        params: &CredentialParams,
    ) -> Result<Option<Self>, CredentialError> {
        let Ok(service) = service.parse::<Service>() else {
            return Ok(None);
        };
        let credential_type = match service {
            Service::SSH => {
                let username = required(service, params, "username")?;
                match param(params, "type") {
                    "up" => CredentialType::UP {
                        username,
                        password: param(params, "password").to_owned(),
                        privilege: privilege(params),
                    },
                    _ => CredentialType::USK {
                        username,
                        password: param(params, "password").to_owned(),
                        private_key: required(service, params, "private")?,
                        privilege: privilege(params),
                    },
                }
            }
            Service::SMB | Service::ESXi => CredentialType::UP {
                username: required(service, params, "username")?,
                password: param(params, "password").to_owned(),
                privilege: None,
            },
            Service::SNMP => snmp(params)?,
        };
        let port = match param(params, "port") {
            "" => None,
            port => Some(port.to_owned()),
        };
        Ok(Some(Credential {
            service,
            port,
            credential_type,
        }))
    }
}
