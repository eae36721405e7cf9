// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use super::severity::{CVSS_BASE_V2, cvss_base_v2};

/// Type of a VT parameter. It decides which values the engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    #[doc = "checkbox"]
    CheckBox,
    #[doc = "entry"]
    Entry,
    #[doc = "file"]
    File,
    #[doc = "password"]
    Password,
    #[doc = "radio"]
    Radio,
    #[doc = "sshlogin"]
    SshLogin,
    #[doc = "integer"]
    Integer,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown parameter type: {0}")]
pub struct UnknownParameterType(pub String);

impl FromStr for ParameterType {
    type Err = UnknownParameterType;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use ParameterType::*;
        match s {
            "checkbox" => Ok(CheckBox),
            "entry" => Ok(Entry),
            "file" => Ok(File),
            "password" => Ok(Password),
            "radio" => Ok(Radio),
            "sshlogin" => Ok(SshLogin),
            "integer" => Ok(Integer),
            _ => Err(UnknownParameterType(s.to_owned())),
        }
    }
}

impl AsRef<str> for ParameterType {
    fn as_ref(&self) -> &str {
        use ParameterType::*;
        match self {
            CheckBox => "checkbox",
            Entry => "entry",
            File => "file",
            Password => "password",
            Radio => "radio",
            SshLogin => "sshlogin",
            Integer => "integer",
        }
    }
}

impl Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// A parameter a VT declares and a client may override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VtParameter {
    pub id: u16,
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default)]
    pub default: String,
}

/// Quality of detection type of a VT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QodType {
    Exploit,
    RemoteVul,
    RemoteApp,
    Package,
    Registry,
    RemoteActive,
    RemoteBanner,
    ExecutableVersion,
    RemoteAnalysis,
    RemoteProbe,
    RemoteBannerUnreliable,
    ExecutableVersionUnreliable,
    PackageUnreliable,
    GeneralNote,
    Default,
}

impl QodType {
    /// The quality of detection in percent.
    pub fn value(&self) -> u8 {
        use QodType::*;
        match self {
            Exploit => 100,
            RemoteVul => 99,
            RemoteApp => 98,
            Package | Registry => 97,
            RemoteActive => 95,
            RemoteBanner | ExecutableVersion => 80,
            RemoteAnalysis => 70,
            RemoteProbe => 50,
            RemoteBannerUnreliable | ExecutableVersionUnreliable | PackageUnreliable => 30,
            GeneralNote => 1,
            Default => 70,
        }
    }
}

impl FromStr for QodType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use QodType::*;
        Ok(match s {
            "exploit" => Exploit,
            "remote_vul" => RemoteVul,
            "remote_app" => RemoteApp,
            "package" => Package,
            "registry" => Registry,
            "remote_active" => RemoteActive,
            "remote_banner" => RemoteBanner,
            "executable_version" => ExecutableVersion,
            "remote_analysis" => RemoteAnalysis,
            "remote_probe" => RemoteProbe,
            "remote_banner_unreliable" => RemoteBannerUnreliable,
            "executable_version_unreliable" => ExecutableVersionUnreliable,
            "package_unreliable" => PackageUnreliable,
            "general_note" => GeneralNote,
            "default" => Default,
            _ => return Err(format!("unknown qod_type {s}")),
        })
    }
}

/// Severity descriptor of a VT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Severity {
    pub vector: Option<String>,
    /// Scoring scheme of the vector, e.g. `cvss_base_v2`.
    pub severity_type: Option<String>,
    pub origin: Option<String>,
    pub date: Option<i64>,
}

impl Severity {
    /// Numeric base score, only for the supported scheme and only when a vector is set.
    pub fn score(&self) -> Option<f32> {
        match (self.severity_type.as_deref(), self.vector.as_deref()) {
            (Some(CVSS_BASE_V2), Some(vector)) if !vector.is_empty() => cvss_base_v2(vector),
            _ => None,
        }
    }
}

/// A reference like a CVE or a BID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VtReference {
    pub class: String,
    pub id: String,
}

/// Metadata of a single VT as far as scan orchestration needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VtRecord {
    pub oid: String,
    pub name: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub parameters: BTreeMap<u16, VtParameter>,
    #[serde(default)]
    pub references: Vec<VtReference>,
    /// OIDs of the VTs this one depends on
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub qod_type: Option<QodType>,
    #[serde(default)]
    pub qod: Option<u8>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub creation_time: Option<i64>,
    #[serde(default)]
    pub modification_time: Option<i64>,
    /// Descriptive tags like summary, insight or solution.
    #[serde(default)]
    pub custom: BTreeMap<String, String>,
}

impl VtRecord {
    /// The quality of detection. A known QoD type wins over an explicit value.
    pub fn qod(&self) -> Option<u8> {
        self.qod_type.map(|t| t.value()).or(self.qod)
    }

    pub fn parameter(&self, id: u16) -> Option<&VtParameter> {
        self.parameters.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qod_type_wins_over_value() {
        let mut vt = VtRecord {
            qod: Some(42),
            ..Default::default()
        };
        assert_eq!(vt.qod(), Some(42));
        vt.qod_type = Some("remote_banner".parse().unwrap());
        assert_eq!(vt.qod(), Some(80));
        assert!("nonsense".parse::<QodType>().is_err());
    }

    #[test]
    fn severity_only_for_supported_scheme() {
        let mut severity = Severity {
            vector: Some("AV:N/AC:L/Au:N/C:P/I:P/A:P".into()),
            severity_type: Some("cvss_base_v2".into()),
            ..Default::default()
        };
        assert_eq!(severity.score(), Some(7.5));
        severity.severity_type = Some("cvss_base_v3".into());
        assert_eq!(severity.score(), None);
        severity.severity_type = Some("cvss_base_v2".into());
        severity.vector = None;
        assert_eq!(severity.score(), None);
    }

    #[test]
    fn parameter_type_names() {
        for name in [
            "checkbox", "entry", "file", "password", "radio", "sshlogin", "integer",
        ] {
            assert_eq!(name.parse::<ParameterType>().unwrap().as_ref(), name);
        }
        assert!("scanner".parse::<ParameterType>().is_err());
    }
}
