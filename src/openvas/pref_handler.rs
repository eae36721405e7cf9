// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Translates a scan into the preference lines openvas reads from
//! `internal/<id>/scanprefs`.

use std::collections::{BTreeMap, HashSet};

use base64::{Engine as _, engine::general_purpose};

use super::error::ConfigRejection;
use crate::catalog::{ParameterType, VtCatalog};
use crate::models::{AliveTest, Credential, CredentialType, Scan, Service, VT};
use crate::storage::ScanIndex;

const OID_SSH_AUTH: &str = "1.3.6.1.4.1.25623.1.0.103591";
const OID_SMB_AUTH: &str = "1.3.6.1.4.1.25623.1.0.90023";
const OID_ESXI_AUTH: &str = "1.3.6.1.4.1.25623.1.0.105058";
const OID_SNMP_AUTH: &str = "1.3.6.1.4.1.25623.1.0.105076";
const OID_PING_HOST: &str = "1.3.6.1.4.1.25623.1.0.100315";

const BOREAS_ALIVE_TEST: &str = "ALIVE_TEST";
const BOREAS_ALIVE_TEST_PORTS: &str = "ALIVE_TEST_PORTS";

fn bool_to_str(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// A VT parameter that was not handed to openvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedParameter {
    pub oid: String,
    pub id: u16,
    pub value: String,
    /// Declared type the value did not match; `None` when the VT does not declare the parameter.
    pub expected: Option<ParameterType>,
}

/// Result of translating a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledPreferences {
    options: Vec<String>,
    preferences: Vec<String>,
    /// OIDs of the VTs to run.
    pub vts: Vec<String>,
    pub dropped: Vec<DroppedParameter>,
}

impl CompiledPreferences {
    /// All preference lines in the order they are stored. The main index is
    /// only known after allocation, so it is added here.
    pub fn lines(&self, main_index: ScanIndex) -> Vec<String> {
        let mut lines = self.options.clone();
        lines.push(format!("ov_maindbid|||{main_index}"));
        lines.extend(self.preferences.iter().cloned());
        lines
    }
}

/// Checks a client supplied value against the declared type and returns the
/// value as openvas expects it.
pub fn check_param_type(value: &str, param_type: ParameterType) -> Option<String> {
    match param_type {
        ParameterType::Entry
        | ParameterType::Password
        | ParameterType::Radio
        | ParameterType::SshLogin => Some(value.to_owned()),
        ParameterType::CheckBox => match value {
            "0" => Some("no".to_owned()),
            "1" => Some("yes".to_owned()),
            _ => None,
        },
        ParameterType::File => general_purpose::STANDARD
            .decode(value)
            .is_ok()
            .then(|| value.to_owned()),
        ParameterType::Integer => value.trim().parse::<i64>().is_ok().then(|| value.to_owned()),
    }
}

/// The classic alive detection settings of ping_host.nasl.
pub fn alive_test_preferences(alive_test: &AliveTest) -> Vec<(String, String)> {
    let ack = alive_test.tcp_ack;
    let syn = alive_test.tcp_syn;
    let mut prefs = vec![
        (
            format!("{OID_PING_HOST}:1:checkbox:Do a TCP ping"),
            bool_to_str(ack || syn),
        ),
        (
            format!("{OID_PING_HOST}:2:checkbox:TCP ping tries also TCP-SYN ping"),
            bool_to_str(ack && syn),
        ),
        (
            format!("{OID_PING_HOST}:7:checkbox:TCP ping tries only TCP-SYN ping"),
            bool_to_str(syn && !ack),
        ),
        (
            format!("{OID_PING_HOST}:3:checkbox:Do an ICMP ping"),
            bool_to_str(alive_test.icmp),
        ),
        (
            format!("{OID_PING_HOST}:4:checkbox:Use ARP"),
            bool_to_str(alive_test.arp),
        ),
        // Mark unreachable hosts as dead means the opposite of consider alive.
        (
            format!("{OID_PING_HOST}:5:checkbox:Mark unreachable Hosts as dead (not scanning)"),
            bool_to_str(!alive_test.consider_alive),
        ),
    ];
    // Without any method selected openvas warns, although every host is considered alive.
    if alive_test.mask() == crate::models::AliveTestMethods::ConsiderAlive as u8 {
        prefs.push((format!("{OID_PING_HOST}:1:checkbox:Do a TCP ping"), "yes"));
    }
    prefs
        .into_iter()
        .map(|(k, v)| (k, v.to_owned()))
        .collect()
}

fn credential_preferences(credential: Credential) -> Vec<String> {
    let mut prefs = Vec::new();
    match (credential.service, credential.credential_type) {
        (
            Service::SSH,
            CredentialType::UP {
                username,
                password,
                privilege,
            },
        ) => {
            prefs.push(format!(
                "auth_port_ssh|||{}",
                credential.port.as_deref().unwrap_or("22")
            ));
            prefs.push(format!("{OID_SSH_AUTH}:1:entry:SSH login name:|||{username}"));
            prefs.push(format!(
                "{OID_SSH_AUTH}:3:password:SSH password (unsafe!):|||{password}"
            ));
            if let Some(p) = privilege {
                prefs.push(format!(
                    "{OID_SSH_AUTH}:7:entry:SSH privilege login name:|||{}",
                    p.username
                ));
                prefs.push(format!(
                    "{OID_SSH_AUTH}:8:password:SSH privilege password:|||{}",
                    p.password
                ));
            }
        }
        (
            Service::SSH,
            CredentialType::USK {
                username,
                password,
                private_key,
                privilege,
            },
        ) => {
            prefs.push(format!(
                "auth_port_ssh|||{}",
                credential.port.as_deref().unwrap_or("22")
            ));
            prefs.push(format!("{OID_SSH_AUTH}:1:entry:SSH login name:|||{username}"));
            prefs.push(format!(
                "{OID_SSH_AUTH}:2:password:SSH key passphrase:|||{password}"
            ));
            prefs.push(format!(
                "{OID_SSH_AUTH}:4:file:SSH private key:|||{private_key}"
            ));
            if let Some(p) = privilege {
                prefs.push(format!(
                    "{OID_SSH_AUTH}:7:entry:SSH privilege login name:|||{}",
                    p.username
                ));
                prefs.push(format!(
                    "{OID_SSH_AUTH}:8:password:SSH privilege password:|||{}",
                    p.password
                ));
            }
        }
        (
            Service::SMB,
            CredentialType::UP {
                username, password, ..
            },
        ) => {
            prefs.push(format!("{OID_SMB_AUTH}:1:entry:SMB login:|||{username}"));
            prefs.push(format!("{OID_SMB_AUTH}:2:password:SMB password:|||{password}"));
        }
        (
            Service::ESXi,
            CredentialType::UP {
                username, password, ..
            },
        ) => {
            prefs.push(format!(
                "{OID_ESXI_AUTH}:1:entry:ESXi login name:|||{username}"
            ));
            prefs.push(format!(
                "{OID_ESXI_AUTH}:2:password:ESXi login password:|||{password}"
            ));
        }
        (
            Service::SNMP,
            CredentialType::SNMP {
                username,
                password,
                community,
                auth_algorithm,
                privacy_password,
                privacy_algorithm,
            },
        ) => {
            prefs.push(format!(
                "{OID_SNMP_AUTH}:1:password:SNMP Community:|||{community}"
            ));
            prefs.push(format!("{OID_SNMP_AUTH}:2:entry:SNMPv3 Username:|||{username}"));
            prefs.push(format!(
                "{OID_SNMP_AUTH}:3:password:SNMPv3 Password:|||{password}"
            ));
            prefs.push(format!(
                "{OID_SNMP_AUTH}:4:radio:SNMPv3 Authentication Algorithm:|||{auth_algorithm}"
            ));
            prefs.push(format!(
                "{OID_SNMP_AUTH}:5:password:SNMPv3 Privacy Password:|||{privacy_password}"
            ));
            prefs.push(format!(
                "{OID_SNMP_AUTH}:6:radio:SNMPv3 Privacy Algorithm:|||{privacy_algorithm}"
            ));
        }
        (service, _) => {
            tracing::debug!(service = service.name(), "credential type not supported by service");
        }
    }
    prefs
}

#[derive(Debug)]
pub struct PreferenceHandler<'a> {
    scan_config: &'a Scan,
    catalog: &'a VtCatalog,
    result: CompiledPreferences,
    nvt_params: BTreeMap<String, String>,
}

impl<'a> PreferenceHandler<'a> {
    pub fn new(scan_config: &'a Scan, catalog: &'a VtCatalog) -> Self {
        Self {
            scan_config,
            catalog,
            result: CompiledPreferences::default(),
            nvt_params: BTreeMap::new(),
        }
    }

    pub fn prepare_preferences_for_openvas(mut self) -> Result<CompiledPreferences, ConfigRejection> {
        self.prepare_scan_params_for_openvas();
        self.prepare_target_for_openvas();
        self.prepare_ports_for_openvas()?;
        self.prepare_reverse_lookup_opt_for_openvas();
        self.prepare_credentials_for_openvas()?;
        self.prepare_plugins_for_openvas()?;
        // Alive test preferences overwrite parameters of ping_host.nasl a client
        // may have set, therefore they are merged before the VT preferences are stored.
        self.prepare_alive_test_option_for_openvas();
        self.prepare_nvt_preferences();
        self.prepare_boreas_alive_test();
        Ok(self.result)
    }

    fn push(&mut self, key: &str, value: impl std::fmt::Display) {
        self.result.preferences.push(format!("{key}|||{value}"));
    }

    fn prepare_scan_params_for_openvas(&mut self) {
        let target = &self.scan_config.target;
        let exclude_hosts = target
            .excluded_hosts
            .iter()
            .chain(target.finished_hosts.iter())
            .filter(|h| !h.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(",");

        let mut options: Vec<(String, String)> = self
            .scan_config
            .scan_preferences
            .iter()
            .map(|p| (p.id.clone(), p.engine_value()))
            .collect();
        if !exclude_hosts.is_empty() {
            match options.iter_mut().find(|(id, _)| id == "exclude_hosts") {
                Some((_, value)) => *value = exclude_hosts,
                None => options.push(("exclude_hosts".to_owned(), exclude_hosts)),
            }
        }
        self.result.options = options
            .into_iter()
            .map(|(id, value)| format!("{id}|||{value}"))
            .collect();
    }

    fn prepare_target_for_openvas(&mut self) {
        let target = self.scan_config.target.hosts.join(",");
        self.push("TARGET", target);
    }

    fn prepare_ports_for_openvas(&mut self) -> Result<(), ConfigRejection> {
        let ports = self.scan_config.target.ports.trim();
        if ports.is_empty() {
            return Err(ConfigRejection::NoPortList);
        }
        self.push("port_range", ports.to_owned());
        Ok(())
    }

    fn prepare_reverse_lookup_opt_for_openvas(&mut self) {
        let target = &self.scan_config.target;
        if let Some(only) = target.reverse_lookup_only {
            self.push("reverse_lookup_only", bool_to_str(only));
        }
        if let Some(unify) = target.reverse_lookup_unify {
            self.push("reverse_lookup_unify", bool_to_str(unify));
        }
    }

    fn prepare_credentials_for_openvas(&mut self) -> Result<(), ConfigRejection> {
        for (service, params) in &self.scan_config.target.credentials {
            match Credential::from_params(service, params) {
                Ok(Some(credential)) => {
                    let prefs = credential_preferences(credential);
                    self.result.preferences.extend(prefs);
                }
                Ok(None) => tracing::debug!(service, "ignoring credential of unknown service"),
                Err(e) => return Err(ConfigRejection::MalformedCredential(e)),
            }
        }
        Ok(())
    }

    fn process_vt(&mut self, vt: &VT) -> bool {
        let Some(nvt) = self.catalog.get(&vt.oid) else {
            tracing::warn!(oid = vt.oid, "VT not found, it will not be loaded");
            return false;
        };
        for pref in &vt.parameters {
            let Some(declared) = nvt.parameter(pref.id) else {
                tracing::debug!(
                    oid = vt.oid,
                    pref = pref.id,
                    "missing type or name for VT parameter, it will not be loaded"
                );
                self.result.dropped.push(DroppedParameter {
                    oid: vt.oid.clone(),
                    id: pref.id,
                    value: pref.value.clone(),
                    expected: None,
                });
                continue;
            };
            // The timeout preference is always an integer.
            let check_as = if pref.id == 0 {
                ParameterType::Integer
            } else {
                declared.param_type
            };
            match check_param_type(&pref.value, check_as) {
                Some(value) => {
                    self.nvt_params.insert(
                        format!(
                            "{}:{}:{}:{}",
                            vt.oid, pref.id, declared.param_type, declared.name
                        ),
                        value,
                    );
                }
                None => {
                    tracing::debug!(
                        oid = vt.oid,
                        pref = pref.id,
                        expected = %check_as,
                        value = pref.value,
                        "VT parameter has an invalid value, it will not be loaded"
                    );
                    self.result.dropped.push(DroppedParameter {
                        oid: vt.oid.clone(),
                        id: pref.id,
                        value: pref.value.clone(),
                        expected: Some(check_as),
                    });
                }
            }
        }
        true
    }

    fn vts_in_groups(&self) -> Vec<String> {
        let mut result = Vec::new();
        for group in &self.scan_config.vt_groups {
            match group.split_once('=') {
                Some(("family", family)) => {
                    result.extend(self.catalog.family(family.trim()).into_iter().map(String::from))
                }
                _ => tracing::debug!(group, "unsupported VT group filter"),
            }
        }
        result
    }

    fn prepare_plugins_for_openvas(&mut self) -> Result<(), ConfigRejection> {
        let mut nvts = self.vts_in_groups();
        let scan_config = self.scan_config;
        for vt in &scan_config.vts {
            if self.process_vt(vt) {
                nvts.push(vt.oid.clone());
            }
        }
        let mut seen = HashSet::new();
        nvts.retain(|oid| seen.insert(oid.clone()));
        if nvts.is_empty() {
            return Err(ConfigRejection::NoVts);
        }

        self.push("plugin_set", nvts.join(";"));
        self.result.vts = nvts;
        Ok(())
    }

    fn prepare_alive_test_option_for_openvas(&mut self) {
        if let Some(alive_test) = &self.scan_config.target.alive_test {
            self.nvt_params.extend(alive_test_preferences(alive_test));
        }
    }

    fn prepare_nvt_preferences(&mut self) {
        let params = std::mem::take(&mut self.nvt_params);
        for (k, v) in params {
            self.push(&k, v);
        }
    }

    fn prepare_boreas_alive_test(&mut self) {
        let target = &self.scan_config.target;
        let mask = target.alive_test.map(|a| a.mask());
        let ports = target
            .alive_test_ports
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from);
        if let Some(mask) = mask {
            self.push(BOREAS_ALIVE_TEST, mask);
        }
        if let Some(ports) = ports {
            self.push(BOREAS_ALIVE_TEST_PORTS, ports);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::*;
    use crate::catalog::{VtParameter, VtRecord};
    use crate::models::{Parameter, ScanPreference, Target};

    const OID_TEST: &str = "1.3.6.1.4.1.25623.1.0.10662";

    fn catalog() -> VtCatalog {
        let params = [
            (0, "timeout", ParameterType::Entry),
            (1, "Check", ParameterType::CheckBox),
            (2, "Count", ParameterType::Integer),
            (3, "Key", ParameterType::File),
            (4, "Login", ParameterType::Entry),
        ]
        .into_iter()
        .map(|(id, name, param_type)| {
            (
                id,
                VtParameter {
                    id,
                    name: name.to_owned(),
                    param_type,
                    default: String::new(),
                },
            )
        })
        .collect::<BTreeMap<_, _>>();
        VtCatalog::new(
            1,
            [
                VtRecord {
                    oid: OID_TEST.to_owned(),
                    family: "web".to_owned(),
                    parameters: params,
                    ..Default::default()
                },
                VtRecord {
                    oid: "1.2.3".to_owned(),
                    family: "ssh".to_owned(),
                    ..Default::default()
                },
            ],
        )
    }

    fn scan() -> Scan {
        Scan {
            scan_id: "123-456".to_string(),
            target: Target {
                hosts: vec!["127.0.0.1".to_string(), "10.0.0.1".to_string()],
                ports: "T:22,80".to_owned(),
                ..Default::default()
            },
            vts: vec![VT {
                oid: OID_TEST.to_owned(),
                parameters: vec![],
            }],
            ..Default::default()
        }
    }

    fn compile(scan: &Scan) -> Result<CompiledPreferences, ConfigRejection> {
        let catalog = catalog();
        PreferenceHandler::new(scan, &catalog).prepare_preferences_for_openvas()
    }

    fn with_params(params: &[(u16, &str)]) -> CompiledPreferences {
        let mut scan = scan();
        scan.vts[0].parameters = params
            .iter()
            .map(|(id, value)| Parameter {
                id: *id,
                value: value.to_string(),
            })
            .collect();
        compile(&scan).unwrap()
    }

    fn credentials(values: &[(&str, &str)]) -> BTreeMap<String, HashMap<String, String>> {
        let params = values
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BTreeMap::from([("ssh".to_owned(), params)])
    }

    #[test]
    fn order_of_preferences() {
        let mut scan = scan();
        scan.scan_preferences = vec![ScanPreference {
            id: "safe_checks".to_owned(),
            value: "1".to_owned(),
        }];
        let lines = compile(&scan).unwrap().lines(7);
        assert_eq!(
            lines,
            vec![
                "safe_checks|||yes".to_owned(),
                "ov_maindbid|||7".to_owned(),
                "TARGET|||127.0.0.1,10.0.0.1".to_owned(),
                "port_range|||T:22,80".to_owned(),
                format!("plugin_set|||{OID_TEST}"),
            ]
        );
    }

    #[test]
    fn exclude_hosts_include_finished_hosts() {
        let mut scan = scan();
        scan.target.excluded_hosts = vec!["10.0.0.1".to_owned()];
        scan.target.finished_hosts = vec!["10.0.0.2".to_owned(), "10.0.0.3".to_owned()];
        let lines = compile(&scan).unwrap().lines(1);
        assert!(lines.contains(&"exclude_hosts|||10.0.0.1,10.0.0.2,10.0.0.3".to_owned()));

        scan.target.excluded_hosts.clear();
        let lines = compile(&scan).unwrap().lines(1);
        assert!(lines.contains(&"exclude_hosts|||10.0.0.2,10.0.0.3".to_owned()));
    }

    #[test]
    fn rejections() {
        let mut scan = scan();
        scan.target.ports = " ".to_owned();
        assert_eq!(compile(&scan), Err(ConfigRejection::NoPortList));

        let mut scan = self::scan();
        scan.vts[0].oid = "0.0.0".to_owned();
        assert_eq!(compile(&scan), Err(ConfigRejection::NoVts));

        let mut scan = self::scan();
        scan.target.credentials = credentials(&[("type", "up"), ("password", "pw")]);
        assert!(matches!(
            compile(&scan),
            Err(ConfigRejection::MalformedCredential(_))
        ));
    }

    #[test]
    fn vt_groups_resolve_families() {
        let mut scan = scan();
        scan.vt_groups = vec!["family=ssh".to_owned(), "family=ftp".to_owned(), "x".to_owned()];
        let compiled = compile(&scan).unwrap();
        assert_eq!(compiled.vts, vec!["1.2.3".to_owned(), OID_TEST.to_owned()]);
        assert!(
            compiled
                .lines(1)
                .contains(&format!("plugin_set|||1.2.3;{OID_TEST}"))
        );

        scan.vts.clear();
        scan.vt_groups = vec!["family=ftp".to_owned()];
        assert_eq!(compile(&scan), Err(ConfigRejection::NoVts));
    }

    #[test]
    fn checkbox_parameters() {
        let compiled = with_params(&[(1, "1")]);
        assert!(
            compiled
                .lines(1)
                .contains(&format!("{OID_TEST}:1:checkbox:Check|||yes"))
        );
        let compiled = with_params(&[(1, "0")]);
        assert!(
            compiled
                .lines(1)
                .contains(&format!("{OID_TEST}:1:checkbox:Check|||no"))
        );
        let compiled = with_params(&[(1, "2")]);
        assert!(!compiled.lines(1).iter().any(|l| l.contains(":1:checkbox:")));
        assert_eq!(
            compiled.dropped,
            vec![DroppedParameter {
                oid: OID_TEST.to_owned(),
                id: 1,
                value: "2".to_owned(),
                expected: Some(ParameterType::CheckBox),
            }]
        );
    }

    #[test]
    fn integer_and_file_parameters() {
        let compiled = with_params(&[(2, "abc"), (4, "admin")]);
        assert_eq!(compiled.dropped.len(), 1);
        assert!(
            compiled
                .lines(1)
                .contains(&format!("{OID_TEST}:4:entry:Login|||admin"))
        );

        let compiled = with_params(&[(2, "42")]);
        assert!(compiled.dropped.is_empty());
        assert!(
            compiled
                .lines(1)
                .contains(&format!("{OID_TEST}:2:integer:Count|||42"))
        );

        let compiled = with_params(&[(3, "aGVsbG8="), (0, "abc")]);
        assert!(
            compiled
                .lines(1)
                .contains(&format!("{OID_TEST}:3:file:Key|||aGVsbG8="))
        );
        // id 0 is checked as integer but keeps its declared type in the key
        assert_eq!(compiled.dropped[0].expected, Some(ParameterType::Integer));
        let compiled = with_params(&[(3, "not base64!"), (0, "20"), (9, "x")]);
        assert!(
            compiled
                .lines(1)
                .contains(&format!("{OID_TEST}:0:entry:timeout|||20"))
        );
        assert_eq!(compiled.dropped.len(), 2);
        assert_eq!(compiled.dropped[1].expected, None);
    }

    #[test]
    fn ssh_credentials() {
        let mut scan = scan();
        scan.target.credentials =
            credentials(&[("type", "up"), ("username", "user"), ("password", "pw")]);
        let lines = compile(&scan).unwrap().lines(1);
        let ssh: Vec<&str> = lines
            .iter()
            .map(String::as_str)
            .filter(|l| l.starts_with(OID_SSH_AUTH) || l.starts_with("auth_port_ssh"))
            .collect();
        assert_eq!(
            ssh,
            vec![
                "auth_port_ssh|||22",
                format!("{OID_SSH_AUTH}:1:entry:SSH login name:|||user").as_str(),
                format!("{OID_SSH_AUTH}:3:password:SSH password (unsafe!):|||pw").as_str(),
            ]
        );

        scan.target.credentials = credentials(&[
            ("type", "usk"),
            ("username", "user"),
            ("password", "phrase"),
            ("private", "KEY"),
            ("port", "2222"),
            ("privilege_username", "root"),
            ("privilege_password", "rootpw"),
        ]);
        let lines = compile(&scan).unwrap().lines(1);
        assert!(lines.contains(&"auth_port_ssh|||2222".to_owned()));
        assert!(lines.contains(&format!("{OID_SSH_AUTH}:2:password:SSH key passphrase:|||phrase")));
        assert!(lines.contains(&format!("{OID_SSH_AUTH}:4:file:SSH private key:|||KEY")));
        assert!(lines.contains(&format!(
            "{OID_SSH_AUTH}:7:entry:SSH privilege login name:|||root"
        )));
        assert!(!lines.iter().any(|l| l.contains("SSH password (unsafe!)")));
    }

    #[test]
    fn unknown_credential_service_is_skipped() {
        let mut scan = scan();
        scan.target.credentials = BTreeMap::from([(
            "krb5".to_owned(),
            HashMap::from([("username".to_owned(), "u".to_owned())]),
        )]);
        let compiled = compile(&scan).unwrap();
        assert_eq!(compiled.lines(1).len(), 4);
    }

    #[test]
    fn alive_test_bit_table() {
        for mask in 1..=31i64 {
            let at = AliveTest::from_mask(mask).unwrap();
            let prefs: HashMap<String, String> = alive_test_preferences(&at).into_iter().collect();
            let get = |id: &str| {
                prefs
                    .iter()
                    .find(|(k, _)| k.starts_with(&format!("{OID_PING_HOST}:{id}:")))
                    .map(|(_, v)| v.as_str())
                    .unwrap()
            };
            let ack = mask & 1 != 0;
            let icmp = mask & 2 != 0;
            let arp = mask & 4 != 0;
            let alive = mask & 8 != 0;
            let syn = mask & 16 != 0;
            let yn = |b: bool| if b { "yes" } else { "no" };
            assert_eq!(get("1"), yn(ack || syn || mask == 8), "mask {mask}");
            assert_eq!(get("2"), yn(ack && syn), "mask {mask}");
            assert_eq!(get("7"), yn(syn && !ack), "mask {mask}");
            assert_eq!(get("3"), yn(icmp), "mask {mask}");
            assert_eq!(get("4"), yn(arp), "mask {mask}");
            assert_eq!(get("5"), yn(!alive), "mask {mask}");
            assert_eq!(prefs.len(), 6);
        }
    }

    #[test]
    fn alive_test_overwrites_vt_parameters() {
        let mut scan = scan();
        scan.target.alive_test = AliveTest::from_mask(2);
        scan.target.alive_test_ports = Some("T:80".to_owned());
        let catalog = VtCatalog::new(
            1,
            [VtRecord {
                oid: OID_PING_HOST.to_owned(),
                parameters: BTreeMap::from([(
                    3,
                    VtParameter {
                        id: 3,
                        name: "Do an ICMP ping".to_owned(),
                        param_type: ParameterType::CheckBox,
                        default: "no".to_owned(),
                    },
                )]),
                ..Default::default()
            }],
        );
        scan.vts = vec![VT {
            oid: OID_PING_HOST.to_owned(),
            parameters: vec![Parameter {
                id: 3,
                value: "0".to_owned(),
            }],
        }];
        let lines = PreferenceHandler::new(&scan, &catalog)
            .prepare_preferences_for_openvas()
            .unwrap()
            .lines(1);
        let icmp: Vec<&String> = lines.iter().filter(|l| l.contains("Do an ICMP ping")).collect();
        assert_eq!(icmp, vec![&format!("{OID_PING_HOST}:3:checkbox:Do an ICMP ping|||yes")]);
        assert_eq!(lines[lines.len() - 2], "ALIVE_TEST|||2");
        assert_eq!(lines[lines.len() - 1], "ALIVE_TEST_PORTS|||T:80");
    }

    #[test]
    fn reverse_lookup() {
        let mut scan = scan();
        scan.target.reverse_lookup_only = Some(true);
        scan.target.reverse_lookup_unify = Some(false);
        let lines = compile(&scan).unwrap().lines(1);
        assert!(lines.contains(&"reverse_lookup_only|||yes".to_owned()));
        assert!(lines.contains(&"reverse_lookup_unify|||no".to_owned()));
    }
}
