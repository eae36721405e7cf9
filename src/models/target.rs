// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

use serde::{Deserialize, Deserializer, Serialize};

use super::credential::CredentialParams;

pub type Host = String;

/// Information about a target of a scan
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// List of hosts to scan
    pub hosts: Vec<Host>,
    /// Port list in the engine notation, e.g. `T:22,80,U:161`
    #[serde(default)]
    pub ports: String,
    #[serde(default)]
    /// List of excluded hosts to scan
    pub excluded_hosts: Vec<Host>,
    /// Hosts a previous attempt of this scan already finished.
    #[serde(default)]
    pub finished_hosts: Vec<Host>,
    /// Credentials keyed by service, e.g. `ssh`.
    #[serde(default)]
    pub credentials: BTreeMap<String, CredentialParams>,
    #[serde(
        default,
        deserialize_with = "alive_test_from_mask",
        skip_serializing_if = "Option::is_none"
    )]
    /// Methods used for alive testing
    pub alive_test: Option<AliveTest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Ports used for alive testing
    pub alive_test_ports: Option<String>,
    #[serde(default)]
    /// If multiple IP addresses resolve to the same DNS name the DNS name will only get scanned
    /// once.
    pub reverse_lookup_unify: Option<bool>,
    #[serde(default)]
    /// Only scan IP addresses that can be resolved into a DNS name.
    pub reverse_lookup_only: Option<bool>,
}

/// Enum of possible alive test methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliveTestMethods {
    TcpAck = 0x01,
    Icmp = 0x02,
    Arp = 0x04,
    ConsiderAlive = 0x08,
    TcpSyn = 0x10,
}

impl Display for AliveTestMethods {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AliveTestMethods::TcpAck => write!(f, "tcp_ack"),
            AliveTestMethods::Icmp => write!(f, "icmp"),
            AliveTestMethods::Arp => write!(f, "arp"),
            AliveTestMethods::ConsiderAlive => write!(f, "consider_alive"),
            AliveTestMethods::TcpSyn => write!(f, "tcp_syn"),
        }
    }
}

/// Selected alive test methods.
///
/// Clients send them as a bitmask of [AliveTestMethods]; only masks within
/// `1..=31` select anything, everything else leaves the engine defaults in place.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub struct AliveTest {
    pub tcp_ack: bool,
    pub icmp: bool,
    pub arp: bool,
    pub consider_alive: bool,
    pub tcp_syn: bool,
}

impl AliveTest {
    pub fn from_mask(mask: i64) -> Option<Self> {
        if !(1..=31).contains(&mask) {
            return None;
        }
        let set = |m: AliveTestMethods| mask & m as i64 != 0;
        Some(Self {
            tcp_ack: set(AliveTestMethods::TcpAck),
            icmp: set(AliveTestMethods::Icmp),
            arp: set(AliveTestMethods::Arp),
            consider_alive: set(AliveTestMethods::ConsiderAlive),
            tcp_syn: set(AliveTestMethods::TcpSyn),
        })
    }

    pub fn mask(&self) -> u8 {
        [
            (self.tcp_ack, AliveTestMethods::TcpAck),
            (self.icmp, AliveTestMethods::Icmp),
            (self.arp, AliveTestMethods::Arp),
            (self.consider_alive, AliveTestMethods::ConsiderAlive),
            (self.tcp_syn, AliveTestMethods::TcpSyn),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .fold(0, |mask, (_, m)| mask | m as u8)
    }

    pub fn methods(&self) -> Vec<AliveTestMethods> {
        [
            (self.tcp_ack, AliveTestMethods::TcpAck),
            (self.icmp, AliveTestMethods::Icmp),
            (self.arp, AliveTestMethods::Arp),
            (self.consider_alive, AliveTestMethods::ConsiderAlive),
            (self.tcp_syn, AliveTestMethods::TcpSyn),
        ]
        .into_iter()
        .filter_map(|(enabled, m)| enabled.then_some(m))
        .collect()
    }
}

impl From<AliveTest> for u8 {
    fn from(value: AliveTest) -> Self {
        value.mask()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMask {
    Number(i64),
    Text(String),
}

fn alive_test_from_mask<'de, D>(deserializer: D) -> Result<Option<AliveTest>, D::Error>
where
    D: Deserializer<'de>,
{
    let mask = match Option::<RawMask>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(RawMask::Number(x)) => x,
        Some(RawMask::Text(x)) => match x.trim().parse() {
            Ok(x) => x,
            Err(_) => {
                tracing::debug!(value = x, "alive test settings not applied, invalid value");
                return Ok(None);
            }
        },
    };
    let result = AliveTest::from_mask(mask);
    if result.is_none() {
        tracing::debug!(mask, "alive test mask out of range, using engine defaults");
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_round_trip_for_valid_range() {
        assert_eq!(AliveTest::from_mask(0), None);
        assert_eq!(AliveTest::from_mask(32), None);
        assert_eq!(AliveTest::from_mask(-1), None);
        let at = AliveTest::from_mask(18).unwrap();
        assert_eq!(
            at.methods(),
            vec![AliveTestMethods::Icmp, AliveTestMethods::TcpSyn]
        );
        assert_eq!(at.mask(), 18);
    }

    #[test]
    fn deserialize_alive_test() {
        let target: Target =
            serde_json::from_str(r#"{"hosts": ["127.0.0.1"], "alive_test": "2"}"#).unwrap();
        assert_eq!(
            target.alive_test,
            Some(AliveTest {
                icmp: true,
                ..Default::default()
            })
        );
        let target: Target =
            serde_json::from_str(r#"{"hosts": ["127.0.0.1"], "alive_test": 64}"#).unwrap();
        assert_eq!(target.alive_test, None);
        let target: Target =
            serde_json::from_str(r#"{"hosts": ["127.0.0.1"], "alive_test": "all"}"#).unwrap();
        assert_eq!(target.alive_test, None);
        let target: Target = serde_json::from_str(r#"{"hosts": ["127.0.0.1"]}"#).unwrap();
        assert_eq!(target.alive_test, None);
    }
}
