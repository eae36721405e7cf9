// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use serde::{Deserialize, Serialize};

/// A scanner option as sent by a client, e.g. `safe_checks=1`.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPreference {
    /// Name of the option as openvas knows it.
    pub id: String,
    /// Value as sent by the client; see [ScanPreference::engine_value].
    pub value: String,
}

/// Default of a known option, its variant decides how values are rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    Bool(bool),
    Int(i64),
    String(&'static str),
}

impl Default for PreferenceValue {
    fn default() -> Self {
        Self::Int(0)
    }
}

/// A scanner option openvas understands.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanPreferenceInformation {
    /// Name used in the preference line
    pub id: &'static str,
    /// Human readable name
    pub name: &'static str,
    pub default: PreferenceValue,
    pub description: &'static str,
}

/// Scanner preferences the engine knows about.
pub const PREFERENCES: [ScanPreferenceInformation; 22] = [
    ScanPreferenceInformation {
        id: "auto_enable_dependencies",
        name: "Automatic Enable Dependencies",
        default: PreferenceValue::Bool(true),
        description: "Automatically enable the plugins that are depended on.",
    },
    ScanPreferenceInformation {
        id: "cgi_path",
        name: "CGI Path",
        default: PreferenceValue::String("/cgi-bin:/scripts"),
        description: "Paths where the engine looks for default CGIs, separated by ':'.",
    },
    ScanPreferenceInformation {
        id: "checks_read_timeout",
        name: "Checks Read Timeout",
        default: PreferenceValue::Int(5),
        description: "Number of seconds that the security checks will wait for when doing a recv().",
    },
    ScanPreferenceInformation {
        id: "drop_privileges",
        name: "Drop Privileges",
        default: PreferenceValue::Bool(false),
        description: "Drop the root privileges of the engine process before running plugins.",
    },
    ScanPreferenceInformation {
        id: "network_scan",
        name: "Network Scan",
        default: PreferenceValue::Bool(false),
        description: "Scan the whole network at once instead of host by host.",
    },
    ScanPreferenceInformation {
        id: "non_simult_ports",
        name: "Non simultaneous ports",
        default: PreferenceValue::String("139, 445, 3389, Services/irc"),
        description: "Ports on which the engine never opens two connections at the same time.",
    },
    ScanPreferenceInformation {
        id: "open_sock_max_attempts",
        name: "Maximum Attempts to open Sockets",
        default: PreferenceValue::Int(5),
        description: "Unsuccessful retries to open a socket before the port is set as closed.",
    },
    ScanPreferenceInformation {
        id: "timeout_retry",
        name: "Socket timeout retry",
        default: PreferenceValue::Int(5),
        description: "Number of retries when a socket connection attempt times out.",
    },
    ScanPreferenceInformation {
        id: "optimize_test",
        name: "Optimize Test",
        default: PreferenceValue::Bool(true),
        description: "Only launch plugins against the services they have been designed to check.",
    },
    ScanPreferenceInformation {
        id: "plugins_timeout",
        name: "Plugins Timeout",
        default: PreferenceValue::Int(5),
        description: "Maximum lifetime of a plugin in seconds.",
    },
    ScanPreferenceInformation {
        id: "report_host_details",
        name: "Report Host Details",
        default: PreferenceValue::Bool(true),
        description: "Report general information collected about a host as results.",
    },
    ScanPreferenceInformation {
        id: "safe_checks",
        name: "Safe Checks",
        default: PreferenceValue::Bool(true),
        description: "Disable the plugins which have the potential to crash the remote services.",
    },
    ScanPreferenceInformation {
        id: "scanner_plugins_timeout",
        name: "ACT_SCANNER plugins timeout",
        default: PreferenceValue::Int(36000),
        description: "Like 'Plugins Timeout', but for ACT_SCANNER plugins.",
    },
    ScanPreferenceInformation {
        id: "time_between_request",
        name: "Time between Requests",
        default: PreferenceValue::Int(0),
        description: "Milliseconds to wait between two network actions. 0 disables the wait.",
    },
    ScanPreferenceInformation {
        id: "unscanned_closed",
        name: "Close unscanned Port TCP",
        default: PreferenceValue::Bool(true),
        description: "Treat TCP ports that were not scanned like closed ports.",
    },
    ScanPreferenceInformation {
        id: "unscanned_closed_udp",
        name: "Close unscanned Port UDP",
        default: PreferenceValue::Bool(true),
        description: "Treat UDP ports that were not scanned like closed ports.",
    },
    ScanPreferenceInformation {
        id: "expand_vhosts",
        name: "Expand VHosts",
        default: PreferenceValue::Bool(true),
        description: "Expand the target host list with the vhosts of its hostnames.",
    },
    ScanPreferenceInformation {
        id: "test_empty_vhost",
        name: "Test Empty VHost",
        default: PreferenceValue::Bool(false),
        description: "Also test the host by its IP address when it has vhosts.",
    },
    ScanPreferenceInformation {
        id: "test_alive_hosts_only",
        name: "Test Alive Hosts Only",
        default: PreferenceValue::Bool(false),
        description: "Let the engine's own alive detection decide which hosts are scanned.",
    },
    ScanPreferenceInformation {
        id: "table_driven_lsc",
        name: "Table Driven LSC",
        default: PreferenceValue::Bool(true),
        description: "Run local security checks through the table driven backend.",
    },
    ScanPreferenceInformation {
        id: "dry_run",
        name: "Dry Run",
        default: PreferenceValue::Bool(false),
        description: "Simulate a scan, every selected VT produces a log result.",
    },
    ScanPreferenceInformation {
        id: "max_hosts",
        name: "Maximum Hosts",
        default: PreferenceValue::Int(30),
        description: "Maximum number of hosts scanned at the same time.",
    },
];

/// Returns the known preference with that id.
pub fn preference(id: &str) -> Option<&'static ScanPreferenceInformation> {
    PREFERENCES.iter().find(|p| p.id == id)
}

impl ScanPreference {
    /// The value as the engine expects it.
    ///
    /// Booleans are rendered as `yes` or `no`, `1`, `yes` and `true` being the
    /// truthy spellings. Everything else, including unknown preferences, is
    /// passed on as it is.
    pub fn engine_value(&self) -> String {
        match preference(&self.id).map(|p| &p.default) {
            Some(PreferenceValue::Bool(_)) => {
                let truthy = matches!(
                    self.value.trim().to_ascii_lowercase().as_str(),
                    "1" | "yes" | "true"
                );
                if truthy { "yes" } else { "no" }.to_owned()
            }
            _ => self.value.clone(),
        }
    }
}
