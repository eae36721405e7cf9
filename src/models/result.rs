// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use serde::{Deserialize, Serialize};

/// Enum of possible types of results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    /// Vulnerability
    Alarm,
    #[default]
    /// Log message
    Log,
    /// Some kind of error during the scan
    Error,
    /// Information about a host, like a detected operating system
    HostDetail,
}

impl std::fmt::Display for ResultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ResultType::Alarm => "alarm",
                ResultType::Log => "log",
                ResultType::Error => "error",
                ResultType::HostDetail => "host_detail",
            }
        )
    }
}

impl ResultType {
    /// Maps the kind token of a result record.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "ERRMSG" => Some(ResultType::Error),
            "LOG" => Some(ResultType::Log),
            "HOST_DETAIL" => Some(ResultType::HostDetail),
            "ALARM" => Some(ResultType::Alarm),
            _ => None,
        }
    }
}

/// Scan result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScanResult {
    #[serde(rename = "type")]
    /// Type of the result
    pub result_type: ResultType,
    /// Address of the host the result belongs to. Empty for scan wide results.
    pub host: String,
    #[serde(default)]
    /// DNS
    pub hostname: String,
    #[serde(default)]
    /// Port, e.g. `443/tcp` or `general/tcp`
    pub port: String,
    #[serde(default)]
    /// ID of the VT, which generated the result
    pub oid: String,
    #[serde(default)]
    /// Name of the VT, empty when the VT is unknown
    pub name: String,
    #[serde(default)]
    /// Additional information
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    /// Quality of detection
    pub qod: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    /// Severity score, only for alarms
    pub severity: Option<f32>,
}
