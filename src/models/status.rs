// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use serde::{Deserialize, Serialize};

/// Enum of phases a scan can be in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// A scan has been requested, but not started yet
    #[default]
    Requested,
    /// The engine accepted the scan and runs it
    Running,
    /// A scan has been stopped by a client
    Stopped,
    /// A scan could not finish due to an error while scanning
    Failed,
    /// A scan has been successfully finished
    Succeeded,
    /// A scan was refused before the engine was started
    Rejected,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Requested => write!(f, "requested"),
            Phase::Running => write!(f, "running"),
            Phase::Stopped => write!(f, "stopped"),
            Phase::Failed => write!(f, "failed"),
            Phase::Succeeded => write!(f, "succeeded"),
            Phase::Rejected => write!(f, "rejected"),
        }
    }
}

/// Progress of a single host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostProgress {
    pub launched: i64,
    pub total: i64,
}

impl HostProgress {
    /// Parses a status record, `launched/total` with an optional leading `host/`.
    ///
    /// Records with an unknown total (0) or malformed ones are `None`.
    pub fn parse(record: &str) -> Option<Self> {
        let mut parts = record.rsplitn(3, '/');
        let total = parts.next()?.trim().parse::<i64>().ok()?;
        let launched = parts.next()?.trim().parse::<i64>().ok()?;
        if total == 0 {
            return None;
        }
        Some(Self { launched, total })
    }

    /// Percentage of launched VTs. A total of -1 marks a finished host.
    pub fn percent(&self) -> u8 {
        match self.total {
            -1 => 100,
            t if t > 0 => {
                (i128::from(self.launched.clamp(0, t)) * 100 / i128::from(t)) as u8
            }
            _ => 0,
        }
    }
}
