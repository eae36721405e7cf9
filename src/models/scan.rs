// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use serde::{Deserialize, Serialize};

use super::{scanner_preference::ScanPreference, target::Target};

pub type ScanID = String;

/// Struct for creating and getting a scan
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scan {
    #[serde(default)]
    /// Unique ID of a scan
    pub scan_id: ScanID,
    /// Information about the target to scan
    pub target: Target,
    #[serde(default, alias = "scanner_preferences")]
    /// Configuration options for a scan
    pub scan_preferences: Vec<ScanPreference>,
    #[serde(default)]
    /// List of VTs to execute for the target
    pub vts: Vec<VT>,
    /// Filters selecting whole groups of VTs, e.g. `family=ssh`.
    #[serde(default)]
    pub vt_groups: Vec<String>,
}

/// A VT to execute during a scan, including its parameters
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VT {
    /// The ID of the VT to execute
    pub oid: String,
    #[serde(default)]
    /// The list of parameters for the VT
    pub parameters: Vec<Parameter>,
}

/// Represents a parameter for a VT.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// The ID of the parameter.
    pub id: u16,
    /// The value of the parameter.
    pub value: String,
}
