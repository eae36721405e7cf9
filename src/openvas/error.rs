// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::io;

use thiserror::Error;

use crate::models::{CredentialError, scanner::Error as ScanError};
use crate::storage::DbError;

/// Reasons for refusing a scan before the engine is started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigRejection {
    #[error("No port list defined.")]
    NoPortList,
    #[error("No VTS to run.")]
    NoVts,
    #[error("Malformed credential.")]
    MalformedCredential(#[source] CredentialError),
}

#[derive(Debug, Error)]
pub enum OpenvasError {
    #[error("{0}")]
    Rejected(#[from] ConfigRejection),
    #[error(
        "It was not possible to start the scan, because of a pending feed update. Please try later."
    )]
    FeedPending,
    #[error("It was not possible to run the task {0}, since openvas ended unexpectedly.")]
    SpawnFailure(String),
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
    #[error("A scan with ID {0} not found.")]
    ScanNotFound(String),
    #[error("A scan with ID {0} already exists.")]
    DuplicateScanId(String),
    #[error("Unable to run command: {0}")]
    CmdError(#[from] io::Error),
}

impl OpenvasError {
    /// Whether the scan was refused without the engine being involved.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::FeedPending)
    }
}

impl From<OpenvasError> for ScanError {
    fn from(value: OpenvasError) -> Self {
        match value {
            OpenvasError::ScanNotFound(id) => ScanError::ScanNotFound(id),
            OpenvasError::Storage(e) => ScanError::Connection(e.to_string()),
            e => ScanError::Unexpected(e.to_string()),
        }
    }
}
