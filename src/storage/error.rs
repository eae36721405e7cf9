// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::sync::PoisonError;

use redis::{ErrorKind, RedisError};
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, DbError>;

/// Error cases while working with the keyed store.
#[derive(Debug, Error)]
pub enum DbError {
    /// The store rejects what we ask for, e.g. an unknown index or missing permissions.
    #[error("Keyed store is misconfigured: {0}.")]
    Configuration(String),
    /// The store cannot be reached anymore.
    #[error("Connection to the keyed store lost: {0}.")]
    ConnectionLost(String),
    /// The store is busy; the same request may succeed later.
    #[error("Keyed store is busy: {0}.")]
    Busy(String),
    #[error("Poisoned lock: {0}.")]
    PoisonedLock(String),
    #[error("Unexpected keyed store error: {0}.")]
    Other(String),
    /// Every index is in use; finished scans must be released to free slots.
    #[error("No DB available.")]
    NoAvailDbErr,
}

impl DbError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::NoAvailDbErr)
    }
}

impl From<RedisError> for DbError {
    fn from(err: RedisError) -> DbError {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::ResponseError
            | ErrorKind::AuthenticationFailed
            | ErrorKind::ReadOnly
            | ErrorKind::InvalidClientConfig => DbError::Configuration(message),
            ErrorKind::IoError | ErrorKind::ClusterDown | ErrorKind::MasterDown => {
                DbError::ConnectionLost(message)
            }
            ErrorKind::BusyLoadingError | ErrorKind::TryAgain => DbError::Busy(message),
            _ => DbError::Other(message),
        }
    }
}

impl<T> From<PoisonError<T>> for DbError {
    fn from(value: PoisonError<T>) -> Self {
        DbError::PoisonedLock(value.to_string())
    }
}
