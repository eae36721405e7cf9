// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use async_trait::async_trait;
use thiserror::Error;

use super::Scan;

/// Accepts scans and runs them in the background.
#[async_trait]
pub trait ScanStarter {
    /// Returns once the scan was accepted, not when it is done.
    async fn start_scan(&self, scan: Scan) -> Result<(), Error>;

    /// Whether a new scan would be accepted right now.
    async fn can_start_scan(&self, _: &Scan) -> bool {
        true
    }
}

#[async_trait]
pub trait ScanStopper {
    /// Asks a running scan to stop. The scan ends on its own schedule.
    async fn stop_scan<I>(&self, id: I) -> Result<(), Error>
    where
        I: AsRef<str> + Send + 'static;
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Unexpected issue: {0}")]
    Unexpected(String),
    #[error("Connection issue: {0}")]
    Connection(String),
    #[error("Scan not found: {0}")]
    ScanNotFound(String),
}
