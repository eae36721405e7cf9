// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{io, path::PathBuf};

use openvas_orchestrator::{
    config::ConfigError, feed::FeedError, openvas::OpenvasError, storage::DbError,
};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("Unable to read scan from {0}: {1}")]
    Read(PathBuf, #[source] io::Error),
    #[error("Invalid scan: {0}")]
    InvalidScan(#[from] serde_json::Error),
    #[error("{0}")]
    Openvas(#[from] OpenvasError),
    #[error("{0}")]
    Feed(#[from] FeedError),
    #[error("{0}")]
    Storage(#[from] DbError),
}
