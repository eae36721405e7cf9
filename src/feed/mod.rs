// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Keeps the in-memory VT catalog in line with the feed on disk.
//!
//! openvas caches the feed in its own index of the keyed store. When the feed
//! on disk is newer than that cache, openvas is asked to refresh it and the
//! catalog is reloaded from the cache as soon as no scan is running. Until
//! then the feed is pending and new scans are refused.

use std::{
    io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::catalog::{CatalogHandle, CatalogSource, FeedVersion, parse_feed_version};
use crate::openvas::Engine;
use crate::storage::DbError;

/// Name of the file in the plugins folder that carries the feed version.
pub const FEED_INFO: &str = "plugin_feed_info.inc";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Unable to read {0}: {1}")]
    Read(PathBuf, #[source] io::Error),
    #[error("Unable to load VTs: {0}")]
    Storage(#[from] DbError),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Returns the value of `PLUGIN_SET` or 0 when the content does not set it.
pub fn parse_feed_info(content: &str) -> FeedVersion {
    content
        .lines()
        .filter(|l| l.contains("PLUGIN_SET"))
        .filter_map(|l| l.split_once('='))
        .filter_map(|(_, v)| parse_feed_version(v.trim().trim_end_matches(';')))
        .last()
        .unwrap_or_default()
}

/// Version of the feed in the plugins folder. `None` when there is no feed info file.
pub fn disk_version(plugins_folder: &Path) -> Result<Option<FeedVersion>, FeedError> {
    let path = plugins_folder.join(FEED_INFO);
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(Some(parse_feed_info(&content))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "feed info not found");
            Ok(None)
        }
        Err(e) => Err(FeedError::Read(path, e)),
    }
}

/// Compares a cached version with the version on disk.
///
/// Returns `None` when there is no feed on disk. A version of 0 on disk is
/// always outdated.
pub fn feed_is_outdated(cached: FeedVersion, on_disk: Option<FeedVersion>) -> Option<bool> {
    on_disk.map(|disk| cached < disk || disk == 0)
}

/// Result of a single feed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// The feed on disk cannot be read; new scans stay refused.
    Indeterminate,
    /// A reload is due but scans are running.
    Deferred,
    /// The catalog was replaced.
    Reloaded,
    UpToDate,
}

/// Decides when the VT catalog is reloaded.
pub struct FeedSynchronizer<S, E> {
    plugins_folder: PathBuf,
    source: Arc<S>,
    engine: Arc<E>,
    catalog: CatalogHandle,
    pending: Arc<AtomicBool>,
}

impl<S, E> FeedSynchronizer<S, E>
where
    S: CatalogSource,
    E: Engine,
{
    pub fn new(
        plugins_folder: impl Into<PathBuf>,
        source: Arc<S>,
        engine: Arc<E>,
        catalog: CatalogHandle,
    ) -> Self {
        Self {
            plugins_folder: plugins_folder.into(),
            source,
            engine,
            catalog,
            pending: Default::default(),
        }
    }

    /// Flag that is set while a reload is pending. Scanners refuse new scans while it is set.
    pub fn pending(&self) -> Arc<AtomicBool> {
        self.pending.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    async fn cached_version(&self) -> Result<Option<FeedVersion>, FeedError> {
        let source = self.source.clone();
        let version = tokio::task::spawn_blocking(move || source.version()).await??;
        Ok(version)
    }

    async fn refresh_cache(&self) -> Result<(), FeedError> {
        tracing::debug!("loading VTs into the openvas cache");
        let engine = self.engine.clone();
        if let Err(error) = tokio::task::spawn_blocking(move || engine.refresh_vt_cache()).await? {
            tracing::error!(%error, "openvas failed to load the VTs");
        }
        Ok(())
    }

    async fn reload(&self) -> Result<(), FeedError> {
        tracing::debug!("loading VTs into memory");
        let source = self.source.clone();
        let catalog = tokio::task::spawn_blocking(move || source.load()).await??;
        tracing::info!(version = catalog.version, vts = catalog.len(), "VT catalog loaded");
        self.catalog.replace(catalog);
        Ok(())
    }

    /// Checks the feed and reloads the catalog when it is outdated and `running_scans` is 0.
    pub async fn check_feed(&self, running_scans: usize) -> Result<FeedStatus, FeedError> {
        let mut cached = self.cached_version().await?;
        let on_disk = {
            let folder = self.plugins_folder.clone();
            tokio::task::spawn_blocking(move || disk_version(&folder)).await??
        };
        let Some(outdated) = feed_is_outdated(cached.unwrap_or_default(), on_disk) else {
            self.pending.store(true, Ordering::SeqCst);
            return Ok(FeedStatus::Indeterminate);
        };

        if cached.is_none() || outdated {
            self.refresh_cache().await?;
            cached = self.cached_version().await?;
            self.pending.store(true, Ordering::SeqCst);
        }

        let reload_due =
            self.is_pending() || self.catalog.version() != cached.unwrap_or_default();
        if !reload_due {
            return Ok(FeedStatus::UpToDate);
        }
        if running_scans > 0 {
            self.pending.store(true, Ordering::SeqCst);
            tracing::debug!(
                running_scans,
                "There is a running scan. Therefore the feed update will be performed later."
            );
            return Ok(FeedStatus::Deferred);
        }
        self.reload().await?;
        self.pending.store(false, Ordering::SeqCst);
        Ok(FeedStatus::Reloaded)
    }

    /// Checks the feed on every interval tick until the task is aborted.
    pub async fn run<F>(self, check_interval: Duration, running_scans: F)
    where
        F: Fn() -> usize + Send + 'static,
    {
        let mut interval = tokio::time::interval(check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.check_feed(running_scans()).await {
                Ok(status) => tracing::trace!(?status, "feed checked"),
                Err(error) => tracing::warn!(%error, "Unable to check feed"),
            }
        }
    }
}
