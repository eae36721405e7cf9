// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;

use super::{
    engine::Engine,
    error::OpenvasError,
    result_collector::Reporter,
    running_scan::{Intervals, RunningScan, RunningScanHandle, request_stop},
};
use crate::catalog::CatalogHandle;
use crate::models::{
    Phase, ResultType, Scan, ScanResult,
    scanner::{Error as ScanError, ScanStarter, ScanStopper},
};
use crate::storage::StoreConnector;

/// Runs any number of scans at the same time, each on its own task with its
/// own main index.
pub struct Scanner<C, E, R> {
    connector: Arc<C>,
    engine: Arc<E>,
    reporter: Arc<R>,
    catalog: CatalogHandle,
    pending_feed: Arc<AtomicBool>,
    intervals: Intervals,
    scans: Mutex<Scans>,
}

/// Client scan ids that are being prepared or were started.
#[derive(Default)]
struct Scans {
    preparing: HashSet<String>,
    started: HashMap<String, RunningScanHandle>,
}

impl Scans {
    /// Claims the id for a new scan. Handles of ended scans are dropped on the way.
    fn reserve(&mut self, scan_id: &str) -> bool {
        self.started.retain(|_, h| !h.is_finished());
        !self.started.contains_key(scan_id) && self.preparing.insert(scan_id.to_owned())
    }
}

impl<C, E, R> Scanner<C, E, R>
where
    C: StoreConnector,
    E: Engine,
    R: Reporter,
{
    pub fn new(
        connector: Arc<C>,
        engine: Arc<E>,
        reporter: Arc<R>,
        catalog: CatalogHandle,
        pending_feed: Arc<AtomicBool>,
        intervals: Intervals,
    ) -> Self {
        Self {
            connector,
            engine,
            reporter,
            catalog,
            pending_feed,
            intervals,
            scans: Default::default(),
        }
    }

    fn scans(&self) -> MutexGuard<'_, Scans> {
        match self.scans.lock() {
            Ok(scans) => scans,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Amount of scans whose task did not end yet.
    pub fn running_scans(&self) -> usize {
        self.scans()
            .started
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Removes the handle of a scan, e.g. to wait for it.
    ///
    /// Handles of ended scans are only kept until the next launch; their final
    /// phase is known to the reporter.
    pub fn take(&self, scan_id: &str) -> Option<RunningScanHandle> {
        self.scans().started.remove(scan_id)
    }

    fn reject(&self, scan: &Scan, error: &OpenvasError) {
        tracing::info!(scan_id = scan.scan_id, reason = %error, "scan not started");
        self.reporter.result(
            &scan.scan_id,
            ScanResult {
                result_type: ResultType::Error,
                host: scan.target.hosts.join(","),
                message: error.to_string(),
                ..Default::default()
            },
        );
        let phase = if error.is_rejection() {
            Phase::Rejected
        } else {
            Phase::Failed
        };
        self.reporter.scan_status(&scan.scan_id, phase);
    }

    /// Prepares the scan and launches it.
    ///
    /// A scan that cannot be started is reported as failed to the reporter and
    /// the reason is returned.
    pub fn launch(&self, scan: &Scan) -> Result<(), OpenvasError> {
        if !self.scans().reserve(&scan.scan_id) {
            return Err(OpenvasError::DuplicateScanId(scan.scan_id.clone()));
        }
        let prepared = if self.pending_feed.load(Ordering::SeqCst) {
            Err(OpenvasError::FeedPending)
        } else {
            self.connector
                .connect()
                .map_err(OpenvasError::from)
                .and_then(|store| {
                    RunningScan::prepare(
                        scan,
                        store,
                        self.engine.clone(),
                        self.reporter.clone(),
                        self.catalog.snapshot(),
                        self.intervals,
                    )
                })
        };
        let prepared = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                self.scans().preparing.remove(&scan.scan_id);
                self.reject(scan, &e);
                return Err(e);
            }
        };
        self.reporter.scan_status(&scan.scan_id, Phase::Requested);
        let handle = prepared.start();
        let mut scans = self.scans();
        scans.preparing.remove(&scan.scan_id);
        scans.started.insert(scan.scan_id.clone(), handle);
        Ok(())
    }

    /// Asks a running scan to stop. The scan itself tells openvas and cleans up.
    pub fn stop(&self, scan_id: &str) -> Result<(), OpenvasError> {
        let main_index = match self.scans().started.get(scan_id) {
            Some(h) if !h.is_finished() => h.main_index(),
            _ => return Err(OpenvasError::ScanNotFound(scan_id.to_owned())),
        };
        let mut store = self.connector.connect()?;
        request_stop(&mut store, main_index, scan_id)?;
        Ok(())
    }
}

#[async_trait]
impl<C, E, R> ScanStarter for Scanner<C, E, R>
where
    C: StoreConnector,
    E: Engine,
    R: Reporter,
{
    async fn start_scan(&self, scan: Scan) -> Result<(), ScanError> {
        self.launch(&scan).map_err(ScanError::from)
    }

    async fn can_start_scan(&self, _: &Scan) -> bool {
        !self.pending_feed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C, E, R> ScanStopper for Scanner<C, E, R>
where
    C: StoreConnector,
    E: Engine,
    R: Reporter,
{
    async fn stop_scan<I>(&self, id: I) -> Result<(), ScanError>
    where
        I: AsRef<str> + Send + 'static,
    {
        self.stop(id.as_ref()).map_err(ScanError::from)
    }
}
