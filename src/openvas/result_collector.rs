// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Retrieves results and host status written by openvas and hands them to a
//! [Reporter].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::catalog::VtCatalog;
use crate::models::{HostProgress, Phase, ResultType, ScanResult};
use crate::storage::{KeyedStore, StoreResult};

pub const KB_RESULTS: &str = "internal/results";
pub const KB_STATUS: &str = "internal/status";
pub const KB_HOST_IP: &str = "internal/ip";
pub const KB_HOST_START: &str = "internal/HOST_START";
pub const KB_HOST_END: &str = "internal/HOST_END";

/// Receives everything a scan produces.
pub trait Reporter: Send + Sync + 'static {
    fn result(&self, scan_id: &str, result: ScanResult);

    /// Progress of a host in percent.
    fn host_progress(&self, scan_id: &str, host: &str, progress: u8);

    fn host_finished(&self, scan_id: &str, host: &str);

    fn scan_status(&self, scan_id: &str, phase: Phase);
}

/// Everything reported for one scan.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Results {
    pub results: Vec<ScanResult>,
    pub host_status: HashMap<String, u8>,
    pub finished_hosts: Vec<String>,
    pub phase: Phase,
}

/// Keeps reported data in memory until it is fetched.
#[derive(Default, Debug, Clone)]
pub struct ResultCollector {
    scans: Arc<Mutex<HashMap<String, Results>>>,
}

impl ResultCollector {
    fn with_scan(&self, scan_id: &str, f: impl FnOnce(&mut Results)) {
        let mut scans = match self.scans.lock() {
            Ok(scans) => scans,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(scans.entry(scan_id.to_owned()).or_default());
    }

    /// A copy of what has been reported for a scan so far.
    pub fn get(&self, scan_id: &str) -> Option<Results> {
        match self.scans.lock() {
            Ok(scans) => scans.get(scan_id).cloned(),
            Err(poisoned) => poisoned.into_inner().get(scan_id).cloned(),
        }
    }

    pub fn phase(&self, scan_id: &str) -> Option<Phase> {
        self.get(scan_id).map(|r| r.phase)
    }
}

impl Reporter for ResultCollector {
    fn result(&self, scan_id: &str, result: ScanResult) {
        self.with_scan(scan_id, |r| r.results.push(result));
    }

    fn host_progress(&self, scan_id: &str, host: &str, progress: u8) {
        self.with_scan(scan_id, |r| {
            r.host_status.insert(host.to_owned(), progress);
        });
    }

    fn host_finished(&self, scan_id: &str, host: &str) {
        self.with_scan(scan_id, |r| {
            r.host_status.insert(host.to_owned(), 100);
            r.finished_hosts.push(host.to_owned());
        });
    }

    fn scan_status(&self, scan_id: &str, phase: Phase) {
        self.with_scan(scan_id, |r| r.phase = phase);
    }
}

/// Turns a result record `KIND|||hostname|||port|||oid|||message` into a result.
///
/// The message is not split any further. Unknown kinds are skipped.
pub fn translate_result(record: &str, host: &str, catalog: &VtCatalog) -> Option<ScanResult> {
    let mut fields = record.splitn(5, "|||");
    let kind = fields.next().unwrap_or_default().trim();
    let hostname = fields.next().unwrap_or_default().trim();
    let port = fields.next().unwrap_or_default().trim();
    let oid = fields.next().unwrap_or_default().trim();
    let message = fields.next().unwrap_or_default();

    let Some(result_type) = ResultType::from_kind(kind) else {
        tracing::warn!(record, "unknown result type, skipping it");
        return None;
    };

    let mut result = ScanResult {
        result_type,
        host: host.to_owned(),
        hostname: hostname.to_owned(),
        port: port.to_owned(),
        oid: oid.to_owned(),
        message: message.to_owned(),
        ..Default::default()
    };

    if message.contains("Host dead") {
        return Some(result);
    }
    let vt = match catalog.get(oid) {
        Some(vt) => vt,
        None => {
            if !oid.is_empty() {
                tracing::warn!(oid, "result of an unknown VT");
            } else if result_type != ResultType::Error {
                tracing::warn!("missing VT oid for a result");
            }
            return Some(result);
        }
    };
    result.name = vt.name.clone();
    match result_type {
        ResultType::Log => result.qod = vt.qod(),
        ResultType::Alarm => {
            result.qod = vt.qod();
            result.severity = vt.severity.score();
        }
        ResultType::Error | ResultType::HostDetail => {}
    }
    Some(result)
}

/// Parses a status record and returns the host it names, if any, with its progress.
pub fn parse_status(record: &str) -> Option<(Option<&str>, HostProgress)> {
    let progress = HostProgress::parse(record)?;
    let host = record.rsplitn(3, '/').nth(2).map(str::trim);
    Some((host, progress))
}

/// Reads the records of the currently selected index.
pub struct ResultHelper<'a, S, R> {
    store: &'a mut S,
    catalog: &'a VtCatalog,
    reporter: &'a R,
    scan_id: &'a str,
}

impl<'a, S, R> ResultHelper<'a, S, R>
where
    S: KeyedStore,
    R: Reporter,
{
    pub fn init(store: &'a mut S, catalog: &'a VtCatalog, reporter: &'a R, scan_id: &'a str) -> Self {
        Self {
            store,
            catalog,
            reporter,
            scan_id,
        }
    }

    /// Address of the host scanned within the selected index, empty for the main index.
    pub fn current_host(&mut self) -> StoreResult<String> {
        Ok(self.store.get(KB_HOST_IP)?.unwrap_or_default())
    }

    /// Reports and removes all queued results. Returns the amount of results reported.
    pub fn collect_results(&mut self, host: &str) -> StoreResult<usize> {
        let mut count = 0;
        for record in self.store.pop_all(KB_RESULTS)? {
            if let Some(result) = translate_result(&record, host, self.catalog) {
                self.reporter.result(self.scan_id, result);
                count += 1;
            }
        }
        Ok(count)
    }

    /// Reports and removes all queued status records.
    pub fn collect_host_status(&mut self, host: &str) -> StoreResult<()> {
        for record in self.store.pop_all(KB_STATUS)? {
            match parse_status(&record) {
                Some((named, progress)) => {
                    let host = named.filter(|h| !h.is_empty()).unwrap_or(host);
                    tracing::debug!(host, progress = progress.percent(), "host progress");
                    self.reporter
                        .host_progress(self.scan_id, host, progress.percent());
                }
                None => tracing::trace!(record, "ignoring status record"),
            }
        }
        Ok(())
    }

    /// The host's newest timestamp record as `(kind, timestamp)`; the end wins over the start.
    pub fn host_timestamp(&mut self) -> StoreResult<Option<(&'static str, String)>> {
        if let Some(end) = self.store.get(KB_HOST_END)?.filter(|x| !x.is_empty()) {
            return Ok(Some(("HOST_END", end)));
        }
        Ok(self
            .store
            .get(KB_HOST_START)?
            .filter(|x| !x.is_empty())
            .map(|start| ("HOST_START", start)))
    }
}
