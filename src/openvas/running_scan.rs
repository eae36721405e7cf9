// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Drives a single scan from preparing the main index over launching openvas
//! to releasing every index the scan used.
//!
//! All state shared with openvas lives in the keyed store. The scan id a
//! client knows is never handed to openvas; each attempt gets its own engine
//! id, so that concurrent scans never share keys.

use std::{collections::HashSet, io, sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{
    engine::{Engine, EngineProcess},
    error::OpenvasError,
    pref_handler::PreferenceHandler,
    result_collector::{Reporter, ResultHelper},
};
use crate::catalog::VtCatalog;
use crate::models::{Phase, ResultType, Scan, ScanResult};
use crate::storage::{DbError, KeyedStore, ScanIndex};

/// Registry of host indices within the main index.
pub const KB_DBINDEX: &str = "internal/dbindex";
/// Engine id of the scan, within the main index.
pub const KB_SCANID: &str = "internal/scanid";
/// Engine id a host index belongs to.
pub const KB_HOST_SCAN_ID: &str = "internal/scan_id";
pub const KB_OVAS_PID: &str = "internal/ovas_pid";

/// Key holding `new`, `stop_all` or `finished` for an engine id.
pub fn status_key(engine_id: &str) -> String {
    format!("internal/{engine_id}")
}

pub fn preferences_key(engine_id: &str) -> String {
    format!("internal/{engine_id}/scanprefs")
}

pub fn global_scan_id_key(scan_id: &str) -> String {
    format!("internal/{scan_id}/globalscanid")
}

/// Writes the stop sentinel for the scan whose main index is given.
///
/// Returns the engine id of the scan. The worker of the scan picks the
/// sentinel up on its next round.
pub fn request_stop<S: KeyedStore>(
    store: &mut S,
    main_index: ScanIndex,
    scan_id: &str,
) -> Result<String, OpenvasError> {
    store.select(main_index)?;
    let engine_id = store
        .get(&global_scan_id_key(scan_id))?
        .ok_or_else(|| OpenvasError::ScanNotFound(scan_id.to_owned()))?;
    store.set(&status_key(&engine_id), "stop_all")?;
    info!(scan_id, engine_id, main_index, "stop requested");
    Ok(engine_id)
}

/// How often the store is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    /// Between two harvesting rounds.
    pub check: Duration,
    /// While waiting for openvas to accept or end a scan.
    pub launch_check: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            check: Duration::from_secs(3),
            launch_check: Duration::from_secs(1),
        }
    }
}

/// Takes care of running a single scan to completion.
pub struct RunningScan<S, E, R> {
    scan_id: String,
    target: String,
    engine_id: String,
    main_index: ScanIndex,
    main_released: bool,
    store: S,
    engine: Arc<E>,
    reporter: Arc<R>,
    catalog: Arc<VtCatalog>,
    intervals: Intervals,
    reported_timestamps: HashSet<(String, &'static str)>,
}

impl<S, E, R> RunningScan<S, E, R>
where
    S: KeyedStore + 'static,
    E: Engine,
    R: Reporter,
{
    /// Allocates the main index and stores everything openvas needs to run the scan.
    ///
    /// Configuration errors are detected before anything is allocated.
    pub fn prepare(
        scan: &Scan,
        mut store: S,
        engine: Arc<E>,
        reporter: Arc<R>,
        catalog: Arc<VtCatalog>,
        intervals: Intervals,
    ) -> Result<Self, OpenvasError> {
        let compiled = PreferenceHandler::new(scan, &catalog).prepare_preferences_for_openvas()?;
        for dropped in &compiled.dropped {
            debug!(
                scan_id = scan.scan_id,
                oid = dropped.oid,
                id = dropped.id,
                "VT parameter dropped"
            );
        }

        let main_index = store.allocate_index()?;
        let engine_id = uuid::Uuid::new_v4().to_string();
        let mut running = Self {
            scan_id: scan.scan_id.clone(),
            target: scan.target.hosts.join(","),
            engine_id,
            main_index,
            main_released: false,
            store,
            engine,
            reporter,
            catalog,
            intervals,
            reported_timestamps: HashSet::new(),
        };
        if let Err(e) = running.store_preferences(&compiled.lines(main_index)) {
            running.release_main();
            return Err(e.into());
        }
        debug!(
            scan_id = running.scan_id,
            engine_id = running.engine_id,
            main_index,
            vts = compiled.vts.len(),
            "scan prepared"
        );
        Ok(running)
    }

    fn store_preferences(&mut self, lines: &[String]) -> Result<(), DbError> {
        self.store.set(&status_key(&self.engine_id), "new")?;
        self.store
            .set(&global_scan_id_key(&self.scan_id), &self.engine_id)?;
        self.store.set(KB_SCANID, &self.engine_id)?;
        self.store
            .append_all(&preferences_key(&self.engine_id), lines)
    }

    pub fn engine_id(&self) -> &str {
        &self.engine_id
    }

    pub fn main_index(&self) -> ScanIndex {
        self.main_index
    }

    /// Runs the scan on its own task.
    pub fn start(self) -> RunningScanHandle {
        let engine_id = self.engine_id.clone();
        let main_index = self.main_index;
        RunningScanHandle {
            handle: tokio::spawn(self.run()),
            engine_id,
            main_index,
        }
    }

    async fn run(mut self) -> Phase {
        let phase = match self.spawn() {
            Ok(mut process) => match self.supervise(&mut process).await {
                Ok(phase) => phase,
                Err(e) => {
                    error!(scan_id = self.scan_id, error = %e, "scan aborted");
                    self.report_error(e.to_string());
                    self.abort(&mut process).await;
                    Phase::Failed
                }
            },
            Err(e) => {
                self.report_error(e.to_string());
                Phase::Failed
            }
        };
        if let Err(e) = self.cleanup() {
            warn!(scan_id = self.scan_id, error = %e, "unable to release all indices");
        }
        info!(scan_id = self.scan_id, %phase, "scan ended");
        self.reporter.scan_status(&self.scan_id, phase);
        phase
    }

    fn report_error(&self, message: String) {
        self.reporter.result(
            &self.scan_id,
            ScanResult {
                result_type: ResultType::Error,
                host: self.target.clone(),
                message,
                ..Default::default()
            },
        );
    }

    fn spawn(&mut self) -> Result<E::Process, OpenvasError> {
        self.engine.start(&self.engine_id).map_err(|e| {
            error!(scan_id = self.scan_id, error = %e, "unable to start openvas");
            OpenvasError::SpawnFailure(self.scan_id.clone())
        })
    }

    async fn supervise(&mut self, process: &mut E::Process) -> Result<Phase, OpenvasError> {
        self.launch(process).await?;
        self.reporter.scan_status(&self.scan_id, Phase::Running);
        self.run_to_completion(process).await
    }

    /// Waits until openvas accepted the preferences.
    async fn launch(&mut self, process: &mut E::Process) -> Result<(), OpenvasError> {
        if let Some(pid) = process.id() {
            self.store.set(KB_OVAS_PID, &pid.to_string())?;
        }

        let key = status_key(&self.engine_id);
        let mut interval = tokio::time::interval(self.intervals.launch_check);
        loop {
            interval.tick().await;
            if self.store.get(&key)?.as_deref() != Some("new") {
                return Ok(());
            }
            if let Some(code) = process.try_exit()? {
                error!(scan_id = self.scan_id, code, "openvas ended during launch");
                return Err(OpenvasError::SpawnFailure(self.scan_id.clone()));
            }
        }
    }

    async fn run_to_completion(&mut self, process: &mut E::Process) -> Result<Phase, OpenvasError> {
        let key = status_key(&self.engine_id);
        let mut interval = tokio::time::interval(self.intervals.check);
        let mut idle_ticks = 0;
        loop {
            interval.tick().await;
            self.store.select(self.main_index)?;
            if self.store.get(&key)?.as_deref() == Some("stop_all") {
                info!(scan_id = self.scan_id, "stop requested");
                self.stop_engine(process).await?;
                return Ok(Phase::Stopped);
            }

            let processed = match self.harvest() {
                Ok(processed) => processed,
                Err(error) if error.is_transient() => {
                    warn!(scan_id = self.scan_id, %error, "harvesting on the next tick");
                    idle_ticks = 0;
                    continue;
                }
                Err(error) => return Err(error.into()),
            };

            let status = self.store.get(&key)?;
            let finished = matches!(status.as_deref(), None | Some("finished"));
            if !finished {
                if let Some(code) = process.try_exit()?.filter(|c| *c != 0) {
                    error!(scan_id = self.scan_id, code, "openvas ended unexpectedly");
                    self.report_error(format!(
                        "Task {} was unexpectedly stopped or killed.",
                        self.scan_id
                    ));
                    return Ok(Phase::Failed);
                }
            }
            // A host index may be registered between the enumeration and the
            // status check, therefore the scan only ends after two idle rounds.
            if processed == 0 && finished {
                idle_ticks += 1;
                if idle_ticks >= 2 {
                    let code = self.wait_for_exit(process).await?;
                    debug!(scan_id = self.scan_id, code, "openvas ended");
                    return Ok(Phase::Succeeded);
                }
            } else {
                idle_ticks = 0;
            }
        }
    }

    async fn stop_engine(&mut self, process: &mut E::Process) -> Result<(), OpenvasError> {
        let engine = self.engine.clone();
        let engine_id = self.engine_id.clone();
        tokio::task::spawn_blocking(move || engine.stop(&engine_id))
            .await
            .map_err(io::Error::other)??;
        let code = self.wait_for_exit(process).await?;
        debug!(scan_id = self.scan_id, code, "openvas stopped");
        Ok(())
    }

    /// Polls until the process ended, so that it does not linger as a zombie.
    async fn wait_for_exit(&mut self, process: &mut E::Process) -> Result<i32, OpenvasError> {
        let mut interval = tokio::time::interval(self.intervals.launch_check);
        loop {
            interval.tick().await;
            if let Some(code) = process.try_exit()? {
                return Ok(code);
            }
        }
    }

    /// Stops openvas after the scan failed, unless it already ended.
    async fn abort(&mut self, process: &mut E::Process) {
        match process.try_exit() {
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Err(e) = self.stop_engine(process).await {
                    warn!(scan_id = self.scan_id, error = %e, "unable to stop openvas");
                }
            }
            Err(e) => warn!(scan_id = self.scan_id, error = %e, "unable to check openvas"),
        }
    }

    /// Harvests the main index and then every host index. Returns the amount of host indices
    /// belonging to this scan.
    fn harvest(&mut self) -> Result<usize, DbError> {
        ResultHelper::init(
            &mut self.store,
            &self.catalog,
            &*self.reporter,
            &self.scan_id,
        )
        .collect_results("")?;
        self.harvest_hosts()
    }

    fn harvest_hosts(&mut self) -> Result<usize, DbError> {
        let mut processed = 0;
        for entry in self.store.enumerate(KB_DBINDEX)? {
            let Ok(index) = entry.trim().parse::<ScanIndex>() else {
                warn!(scan_id = self.scan_id, entry, "invalid host index");
                continue;
            };
            self.store.select(index)?;
            match self.store.get(KB_HOST_SCAN_ID)? {
                Some(id) if id == self.engine_id => {}
                Some(_) => {
                    debug!(index, "host index belongs to another scan");
                    continue;
                }
                // openvas did not initialize the index yet
                None => continue,
            }
            processed += 1;
            self.harvest_host(index, &entry)?;
        }
        self.store.select(self.main_index)?;
        Ok(processed)
    }

    fn harvest_host(&mut self, index: ScanIndex, entry: &str) -> Result<(), DbError> {
        let mut helper = ResultHelper::init(
            &mut self.store,
            &self.catalog,
            &*self.reporter,
            &self.scan_id,
        );
        let host = helper.current_host()?;
        helper.collect_results(&host)?;
        helper.collect_host_status(&host)?;
        let timestamp = helper.host_timestamp()?;
        self.report_timestamp(&host, timestamp);

        if self.store.get(&status_key(&self.engine_id))?.as_deref() != Some("finished") {
            return Ok(());
        }
        debug!(scan_id = self.scan_id, host, index, "host finished");
        self.reporter.host_finished(&self.scan_id, &host);
        // openvas may have written its last records while the host was harvested
        let mut helper = ResultHelper::init(
            &mut self.store,
            &self.catalog,
            &*self.reporter,
            &self.scan_id,
        );
        helper.collect_results(&host)?;
        helper.collect_host_status(&host)?;
        let timestamp = helper.host_timestamp()?;
        self.report_timestamp(&host, timestamp);

        self.store.select(self.main_index)?;
        self.store.remove_item(KB_DBINDEX, entry)?;
        self.store.release(index)
    }

    fn report_timestamp(&mut self, host: &str, timestamp: Option<(&'static str, String)>) {
        let Some((kind, value)) = timestamp else {
            return;
        };
        if !self.reported_timestamps.insert((host.to_owned(), kind)) {
            return;
        }
        self.reporter.result(
            &self.scan_id,
            ScanResult {
                result_type: ResultType::Log,
                host: host.to_owned(),
                name: kind.to_owned(),
                message: value,
                ..Default::default()
            },
        );
    }

    fn release_main(&mut self) {
        if self.main_released {
            return;
        }
        match self.store.release(self.main_index) {
            Ok(()) => self.main_released = true,
            Err(e) => warn!(index = self.main_index, error = %e, "unable to release main index"),
        }
    }

    /// Releases host indices openvas left behind and the main index.
    fn cleanup(&mut self) -> Result<(), DbError> {
        let result = self.release_hosts();
        self.release_main();
        result
    }

    fn release_hosts(&mut self) -> Result<(), DbError> {
        self.store.select(self.main_index)?;
        for entry in self.store.enumerate(KB_DBINDEX)? {
            let Ok(index) = entry.trim().parse::<ScanIndex>() else {
                continue;
            };
            self.store.select(index)?;
            if self.store.get(KB_HOST_SCAN_ID)?.as_deref() == Some(self.engine_id.as_str()) {
                debug!(scan_id = self.scan_id, index, "releasing unfinished host index");
                self.store.release(index)?;
            }
        }
        self.store.select(self.main_index)
    }
}

/// A handle to a [RunningScan].
pub struct RunningScanHandle {
    handle: JoinHandle<Phase>,
    engine_id: String,
    main_index: ScanIndex,
}

impl RunningScanHandle {
    pub fn engine_id(&self) -> &str {
        &self.engine_id
    }

    pub fn main_index(&self) -> ScanIndex {
        self.main_index
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the scan to end and returns its final phase.
    pub async fn wait(self) -> Phase {
        match self.handle.await {
            Ok(phase) => phase,
            Err(e) => {
                error!(engine_id = self.engine_id, error = %e, "scan task ended abnormally");
                Phase::Failed
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::HashMap,
        io,
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use super::*;
    use crate::catalog::{Severity, VtRecord};
    use crate::models::{Target, VT};
    #[cfg(target_os = "linux")]
    use crate::openvas::OpenvasProcess;
    use crate::openvas::result_collector::{
        KB_HOST_END, KB_HOST_IP, KB_HOST_START, KB_RESULTS, KB_STATUS, ResultCollector,
    };
    use crate::storage::{
        StoreConnector, StoreResult,
        inmemory::{InMemoryConnector, InMemoryStore},
    };

    pub const OID: &str = "1.3.6.1.4.1.25623.1.0.10662";

    /// How the fake engine behaves once started.
    #[derive(Debug, Clone)]
    pub enum Script {
        /// Scans each host, reports one alarm per host and finishes.
        Complete(Vec<&'static str>),
        /// Ends with the given code before accepting the scan.
        Crash(i32),
        /// Accepts the scan, starts scanning each host and waits for a stop.
        UntilStopped(Vec<&'static str>),
        /// Starts and ends with the given code while scanning.
        DiesWhileScanning(i32),
        /// Registers a host index that does not name its scan yet.
        HostWithoutScanId(&'static str),
        /// Registers a host index of another scan next to a finished host of its own.
        ForeignHost(&'static str),
        /// Marks the scan finished before registering any host; the test adds them.
        FinishedEarly,
    }

    #[derive(Debug, Clone)]
    pub struct FakeProcess {
        exit: Arc<Mutex<Option<i32>>>,
    }

    impl EngineProcess for FakeProcess {
        fn id(&self) -> Option<u32> {
            Some(4242)
        }

        fn try_exit(&mut self) -> io::Result<Option<i32>> {
            Ok(*self.exit.lock().unwrap())
        }
    }

    /// Plays the part openvas plays in the keyed store.
    pub struct FakeEngine {
        pub connector: InMemoryConnector,
        pub script: Script,
        pub processes: Mutex<HashMap<String, FakeProcess>>,
        pub stopped: AtomicBool,
        pub refreshed: AtomicBool,
    }

    impl FakeEngine {
        pub fn new(connector: InMemoryConnector, script: Script) -> Self {
            Self {
                connector,
                script,
                processes: Default::default(),
                stopped: AtomicBool::new(false),
                refreshed: AtomicBool::new(false),
            }
        }

        pub fn exit(&self, engine_id: &str, code: i32) {
            if let Some(process) = self.processes.lock().unwrap().get(engine_id) {
                *process.exit.lock().unwrap() = Some(code);
            }
        }

        /// Writes a host index like openvas does while scanning `host` and registers it
        /// in the main index. Only an index with an owner names its scan.
        pub fn scan_host(
            &self,
            owner: Option<&str>,
            main: ScanIndex,
            host: &str,
            finish: bool,
        ) -> ScanIndex {
            let mut store = self.connector.connect().unwrap();
            let index = store.allocate_index().unwrap();
            if let Some(engine_id) = owner {
                store.set(KB_HOST_SCAN_ID, engine_id).unwrap();
            }
            store.set(KB_HOST_IP, host).unwrap();
            store.set(KB_HOST_START, "1700000000").unwrap();
            store
                .append(
                    KB_RESULTS,
                    &format!("ALARM|||{host}|||22/tcp|||{OID}|||vulnerable"),
                )
                .unwrap();
            match owner {
                Some(engine_id) if finish => {
                    store.append(KB_STATUS, &format!("{host}/10/10")).unwrap();
                    store.set(KB_HOST_END, "1700000100").unwrap();
                    store.set(&status_key(engine_id), "finished").unwrap();
                }
                _ => store.append(KB_STATUS, &format!("{host}/1/10")).unwrap(),
            }
            store.select(main).unwrap();
            store.append(KB_DBINDEX, &index.to_string()).unwrap();
            index
        }
    }

    /// Finds the main index openvas is told about through the engine id.
    pub fn main_index_of(connector: &InMemoryConnector, engine_id: &str) -> ScanIndex {
        let mut store = connector.connect().unwrap();
        for index in connector.in_use().unwrap() {
            store.select(index).unwrap();
            if store.get(KB_SCANID).unwrap().as_deref() == Some(engine_id) {
                return index;
            }
        }
        panic!("no main index for {engine_id}");
    }

    impl Engine for FakeEngine {
        type Process = FakeProcess;

        fn start(&self, engine_id: &str) -> io::Result<FakeProcess> {
            let main = main_index_of(&self.connector, engine_id);
            let mut store = self.connector.connect().unwrap();
            store.select(main).unwrap();
            assert!(!store.enumerate(&preferences_key(engine_id)).unwrap().is_empty());
            let process = FakeProcess {
                exit: Default::default(),
            };
            self.processes
                .lock()
                .unwrap()
                .insert(engine_id.to_owned(), process.clone());
            let exit = |code| *process.exit.lock().unwrap() = Some(code);
            match &self.script {
                Script::Crash(code) => exit(*code),
                Script::Complete(hosts) => {
                    store.set(&status_key(engine_id), "ready").unwrap();
                    store
                        .append(KB_RESULTS, &format!("LOG||||||general/tcp|||{OID}|||scan wide"))
                        .unwrap();
                    for host in hosts {
                        self.scan_host(Some(engine_id), main, host, true);
                    }
                    store.set(&status_key(engine_id), "finished").unwrap();
                    exit(0);
                }
                Script::UntilStopped(hosts) => {
                    store.set(&status_key(engine_id), "ready").unwrap();
                    for host in hosts {
                        self.scan_host(Some(engine_id), main, host, false);
                    }
                }
                Script::DiesWhileScanning(code) => {
                    store.set(&status_key(engine_id), "ready").unwrap();
                    exit(*code);
                }
                Script::HostWithoutScanId(host) => {
                    store.set(&status_key(engine_id), "ready").unwrap();
                    self.scan_host(None, main, host, false);
                }
                Script::ForeignHost(host) => {
                    store.set(&status_key(engine_id), "ready").unwrap();
                    self.scan_host(Some("another-engine-id"), main, "10.0.0.99", false);
                    self.scan_host(Some(engine_id), main, host, true);
                    store.set(&status_key(engine_id), "finished").unwrap();
                    exit(0);
                }
                Script::FinishedEarly => {
                    store.set(&status_key(engine_id), "finished").unwrap();
                }
            }
            Ok(process)
        }

        fn stop(&self, engine_id: &str) -> io::Result<()> {
            self.stopped.store(true, Ordering::SeqCst);
            self.exit(engine_id, -15);
            Ok(())
        }

        fn refresh_vt_cache(&self) -> io::Result<()> {
            self.refreshed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    pub fn catalog() -> VtCatalog {
        VtCatalog::new(
            1,
            [VtRecord {
                oid: OID.to_owned(),
                name: "Test VT".to_owned(),
                severity: Severity {
                    vector: Some("AV:N/AC:L/Au:N/C:P/I:P/A:P".to_owned()),
                    severity_type: Some("cvss_base_v2".to_owned()),
                    ..Default::default()
                },
                ..Default::default()
            }],
        )
    }

    pub fn scan(id: &str) -> Scan {
        Scan {
            scan_id: id.to_owned(),
            target: Target {
                hosts: vec!["10.0.0.1".to_owned(), "10.0.0.2".to_owned()],
                ports: "T:22".to_owned(),
                ..Default::default()
            },
            vts: vec![VT {
                oid: OID.to_owned(),
                parameters: vec![],
            }],
            ..Default::default()
        }
    }

    pub const FAST: Intervals = Intervals {
        check: Duration::from_millis(10),
        launch_check: Duration::from_millis(5),
    };

    fn prepare(
        connector: &InMemoryConnector,
        script: Script,
    ) -> (
        RunningScan<<InMemoryConnector as StoreConnector>::Store, FakeEngine, ResultCollector>,
        Arc<FakeEngine>,
        Arc<ResultCollector>,
    ) {
        let engine = Arc::new(FakeEngine::new(connector.clone(), script));
        let reporter = Arc::new(ResultCollector::default());
        let running = RunningScan::prepare(
            &scan("client-1"),
            connector.connect().unwrap(),
            engine.clone(),
            reporter.clone(),
            Arc::new(catalog()),
            FAST,
        )
        .unwrap();
        (running, engine, reporter)
    }

    #[tokio::test]
    async fn prepare_stores_control_keys() {
        let connector = InMemoryConnector::default();
        let (running, _, _) = prepare(&connector, Script::Crash(1));
        let mut store = connector.connect().unwrap();
        store.select(running.main_index()).unwrap();
        let engine_id = running.engine_id().to_owned();
        assert_ne!(engine_id, "client-1");
        assert_eq!(
            store.get(&status_key(&engine_id)).unwrap().as_deref(),
            Some("new")
        );
        assert_eq!(
            store.get(&global_scan_id_key("client-1")).unwrap(),
            Some(engine_id.clone())
        );
        assert_eq!(store.get(KB_SCANID).unwrap(), Some(engine_id.clone()));
        let prefs = store.enumerate(&preferences_key(&engine_id)).unwrap();
        assert!(prefs.contains(&format!("ov_maindbid|||{}", running.main_index())));
        assert!(prefs.contains(&"TARGET|||10.0.0.1,10.0.0.2".to_owned()));
    }

    #[tokio::test]
    async fn rejected_scans_allocate_nothing() {
        let connector = InMemoryConnector::default();
        let engine = Arc::new(FakeEngine::new(connector.clone(), Script::Crash(1)));
        let mut scan = scan("client-1");
        scan.target.ports = String::new();
        let result = RunningScan::prepare(
            &scan,
            connector.connect().unwrap(),
            engine,
            Arc::new(ResultCollector::default()),
            Arc::new(catalog()),
            FAST,
        );
        assert!(matches!(result, Err(OpenvasError::Rejected(_))));
        assert!(connector.in_use().unwrap().is_empty());
    }

    #[tokio::test]
    async fn completes_and_releases_everything() {
        let connector = InMemoryConnector::default();
        let (running, _, reporter) =
            prepare(&connector, Script::Complete(vec!["10.0.0.1", "10.0.0.2"]));
        let phase = running.start().wait().await;
        assert_eq!(phase, Phase::Succeeded);
        assert!(connector.in_use().unwrap().is_empty());

        let results = reporter.get("client-1").unwrap();
        assert_eq!(results.phase, Phase::Succeeded);
        let alarms: Vec<&ScanResult> = results
            .results
            .iter()
            .filter(|r| r.result_type == ResultType::Alarm)
            .collect();
        assert_eq!(alarms.len(), 2);
        assert!(alarms.iter().all(|a| a.severity == Some(7.5)));
        assert!(alarms.iter().any(|a| a.host == "10.0.0.2"));
        let scan_wide = results
            .results
            .iter()
            .find(|r| r.message == "scan wide")
            .unwrap();
        assert_eq!(scan_wide.host, "");
        let mut finished = results.finished_hosts.clone();
        finished.sort();
        assert_eq!(finished, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(results.host_status.get("10.0.0.1"), Some(&100));
        assert!(
            results
                .results
                .iter()
                .any(|r| r.name == "HOST_END" && r.host == "10.0.0.1")
        );
    }

    #[tokio::test]
    async fn completes_without_any_host() {
        let connector = InMemoryConnector::default();
        let (running, _, reporter) = prepare(&connector, Script::Complete(vec![]));
        assert_eq!(running.start().wait().await, Phase::Succeeded);
        assert_eq!(reporter.phase("client-1"), Some(Phase::Succeeded));
        assert!(connector.in_use().unwrap().is_empty());
    }

    #[tokio::test]
    async fn crash_during_launch_fails_the_scan() {
        let connector = InMemoryConnector::default();
        let (running, _, reporter) = prepare(&connector, Script::Crash(-11));
        assert_eq!(running.start().wait().await, Phase::Failed);
        let results = reporter.get("client-1").unwrap();
        assert_eq!(results.results[0].result_type, ResultType::Error);
        assert!(connector.in_use().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dying_engine_fails_the_scan() {
        let connector = InMemoryConnector::default();
        let (running, _, reporter) = prepare(&connector, Script::DiesWhileScanning(1));
        assert_eq!(running.start().wait().await, Phase::Failed);
        assert_eq!(reporter.phase("client-1"), Some(Phase::Failed));
        assert!(connector.in_use().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_sentinel_stops_engine() {
        let connector = InMemoryConnector::default();
        let (running, engine, reporter) =
            prepare(&connector, Script::UntilStopped(vec!["10.0.0.1"]));
        let engine_id = running.engine_id().to_owned();
        let main = running.main_index();
        let handle = running.start();

        // wait until the host was harvested at least once
        while reporter
            .get("client-1")
            .map(|r| r.results.is_empty())
            .unwrap_or(true)
        {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let mut store = connector.connect().unwrap();
        store.select(main).unwrap();
        store.set(&status_key(&engine_id), "stop_all").unwrap();

        assert_eq!(handle.wait().await, Phase::Stopped);
        assert!(engine.stopped.load(Ordering::SeqCst));
        assert!(connector.in_use().unwrap().is_empty());
        assert_eq!(reporter.phase("client-1"), Some(Phase::Stopped));
    }

    #[tokio::test]
    async fn stop_request_needs_known_scan() {
        let connector = InMemoryConnector::default();
        let (running, _, _) = prepare(&connector, Script::Complete(vec![]));
        let mut store = connector.connect().unwrap();
        assert!(matches!(
            request_stop(&mut store, running.main_index(), "unknown"),
            Err(OpenvasError::ScanNotFound(_))
        ));
        let engine_id = request_stop(&mut store, running.main_index(), "client-1").unwrap();
        assert_eq!(engine_id, running.engine_id());
        assert_eq!(
            store.get(&status_key(&engine_id)).unwrap().as_deref(),
            Some("stop_all")
        );
    }

    fn prepare_with<S: KeyedStore + 'static, E: Engine>(
        store: S,
        engine: Arc<E>,
    ) -> (RunningScan<S, E, ResultCollector>, Arc<ResultCollector>) {
        let reporter = Arc::new(ResultCollector::default());
        let running = RunningScan::prepare(
            &scan("client-1"),
            store,
            engine,
            reporter.clone(),
            Arc::new(catalog()),
            FAST,
        )
        .unwrap();
        (running, reporter)
    }

    fn alarms_for(reporter: &ResultCollector, host: &str) -> usize {
        reporter
            .get("client-1")
            .map(|r| {
                r.results
                    .iter()
                    .filter(|r| r.result_type == ResultType::Alarm && r.host == host)
                    .count()
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn host_without_scan_id_is_left_for_later() {
        let connector = InMemoryConnector::default();
        let (running, engine, reporter) =
            prepare(&connector, Script::HostWithoutScanId("10.0.0.1"));
        let engine_id = running.engine_id().to_owned();
        let main = running.main_index();
        let handle = running.start();

        while connector.in_use().unwrap().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // several harvesting rounds
        tokio::time::sleep(Duration::from_millis(60)).await;
        let host_index = connector
            .in_use()
            .unwrap()
            .into_iter()
            .find(|i| *i != main)
            .unwrap();
        assert_eq!(alarms_for(&reporter, "10.0.0.1"), 0);
        assert!(!handle.is_finished());

        let mut store = connector.connect().unwrap();
        store.select(host_index).unwrap();
        store.set(KB_HOST_SCAN_ID, &engine_id).unwrap();
        store.set(&status_key(&engine_id), "finished").unwrap();
        store.select(main).unwrap();
        store.set(&status_key(&engine_id), "finished").unwrap();
        engine.exit(&engine_id, 0);

        assert_eq!(handle.wait().await, Phase::Succeeded);
        assert_eq!(alarms_for(&reporter, "10.0.0.1"), 1);
        let results = reporter.get("client-1").unwrap();
        assert_eq!(results.finished_hosts, vec!["10.0.0.1"]);
        assert!(connector.in_use().unwrap().is_empty());
    }

    #[tokio::test]
    async fn host_index_of_another_scan_is_left_alone() {
        let connector = InMemoryConnector::default();
        let (running, _, reporter) = prepare(&connector, Script::ForeignHost("10.0.0.1"));
        assert_eq!(running.start().wait().await, Phase::Succeeded);
        assert_eq!(alarms_for(&reporter, "10.0.0.1"), 1);
        assert_eq!(alarms_for(&reporter, "10.0.0.99"), 0);
        let results = reporter.get("client-1").unwrap();
        assert!(results.results.iter().all(|r| r.host != "10.0.0.99"));

        let left = connector.in_use().unwrap();
        assert_eq!(left.len(), 1);
        let mut store = connector.connect().unwrap();
        store.select(left[0]).unwrap();
        assert_eq!(
            store.get(KB_HOST_SCAN_ID).unwrap().as_deref(),
            Some("another-engine-id")
        );
        assert_eq!(store.get(KB_HOST_IP).unwrap().as_deref(), Some("10.0.0.99"));
        assert_eq!(store.enumerate(KB_RESULTS).unwrap().len(), 1);
    }

    type Hook = Box<dyn FnOnce() + Send>;

    /// Runs a hook right after the host registry was read for the first time.
    struct HookedStore {
        inner: InMemoryStore,
        hook: Arc<Mutex<Option<Hook>>>,
    }

    impl KeyedStore for HookedStore {
        fn allocate_index(&mut self) -> StoreResult<ScanIndex> {
            self.inner.allocate_index()
        }

        fn select(&mut self, index: ScanIndex) -> StoreResult<()> {
            self.inner.select(index)
        }

        fn index(&self) -> ScanIndex {
            self.inner.index()
        }

        fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
            self.inner.set(key, value)
        }

        fn append(&mut self, key: &str, value: &str) -> StoreResult<()> {
            self.inner.append(key, value)
        }

        fn pop(&mut self, key: &str) -> StoreResult<Option<String>> {
            self.inner.pop(key)
        }

        fn enumerate(&mut self, key: &str) -> StoreResult<Vec<String>> {
            let values = self.inner.enumerate(key)?;
            if key == KB_DBINDEX {
                let hook = self.hook.lock().unwrap().take();
                if let Some(hook) = hook {
                    hook();
                }
            }
            Ok(values)
        }

        fn remove_item(&mut self, key: &str, value: &str) -> StoreResult<()> {
            self.inner.remove_item(key, value)
        }

        fn release(&mut self, index: ScanIndex) -> StoreResult<()> {
            self.inner.release(index)
        }
    }

    #[tokio::test]
    async fn host_registered_after_scan_finished_is_harvested() {
        let connector = InMemoryConnector::default();
        let engine = Arc::new(FakeEngine::new(connector.clone(), Script::FinishedEarly));
        let hook: Arc<Mutex<Option<Hook>>> = Default::default();
        let store = HookedStore {
            inner: connector.connect().unwrap(),
            hook: hook.clone(),
        };
        let (running, reporter) = prepare_with(store, engine.clone());
        let engine_id = running.engine_id().to_owned();
        let main = running.main_index();
        *hook.lock().unwrap() = Some(Box::new(move || {
            engine.scan_host(Some(&engine_id), main, "10.0.0.3", true);
            engine.exit(&engine_id, 0);
        }));

        assert_eq!(running.start().wait().await, Phase::Succeeded);
        assert!(hook.lock().unwrap().is_none());
        assert_eq!(alarms_for(&reporter, "10.0.0.3"), 1);
        let results = reporter.get("client-1").unwrap();
        assert_eq!(results.finished_hosts, vec!["10.0.0.3"]);
        assert!(connector.in_use().unwrap().is_empty());
    }

    /// Takes its time to deliver a stop and counts the ticks of the runtime meanwhile.
    struct SlowStop {
        inner: FakeEngine,
        ticks: Arc<AtomicUsize>,
        ticks_during_stop: AtomicUsize,
    }

    impl Engine for SlowStop {
        type Process = FakeProcess;

        fn start(&self, engine_id: &str) -> io::Result<FakeProcess> {
            self.inner.start(engine_id)
        }

        fn stop(&self, engine_id: &str) -> io::Result<()> {
            let before = self.ticks.load(Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(100));
            self.ticks_during_stop
                .store(self.ticks.load(Ordering::SeqCst) - before, Ordering::SeqCst);
            self.inner.stop(engine_id)
        }

        fn refresh_vt_cache(&self) -> io::Result<()> {
            self.inner.refresh_vt_cache()
        }
    }

    #[tokio::test]
    async fn stopping_engine_does_not_block_runtime() {
        let connector = InMemoryConnector::default();
        let ticks = Arc::new(AtomicUsize::new(0));
        let engine = Arc::new(SlowStop {
            inner: FakeEngine::new(connector.clone(), Script::UntilStopped(vec!["10.0.0.1"])),
            ticks: ticks.clone(),
            ticks_during_stop: AtomicUsize::new(0),
        });
        let (running, reporter) = prepare_with(connector.connect().unwrap(), engine.clone());
        let engine_id = running.engine_id().to_owned();
        let main = running.main_index();
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(1));
            loop {
                interval.tick().await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        });
        let handle = running.start();

        while alarms_for(&reporter, "10.0.0.1") == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let mut store = connector.connect().unwrap();
        store.select(main).unwrap();
        store.set(&status_key(&engine_id), "stop_all").unwrap();

        assert_eq!(handle.wait().await, Phase::Stopped);
        ticker.abort();
        assert!(engine.inner.stopped.load(Ordering::SeqCst));
        assert!(engine.ticks_during_stop.load(Ordering::SeqCst) >= 5);
        assert!(connector.in_use().unwrap().is_empty());
    }

    /// Spawns a real child process in place of openvas.
    #[cfg(target_os = "linux")]
    struct ChildEngine {
        connector: InMemoryConnector,
        status: &'static str,
        command: &'static [&'static str],
        pid: std::sync::atomic::AtomicU32,
    }

    #[cfg(target_os = "linux")]
    impl Engine for ChildEngine {
        type Process = OpenvasProcess;

        fn start(&self, engine_id: &str) -> io::Result<OpenvasProcess> {
            let main = main_index_of(&self.connector, engine_id);
            let mut store = self.connector.connect().unwrap();
            store.select(main).unwrap();
            store.set(&status_key(engine_id), self.status).unwrap();
            let child = std::process::Command::new(self.command[0])
                .args(&self.command[1..])
                .spawn()?;
            self.pid.store(child.id(), Ordering::SeqCst);
            Ok(child.into())
        }

        fn stop(&self, _: &str) -> io::Result<()> {
            Ok(())
        }

        fn refresh_vt_cache(&self) -> io::Result<()> {
            Ok(())
        }
    }

    #[cfg(target_os = "linux")]
    fn is_zombie(pid: u32) -> bool {
        std::fs::read_to_string(format!("/proc/{pid}/stat"))
            .ok()
            .and_then(|stat| {
                stat.rsplit_once(')')
                    .map(|(_, rest)| rest.trim_start().starts_with('Z'))
            })
            .unwrap_or(false)
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn engine_process_is_reaped() {
        let cases: [(&'static str, &'static [&'static str], Phase); 2] = [
            ("finished", &["sleep", "0.05"], Phase::Succeeded),
            ("ready", &["sh", "-c", "sleep 0.05; exit 3"], Phase::Failed),
        ];
        for (status, command, expected) in cases {
            let connector = InMemoryConnector::default();
            let engine = Arc::new(ChildEngine {
                connector: connector.clone(),
                status,
                command,
                pid: std::sync::atomic::AtomicU32::new(0),
            });
            let (running, reporter) = prepare_with(connector.connect().unwrap(), engine.clone());
            assert_eq!(running.start().wait().await, expected);
            assert_eq!(reporter.phase("client-1"), Some(expected));

            tokio::time::sleep(Duration::from_millis(100)).await;
            let pid = engine.pid.load(Ordering::SeqCst);
            assert_ne!(pid, 0);
            assert!(!is_zombie(pid), "{status}: openvas {pid} was not reaped");
            assert!(connector.in_use().unwrap().is_empty());
        }
    }
}
