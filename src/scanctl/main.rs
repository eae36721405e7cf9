// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Runs and stops openvas scans from the command line.
mod error;

use std::{
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{ArgAction, Parser, Subcommand};
use openvas_orchestrator::{
    catalog::CatalogHandle,
    config::{Config, ConfigError},
    feed::FeedSynchronizer,
    models::{Phase, Scan},
    openvas::{OpenvasEngine, ResultCollector, Scanner, running_scan::request_stop},
    storage::{
        ScanIndex, StoreConnector,
        redis::{RedisCatalogSource, RedisConnector},
    },
};

use error::CliError;

#[derive(Parser)]
#[command(name = "scanctl", version, about = "Runs openvas scans.")]
struct Cli {
    /// Path to the TOML configuration.
    #[arg(short, long, env = "SCANCTL_CONFIG")]
    config: Option<PathBuf>,
    /// Prints more details while running.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs a scan until it is done and prints its results as JSON.
    Start {
        /// Scan as JSON; `-` reads from stdin.
        scan: PathBuf,
    },
    /// Asks a running scan to stop.
    Stop {
        /// Main index of the scan, as logged on start.
        #[arg(long)]
        index: ScanIndex,
        scan_id: String,
    },
    /// Reloads the VT catalog when the feed changed.
    FeedCheck,
}

struct Context {
    config: Config,
    url: String,
}

impl Context {
    fn new(config: Config) -> Result<Self, CliError> {
        let url = config
            .redis
            .url
            .clone()
            .ok_or(ConfigError::Missing("db_address"))?;
        Ok(Self { config, url })
    }

    fn synchronizer(
        &self,
        engine: Arc<OpenvasEngine>,
        catalog: CatalogHandle,
    ) -> Result<FeedSynchronizer<RedisCatalogSource, OpenvasEngine>, CliError> {
        let plugins_folder = self
            .config
            .feed
            .plugins_folder
            .clone()
            .ok_or(ConfigError::Missing("plugins_folder"))?;
        Ok(FeedSynchronizer::new(
            plugins_folder,
            Arc::new(RedisCatalogSource::new(&self.url)),
            engine,
            catalog,
        ))
    }
}

fn read_scan(path: &Path) -> Result<Scan, CliError> {
    let mut content = String::new();
    let read = if path.as_os_str() == "-" {
        std::io::stdin().read_to_string(&mut content).map(|_| ())
    } else {
        std::fs::read_to_string(path).map(|c| content = c)
    };
    read.map_err(|e| CliError::Read(path.to_owned(), e))?;
    Ok(serde_json::from_str(&content)?)
}

async fn start(ctx: &Context, path: &Path) -> Result<Phase, CliError> {
    let scan = read_scan(path)?;
    let engine = Arc::new(ctx.config.engine());
    let catalog = CatalogHandle::default();
    let sync = ctx.synchronizer(engine.clone(), catalog.clone())?;
    let status = sync.check_feed(0).await?;
    tracing::debug!(?status, version = catalog.version(), "feed checked");

    let connector = Arc::new(RedisConnector::new(&ctx.url));
    let reporter = Arc::new(ResultCollector::default());
    let scanner = Scanner::new(
        connector.clone(),
        engine,
        reporter.clone(),
        catalog,
        sync.pending(),
        ctx.config.intervals(),
    );
    scanner.launch(&scan)?;
    let Some(handle) = scanner.take(&scan.scan_id) else {
        return Ok(Phase::Failed);
    };
    let main_index = handle.main_index();
    tracing::info!(
        scan_id = scan.scan_id,
        main_index,
        "scan started, stop it with `scanctl stop --index {main_index} {}`",
        scan.scan_id
    );

    let wait = handle.wait();
    tokio::pin!(wait);
    let phase = tokio::select! {
        phase = &mut wait => phase,
        _ = tokio::signal::ctrl_c() => {
            let mut store = connector.connect()?;
            request_stop(&mut store, main_index, &scan.scan_id)?;
            wait.await
        }
    };

    let results = reporter.get(&scan.scan_id).unwrap_or_default();
    println!("{}", serde_json::to_string_pretty(&results.results)?);
    Ok(phase)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    config.log.init(cli.verbose);
    let ctx = Context::new(config.resolve()?)?;
    tracing::trace!(config = %ctx.config, "configuration");

    match cli.command {
        Command::Start { scan } => {
            let phase = start(&ctx, &scan).await?;
            tracing::info!(%phase, "scan ended");
            if phase != Phase::Succeeded && phase != Phase::Stopped {
                std::process::exit(2);
            }
        }
        Command::Stop { index, scan_id } => {
            let connector = RedisConnector::new(&ctx.url);
            let mut store = connector.connect()?;
            let engine_id = request_stop(&mut store, index, &scan_id)?;
            println!("{engine_id}");
        }
        Command::FeedCheck => {
            let catalog = CatalogHandle::default();
            let sync = ctx.synchronizer(Arc::new(ctx.config.engine()), catalog.clone())?;
            let status = sync.check_feed(0).await?;
            println!("{status:?} {}", catalog.version());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
