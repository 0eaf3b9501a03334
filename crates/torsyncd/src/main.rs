//! torsyncd - ToR switch sync driver
//!
//! Replays a scenario of platform events through the driver against the
//! configured switches.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use torsync::config::CoordinationBackend;
use torsync::{
    DriverConfig, Replayer, Scenario, ShellSwitchExecutor, StaticInventory, TorSyncDriver,
};
use torsync_common::lock::{LockService, MemoryLockService};
use torsync_common::store::MemoryStore;

/// Top-of-rack switch sync driver
#[derive(Parser, Debug)]
#[command(name = "torsyncd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Driver configuration (YAML)
    #[arg(short = 'c', long)]
    config: PathBuf,

    /// Scenario to replay (JSON)
    #[arg(short = 's', long)]
    scenario: PathBuf,

    /// Print switch commands instead of running them
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

/// Initializes tracing/logging subsystem
fn init_logging(log_level: &str) -> anyhow::Result<()> {
    let level: Level = log_level
        .parse()
        .with_context(|| format!("invalid log level '{}'", log_level))?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let config = DriverConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let scenario = Scenario::load(&args.scenario)
        .with_context(|| format!("loading {}", args.scenario.display()))?;

    info!(
        hosts = config.hosts.len(),
        port_mappings = config.port_mappings.len(),
        events = scenario.events.len(),
        dry_run = args.dry_run,
        "Configuration loaded"
    );

    let locks: Arc<dyn LockService> = match config.coordination.backend {
        CoordinationBackend::Memory => Arc::new(MemoryLockService::new()),
    };
    let executor = Arc::new(ShellSwitchExecutor::from_config(&config).with_dry_run(args.dry_run));
    let store = Arc::new(MemoryStore::from_snapshot(scenario.entities));
    let driver = TorSyncDriver::new(
        store.clone(),
        store.clone(),
        Arc::new(StaticInventory::from_config(&config)),
        executor.clone(),
        locks,
    );

    let reports = Replayer::new(store, driver).run(scenario.events).await;
    for report in &reports {
        println!("{}", serde_json::to_string(report)?);
    }
    if args.dry_run {
        for cmd in executor.captured_commands() {
            println!("{}", cmd);
        }
    }

    let failures = reports.iter().filter(|r| r.outcome.is_failure()).count();
    info!(events = reports.len(), failures, "Replay complete");
    Ok(failures == 0)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("torsyncd: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!("--- Starting torsyncd ---");

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("torsyncd failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
