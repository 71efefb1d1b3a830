//! Xbox 360 controller daemon
//!
//! Attaches to every matching controller and runs until Ctrl-C.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use xpad360_driver::dispatch;
use xpad360_driver::{
    DeviceManager, DriverConfig, DriverError, EvdevInput, NusbHost, ReportSink, SessionDirectory,
    WorkerPool,
};

#[derive(Parser)]
#[command(name = "xpad360d")]
#[command(about = "Userspace driver for wired Xbox 360 controllers")]
struct Cli {
    /// Config file path (default: ~/.config/xpad360/driver.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of report workers (default: one per online CPU)
    #[arg(short, long)]
    workers: Option<usize>,

    /// List connected controllers and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = cli.config.unwrap_or_else(DriverConfig::default_path);
    info!("Loading config from {:?}", config_path);
    let mut config = DriverConfig::load(&config_path)?;
    if cli.workers.is_some() {
        config.workers = cli.workers;
    }

    if cli.list {
        let devices = dispatch::list_matching(&config)?;
        if devices.is_empty() {
            println!("No controllers found");
        }
        for device in devices {
            println!(
                "{:04x}:{:04x} bus {} address {}  {}",
                device.vendor_id(),
                device.product_id(),
                device.bus_number(),
                device.device_address(),
                device.product_string().unwrap_or("Unknown")
            );
        }
        return Ok(());
    }

    let directory = Arc::new(SessionDirectory::new());
    let pool = Arc::new(
        WorkerPool::new(
            config.worker_count(),
            config.effective_queue_depth(),
            ReportSink::new(Arc::clone(&directory)),
        )
        .map_err(DriverError::from)?,
    );
    info!(
        "Started {} report workers (queue depth {})",
        pool.workers(),
        pool.queue_depth()
    );

    let (completions_tx, completions_rx) = mpsc::unbounded_channel();
    let host = Arc::new(NusbHost::new(
        tokio::runtime::Handle::current(),
        completions_tx,
    ));
    let mut manager = DeviceManager::new(
        host,
        Arc::new(EvdevInput::new()),
        Arc::clone(&pool),
        directory,
        config.descriptor(),
    );

    let result = dispatch::run(&mut manager, completions_rx, &config).await;
    drop(manager);

    for (index, stats) in pool.stats().iter().enumerate() {
        info!(
            "Worker {}: {} processed, {} dropped",
            index, stats.processed, stats.dropped
        );
    }
    pool.shutdown();
    result
}
