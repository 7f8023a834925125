// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ehddp-sim - eHDDP discovery against a simulated hybrid fabric
//!
//! Loads a JSON fabric description, starts the discovery service on an
//! in-memory controller and prints what it inferred.
//!
//! # Usage
//!
//! ```bash
//! # Three cycles over the sample fabric
//! ehddp-sim --topology tools/ehddp-sim/topologies/hybrid.json --cycles 3
//!
//! # Run until Ctrl+C, appending valid cycles to a JSON-lines file
//! ehddp-sim --topology fabric.json --cycles 0 --stats cycles.jsonl --log-level debug
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use ehddp::inventory::StaticReference;
use ehddp::{Collaborators, DiscoveryConfig, DiscoveryService, MemoryNetwork};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod fabric;
mod layout;
mod report;

use fabric::Fabric;
use layout::Layout;
use report::{print_topology, ReportSink};

/// eHDDP simulator - discovery cycles over a simulated hybrid fabric
#[derive(Parser, Debug)]
#[command(name = "ehddp-sim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Fabric description (JSON)
    #[arg(short, long)]
    topology: PathBuf,

    /// Discovery configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cycles to run (0 = until Ctrl+C)
    #[arg(short = 'n', long, default_value = "1")]
    cycles: u64,

    /// Override the harvest window (milliseconds)
    #[arg(long)]
    harvest_ms: Option<u64>,

    /// Append valid cycle records to this file (JSON lines)
    #[arg(short, long)]
    stats: Option<PathBuf>,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| format!("cannot install logger: {}", e))?;

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            DiscoveryConfig::from_file(path)?
        }
        None => DiscoveryConfig::default(),
    };
    if let Some(ms) = args.harvest_ms {
        config.harvest_window_ms = ms;
    }
    config.validate()?;

    let layout = Arc::new(Layout::from_file(&args.topology)?);
    let reference = config.reference.unwrap_or_else(|| layout.reference());

    let network = Arc::new(MemoryNetwork::new());
    for id in layout.managed_ids() {
        network.add_managed_switch(id);
    }
    let sink = Arc::new(ReportSink::new(args.stats.as_deref())?);
    let collaborators = Collaborators::from_memory(
        Arc::clone(&network),
        Arc::new(StaticReference(Some(reference))),
        sink.clone(),
    );

    info!("+----------------------------------------------------+");
    info!("|       eHDDP Simulator v{:<28}|", env!("CARGO_PKG_VERSION"));
    info!("+----------------------------------------------------+");
    info!(
        "|  Fabric:  {:40} |",
        format!("{} nodes, {} sensors", layout.nodes().len(), layout.sensors())
    );
    info!("|  Expect:  {:40} |", format!("{} switches", reference.expected_switches));
    info!("|  Harvest: {:40} |", format!("{} ms", config.harvest_window_ms));
    info!(
        "|  Cycles:  {:40} |",
        if args.cycles == 0 {
            "until interrupted".to_string()
        } else {
            args.cycles.to_string()
        }
    );
    info!("+----------------------------------------------------+");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let fabric = Fabric::start(Arc::clone(&layout), Arc::clone(&network), config.ether_type)?;
    let limit = (args.cycles > 0).then_some(args.cycles);
    let service = DiscoveryService::start_with_limit(config, collaborators, limit)?;

    while running.load(Ordering::SeqCst) && !service.is_finished() {
        thread::sleep(Duration::from_millis(100));
    }
    if !running.load(Ordering::SeqCst) {
        info!("Shutdown signal received, stopping discovery...");
    }

    let completed = service.completed_cycles();
    let last = service.last_report();
    service.stop();
    let carried = fabric.stop();

    print_topology(&network, last.as_deref());
    info!(
        "{} cycles, {} valid; fabric carried {} frames, punted {}, dropped {}",
        completed,
        sink.recorded(),
        carried.carried,
        carried.punted,
        carried.dropped
    );
    Ok(())
}
