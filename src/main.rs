//! Replication simulator
//!
//! Runs one replication job against in-memory peers: a node that lost one
//! part of every blob recovers it from the parts the other nodes still hold.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Replication Job                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  VecPlanner  │───▶│   Recovery   │───▶│ Record Store │       │
//! │  │              │    │   Machine    │    │              │       │
//! │  └──────────────┘    └──────▲───────┘    └──────────────┘       │
//! │                             │                                   │
//! │                      InMemoryPeerSource                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use blobrepl::adapters::{
    InMemoryPeerSource, InMemoryRecordStore, ReedSolomonCoder, StaticPhantomChecker, VecPlanner,
};
use blobrepl::domain::ports::PlanItem;
use blobrepl::metrics::render_text;
use blobrepl::repl::{Ingress, LostBlob, PartMask, ReplJob, ReplPorts};
use blobrepl::{BlobId, ReplConfig, ReplMonGroup};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Replication recovery simulator for an erasure-coded blob store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "REPL_CONFIG")]
    config: Option<PathBuf>,

    /// Number of blobs the node lost
    #[arg(long, env = "REPL_BLOBS", default_value = "64")]
    blobs: u32,

    /// Size of every blob in bytes
    #[arg(long, env = "REPL_BLOB_SIZE", default_value = "4096")]
    blob_size: u32,

    /// Part position held by the recovering node
    #[arg(long, env = "REPL_LOCAL_PART", default_value = "0")]
    local_part: u8,

    /// Every n-th blob keeps too few parts on the peers (0 disables)
    #[arg(long, env = "REPL_DAMAGED_EVERY", default_value = "7")]
    damaged_every: u32,

    /// Every n-th blob is a phantom that was never fully written (0 disables)
    #[arg(long, env = "REPL_PHANTOM_EVERY", default_value = "11")]
    phantom_every: u32,

    /// Override the huge blob threshold, in bytes of one part
    #[arg(long, env = "REPL_HUGE_BLOB_THRESHOLD")]
    huge_blob_threshold: Option<usize>,

    /// Print Prometheus metrics after the job
    #[arg(long, env = "REPL_DUMP_METRICS")]
    dump_metrics: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let mut config = match &args.config {
        Some(path) => ReplConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ReplConfig::default(),
    };
    if let Some(threshold) = args.huge_blob_threshold {
        config.huge_blob_threshold = threshold;
    }
    config.validate()?;

    let scheme = config.scheme()?;
    info!("Starting replication simulator");
    info!("  Scheme: {}", scheme);
    info!("  Blobs: {} x {} bytes", args.blobs, args.blob_size);
    info!("  Local part: {}", args.local_part);

    anyhow::ensure!(
        args.local_part < scheme.total_part_count(),
        "local part {} out of range for scheme {}",
        args.local_part,
        scheme
    );

    let coder = Arc::new(ReedSolomonCoder::new(scheme)?);
    let registry = prometheus::Registry::new();
    let mon = ReplMonGroup::new()?;
    mon.register(&registry)?;

    let mut planner_items = Vec::new();
    let mut peers = InMemoryPeerSource::new(coder.clone());
    let mut phantoms = Vec::new();
    let total = scheme.total_part_count();
    let all_but_local: Vec<u8> = (0..total).filter(|&p| p != args.local_part).collect();
    let too_few: Vec<u8> = all_but_local
        .iter()
        .copied()
        .take(usize::from(scheme.minimal_restorable_part_count()) - 1)
        .collect();

    for n in 1..=args.blobs {
        let id = BlobId::new(1000, 1, n, 0, 0, args.blob_size);
        let payload: Vec<u8> = (0..args.blob_size).map(|b| (b ^ n) as u8).collect();
        let phantom = is_every(n, args.phantom_every);

        let held = if phantom || is_every(n, args.damaged_every) {
            &too_few
        } else {
            &all_but_local
        };
        peers.add_blob(id, &payload, held)?;
        if phantom {
            phantoms.push(id);
        }

        planner_items.push(PlanItem::Lost(LostBlob::new(
            id,
            PartMask::one_hot(args.local_part, total),
            phantom,
            Ingress(u64::from(n)),
        )));
    }

    let mut planner = VecPlanner::new(planner_items);
    let mut phantom_checker = StaticPhantomChecker::new(phantoms);
    let store = InMemoryRecordStore::new();
    let mut committer = store.clone();

    let job = ReplJob::new(&config, coder, mon);
    let report = job
        .run(ReplPorts {
            planner: &mut planner,
            peers: &mut peers,
            phantom_checker: &mut phantom_checker,
            committer: &mut committer,
        })
        .await
        .context("replication job failed")?;

    if !report.unreplicated.is_empty() {
        warn!("{} blobs left unreplicated", report.unreplicated.len());
    }
    info!(
        "Committed {} records in {} commits",
        store.records().len(),
        store.commits()
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    if args.dump_metrics {
        print!("{}", render_text(&registry)?);
    }

    Ok(())
}

fn is_every(n: u32, every: u32) -> bool {
    every != 0 && n % every == 0
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("reed_solomon_erasure=warn".parse()?);

    // logs go to stderr so stdout carries only the report
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}
