//! cwe-fetch - collect raw CWE weakness records
//!
//! Probes the API, collects every weakness reachable from a view (or all of
//! them), and writes `{"Weaknesses": [...]}`. Optionally assembles the graph
//! artifact in the same run.

use anyhow::{bail, Context, Result};
use clap::Parser;
use cwe_common::config::load_config;
use cwe_common::logging::init_tracing;
use cwe_common::output::write_json_atomic;
use cwe_common::WeaknessDocument;
use cwe_fetch::{CliOverrides, FetchSettings, Harvester, Scope};
use cwe_graph::{assemble, write_graph, WriteMode};
use std::path::PathBuf;
use tracing::{info, warn};

/// Exit status after Ctrl-C
const EXIT_INTERRUPTED: i32 = 130;

/// Command-line arguments for cwe-fetch
#[derive(Parser, Debug)]
#[command(name = "cwe-fetch")]
#[command(about = "Collect CWE weakness records from the MITRE CWE REST API")]
#[command(version)]
struct Args {
    /// Output file for the collected records
    output: PathBuf,

    /// View to start collection from
    #[arg(long, env = "CWE_VIEW")]
    view: Option<String>,

    /// CWE REST API base URL
    #[arg(long, env = "CWE_API_BASE_URL")]
    base_url: Option<String>,

    /// Fetch `/cwe/weakness/all` instead of walking a view
    #[arg(long)]
    all_direct: bool,

    /// Outer worker pool size (default: min(32, cores + 4))
    #[arg(long, env = "CWE_MAX_WORKERS")]
    max_workers: Option<usize>,

    /// Identifiers per grouped request
    #[arg(long, env = "CWE_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Disable TLS certificate verification (testing only)
    #[arg(long)]
    insecure: bool,

    /// Print request and cache statistics at the end
    #[arg(long)]
    show_stats: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (overrides CWE_HARVEST_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also assemble the graph artifact into this file
    #[arg(long)]
    graph: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml = load_config(args.config.as_deref());
    let level = toml.as_ref().map(|c| c.logging.level.clone()).unwrap_or_else(|_| "info".to_string());
    init_tracing(args.verbose, &level);

    info!(
        "Starting cwe-fetch v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let toml = toml.context("Failed to load configuration")?;
    let settings = FetchSettings::resolve(
        &CliOverrides {
            base_url: args.base_url.clone(),
            view: args.view.clone(),
            max_workers: args.max_workers,
            batch_size: args.batch_size,
            insecure: args.insecure,
        },
        &toml,
    );

    if settings.insecure {
        warn!("TLS certificate verification is DISABLED (--insecure)");
        warn!("Responses can be intercepted or forged; use only for testing");
    }
    info!(
        base_url = %settings.base_url,
        workers = settings.workers,
        batch_size = settings.batch_size,
        "Configuration resolved"
    );

    tokio::select! {
        result = run(&args, &settings) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, no output written");
            std::process::exit(EXIT_INTERRUPTED);
        }
    }
}

async fn run(args: &Args, settings: &FetchSettings) -> Result<()> {
    let harvester = Harvester::from_settings(settings).context("Failed to build HTTP client")?;

    let mode = harvester.probe().await.context("Connectivity check failed")?;
    info!(?mode, "Data source selected");

    let scope = if args.all_direct {
        Scope::All
    } else {
        Scope::View(settings.view.clone())
    };
    let records = harvester.collect(&scope).await.context("Collection failed")?;

    if args.show_stats {
        println!("{}", harvester.stats());
    }

    if records.is_empty() {
        bail!("No weakness records collected");
    }

    let document = WeaknessDocument::new(records);
    let bytes = write_json_atomic(&document, &args.output, true)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!(
        output = %args.output.display(),
        records = document.len(),
        "✓ Wrote {} records ({:.1} KiB)",
        document.len(),
        bytes as f64 / 1024.0
    );

    if let Some(graph_path) = &args.graph {
        let graph = assemble(&document.weaknesses);
        let summary = write_graph(&graph, graph_path, WriteMode::Merge, false)
            .with_context(|| format!("Failed to write {}", graph_path.display()))?;
        info!(
            output = %graph_path.display(),
            entries = summary.total,
            replaced = summary.replaced,
            "✓ Wrote graph"
        );
    }

    Ok(())
}
