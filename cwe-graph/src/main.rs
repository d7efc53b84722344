//! cwe-graph - assemble collected weakness records into the linked graph
//!
//! Reads the `{"Weaknesses": [...]}` document written by `cwe-fetch` and
//! writes one entry per identifier with symmetric relationship sets.

use anyhow::{Context, Result};
use clap::Parser;
use cwe_common::logging::init_tracing;
use cwe_graph::output::load_document;
use cwe_graph::{write_graph, GraphAssembler, WriteMode};
use std::path::PathBuf;
use tracing::{info, warn};

/// Command-line arguments for cwe-graph
#[derive(Parser, Debug)]
#[command(name = "cwe-graph")]
#[command(about = "Assemble CWE records into a bidirectionally linked graph")]
#[command(version)]
struct Args {
    /// Collected records (`{"Weaknesses": [...]}`)
    input: PathBuf,

    /// Graph artifact to write
    #[arg(short, long, default_value = "shared/cwes.json")]
    output: PathBuf,

    /// Replace the output file instead of merging into it
    #[arg(long)]
    overwrite: bool,

    /// Indent the output JSON
    #[arg(long)]
    pretty: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose, "info");

    info!(
        "Starting cwe-graph v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if args.input.extension().and_then(|e| e.to_str()) != Some("json") {
        warn!(input = %args.input.display(), "Input file does not have a .json extension");
    }

    let document = load_document(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;
    info!(records = document.len(), input = %args.input.display(), "Loaded records");

    let mut assembler = GraphAssembler::new();
    assembler.ingest_all(&document.weaknesses);
    let stats = assembler.stats();
    info!(
        processed = stats.processed,
        skipped = stats.skipped,
        entries = stats.entries,
        "Assembled graph"
    );

    let mode = if args.overwrite {
        WriteMode::Overwrite
    } else {
        WriteMode::Merge
    };
    let summary = write_graph(assembler.entries(), &args.output, mode, args.pretty)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(
        output = %args.output.display(),
        existing = summary.existing,
        new = summary.new,
        replaced = summary.replaced,
        total = summary.total,
        "✓ Wrote {} entries ({:.1} KiB)",
        summary.total,
        summary.bytes as f64 / 1024.0
    );

    Ok(())
}
