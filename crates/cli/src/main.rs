use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use strata_layout::{
    CancellationToken, ImportanceProvider, LayoutResult, MetadataImportance, compute_layout,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod input;

#[derive(Parser, Debug)]
#[command(name = "strata", version, about = "Layered force-directed graph layout")]
struct Args {
    /// Graph JSON file, or '-' for stdin
    graph: PathBuf,

    /// Layout constraints JSON file; missing keys use defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON object of node id to importance in [0, 1]. Defaults to the
    /// `importance` key of each node's metadata.
    #[arg(short, long)]
    importance: Option<PathBuf>,

    /// Overrides the random seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Overrides the importance provider timeout, in seconds
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Output file. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let graph = input::load_graph(&args.graph)?;
    let mut constraints = input::load_constraints(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        constraints.random_seed = seed;
    }
    if let Some(timeout) = args.timeout {
        constraints.oracle_timeout_secs = timeout;
    }
    let provider: Box<dyn ImportanceProvider> = match &args.importance {
        Some(path) => Box::new(input::load_weights(path)?),
        None => Box::new(MetadataImportance::default()),
    };

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, returning partial layout");
            on_interrupt.cancel();
        }
    });

    let result = compute_layout(&graph, &constraints, provider.as_ref(), Some(&token)).await?;
    info!(
        nodes = result.positions.len(),
        edges = result.edge_paths.len(),
        "writing layout"
    );
    write_result(&result, args.output.as_deref(), args.pretty)
}

fn write_result(result: &LayoutResult, output: Option<&Path>, pretty: bool) -> Result<()> {
    let mut json = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    json.push('\n');
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display())),
        None => io::stdout()
            .write_all(json.as_bytes())
            .context("failed to write layout to stdout"),
    }
}
