//! DAT - Script Runner Entry Point
//!
//! Runs a DAT script against an in-memory workflow and prints the resulting
//! variables and pipelines as JSON.

use anyhow::Context;
use clap::Parser;
use dat_rs::{
    config::{self, DatConfig},
    host::{MemoryVistrail, ModuleRegistry},
    operations::global,
    script::ScriptRunner,
    Workspace,
};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "dat",
    version,
    about = "Build variables and plot pipelines from a DAT script"
)]
struct Cli {
    /// Script to run; reads stdin when omitted
    script: Option<PathBuf>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pretty-print the JSON report
    #[arg(short, long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DatConfig::load(path).with_context(|| format!("loading {:?}", path))?,
        None => DatConfig::load_or_default(),
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting DAT (config dir {:?})", config::config_dir());

    let (script, base_dir) = match &cli.script {
        Some(path) => (
            std::fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?,
            path.parent().map(PathBuf::from).unwrap_or_default(),
        ),
        None => {
            let mut script = String::new();
            std::io::stdin()
                .read_to_string(&mut script)
                .context("reading script from stdin")?;
            (script, std::env::current_dir()?)
        }
    };

    global::init(&config)?;
    let operations = global::seal()?;
    let registry = Arc::new(ModuleRegistry::with_basic_package(&config));
    let workspace = Workspace::new(Box::new(MemoryVistrail::new()), registry, operations, config);

    let report = ScriptRunner::new(&workspace, base_dir).run(&script)?;
    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);

    if !report.is_success() {
        tracing::info!("Shutting down with {} failed lines", report.errors.len());
        std::process::exit(1);
    }
    Ok(())
}
