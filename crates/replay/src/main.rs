//! DMS Replay - Main Entry Point

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

use clap::Parser;
use dms::{DmsConfig, DmsModule};
use replay::{init_logging, replay};
use tracing::info;

/// Replay a recorded landmark stream through the drowsiness pipeline
#[derive(Debug, Parser)]
#[command(name = "dms-replay", version, about)]
struct Args {
    /// JSON-lines frame file (stdin when omitted)
    input: Option<PathBuf>,

    /// Configuration file (TOML, JSON or YAML); `DMS__*` env vars override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.json_logs);

    info!("=== DMS Replay v{} ===", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            DmsConfig::load(path)?
        }
        None => DmsConfig::default(),
    };
    let mut module = DmsModule::new(config)?;

    let stdout = io::stdout();
    let output = BufWriter::new(stdout.lock());

    match &args.input {
        Some(path) => {
            info!("Replaying {}", path.display());
            replay(&mut module, BufReader::new(File::open(path)?), output)?;
        }
        None => {
            info!("Replaying from stdin");
            replay(&mut module, io::stdin().lock(), output)?;
        }
    }

    Ok(())
}
