//! # Capo — command line guitar tuner
//!
//! Thin consumer over `capo-core`: starts the analyzer, polls the hand-off
//! queue on its own schedule and prints one `frequency / note / hint` line
//! per estimate. Everything interesting happens in the core crate.

use anyhow::{Context, Result};
use capo_core::analyzer::{AnalyzerConfig, AudioAnalyzer};
use capo_core::queue::SharedQueue;
use capo_core::tuning;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often the queue is polled for new estimates.
const POLL_INTERVAL: Duration = Duration::from_millis(30);

#[derive(Parser, Debug)]
#[command(name = "capo", about = "Command line guitar tuner")]
struct Args {
    /// Path to a JSON analyzer configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many seconds (0 = run until interrupted)
    #[arg(long, default_value_t = 0)]
    duration: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = load_config(&args)?;
    let queue = Arc::new(SharedQueue::with_capacity(config.queue_capacity));
    let mut analyzer =
        AudioAnalyzer::new(config, Arc::clone(&queue)).context("starting audio capture")?;

    analyzer.start();
    println!("Listening... play a string.");

    let started = Instant::now();
    while args.duration == 0 || started.elapsed() < Duration::from_secs(args.duration) {
        if let Some(freq) = queue.get() {
            let (note, hint) = tuning::note_and_hint(freq);
            println!("{freq:>8.2} Hz  {:>2}  {hint}", note.name);
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    analyzer.stop();
    Ok(())
}

fn load_config(args: &Args) -> Result<AnalyzerConfig> {
    let Some(path) = &args.config else {
        return Ok(AnalyzerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: AnalyzerConfig = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config.normalized())
}
