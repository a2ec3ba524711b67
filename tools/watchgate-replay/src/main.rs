//! Replays recorded visitor traces through a watchgate engine and prints
//! the resulting timeline.
//!
//! ```bash
//! watchgate-replay visit.csv --threshold 75 --until 120000
//! watchgate-replay visit.csv --engine countdown --json
//! ```

mod replay;
mod trace;

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use watchgate::config::{EngineStrategy, GateConfig};
use watchgate::engine::{EngagementSnapshot, Signal};
use watchgate::gate::{GateView, format_remaining};
use watchgate::playback::PlaybackSignal;

use crate::replay::{Outcome, Step};

#[derive(Parser, Debug)]
#[command(name = "watchgate-replay")]
#[command(about = "Replay a visitor trace through the unlock gate")]
struct Args {
    /// CSV trace (`t_ms,event,value`)
    trace: PathBuf,

    /// JSON configuration file; WATCHGATE_* environment variables are
    /// applied on top
    #[arg(long)]
    config: Option<PathBuf>,

    /// Required watch time in seconds
    #[arg(long)]
    threshold: Option<f64>,

    /// Measuring strategy: watch-time or countdown
    #[arg(long)]
    engine: Option<EngineStrategy>,

    /// Sample interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Keep sampling until this many milliseconds after mount
    #[arg(long)]
    until: Option<u64>,

    /// Print the final state as JSON instead of a timeline
    #[arg(long)]
    json: bool,
}

fn load_config(args: &Args) -> Result<GateConfig> {
    let mut config = GateConfig::load(args.config.as_deref())?;

    if let Some(threshold) = args.threshold {
        config.required_threshold_secs = threshold;
    }
    if let Some(engine) = args.engine {
        config.engine = engine;
    }
    if let Some(tick_ms) = args.tick_ms {
        config.tick_interval_ms = tick_ms;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    watchgate::tracing::init();
    let args = Args::parse();

    let config = load_config(&args).context("invalid configuration")?;
    let file = File::open(&args.trace)
        .with_context(|| format!("opening {}", args.trace.display()))?;
    let rows = trace::read(file).with_context(|| format!("reading {}", args.trace.display()))?;

    let outcome = replay::replay(&config, &rows, args.until)?;

    if args.json {
        let report = serde_json::json!({
            "snapshot": outcome.snapshot,
            "view": GateView::from_snapshot(&outcome.snapshot),
            "unlocked_at_ms": outcome.unlocked_at_ms,
            "end_ms": outcome.end_ms,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_timeline(&config, &outcome);
    }

    Ok(())
}

fn print_timeline(config: &GateConfig, outcome: &Outcome) {
    println!(
        "{} {} engine, threshold {} s, tick {} ms",
        "watchgate".bold(),
        config.engine,
        config.required_threshold_secs,
        config.tick_interval_ms
    );

    for step in &outcome.steps {
        print_step(step);
    }

    println!();
    match outcome.unlocked_at_ms {
        Some(at_ms) => println!(
            "{} at {}",
            "UNLOCKED".green().bold(),
            format_time(at_ms)
        ),
        None => println!(
            "{} at {}, {} remaining",
            "LOCKED".red().bold(),
            format_time(outcome.end_ms),
            format_remaining(outcome.snapshot.remaining_secs())
        ),
    }
}

fn print_step(step: &Step) {
    let event = format!("{:?}", step.event).to_lowercase();
    let signals = if step.signals.is_empty() {
        "(ignored)".dimmed().to_string()
    } else {
        step.signals
            .iter()
            .map(describe_signal)
            .collect::<Vec<_>>()
            .join(", ")
    };

    println!(
        "[{}] {:<6} {:<28} {}",
        format_time(step.at_ms).cyan(),
        event,
        signals,
        describe_snapshot(&step.snapshot)
    );
}

fn describe_signal(signal: &Signal) -> String {
    match signal {
        Signal::Playback(PlaybackSignal::Started) => "started".green().to_string(),
        Signal::Playback(PlaybackSignal::Stopped) => "stopped".yellow().to_string(),
        Signal::Playback(PlaybackSignal::Progress(quartile)) => {
            format!("progress {quartile}%").blue().to_string()
        }
        Signal::Visibility(visibility) => visibility.to_string().magenta().to_string(),
    }
}

fn describe_snapshot(snapshot: &EngagementSnapshot) -> String {
    let elapsed = format!(
        "{:>7.2}/{} s",
        snapshot.elapsed_secs, snapshot.threshold_secs
    );
    if snapshot.unlocked() {
        format!("{} {}", elapsed, "unlocked".green())
    } else {
        format!(
            "{} {} ({})",
            elapsed,
            format_remaining(snapshot.remaining_secs()),
            snapshot.phase
        )
    }
}

fn format_time(ms: u64) -> String {
    format!("{:>4}.{:03}s", ms / 1000, ms % 1000)
}
