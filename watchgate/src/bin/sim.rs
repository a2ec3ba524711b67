//! Interactive simulator for one gated page view.
//!
//! Reads visitor actions from stdin, one per line, and drives a live gate
//! session with them. Configured from the environment; see
//! `GateConfig::from_env`.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use watchgate::config::GateConfig;
use watchgate::engine;
use watchgate::navigation::{ContinueAction, LogNavigator, NavigationCoordinator};
use watchgate::playback::{NativeEvent, PlaybackSignalAdapter};
use watchgate::reporting::{ReportSink, TracingSink};
use watchgate::session::{GateHandle, GateSession};
use watchgate::tracing::prelude::*;
use watchgate::visibility::{Visibility, VisibilityMonitor};

fn print_usage() {
    eprintln!("Commands:");
    eprintln!("  click                  Press play on the poster");
    eprintln!("  play | pause | end     Player events");
    eprintln!("  seek <percent>         Move the playhead");
    eprintln!("  hide | show            Page visibility");
    eprintln!("  continue [action]      header_button (default) or primary_cta");
    eprintln!("  back                   Go back to video");
    eprintln!("  status                 Print gate state");
    eprintln!("  quit");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  WATCHGATE_THRESHOLD_SECS         Required watch time (default: 120)");
    eprintln!("  WATCHGATE_ENGINE                 watch-time or countdown (default: watch-time)");
    eprintln!("  WATCHGATE_TICK_MS                Sample interval (default: 250)");
    eprintln!("  WATCHGATE_MAX_SAMPLE_DELTA_SECS  Per-sample credit cap (default: 2.0)");
}

struct Page {
    adapter: PlaybackSignalAdapter,
    monitor: &'static VisibilityMonitor,
    gate: GateHandle,
    navigation: NavigationCoordinator,
}

impl Page {
    /// Handle one command. Returns `false` to quit.
    fn dispatch(&self, line: &str) -> Result<bool> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(true);
        };

        match command {
            "click" => {
                self.adapter.bind();
                self.adapter.handle(NativeEvent::Play);
            }
            "play" => {
                self.adapter.handle(NativeEvent::Play);
            }
            "pause" => {
                self.adapter.handle(NativeEvent::Pause);
            }
            "end" => {
                self.adapter.handle(NativeEvent::End);
            }
            "seek" => {
                let percent: f64 = words
                    .next()
                    .context("seek needs a percentage")?
                    .parse()
                    .context("seek percentage must be a number")?;
                self.adapter.handle(NativeEvent::SecondChange {
                    position_secs: percent,
                    duration_secs: 100.0,
                });
            }
            "hide" => {
                self.monitor.set(Visibility::Background);
            }
            "show" => {
                self.monitor.set(Visibility::Foreground);
            }
            "continue" => {
                let action = match words.next() {
                    Some(name) => name
                        .parse()
                        .with_context(|| format!("unknown action: {name}"))?,
                    None => ContinueAction::HeaderButton,
                };
                let target = self.navigation.request_continue(action);
                println!("-> #{}", target.anchor());
            }
            "back" => {
                let target = self.navigation.return_to_video();
                println!("-> #{}", target.anchor());
            }
            "status" => self.print_status(),
            "quit" | "exit" => return Ok(false),
            other => {
                eprintln!("Unknown command: {}", other);
                print_usage();
            }
        }

        Ok(true)
    }

    fn print_status(&self) {
        let snapshot = self.gate.snapshot();
        let view = self.gate.view();

        println!("Engine:    {} ({})", snapshot.strategy, snapshot.phase);
        println!(
            "Elapsed:   {:.2} / {} s",
            snapshot.elapsed_secs, snapshot.threshold_secs
        );
        println!("Playing:   {}", snapshot.is_playing);
        println!("Visible:   {}", snapshot.is_foreground);
        println!("Header:    {}", view.header_label);
        println!("CTA:       {}", view.cta_label);
        if let Some(overlay) = &view.overlay {
            println!("Overlay:   {}", overlay);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    watchgate::tracing::init();

    let config = GateConfig::from_env().context("invalid configuration")?;
    let reporter: Arc<dyn ReportSink> = Arc::new(TracingSink);

    let engine = engine::build_with_default_clock(&config).context("invalid configuration")?;
    let (mut session, gate) = GateSession::new(&config, engine, reporter.clone())?;

    let monitor = VisibilityMonitor::global();
    let adapter = PlaybackSignalAdapter::new();
    session.attach_visibility(monitor);
    session.attach_video(&adapter);

    let cancellation = CancellationToken::new();
    let task = tokio::spawn(session.run(cancellation.clone()));

    let page = Page {
        adapter,
        monitor,
        navigation: NavigationCoordinator::new(gate.clone(), Arc::new(LogNavigator), reporter),
        gate,
    };

    print_usage();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match page.dispatch(&line) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => eprintln!("error: {:#}", e),
                }
            }
        }
    }

    cancellation.cancel();
    task.await?;
    Ok(())
}
