//! # vocal - headless pitch correction driver
//!
//! Runs the detection loop against the default microphone (or a synthetic
//! tone) and prints the detected note and correction ratio every tick.
//!
//! ## Architecture
//! - **Main Thread**: owns the detection loop and the interval ticker
//! - **Command Thread**: reads `key`, `amount` and `stop` lines from stdin
//! - **Communication**: the core's `LoopHandle`, applied at the next tick

mod cli;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::io::BufRead;
use std::thread;

use cli::Cli;
use vocal_core::presets::{preset_or_default, PRESETS};
use vocal_core::{
    DetectionLoop, DetectionSnapshot, EngineConfig, IntervalTicker, LoopHandle, MicrophoneSource,
    ToneSource,
};

/// Amplitude of the synthetic tone source.
const TONE_AMPLITUDE: f32 = 0.5;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.list_presets {
        for preset in PRESETS.iter() {
            println!("{}", output::preset_line(preset, cli.json)?);
        }
        return Ok(());
    }

    let config = build_config(&cli)?;
    info!(
        "Correcting toward {} at {}%",
        config.correction.key, config.correction.amount_percent
    );

    let mut detector = DetectionLoop::from_config(&config);
    detector.add_listener(output::printer(cli.json));
    if let Some(limit) = cli.ticks {
        detector.add_listener(stop_after(limit, detector.handle()));
    }
    spawn_command_reader(detector.handle());

    let window = config.estimator.window_size;
    match cli.tone {
        Some(frequency) => {
            info!("Analysing a synthetic {} Hz tone", frequency);
            detector.start(ToneSource::new(
                frequency,
                TONE_AMPLITUDE,
                vocal_core::audio::TARGET_SAMPLE_RATE,
                window,
            ));
        }
        None => {
            let source = MicrophoneSource::open(window).context("Failed to start audio capture")?;
            detector.start(source);
        }
    }

    let mut ticker = IntervalTicker::new(config.tick_interval());
    detector.run(&mut ticker);
    info!("Finished after {} ticks", detector.tick_count());
    Ok(())
}

/// Layers the config file, preset and explicit flags, in that order.
fn build_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    if let Some(id) = &cli.preset {
        let preset = preset_or_default(id);
        info!("Using preset {}", preset.name);
        config.correction.key = preset.key.root.name().to_string();
        config.correction.amount_percent = preset.amount_percent;
    }
    if let Some(key) = &cli.key {
        config.correction.key = key.clone();
    }
    if let Some(amount) = cli.amount {
        config.correction.amount_percent = amount;
    }
    if let Some(ms) = cli.interval_ms {
        config.detection.tick_interval_ms = ms;
    }
    if let Some(rule) = cli.peak_rule {
        config.estimator.peak_rule = rule.into();
    }

    config.validate()?;
    Ok(config)
}

/// Listener that stops the loop once `limit` snapshots have been published.
fn stop_after(limit: u64, handle: LoopHandle) -> impl FnMut(&DetectionSnapshot) {
    let mut seen = 0;
    move |_: &DetectionSnapshot| {
        seen += 1;
        if seen >= limit {
            handle.stop();
        }
    }
}

/// Reads commands from stdin on a helper thread until EOF.
fn spawn_command_reader(handle: LoopHandle) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match commands::parse_command(&line) {
                Ok(command) => commands::apply(command, &handle),
                Err(e) => warn!("{}", e),
            }
        }
    });
}
