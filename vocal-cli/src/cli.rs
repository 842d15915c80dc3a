use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use vocal_core::PeakRule;

#[derive(Parser, Debug)]
#[command(name = "vocal")]
#[command(about = "Real-time pitch detection and key correction for a single voice")]
pub struct Cli {
    /// JSON engine config; missing fields use defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Correction preset id (see --list-presets)
    #[arg(long)]
    pub preset: Option<String>,

    /// Root of the target major key, e.g. C, F#, Bb
    #[arg(long)]
    pub key: Option<String>,

    /// Correction amount in percent (0-100)
    #[arg(long)]
    pub amount: Option<f32>,

    /// Analyse a synthetic sine at this frequency instead of the microphone
    #[arg(long, value_name = "HZ")]
    pub tone: Option<f32>,

    /// Stop after this many ticks
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Ticker period in milliseconds
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Peak picking rule for the estimator
    #[arg(long, value_enum)]
    pub peak_rule: Option<PeakRuleArg>,

    /// Print JSON objects, one per tick or per listed preset
    #[arg(long)]
    pub json: bool,

    /// List the built-in correction presets and exit
    #[arg(long)]
    pub list_presets: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PeakRuleArg {
    KeyMaximum,
    SecondPeak,
}

impl From<PeakRuleArg> for PeakRule {
    fn from(arg: PeakRuleArg) -> Self {
        match arg {
            PeakRuleArg::KeyMaximum => PeakRule::KeyMaximum,
            PeakRuleArg::SecondPeak => PeakRule::SecondPeak,
        }
    }
}
