//! # Engine Configuration
//!
//! Every field has a default, so a config file only needs the values it
//! changes. Files are JSON.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::audio::BUFFER_SIZE;
use crate::correction::CorrectionState;
use crate::gate::{FrameGate, DEFAULT_RMS_THRESHOLD};
use crate::pitch::{
    PeakRule, PitchEstimator, DEFAULT_MAX_FREQUENCY, DEFAULT_MIN_FREQUENCY, DEFAULT_TRIM_THRESHOLD,
};
use crate::scale::Key;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub gate: GateConfig,
    pub estimator: EstimatorConfig,
    pub correction: CorrectionConfig,
    #[serde(rename = "loop")]
    pub detection: LoopConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Frames with RMS below this are treated as silence.
    pub rms_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Samples per analysis window. Cost grows with its square.
    pub window_size: usize,
    pub trim_threshold: f32,
    pub min_frequency: f32,
    pub max_frequency: f32,
    pub peak_rule: PeakRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Root of the target major key, e.g. "C", "F#", "Bb".
    pub key: String,
    /// 0 disables correction, 100 snaps fully.
    pub amount_percent: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Period of the detection ticker. 16 ms is roughly one display frame.
    pub tick_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gate: GateConfig::default(),
            estimator: EstimatorConfig::default(),
            correction: CorrectionConfig::default(),
            detection: LoopConfig::default(),
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            rms_threshold: DEFAULT_RMS_THRESHOLD,
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            window_size: BUFFER_SIZE,
            trim_threshold: DEFAULT_TRIM_THRESHOLD,
            min_frequency: DEFAULT_MIN_FREQUENCY,
            max_frequency: DEFAULT_MAX_FREQUENCY,
            peak_rule: PeakRule::default(),
        }
    }
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            key: "C".into(),
            amount_percent: 0.0,
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 16,
        }
    }
}

impl EngineConfig {
    /// Loads and validates a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(data).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let est = &self.estimator;
        if est.window_size < 3 {
            bail!("estimator.window_size must be at least 3, got {}", est.window_size);
        }
        if !(est.min_frequency > 0.0 && est.min_frequency < est.max_frequency) {
            bail!(
                "estimator frequency band [{}, {}] is empty or non-positive",
                est.min_frequency,
                est.max_frequency
            );
        }
        if !(self.gate.rms_threshold >= 0.0) {
            bail!("gate.rms_threshold must be non-negative");
        }
        if self.detection.tick_interval_ms == 0 {
            bail!("loop.tick_interval_ms must be positive");
        }
        Ok(())
    }

    pub fn build_estimator(&self) -> PitchEstimator {
        let est = &self.estimator;
        PitchEstimator::new(
            FrameGate::new(self.gate.rms_threshold),
            est.trim_threshold,
            est.min_frequency,
            est.max_frequency,
            est.peak_rule,
        )
    }

    /// Initial correction state; unknown key names fall back to C.
    pub fn correction_state(&self) -> CorrectionState {
        CorrectionState::new(
            Key::from_name(&self.correction.key),
            self.correction.amount_percent,
        )
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.detection.tick_interval_ms)
    }
}
