//! # Pitch Detection Module
//!
//! This module implements the autocorrelation pitch estimator used by the
//! detection loop. It works on a single monophonic frame and answers with a
//! fundamental frequency, or `None` when the frame is silent, aperiodic or
//! outside the vocal band.
//!
//! ## Pipeline
//! - RMS gate to reject silence
//! - Edge trimming around low-amplitude samples
//! - Unnormalized time-domain autocorrelation (O(n²))
//! - Peak picking on the correlation curve
//! - Band check on the resulting frequency

use log::trace;
use serde::{Deserialize, Serialize};

use crate::gate::FrameGate;

/// Samples quieter than this mark the edges of the analysis window.
pub const DEFAULT_TRIM_THRESHOLD: f32 = 0.2;
/// Lowest frequency the estimator will report, in Hz.
pub const DEFAULT_MIN_FREQUENCY: f32 = 60.0;
/// Highest frequency the estimator will report, in Hz.
pub const DEFAULT_MAX_FREQUENCY: f32 = 1200.0;

const PEAK_RATIO: f32 = 0.9;

/// How a period lag is chosen among the local maxima of the correlation curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakRule {
    /// Accept the first local maximum reaching 90% of the highest one.
    #[default]
    KeyMaximum,
    /// Skip the first local maximum and accept the next positive one.
    ///
    /// The reference rule and compatibility baseline: the running maximum
    /// it compares against is never raised, so any positive peak after the
    /// first qualifies. On clean tones this lands on twice the period and
    /// reports one octave low, which is why it is not the default.
    SecondPeak,
}

/// Autocorrelation pitch estimator.
///
/// Owns a scratch buffer for the correlation curve so repeated calls on
/// same-sized frames do not allocate.
#[derive(Debug, Clone)]
pub struct PitchEstimator {
    gate: FrameGate,
    trim_threshold: f32,
    min_frequency: f32,
    max_frequency: f32,
    peak_rule: PeakRule,
    correlations: Vec<f32>,
}

impl Default for PitchEstimator {
    fn default() -> Self {
        Self {
            gate: FrameGate::default(),
            trim_threshold: DEFAULT_TRIM_THRESHOLD,
            min_frequency: DEFAULT_MIN_FREQUENCY,
            max_frequency: DEFAULT_MAX_FREQUENCY,
            peak_rule: PeakRule::default(),
            correlations: Vec::new(),
        }
    }
}

impl PitchEstimator {
    pub fn new(
        gate: FrameGate,
        trim_threshold: f32,
        min_frequency: f32,
        max_frequency: f32,
        peak_rule: PeakRule,
    ) -> Self {
        Self {
            gate,
            trim_threshold,
            min_frequency,
            max_frequency,
            peak_rule,
            correlations: Vec::new(),
        }
    }

    pub fn with_peak_rule(mut self, peak_rule: PeakRule) -> Self {
        self.peak_rule = peak_rule;
        self
    }

    pub fn peak_rule(&self) -> PeakRule {
        self.peak_rule
    }

    /// Estimates the fundamental frequency of a monophonic frame.
    ///
    /// # Arguments
    /// * `samples` - Normalized samples in [-1, 1]
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Returns
    /// * `Some(frequency)` - Detected frequency in Hz, inside the configured band
    /// * `None` - Silence, no usable periodicity, or an out-of-band result
    pub fn estimate(&mut self, samples: &[f32], sample_rate: u32) -> Option<f32> {
        if !self.gate.is_voiced(samples) {
            return None;
        }

        let (start, end) = trim_bounds(samples, self.trim_threshold);
        if end <= start {
            return None;
        }
        let window = &samples[start..end];

        autocorrelate(window, &mut self.correlations);
        let lag = pick_period_lag(&self.correlations, self.peak_rule)?;

        let frequency = sample_rate as f32 / lag as f32;
        if frequency < self.min_frequency || frequency > self.max_frequency {
            trace!("Rejecting out-of-band estimate {:.1} Hz (lag {})", frequency, lag);
            return None;
        }
        Some(frequency)
    }
}

/// Finds the analysis window `[start, end)` inside a frame.
///
/// `start` is the first index in the first half whose magnitude is below
/// `threshold` (0 if there is none). `end` is the last such index in the
/// second half, scanning back from the final sample (`len - 1` if there is
/// none). The end index itself is excluded from the window.
pub fn trim_bounds(samples: &[f32], threshold: f32) -> (usize, usize) {
    let len = samples.len();
    if len == 0 {
        return (0, 0);
    }
    let half = len.div_ceil(2);

    let start = (0..half)
        .find(|&i| samples[i].abs() < threshold)
        .unwrap_or(0);
    let end = (1..half)
        .map(|i| len - i)
        .find(|&i| samples[i].abs() < threshold)
        .unwrap_or(len - 1);

    (start, end)
}

/// Fills `out` with `C[lag] = Σ x[i]·x[i+lag]` for every lag in `[0, len)`.
pub fn autocorrelate(window: &[f32], out: &mut Vec<f32>) {
    let size = window.len();
    out.clear();
    out.extend((0..size).map(|lag| {
        window[..size - lag]
            .iter()
            .zip(&window[lag..])
            .map(|(a, b)| a * b)
            .sum::<f32>()
    }));
}

fn is_local_peak(correlations: &[f32], lag: usize) -> bool {
    correlations[lag] > correlations[lag - 1] && correlations[lag] > correlations[lag + 1]
}

/// Chooses the period lag from a correlation curve, or `None` if no local
/// maximum qualifies. Lag 0 and the final lag are never candidates.
pub fn pick_period_lag(correlations: &[f32], rule: PeakRule) -> Option<usize> {
    let size = correlations.len();
    if size < 3 {
        return None;
    }
    let candidates = (1..size - 1).filter(|&lag| is_local_peak(correlations, lag));

    match rule {
        PeakRule::KeyMaximum => {
            let max = candidates
                .clone()
                .map(|lag| correlations[lag])
                .fold(f32::NEG_INFINITY, f32::max);
            if max <= 0.0 {
                return None;
            }
            candidates
                .into_iter()
                .find(|&lag| correlations[lag] >= max * PEAK_RATIO)
        }
        PeakRule::SecondPeak => {
            // The running maximum is only written when a peak is accepted,
            // so every comparison here is against 0.9 × 0.
            let current_max = 0.0_f32;
            candidates
                .skip(1)
                .find(|&lag| correlations[lag] > current_max * PEAK_RATIO)
        }
    }
}
