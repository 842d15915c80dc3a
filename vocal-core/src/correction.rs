//! # Pitch Correction
//!
//! Turns a detected frequency into the ratio an external pitch shifter
//! should apply. The ratio pulls toward the nearest in-key note, scaled by
//! the correction amount, and never leaves [`MIN_SHIFT_RATIO`,
//! `MAX_SHIFT_RATIO`].

use log::warn;

use crate::scale::{nearest_in_key_frequency, Key};

/// Lowest ratio ever handed to the shifter (one octave down).
pub const MIN_SHIFT_RATIO: f32 = 0.5;
/// Highest ratio ever handed to the shifter (one octave up).
pub const MAX_SHIFT_RATIO: f32 = 2.0;

/// Computes the blended shift ratio.
///
/// # Arguments
/// * `detected` - Detected frequency in Hz, `None` when nothing was detected
/// * `key` - Target major key
/// * `amount_percent` - Correction strength, 0 (off) to 100 (hard snap)
///
/// # Returns
/// * `1.0` when there is no detection or the amount is zero
/// * Otherwise `1 + (target/detected − 1) × amount`, clamped to [0.5, 2.0]
pub fn compute_shift_ratio(detected: Option<f32>, key: Key, amount_percent: f32) -> f32 {
    blend_shift_ratio(detected, key, amount_percent / 100.0)
}

/// Same as [`compute_shift_ratio`] with the amount as a fraction in [0, 1].
pub fn blend_shift_ratio(detected: Option<f32>, key: Key, amount: f32) -> f32 {
    let Some(detected) = detected.filter(|f| f.is_finite() && *f > 0.0) else {
        return 1.0;
    };
    if amount.is_nan() || amount <= 0.0 {
        return 1.0;
    }
    let amount = amount.min(1.0);

    let target = nearest_in_key_frequency(detected, key);
    let correction_ratio = target / detected;
    (1.0 + (correction_ratio - 1.0) * amount).clamp(MIN_SHIFT_RATIO, MAX_SHIFT_RATIO)
}

/// Correction settings and the outcome of the latest tick.
///
/// Only the detection loop writes this; everyone else reads copies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionState {
    target_key: Key,
    amount: f32,
    last_detected: Option<f32>,
    shift_ratio: f32,
}

impl Default for CorrectionState {
    fn default() -> Self {
        Self {
            target_key: Key::default(),
            amount: 0.0,
            last_detected: None,
            shift_ratio: 1.0,
        }
    }
}

impl CorrectionState {
    pub fn new(target_key: Key, amount_percent: f32) -> Self {
        let mut state = Self {
            target_key,
            ..Self::default()
        };
        state.set_amount_percent(amount_percent);
        state
    }

    pub fn target_key(&self) -> Key {
        self.target_key
    }

    /// Correction amount as a fraction in [0, 1].
    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn amount_percent(&self) -> f32 {
        self.amount * 100.0
    }

    pub fn last_detected(&self) -> Option<f32> {
        self.last_detected
    }

    pub fn shift_ratio(&self) -> f32 {
        self.shift_ratio
    }

    /// In-key frequency the current detection is being pulled toward.
    pub fn target_frequency(&self) -> Option<f32> {
        self.last_detected
            .map(|detected| nearest_in_key_frequency(detected, self.target_key))
    }

    pub fn set_key(&mut self, key: Key) {
        self.target_key = key;
        self.recompute();
    }

    /// Sets the amount in percent. Values outside [0, 100] are clamped.
    pub fn set_amount_percent(&mut self, percent: f32) {
        let clamped = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        if clamped != percent {
            warn!("Correction amount {} out of range; using {}", percent, clamped);
        }
        self.amount = clamped / 100.0;
        self.recompute();
    }

    /// Records a new detection and returns the resulting shift ratio.
    pub fn update_detection(&mut self, detected: Option<f32>) -> f32 {
        self.last_detected = detected;
        self.recompute();
        self.shift_ratio
    }

    fn recompute(&mut self) {
        self.shift_ratio = blend_shift_ratio(self.last_detected, self.target_key, self.amount);
    }
}
