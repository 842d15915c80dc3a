//! # Frame Gate
//!
//! Silence gate applied before any pitch analysis. A frame whose RMS energy
//! sits below the threshold is treated as silence or noise floor and never
//! reaches the autocorrelation stage.

/// Default RMS level below which a frame is considered silent.
pub const DEFAULT_RMS_THRESHOLD: f32 = 0.01;

/// Root-mean-square energy of a frame. Returns 0.0 for an empty frame.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// RMS silence gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGate {
    threshold: f32,
}

impl Default for FrameGate {
    fn default() -> Self {
        Self::new(DEFAULT_RMS_THRESHOLD)
    }
}

impl FrameGate {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// True when the frame carries enough energy to be worth analysing.
    pub fn is_voiced(&self, samples: &[f32]) -> bool {
        !samples.is_empty() && rms(samples) >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_constant_signal() {
        let frame = [0.5_f32; 64];
        assert!((rms(&frame) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn silence_is_not_voiced() {
        let gate = FrameGate::default();
        assert!(!gate.is_voiced(&[0.0; 1024]));
        assert!(!gate.is_voiced(&[0.009; 1024]));
        assert!(!gate.is_voiced(&[]));
    }

    #[test]
    fn threshold_is_inclusive() {
        let gate = FrameGate::new(0.25);
        assert!(gate.is_voiced(&[0.25; 16]));
        assert!(gate.is_voiced(&[-0.3; 16]));
        assert!(!gate.is_voiced(&[0.2; 16]));
    }
}
