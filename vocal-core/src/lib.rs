// vocal-core/src/lib.rs

//! The core logic for the real-time vocal processor.
//! This crate is responsible for pitch detection, note mapping, key
//! quantization and the pitch-correction ratio. It is completely headless:
//! it computes numbers and leaves the actual pitch shifting to the host.

pub mod audio;
pub mod config;
pub mod correction;
pub mod detection;
pub mod gate;
pub mod pitch;
pub mod presets;
pub mod scale;
pub mod tuning;

pub use audio::{AudioFrame, FrameSource, MicrophoneSource, ToneSource};
pub use config::EngineConfig;
pub use correction::{compute_shift_ratio, CorrectionState};
pub use detection::{
    mailbox, CancellationToken, DetectionListener, DetectionLoop, IntervalTicker, LoopHandle,
    LoopState, MailboxListener, ManualTicker, Ticker,
};
pub use gate::FrameGate;
pub use pitch::{PeakRule, PitchEstimator};
pub use scale::{nearest_in_key_frequency, Key};
pub use tuning::{to_note, Note, PitchClass};

use serde::Serialize;

/// Represents the result of a single detection tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionSnapshot {
    /// Index of the tick that produced this snapshot.
    pub tick: u64,
    /// The detected fundamental in Hz, `None` for silence or no pitch.
    pub detected_frequency: Option<f32>,
    /// The nearest equal-tempered note to the detection.
    pub note: Option<Note>,
    /// Ratio for the external pitch shifter, always within [0.5, 2.0].
    pub shift_ratio: f32,
    /// The in-key frequency the correction pulls toward.
    pub target_frequency: Option<f32>,
    /// Deviation of the detection from `note`, in cents.
    pub cents_deviation: Option<f32>,
}
