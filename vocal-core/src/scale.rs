//! # Key Quantizer
//!
//! Snaps a detected frequency to the nearest note of a major key. Distances
//! are measured around the pitch-class circle; the winning note keeps the
//! octave of the detection.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tuning::{self, PitchClass};

/// Semitone offsets of the diatonic major scale, in the order they are tried.
pub const MAJOR_SCALE_DEGREES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Target key for correction. The scale is always major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub root: PitchClass,
}

impl Default for Key {
    fn default() -> Self {
        Self { root: PitchClass::C }
    }
}

impl Key {
    pub fn new(root: PitchClass) -> Self {
        Self { root }
    }

    /// Looks up a key by root name, falling back to C when the name is not
    /// recognized.
    pub fn from_name(name: &str) -> Self {
        match name.parse::<PitchClass>() {
            Ok(root) => Self { root },
            Err(e) => {
                warn!("{}; falling back to key of C", e);
                Self::default()
            }
        }
    }

    /// Pitch classes of the scale, starting at the root.
    pub fn pitch_classes(&self) -> [PitchClass; 7] {
        let offset = self.root.semitone() as i32;
        MAJOR_SCALE_DEGREES.map(|degree| PitchClass::from_semitone(offset + degree))
    }

    pub fn contains(&self, pitch_class: PitchClass) -> bool {
        self.pitch_classes().contains(&pitch_class)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} major", self.root)
    }
}

/// Shortest distance between two pitch classes around the 12-semitone circle.
fn circular_distance(a: i32, b: i32) -> i32 {
    let diff = (a - b).abs();
    diff.min(12 - diff)
}

/// Returns the frequency of the in-key note closest to `frequency`.
///
/// The detected pitch is rounded to a semitone within its octave and
/// compared against each scale degree by circular distance. On a tie the
/// earlier degree in [`MAJOR_SCALE_DEGREES`] wins. The chosen pitch class is
/// then placed in the detection's octave, so a wrap past B or C lands
/// almost an octave away from the input.
pub fn nearest_in_key_frequency(frequency: f32, key: Key) -> f32 {
    let midi = tuning::frequency_to_midi(frequency);
    let octave = (midi / 12.0).floor() as i32;
    let semitone = midi.rem_euclid(12.0).round() as i32;
    let key_offset = key.root.semitone() as i32;

    let mut min_distance = i32::MAX;
    let mut nearest_semitone = 0;
    for degree in MAJOR_SCALE_DEGREES {
        let note_in_key = (key_offset + degree) % 12;
        let distance = circular_distance(semitone, note_in_key);
        if distance < min_distance {
            min_distance = distance;
            nearest_semitone = note_in_key;
        }
    }

    let corrected_midi = octave * 12 + nearest_semitone;
    tuning::midi_to_frequency(corrected_midi as f32)
}
