//! # Musical Tuning Module
//!
//! Equal-temperament note arithmetic shared by the display path and the
//! key quantizer.
//!
//! ## Features
//! - The 12 chromatic pitch classes and their spellings
//! - Frequency to note name and octave (A4 = 440 Hz)
//! - Frequency to continuous MIDI-style note number and back
//! - Cent deviation measurements

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reference pitch for A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;
/// MIDI-style note number of A4.
pub const A4_MIDI: f32 = 69.0;

/// Chromatic names starting at C, sharp spellings.
const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// One of the 12 chromatic pitch classes, numbered by semitones above C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitone offset from C (C = 0 … B = 11).
    pub fn semitone(self) -> u8 {
        self as u8
    }

    /// Pitch class for any semitone count, wrapping modulo 12.
    pub fn from_semitone(semitone: i32) -> Self {
        Self::ALL[semitone.rem_euclid(12) as usize]
    }

    pub fn name(self) -> &'static str {
        NOTE_NAMES[self as usize]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Error returned when a pitch-class spelling is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized pitch class `{0}`")]
pub struct ParseKeyError(pub String);

/// Accepted spellings. Sharps and flats of the same class share an offset.
static PITCH_CLASS_NAMES: Lazy<BTreeMap<&'static str, PitchClass>> = Lazy::new(|| {
    use PitchClass::*;
    BTreeMap::from([
        ("C", C),
        ("C#", CSharp),
        ("Db", CSharp),
        ("D", D),
        ("D#", DSharp),
        ("Eb", DSharp),
        ("E", E),
        ("F", F),
        ("F#", FSharp),
        ("Gb", FSharp),
        ("G", G),
        ("G#", GSharp),
        ("Ab", GSharp),
        ("A", A),
        ("A#", ASharp),
        ("Bb", ASharp),
        ("B", B),
    ])
});

impl FromStr for PitchClass {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PITCH_CLASS_NAMES
            .get(s.trim())
            .copied()
            .ok_or_else(|| ParseKeyError(s.to_string()))
    }
}

/// A note: pitch class plus scientific-pitch octave (middle C is C4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    pub pitch_class: PitchClass,
    pub octave: i32,
}

impl Note {
    pub fn name(&self) -> &'static str {
        self.pitch_class.name()
    }

    /// Equal-tempered frequency of this note.
    pub fn frequency(&self) -> f32 {
        let midi = (self.octave + 1) * 12 + self.pitch_class.semitone() as i32;
        midi_to_frequency(midi as f32)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

/// Frequency of C0, 57 semitones below A4.
pub fn c0_frequency() -> f32 {
    A4_FREQUENCY * 2.0_f32.powf(-4.75)
}

/// Maps a frequency to the nearest equal-tempered note.
///
/// Any positive frequency maps to a note; frequencies below C0 get
/// negative octaves.
///
/// # Arguments
/// * `frequency` - Frequency in Hz
///
/// # Returns
/// * `Note` - Nearest pitch class and its octave
pub fn to_note(frequency: f32) -> Note {
    let half_steps = (12.0 * (frequency / c0_frequency()).log2()).round() as i32;
    Note {
        pitch_class: PitchClass::from_semitone(half_steps),
        octave: half_steps.div_euclid(12),
    }
}

/// Continuous note number where 69 is A4 and one unit is a semitone.
pub fn frequency_to_midi(frequency: f32) -> f32 {
    12.0 * (frequency / A4_FREQUENCY).log2() + A4_MIDI
}

pub fn midi_to_frequency(midi: f32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((midi - A4_MIDI) / 12.0)
}

/// Calculates the deviation from a target frequency in cents.
///
/// 100 cents make a semitone; positive values are sharp, negative flat.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
