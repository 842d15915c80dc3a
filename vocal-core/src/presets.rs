//! # Correction Presets
//!
//! Built-in voice presets and the correction each one applies. Only the
//! key and amount live here; the effect chain settings belong to the host.

use log::warn;
use serde::Serialize;

use crate::correction::CorrectionState;
use crate::scale::Key;
use crate::tuning::PitchClass;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrectionPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub key: Key,
    pub amount_percent: f32,
}

impl CorrectionPreset {
    const fn new(id: &'static str, name: &'static str, root: PitchClass, amount_percent: f32) -> Self {
        Self {
            id,
            name,
            key: Key { root },
            amount_percent,
        }
    }

    pub fn correction_state(&self) -> CorrectionState {
        CorrectionState::new(self.key, self.amount_percent)
    }
}

/// Used for any id not in [`PRESETS`].
pub static FALLBACK_PRESET: CorrectionPreset =
    CorrectionPreset::new("default", "Default", PitchClass::D, 30.0);

pub static PRESETS: [CorrectionPreset; 15] = [
    CorrectionPreset::new("simon-le-bon", "Simon Le Bon", PitchClass::D, 30.0),
    CorrectionPreset::new("dave-gahan", "Dave Gahan", PitchClass::A, 20.0),
    CorrectionPreset::new("chris-martin", "Chris Martin", PitchClass::G, 25.0),
    CorrectionPreset::new("mark-hollis", "Mark Hollis", PitchClass::C, 5.0),
    CorrectionPreset::new("bernard-sumner", "Bernard Sumner", PitchClass::E, 35.0),
    CorrectionPreset::new("morten-harket", "Morten Harket", PitchClass::A, 40.0),
    CorrectionPreset::new("seal", "Seal", PitchClass::F, 15.0),
    CorrectionPreset::new("freddie-mercury", "Freddie Mercury", PitchClass::C, 10.0),
    CorrectionPreset::new("adele", "Adele", PitchClass::D, 12.0),
    CorrectionPreset::new("frank-sinatra", "Frank Sinatra", PitchClass::C, 5.0),
    CorrectionPreset::new("beyonce", "Beyoncé", PitchClass::G, 45.0),
    CorrectionPreset::new("ed-sheeran", "Ed Sheeran", PitchClass::G, 20.0),
    CorrectionPreset::new("billie-eilish", "Billie Eilish", PitchClass::A, 60.0),
    CorrectionPreset::new("bruno-mars", "Bruno Mars", PitchClass::F, 35.0),
    CorrectionPreset::new("ariana-grande", "Ariana Grande", PitchClass::E, 50.0),
];

pub fn find_preset(id: &str) -> Option<&'static CorrectionPreset> {
    PRESETS.iter().find(|p| p.id == id)
}

/// Preset for `id`, or [`FALLBACK_PRESET`] with a warning.
pub fn preset_or_default(id: &str) -> &'static CorrectionPreset {
    find_preset(id).unwrap_or_else(|| {
        warn!("Unknown preset `{}`; using default correction", id);
        &FALLBACK_PRESET
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_id() {
        let preset = find_preset("morten-harket").unwrap();
        assert_eq!(preset.key, Key::new(PitchClass::A));
        assert_eq!(preset.amount_percent, 40.0);
    }

    #[test]
    fn unknown_id_uses_fallback() {
        let preset = preset_or_default("nobody");
        assert_eq!(preset.id, "default");
        assert_eq!(preset.key.root, PitchClass::D);
    }

    #[test]
    fn ids_are_unique() {
        for (i, a) in PRESETS.iter().enumerate() {
            assert!(PRESETS[i + 1..].iter().all(|b| b.id != a.id), "duplicate {}", a.id);
        }
    }

    #[test]
    fn preset_builds_state() {
        let state = find_preset("billie-eilish").unwrap().correction_state();
        assert!((state.amount_percent() - 60.0).abs() < 1e-4);
    }
}
