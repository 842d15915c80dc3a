//! Per-tick console output.

use log::error;
use vocal_core::presets::CorrectionPreset;
use vocal_core::DetectionSnapshot;

/// Human-readable line for one snapshot.
pub fn format_line(snapshot: &DetectionSnapshot) -> String {
    match (snapshot.detected_frequency, snapshot.note) {
        (Some(frequency), Some(note)) => {
            let cents = snapshot.cents_deviation.unwrap_or(0.0);
            let target = snapshot
                .target_frequency
                .map(|t| format!("{:7.1} Hz", t))
                .unwrap_or_else(|| "      --".to_string());
            format!(
                "tick {:>6}  {:<4} {:7.1} Hz {:+6.1} ct  -> {}  ratio {:.4}",
                snapshot.tick,
                note.to_string(),
                frequency,
                cents,
                target,
                snapshot.shift_ratio
            )
        }
        _ => format!("tick {:>6}  --   no pitch  ratio {:.4}", snapshot.tick, snapshot.shift_ratio),
    }
}

/// One `--list-presets` row, as aligned text or a JSON object.
pub fn preset_line(preset: &CorrectionPreset, json: bool) -> serde_json::Result<String> {
    if json {
        serde_json::to_string(preset)
    } else {
        Ok(format!(
            "{:<16} {:<16} {:<3} {:>3}%",
            preset.id, preset.name, preset.key.root, preset.amount_percent
        ))
    }
}

/// Listener that prints each snapshot to stdout.
pub fn printer(json: bool) -> impl FnMut(&DetectionSnapshot) {
    move |snapshot: &DetectionSnapshot| {
        if json {
            match serde_json::to_string(snapshot) {
                Ok(line) => println!("{}", line),
                Err(e) => error!("Failed to serialize snapshot: {}", e),
            }
        } else {
            println!("{}", format_line(snapshot));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vocal_core::{Note, PitchClass};

    #[test]
    fn pitched_line_shows_note_and_ratio() {
        let snapshot = DetectionSnapshot {
            tick: 7,
            detected_frequency: Some(466.2),
            note: Some(Note { pitch_class: PitchClass::ASharp, octave: 4 }),
            shift_ratio: 0.9777,
            target_frequency: Some(440.0),
            cents_deviation: Some(0.2),
        };
        let line = format_line(&snapshot);
        assert!(line.contains("A#4"));
        assert!(line.contains("466.2 Hz"));
        assert!(line.contains("ratio 0.9777"));
    }

    #[test]
    fn preset_rows() {
        let preset = vocal_core::presets::find_preset("seal").unwrap();
        let text = preset_line(preset, false).unwrap();
        assert!(text.starts_with("seal "));
        assert!(text.ends_with(" 15%"));

        let json: serde_json::Value = serde_json::from_str(&preset_line(preset, true).unwrap()).unwrap();
        assert_eq!(json["id"], "seal");
        assert_eq!(json["key"]["root"], "F");
        assert_eq!(json["amount_percent"], 15.0);
    }

    #[test]
    fn silent_line() {
        let snapshot = DetectionSnapshot {
            tick: 0,
            detected_frequency: None,
            note: None,
            shift_ratio: 1.0,
            target_frequency: None,
            cents_deviation: None,
        };
        assert!(format_line(&snapshot).contains("no pitch  ratio 1.0000"));
    }
}
