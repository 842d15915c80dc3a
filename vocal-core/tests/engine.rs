//! End-to-end checks of the detection and correction pipeline through the
//! public API.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::f32::consts::PI;
use std::rc::Rc;
use vocal_core::correction::{MAX_SHIFT_RATIO, MIN_SHIFT_RATIO};
use vocal_core::presets::find_preset;
use vocal_core::{
    compute_shift_ratio, nearest_in_key_frequency, to_note, DetectionLoop, DetectionSnapshot,
    EngineConfig, Key, LoopState, ManualTicker, PitchClass, PitchEstimator, ToneSource,
};

const SAMPLE_RATE: u32 = 44_100;

fn sine(frequency: f32, amplitude: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

#[test]
fn random_tones_are_tracked_within_two_percent() {
    let mut rng = StdRng::seed_from_u64(440);
    let mut estimator = PitchEstimator::default();
    for _ in 0..25 {
        let f = rng.gen_range(80.0..=1000.0_f32);
        let detected = estimator
            .estimate(&sine(f, 0.5, 2048), SAMPLE_RATE)
            .unwrap_or_else(|| panic!("no pitch for {f} Hz"));
        assert!((detected - f).abs() / f < 0.02, "{f} Hz detected as {detected} Hz");
    }
}

#[test]
fn quiet_noise_is_never_pitched() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut estimator = PitchEstimator::default();
    for _ in 0..10 {
        let frame: Vec<f32> = (0..1024).map(|_| rng.gen_range(-0.015..0.015)).collect();
        assert_eq!(estimator.estimate(&frame, SAMPLE_RATE), None);
    }
}

#[test]
fn note_labels() {
    assert_eq!(to_note(440.0).to_string(), "A4");
    assert_eq!(to_note(261.63).to_string(), "C4");
}

#[test]
fn e4_is_already_in_c_major() {
    let e4 = 329.63;
    let target = nearest_in_key_frequency(e4, Key::new(PitchClass::C));
    assert!((target - e4).abs() < 0.01);
}

#[test]
fn a_sharp_at_forty_percent_in_a_major() {
    let target = nearest_in_key_frequency(466.16, Key::new(PitchClass::A));
    assert!((target - 440.0).abs() < 0.01);

    let ratio = compute_shift_ratio(Some(466.16), Key::new(PitchClass::A), 40.0);
    assert!((ratio - 0.9777).abs() < 5e-4, "got {ratio}");
}

#[test]
fn ratio_bounds_hold_for_every_key_and_amount() {
    let mut rng = StdRng::seed_from_u64(1200);
    for _ in 0..5_000 {
        let detected = rng.gen_range(60.0..=1200.0_f32);
        let percent = rng.gen_range(0.0..=100.0_f32);
        for root in PitchClass::ALL {
            let ratio = compute_shift_ratio(Some(detected), Key::new(root), percent);
            assert!((MIN_SHIFT_RATIO..=MAX_SHIFT_RATIO).contains(&ratio));
        }
        for root in PitchClass::ALL {
            assert_eq!(compute_shift_ratio(Some(detected), Key::new(root), 0.0), 1.0);
        }
    }
}

#[test]
fn loop_from_config_publishes_corrections() {
    let config = EngineConfig::from_json(
        r#"{ "correction": { "key": "A", "amount_percent": 100 } }"#,
    )
    .unwrap();
    let mut detector = DetectionLoop::from_config(&config);

    let published: Rc<RefCell<Vec<DetectionSnapshot>>> = Rc::default();
    let sink = Rc::clone(&published);
    detector.add_listener(move |s: &DetectionSnapshot| sink.borrow_mut().push(*s));

    detector.start(ToneSource::new(233.08, 0.5, SAMPLE_RATE, 2048));
    detector.run(&mut ManualTicker::limited(2));
    assert_eq!(detector.state(), LoopState::Idle);

    let published = published.borrow();
    assert_eq!(published.len(), 3);
    for snapshot in published.iter() {
        // A#3 in A major snaps fully down to A3.
        let detected = snapshot.detected_frequency.expect("pitched");
        assert_eq!(snapshot.note.map(|n| n.to_string()).as_deref(), Some("A#3"));
        assert!((detected * snapshot.shift_ratio - 220.0).abs() < 0.01);
    }
}

#[test]
fn preset_settings_drive_the_loop() {
    let preset = find_preset("dave-gahan").unwrap();
    let mut detector = DetectionLoop::new(PitchEstimator::default(), preset.correction_state());
    let snapshot = detector.start(ToneSource::new(466.16, 0.5, SAMPLE_RATE, 2048)).unwrap();

    // Key A at 20%: pulled a fifth of the way toward A4.
    let detected = snapshot.detected_frequency.unwrap();
    let expected = 1.0 + (440.0 / detected - 1.0) * 0.2;
    assert!((snapshot.shift_ratio - expected).abs() < 1e-4);
}
