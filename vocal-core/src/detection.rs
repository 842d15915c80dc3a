//! # Detection Loop
//!
//! Polls a frame source once per tick, runs the estimator, updates the
//! correction state and publishes a [`DetectionSnapshot`] to every listener.
//!
//! ## Threading
//! The loop itself is single-threaded: a tick runs to completion before the
//! next one is awaited. The only wait is [`Ticker::wait_for_tick`], which a
//! [`CancellationToken`] can interrupt. Other threads talk to the loop
//! through a [`LoopHandle`] (settings and stop) and read results through a
//! [`MailboxListener`].

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::FrameSource;
use crate::config::EngineConfig;
use crate::correction::CorrectionState;
use crate::pitch::PitchEstimator;
use crate::scale::Key;
use crate::tuning;
use crate::DetectionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopState {
    /// No source attached, no ticks.
    Idle,
    /// One estimation per tick.
    Sampling,
}

/// Receives one snapshot per tick, on the loop's thread.
pub trait DetectionListener {
    fn on_detection(&mut self, snapshot: &DetectionSnapshot);
}

impl<F> DetectionListener for F
where
    F: FnMut(&DetectionSnapshot),
{
    fn on_detection(&mut self, snapshot: &DetectionSnapshot) {
        self(snapshot)
    }
}

/// Cancels a pending wait for the next tick.
///
/// Clones share state. Cancelling also wakes any ticker blocked on
/// [`CancellationToken::wake_receiver`].
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

#[derive(Debug)]
struct TokenInner {
    cancelled: AtomicBool,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                wake_tx,
                wake_rx,
            }),
        }
    }

    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            let _ = self.inner.wake_tx.try_send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Receives a message when the token is cancelled. For use in `select!`.
    pub fn wake_receiver(&self) -> &Receiver<()> {
        &self.inner.wake_rx
    }

    fn reset(&self) {
        while self.inner.wake_rx.try_recv().is_ok() {}
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }
}

/// A periodic clock the loop waits on between ticks.
pub trait Ticker {
    /// Blocks until the next tick is due.
    ///
    /// Returns `false` without waiting further once `cancel` fires, or when
    /// the ticker has no more ticks to give.
    fn wait_for_tick(&mut self, cancel: &CancellationToken) -> bool;
}

/// Fires at a fixed period.
pub struct IntervalTicker {
    ticks: Receiver<Instant>,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            ticks: crossbeam_channel::tick(period),
        }
    }
}

impl Ticker for IntervalTicker {
    fn wait_for_tick(&mut self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        crossbeam_channel::select! {
            recv(self.ticks) -> _ => !cancel.is_cancelled(),
            recv(cancel.wake_receiver()) -> _ => false,
        }
    }
}

/// Fires immediately, optionally a limited number of times.
#[derive(Debug, Clone, Default)]
pub struct ManualTicker {
    remaining: Option<u64>,
}

impl ManualTicker {
    pub fn unlimited() -> Self {
        Self { remaining: None }
    }

    pub fn limited(ticks: u64) -> Self {
        Self {
            remaining: Some(ticks),
        }
    }
}

impl Ticker for ManualTicker {
    fn wait_for_tick(&mut self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        match &mut self.remaining {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Control {
    SetKey(Key),
    SetAmount(f32),
}

/// Cross-thread access to a running loop.
///
/// Settings take effect at the start of the next tick. `stop` cancels the
/// pending tick; a tick already in progress finishes first.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    controls: Sender<Control>,
    cancel: CancellationToken,
}

impl LoopHandle {
    pub fn set_key(&self, key: Key) {
        self.send(Control::SetKey(key));
    }

    /// Sets the key by root name; unknown names select C.
    pub fn set_key_name(&self, name: &str) {
        self.set_key(Key::from_name(name));
    }

    pub fn set_amount(&self, percent: f32) {
        self.send(Control::SetAmount(percent));
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn send(&self, control: Control) {
        if self.controls.send(control).is_err() {
            debug!("Detection loop is gone; dropping {:?}", control);
        }
    }
}

/// Single-slot mailbox for readers on another thread.
///
/// Holds at most one snapshot; a newer one replaces an unread one.
pub struct MailboxListener {
    tx: Sender<DetectionSnapshot>,
    rx: Receiver<DetectionSnapshot>,
}

/// Creates a mailbox listener and the receiver that reads it.
pub fn mailbox() -> (MailboxListener, Receiver<DetectionSnapshot>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (MailboxListener { tx, rx: rx.clone() }, rx)
}

impl DetectionListener for MailboxListener {
    fn on_detection(&mut self, snapshot: &DetectionSnapshot) {
        let _ = self.rx.try_recv();
        let _ = self.tx.try_send(*snapshot);
    }
}

/// The polling controller. Owns the correction state exclusively.
pub struct DetectionLoop {
    estimator: PitchEstimator,
    correction: CorrectionState,
    state: LoopState,
    source: Option<Box<dyn FrameSource>>,
    listeners: Vec<Box<dyn DetectionListener>>,
    cancel: CancellationToken,
    controls_tx: Sender<Control>,
    controls_rx: Receiver<Control>,
    tick_count: u64,
}

impl Default for DetectionLoop {
    fn default() -> Self {
        Self::new(PitchEstimator::default(), CorrectionState::default())
    }
}

impl DetectionLoop {
    pub fn new(estimator: PitchEstimator, correction: CorrectionState) -> Self {
        let (controls_tx, controls_rx) = crossbeam_channel::unbounded();
        Self {
            estimator,
            correction,
            state: LoopState::Idle,
            source: None,
            listeners: Vec::new(),
            cancel: CancellationToken::new(),
            controls_tx,
            controls_rx,
            tick_count: 0,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.build_estimator(), config.correction_state())
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Copy of the correction state as of the last completed tick.
    pub fn correction_state(&self) -> CorrectionState {
        self.correction
    }

    /// Number of ticks run since the loop was created.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            controls: self.controls_tx.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Listeners run in registration order, inside the tick.
    pub fn add_listener<L: DetectionListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    /// Queues a key change for the next tick.
    pub fn set_key(&self, key: Key) {
        let _ = self.controls_tx.send(Control::SetKey(key));
    }

    /// Queues an amount change (percent) for the next tick.
    pub fn set_amount(&self, percent: f32) {
        let _ = self.controls_tx.send(Control::SetAmount(percent));
    }

    /// Attaches `source`, enters Sampling and runs the first tick at once.
    ///
    /// Starting while already sampling swaps the source and restarts.
    pub fn start<S: FrameSource + 'static>(&mut self, source: S) -> Option<DetectionSnapshot> {
        if self.state == LoopState::Sampling {
            info!("Restarting detection loop with a new frame source");
        } else {
            info!("Detection loop started");
        }
        self.cancel.reset();
        self.source = Some(Box::new(source));
        self.state = LoopState::Sampling;
        self.tick()
    }

    /// Cancels the pending tick and returns to Idle. Calling it while
    /// already idle does nothing.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if self.state == LoopState::Idle {
            return;
        }
        self.state = LoopState::Idle;
        self.source = None;
        self.correction.update_detection(None);
        info!("Detection loop stopped after {} ticks", self.tick_count);
    }

    /// Runs one tick if sampling: apply queued settings, pull a frame,
    /// estimate, update the correction state, publish.
    ///
    /// Returns `None` when idle or when the pending tick was cancelled,
    /// in which case the loop goes idle.
    pub fn tick(&mut self) -> Option<DetectionSnapshot> {
        if self.state != LoopState::Sampling {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.stop();
            return None;
        }
        self.apply_controls();

        let source = self.source.as_mut()?;
        let frame = source.pull();
        let detected = self.estimator.estimate(frame.samples, frame.sample_rate);
        let shift_ratio = self.correction.update_detection(detected);

        let note = detected.map(tuning::to_note);
        let snapshot = DetectionSnapshot {
            tick: self.tick_count,
            detected_frequency: detected,
            note,
            shift_ratio,
            target_frequency: self.correction.target_frequency(),
            cents_deviation: detected
                .zip(note)
                .map(|(f, n)| tuning::calculate_cents_deviation(f, n.frequency())),
        };
        self.tick_count += 1;

        match (detected, note) {
            (Some(f), Some(n)) => debug!("tick {}: {:.1} Hz ({}) ratio {:.4}", snapshot.tick, f, n, shift_ratio),
            _ => debug!("tick {}: no pitch", snapshot.tick),
        }

        for listener in &mut self.listeners {
            listener.on_detection(&snapshot);
        }
        Some(snapshot)
    }

    /// Drives ticks from `ticker` until the loop is stopped or the ticker
    /// runs out. Leaves the loop idle and returns the number of ticks run.
    pub fn run<T: Ticker + ?Sized>(&mut self, ticker: &mut T) -> u64 {
        let mut ran = 0;
        while self.state == LoopState::Sampling {
            if !ticker.wait_for_tick(&self.cancel) {
                break;
            }
            if self.tick().is_some() {
                ran += 1;
            }
        }
        self.stop();
        ran
    }

    fn apply_controls(&mut self) {
        while let Ok(control) = self.controls_rx.try_recv() {
            match control {
                Control::SetKey(key) => {
                    info!("Target key set to {}", key);
                    self.correction.set_key(key);
                }
                Control::SetAmount(percent) => {
                    info!("Correction amount set to {}%", percent);
                    self.correction.set_amount_percent(percent);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ToneSource;
    use crate::tuning::PitchClass;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::thread;

    fn tone(frequency: f32) -> ToneSource {
        ToneSource::new(frequency, 0.5, 44_100, 1024)
    }

    fn recorder(detector: &mut DetectionLoop) -> Rc<RefCell<Vec<DetectionSnapshot>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        detector.add_listener(move |snapshot: &DetectionSnapshot| {
            sink.borrow_mut().push(*snapshot);
        });
        seen
    }

    #[test]
    fn stop_from_idle_is_a_no_op() {
        let mut detector = DetectionLoop::default();
        detector.stop();
        detector.stop();
        assert_eq!(detector.state(), LoopState::Idle);
        assert_eq!(detector.tick(), None);
    }

    #[test]
    fn start_ticks_immediately() {
        let mut detector = DetectionLoop::default();
        let seen = recorder(&mut detector);

        let snapshot = detector.start(tone(220.0)).expect("first tick");
        assert_eq!(detector.state(), LoopState::Sampling);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(snapshot.tick, 0);
        assert_eq!(snapshot.note.map(|n| n.to_string()), Some("A3".to_string()));
    }

    #[test]
    fn start_stop_start_resumes() {
        let mut detector = DetectionLoop::default();
        let seen = recorder(&mut detector);

        detector.start(tone(220.0));
        detector.stop();
        assert_eq!(detector.tick(), None);
        assert_eq!(seen.borrow().len(), 1);

        detector.start(tone(330.0));
        assert!(detector.tick().is_some());
        assert_eq!(seen.borrow().len(), 3);
        assert_eq!(detector.state(), LoopState::Sampling);
    }

    #[test]
    fn silence_publishes_pass_through() {
        let mut detector = DetectionLoop::new(
            PitchEstimator::default(),
            CorrectionState::new(Key::new(PitchClass::A), 100.0),
        );
        let snapshot = detector.start(ToneSource::new(440.0, 0.0, 44_100, 1024)).unwrap();
        assert_eq!(snapshot.detected_frequency, None);
        assert_eq!(snapshot.note, None);
        assert_eq!(snapshot.shift_ratio, 1.0);
        assert_eq!(snapshot.cents_deviation, None);
    }

    #[test]
    fn run_with_limited_ticker_then_idle() {
        let mut detector = DetectionLoop::default();
        let seen = recorder(&mut detector);
        detector.start(tone(196.0));

        let ran = detector.run(&mut ManualTicker::limited(4));
        assert_eq!(ran, 4);
        assert_eq!(seen.borrow().len(), 5);
        assert_eq!(detector.state(), LoopState::Idle);
        assert_eq!(detector.correction_state().last_detected(), None);
    }

    #[test]
    fn settings_apply_on_next_tick() {
        let mut detector = DetectionLoop::default();
        let handle = detector.handle();

        let first = detector.start(tone(466.16)).unwrap();
        assert_eq!(first.shift_ratio, 1.0);

        handle.set_key_name("A");
        handle.set_amount(40.0);
        assert_eq!(detector.correction_state().amount(), 0.0);

        let second = detector.tick().unwrap();
        assert!(second.shift_ratio < 0.99 && second.shift_ratio > 0.97, "{}", second.shift_ratio);
        assert_eq!(detector.correction_state().target_key(), Key::new(PitchClass::A));
        let target = second.target_frequency.unwrap();
        assert!((target - 440.0).abs() < 0.01);
    }

    #[test]
    fn listener_can_stop_the_loop() {
        let mut detector = DetectionLoop::default();
        let handle = detector.handle();
        let mut count = 0;
        detector.add_listener(move |_: &DetectionSnapshot| {
            count += 1;
            if count == 3 {
                handle.stop();
            }
        });
        detector.start(tone(300.0));

        let ran = detector.run(&mut ManualTicker::unlimited());
        assert_eq!(ran, 2);
        assert_eq!(detector.tick_count(), 3);
        assert_eq!(detector.state(), LoopState::Idle);
    }

    #[test]
    fn stop_from_another_thread_wakes_interval_ticker() {
        let mut detector = DetectionLoop::default();
        let handle = detector.handle();
        detector.start(tone(250.0));

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handle.stop();
        });
        let mut ticker = IntervalTicker::new(Duration::from_secs(3600));
        let ran = detector.run(&mut ticker);
        stopper.join().unwrap();

        assert_eq!(ran, 0);
        assert_eq!(detector.state(), LoopState::Idle);
    }

    #[test]
    fn mailbox_keeps_only_the_newest_snapshot() {
        let mut detector = DetectionLoop::default();
        let (listener, inbox) = mailbox();
        detector.add_listener(listener);

        detector.start(tone(220.0));
        detector.run(&mut ManualTicker::limited(3));

        let latest = inbox.try_recv().unwrap();
        assert_eq!(latest.tick, 3);
        assert!(inbox.try_recv().is_err());
    }

    #[test]
    fn restart_after_handle_stop() {
        let mut detector = DetectionLoop::default();
        detector.handle().stop();
        assert!(detector.start(tone(220.0)).is_some());
        assert_eq!(detector.state(), LoopState::Sampling);
    }
}
