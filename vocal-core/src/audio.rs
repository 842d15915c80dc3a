//! # Audio Input Module
//!
//! Frame sources feed the detection loop one window of audio per tick.
//! Every source hands out the most recent window it has, never a backlog.
//!
//! ## Sources
//! - [`MicrophoneSource`]: the default input device through CPAL
//! - [`ToneSource`]: a synthetic sine, for offline runs and demos

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{error, info, warn};
use std::f32::consts::TAU;

/// Default analysis window, in samples.
///
/// The estimator is O(n²) in this size, so it bounds the cost of a tick.
pub const BUFFER_SIZE: usize = 2048;

/// Preferred capture rate in Hz.
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// Callback chunks buffered between two pulls; older ones are evicted first.
const CHUNK_BACKLOG: usize = 64;

/// One window of mono audio, borrowed from its source for the length of a tick.
#[derive(Debug, Clone, Copy)]
pub struct AudioFrame<'a> {
    /// Normalized samples in [-1, 1].
    pub samples: &'a [f32],
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

/// Anything that can produce the latest window of audio on demand.
pub trait FrameSource {
    /// Returns the most recent window. Called once per tick.
    fn pull(&mut self) -> AudioFrame<'_>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn pull(&mut self) -> AudioFrame<'_> {
        (**self).pull()
    }
}

/// Shifts `chunk` into the end of a fixed-length window, dropping the oldest
/// samples.
pub fn push_latest(window: &mut [f32], chunk: &[f32]) {
    let len = window.len();
    if chunk.len() >= len {
        window.copy_from_slice(&chunk[chunk.len() - len..]);
    } else {
        window.rotate_left(chunk.len());
        window[len - chunk.len()..].copy_from_slice(chunk);
    }
}

/// Queues `chunk`, evicting the oldest queued chunks while the channel is
/// full. `backlog` is a receiver on the same channel.
pub fn send_latest(
    sender: &Sender<Vec<f32>>,
    backlog: &Receiver<Vec<f32>>,
    mut chunk: Vec<f32>,
) -> Result<(), TrySendError<Vec<f32>>> {
    loop {
        match sender.try_send(chunk) {
            Err(TrySendError::Full(rejected)) => {
                let _ = backlog.try_recv();
                chunk = rejected;
            }
            other => return other,
        }
    }
}

/// Live input from the default capture device.
///
/// The CPAL callback forwards each chunk over a bounded channel; `pull`
/// drains whatever arrived since the previous tick into a rolling window.
pub struct MicrophoneSource {
    // Dropping the stream stops capture.
    stream: cpal::Stream,
    receiver: Receiver<Vec<f32>>,
    window: Vec<f32>,
    sample_rate: u32,
}

impl MicrophoneSource {
    /// Opens the default input device and starts capturing.
    ///
    /// # Arguments
    /// * `window_size` - Samples per analysis window
    ///
    /// # Returns
    /// * `Ok(source)` - A running capture source
    /// * `Err(e)` - No device, no usable f32 format, or stream start failure
    pub fn open(window_size: usize) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        info!("Using audio input device: {}", device.name()?);

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
            .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

        let rate = TARGET_SAMPLE_RATE.clamp(
            supported_config.min_sample_rate().0,
            supported_config.max_sample_rate().0,
        );
        let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        let config: cpal::StreamConfig = config.into();

        info!("Selected sample rate: {} Hz, {} channel(s)", sample_rate, channels);

        let (sender, receiver) = crossbeam_channel::bounded::<Vec<f32>>(CHUNK_BACKLOG);
        let backlog = receiver.clone();
        let err_fn = |err| error!("An error occurred on the audio stream: {}", err);

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = if channels == 1 {
                    data.to_vec()
                } else {
                    data.chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                        .collect()
                };
                if let Err(TrySendError::Disconnected(_)) = send_latest(&sender, &backlog, mono) {
                    warn!("Capture channel disconnected");
                }
            },
            err_fn,
            None,
        )?;

        stream.play()?;

        Ok(Self {
            stream,
            receiver,
            window: vec![0.0; window_size],
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Pauses the device stream. Pulls keep returning the last window.
    pub fn pause(&self) -> Result<()> {
        self.stream.pause()?;
        Ok(())
    }
}

impl FrameSource for MicrophoneSource {
    fn pull(&mut self) -> AudioFrame<'_> {
        while let Ok(chunk) = self.receiver.try_recv() {
            push_latest(&mut self.window, &chunk);
        }
        AudioFrame {
            samples: &self.window,
            sample_rate: self.sample_rate,
        }
    }
}

/// Finds the best supported input configuration for the target sample rate.
///
/// Only 32-bit float formats qualify. Mono is preferred; multi-channel
/// formats are down-mixed by the capture callback. Among equals, the range
/// closest to `target_rate` wins.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let rate_distance = if (c.min_sample_rate().0..=c.max_sample_rate().0)
                .contains(&target_rate)
            {
                0
            } else {
                let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
                let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
                min_diff.min(max_diff)
            };
            (c.channels() != 1, rate_distance)
        })
}

/// Endless sine wave, advancing one window per pull.
#[derive(Debug, Clone)]
pub struct ToneSource {
    frequency: f32,
    amplitude: f32,
    sample_rate: u32,
    phase: f32,
    window: Vec<f32>,
}

impl ToneSource {
    pub fn new(frequency: f32, amplitude: f32, sample_rate: u32, window_size: usize) -> Self {
        Self {
            frequency,
            amplitude,
            sample_rate,
            phase: 0.0,
            window: vec![0.0; window_size],
        }
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
    }

    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude;
    }
}

impl FrameSource for ToneSource {
    fn pull(&mut self) -> AudioFrame<'_> {
        let step = TAU * self.frequency / self.sample_rate as f32;
        for sample in self.window.iter_mut() {
            *sample = self.amplitude * self.phase.sin();
            self.phase = (self.phase + step) % TAU;
        }
        AudioFrame {
            samples: &self.window,
            sample_rate: self.sample_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_chunk_shifts_window() {
        let mut window = [1.0, 2.0, 3.0, 4.0];
        push_latest(&mut window, &[5.0, 6.0]);
        assert_eq!(window, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn long_chunk_keeps_only_its_tail() {
        let mut window = [0.0; 3];
        push_latest(&mut window, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(window, [3.0, 4.0, 5.0]);
    }

    #[test]
    fn full_capture_channel_keeps_the_newest_chunks() {
        let (sender, receiver) = crossbeam_channel::bounded(2);
        let backlog = receiver.clone();
        for n in 1..=5 {
            send_latest(&sender, &backlog, vec![n as f32]).unwrap();
        }

        let mut window = [0.0; 2];
        while let Ok(chunk) = receiver.try_recv() {
            push_latest(&mut window, &chunk);
        }
        assert_eq!(window, [4.0, 5.0]);
    }

    #[test]
    fn tone_source_produces_requested_level() {
        let mut source = ToneSource::new(441.0, 0.5, 44_100, 1000);
        let frame = source.pull();
        assert_eq!(frame.samples.len(), 1000);
        assert_eq!(frame.sample_rate, 44_100);
        let peak = frame.samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!((peak - 0.5).abs() < 1e-3);
    }

    #[test]
    fn tone_source_is_continuous_across_pulls() {
        let mut source = ToneSource::new(100.0, 1.0, 1000, 5);
        let first: Vec<f32> = source.pull().samples.to_vec();
        let second: Vec<f32> = source.pull().samples.to_vec();
        // 100 Hz at 1 kHz repeats every 10 samples, so the second window
        // is the first one shifted by half a period (negated).
        for (a, b) in first.iter().zip(&second) {
            assert!((a + b).abs() < 1e-4);
        }
    }
}
