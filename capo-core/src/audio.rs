//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform
//! Audio Library). It exposes the blocking [`AudioSource`] contract the
//! analyzer consumes and a microphone-backed implementation of it.
//!
//! ## Features
//! - Automatic audio device selection
//! - Signed 16-bit mono chunks regardless of the device's native format
//! - Blocking chunk reads with a liveness timeout
//! - Idempotent teardown

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfigRange};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::thread::JoinHandle;
use std::time::Duration;

/// Default capture sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Default channel count (mono).
pub const DEFAULT_CHANNELS: u16 = 1;

/// Number of samples acquired per analyzer iteration.
pub const CHUNK_SIZE: usize = 1024;

/// How long a chunk read may wait before the device is reported unresponsive.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// How many in-flight chunks the capture callback may buffer before dropping.
const CHANNEL_DEPTH: usize = 32;

/// A blocking source of raw signed 16-bit samples.
///
/// `read_chunk` blocks until a full chunk is available, which makes the
/// device's own pacing the analyzer's real-time clock.
pub trait AudioSource {
    /// Fills `out` with the next samples, blocking until enough are
    /// available. Errors are recoverable from the caller's point of view:
    /// the analyzer logs them and retries.
    fn read_chunk(&mut self, out: &mut [i16]) -> Result<()>;

    /// Stops the capture stream and releases the device. Must be safe to
    /// call more than once.
    fn close(&mut self);

    /// The rate samples are actually captured at, which may differ from the
    /// requested rate if the device cannot honor it.
    fn sample_rate(&self) -> u32;
}

/// Microphone input via the default CPAL host.
///
/// `cpal::Stream` is not `Send`, so the stream lives on a small dedicated
/// thread spawned by [`MicrophoneSource::open`]; sample chunks cross over a
/// bounded channel and teardown is a signal plus join. Open errors are
/// reported back synchronously over a handshake channel, so a missing device
/// fails construction rather than surfacing later.
pub struct MicrophoneSource {
    samples: Receiver<Vec<i16>>,
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    pending: VecDeque<i16>,
    sample_rate: u32,
}

impl MicrophoneSource {
    /// Opens the default input device and starts capturing.
    ///
    /// # Arguments
    /// * `sample_rate` - Requested sample rate in Hz
    /// * `channels` - Preferred channel count (extra channels are dropped)
    /// * `chunk_size` - Samples per chunk handed to the reader
    ///
    /// # Returns
    /// * `Ok(source)` - Capture is running
    /// * `Err(e)` - No device, no usable format, or the stream failed to start
    pub fn open(sample_rate: u32, channels: u16, chunk_size: usize) -> Result<Self> {
        let (sample_tx, sample_rx) = bounded::<Vec<i16>>(CHANNEL_DEPTH);
        let (ready_tx, ready_rx) = bounded::<Result<u32>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let worker = std::thread::spawn(move || {
            let stream = match build_input_stream(sample_rate, channels, chunk_size, sample_tx) {
                Ok((stream, actual_rate)) => {
                    let _ = ready_tx.send(Ok(actual_rate));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            // Park until close(); the stream keeps capturing meanwhile.
            let _ = shutdown_rx.recv();
            if let Err(e) = stream.pause() {
                log::warn!("error pausing input stream: {e}");
            }
            drop(stream);
        });

        let actual_rate = ready_rx
            .recv()
            .context("audio capture thread exited before reporting status")??;

        log::info!("audio capture running at {actual_rate} Hz");

        Ok(Self {
            samples: sample_rx,
            shutdown: Some(shutdown_tx),
            worker: Some(worker),
            pending: VecDeque::new(),
            sample_rate: actual_rate,
        })
    }
}

impl AudioSource for MicrophoneSource {
    fn read_chunk(&mut self, out: &mut [i16]) -> Result<()> {
        while self.pending.len() < out.len() {
            let chunk = match self.samples.recv_timeout(READ_TIMEOUT) {
                Ok(chunk) => chunk,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(anyhow!("audio device produced no samples for {READ_TIMEOUT:?}"));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(anyhow!("audio capture stream closed"));
                }
            };
            self.pending.extend(chunk);
        }
        for slot in out.iter_mut() {
            // The loop above guarantees enough pending samples.
            *slot = self.pending.pop_front().unwrap_or(0);
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
            if let Some(worker) = self.worker.take() {
                let _ = worker.join();
            }
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Accumulates callback buffers into fixed-size mono `i16` chunks.
struct Chunker {
    buffer: Vec<i16>,
    chunk_size: usize,
    channels: usize,
    sender: Sender<Vec<i16>>,
}

impl Chunker {
    fn new(chunk_size: usize, channels: usize, sender: Sender<Vec<i16>>) -> Self {
        Self {
            buffer: Vec::with_capacity(chunk_size * 2),
            chunk_size,
            channels: channels.max(1),
            sender,
        }
    }

    fn push_i16(&mut self, data: &[i16]) {
        for frame in data.chunks(self.channels) {
            // De-interleave: take the first channel.
            self.buffer.push(frame[0]);
        }
        self.flush();
    }

    fn push_f32(&mut self, data: &[f32]) {
        for frame in data.chunks(self.channels) {
            let sample = (frame[0].clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            self.buffer.push(sample);
        }
        self.flush();
    }

    fn flush(&mut self) {
        while self.buffer.len() >= self.chunk_size {
            let chunk: Vec<i16> = self.buffer.drain(..self.chunk_size).collect();
            // Drop the chunk if the reader lags; capture must never stall.
            let _ = self.sender.try_send(chunk);
        }
    }
}

/// Builds and starts the input stream on the calling thread.
fn build_input_stream(
    sample_rate: u32,
    channels: u16,
    chunk_size: usize,
    sender: Sender<Vec<i16>>,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no audio input device available"))?;

    log::info!("using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported = find_supported_config(configs, sample_rate, channels)
        .ok_or_else(|| anyhow!("no suitable i16/f32 input format found"))?;

    let rate = sample_rate.clamp(supported.min_sample_rate().0, supported.max_sample_rate().0);
    let config = supported.with_sample_rate(cpal::SampleRate(rate));
    let sample_format = config.sample_format();
    let stream_config: cpal::StreamConfig = config.into();
    let stream_channels = stream_config.channels as usize;

    let err_fn = |err| log::error!("an error occurred on the audio stream: {err}");
    let mut chunker = Chunker::new(chunk_size, stream_channels, sender);

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| chunker.push_i16(data),
            err_fn,
            None,
        )?,
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| chunker.push_f32(data),
            err_fn,
            None,
        )?,
        other => return Err(anyhow!("unsupported input sample format {other:?}")),
    };

    stream.play()?;

    Ok((stream, rate))
}

/// Finds the best supported configuration for the requested rate and layout.
///
/// Prefers the requested channel count and the closest sample rate among
/// configurations using a sample format we can convert from.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
    target_channels: u16,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| matches!(c.sample_format(), SampleFormat::I16 | SampleFormat::F32))
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i32 - target_rate as i32).abs();
            let max_diff = (c.max_sample_rate().0 as i32 - target_rate as i32).abs();
            (c.channels() != target_channels, min_diff.min(max_diff))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunker_emits_fixed_size_chunks() {
        let (tx, rx) = bounded(8);
        let mut chunker = Chunker::new(4, 1, tx);
        chunker.push_i16(&[1, 2, 3]);
        assert!(rx.try_recv().is_err());
        chunker.push_i16(&[4, 5, 6, 7, 8, 9]);
        assert_eq!(rx.try_recv().unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(rx.try_recv().unwrap(), vec![5, 6, 7, 8]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn chunker_takes_the_first_channel_of_interleaved_input() {
        let (tx, rx) = bounded(8);
        let mut chunker = Chunker::new(3, 2, tx);
        chunker.push_i16(&[10, -10, 20, -20, 30, -30]);
        assert_eq!(rx.try_recv().unwrap(), vec![10, 20, 30]);
    }

    #[test]
    fn chunker_converts_float_samples_to_full_scale_i16() {
        let (tx, rx) = bounded(8);
        let mut chunker = Chunker::new(2, 1, tx);
        chunker.push_f32(&[1.0, -1.0]);
        let chunk = rx.try_recv().unwrap();
        assert_eq!(chunk[0], i16::MAX);
        assert_eq!(chunk[1], -i16::MAX);
    }
}
