//! # Audio Analyzer Module
//!
//! The real-time pitch detection engine. Owns the rolling sample buffer and
//! runs the acquire → window → transform → HPS → filter → peak pipeline once
//! per captured chunk on a dedicated worker thread, publishing one frequency
//! estimate per iteration into the shared hand-off queue.
//!
//! ## Architecture
//! - **Worker thread**: blocking chunk reads pace the loop at the device rate
//! - **State**: buffer, window and FFT plan are owned by the worker alone
//! - **Output**: lossy bounded queue polled by consumers on their own schedule

use crate::audio::{self, AudioSource, MicrophoneSource};
use crate::fft::{self, ForwardFft};
use crate::pitch;
use crate::queue::{SharedQueue, DEFAULT_QUEUE_CAPACITY};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Number of chunks the rolling buffer spans.
pub const BUFFER_CHUNKS: usize = 50;

/// Zero-padding multiplier: the FFT input is the buffer plus this many
/// buffer-lengths of trailing zeros.
pub const PADDING_FACTOR: usize = 3;

/// Pause after a failed device read, so a dead device cannot spin the loop.
const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Runtime configuration for the [`AudioAnalyzer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Requested capture sample rate in Hz.
    pub sample_rate: u32,
    /// Preferred capture channel count.
    pub channels: u16,
    /// Samples acquired per loop iteration.
    pub chunk_size: usize,
    /// Rolling buffer length in chunks.
    pub buffer_chunks: usize,
    /// Trailing zero-padding, in buffer lengths.
    pub padding_factor: usize,
    /// Capacity of the hand-off queue created by consumers.
    pub queue_capacity: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sample_rate: audio::DEFAULT_SAMPLE_RATE,
            channels: audio::DEFAULT_CHANNELS,
            chunk_size: audio::CHUNK_SIZE,
            buffer_chunks: BUFFER_CHUNKS,
            padding_factor: PADDING_FACTOR,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl AnalyzerConfig {
    /// Returns a copy with degenerate values clamped back to their defaults.
    pub fn normalized(mut self) -> Self {
        if self.sample_rate == 0 {
            self.sample_rate = audio::DEFAULT_SAMPLE_RATE;
        }
        if self.channels == 0 {
            self.channels = audio::DEFAULT_CHANNELS;
        }
        self.chunk_size = self.chunk_size.max(1);
        self.buffer_chunks = self.buffer_chunks.max(1);
        self.queue_capacity = self.queue_capacity.max(1);
        self
    }

    /// Rolling buffer length in samples.
    pub fn buffer_len(&self) -> usize {
        self.chunk_size * self.buffer_chunks
    }

    /// FFT input length: the buffer plus trailing zero-padding.
    pub fn padded_len(&self) -> usize {
        self.buffer_len() * (1 + self.padding_factor)
    }
}

/// Streaming pitch detector: rolling buffer, precomputed window, planned FFT.
///
/// Absorbs one chunk at a time and produces the loudest frequency currently
/// in the buffer. Pure state machine with no threads or I/O, so the whole
/// pipeline is testable with synthetic signals.
pub struct PitchDetector {
    buffer: Vec<f32>,
    window: Vec<f32>,
    windowed: Vec<f32>,
    fft: ForwardFft,
    chunk_size: usize,
    sample_rate: f32,
}

impl PitchDetector {
    /// Builds detector state for `config`, using the actual capture rate
    /// reported by the audio source.
    pub fn new(config: &AnalyzerConfig, sample_rate: u32) -> Self {
        let len = config.buffer_len();
        Self {
            buffer: vec![0.0; len],
            window: fft::hann_window(len),
            windowed: vec![0.0; len],
            fft: ForwardFft::new(config.padded_len()),
            chunk_size: config.chunk_size,
            sample_rate: sample_rate as f32,
        }
    }

    /// Absorbs one chunk and returns the frequency estimate for the updated
    /// buffer, rounded to two decimal places.
    pub fn process_chunk(&mut self, chunk: &[i16]) -> f32 {
        self.push_chunk(chunk);
        self.analyze()
    }

    /// Shifts the rolling buffer left by one chunk and appends `chunk` at
    /// the tail. Buffer length is invariant across this operation.
    fn push_chunk(&mut self, chunk: &[i16]) {
        let len = self.buffer.len();
        let n = chunk.len().min(len);
        self.buffer.copy_within(n.., 0);
        for (slot, &sample) in self.buffer[len - n..].iter_mut().zip(chunk) {
            *slot = sample as f32;
        }
    }

    /// Windows the buffer, transforms it and extracts the loudest frequency.
    fn analyze(&mut self) -> f32 {
        for ((out, &sample), &coeff) in self
            .windowed
            .iter_mut()
            .zip(&self.buffer)
            .zip(&self.window)
        {
            *out = sample * coeff;
        }
        let mut magnitude = self.fft.magnitude_half_spectrum(&self.windowed);
        pitch::loudest_frequency(&mut magnitude, self.sample_rate)
    }

    /// Expected chunk length for [`process_chunk`](Self::process_chunk).
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// The pitch detection engine.
///
/// Reads the microphone on a dedicated worker thread and publishes one
/// frequency estimate per captured chunk into the shared queue. The engine
/// runs at most once: `start` consumes the audio source, `stop` tears it
/// down.
pub struct AudioAnalyzer {
    config: AnalyzerConfig,
    queue: Arc<SharedQueue<f32>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    source: Option<Box<dyn AudioSource + Send>>,
}

impl AudioAnalyzer {
    /// Creates an analyzer capturing from the default input device.
    ///
    /// Failure to open the device is fatal to the instance and is returned
    /// to the caller; nothing has been spawned at that point.
    pub fn new(config: AnalyzerConfig, queue: Arc<SharedQueue<f32>>) -> Result<Self> {
        let config = config.normalized();
        let source = MicrophoneSource::open(config.sample_rate, config.channels, config.chunk_size)?;
        Ok(Self::with_source(config, queue, Box::new(source)))
    }

    /// Creates an analyzer reading from an injected source (tests, replay).
    pub fn with_source(
        config: AnalyzerConfig,
        queue: Arc<SharedQueue<f32>>,
        source: Box<dyn AudioSource + Send>,
    ) -> Self {
        Self {
            config: config.normalized(),
            queue,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            source: Some(source),
        }
    }

    /// Whether the analysis loop is currently running.
    pub fn running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// The queue this analyzer publishes estimates into.
    pub fn queue(&self) -> &Arc<SharedQueue<f32>> {
        &self.queue
    }

    /// Starts the acquisition and analysis loop on a dedicated thread.
    ///
    /// A second call after the source has been consumed is a logged no-op.
    pub fn start(&mut self) {
        let Some(mut source) = self.source.take() else {
            log::warn!("analyzer already started");
            return;
        };

        self.running.store(true, Ordering::Relaxed);
        let running = Arc::clone(&self.running);
        let queue = Arc::clone(&self.queue);
        let config = self.config;

        self.worker = Some(std::thread::spawn(move || {
            let mut detector = PitchDetector::new(&config, source.sample_rate());
            let mut chunk = vec![0_i16; config.chunk_size];

            while running.load(Ordering::Relaxed) {
                match source.read_chunk(&mut chunk) {
                    Ok(()) => {
                        // A panicking chunk must not kill the long-lived loop.
                        match catch_unwind(AssertUnwindSafe(|| detector.process_chunk(&chunk))) {
                            Ok(freq) => queue.put(freq),
                            Err(_) => log::error!("pitch analysis panicked; chunk skipped"),
                        }
                    }
                    Err(e) => {
                        log::warn!("audio read failed, retrying: {e:#}");
                        std::thread::sleep(READ_RETRY_DELAY);
                    }
                }
            }

            source.close();
            log::debug!("analysis loop stopped");
        }));
    }

    /// Requests termination and waits for the worker to finish.
    ///
    /// Cancellation is cooperative: the in-flight iteration completes, then
    /// the worker closes the audio source exactly once. Calling `stop` again
    /// is a no-op.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("analysis thread panicked during shutdown");
            }
        }
    }
}

impl Drop for AudioAnalyzer {
    fn drop(&mut self) {
        self.stop();
    }
}
