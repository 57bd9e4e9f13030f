// SPDX-License-Identifier: MPL-2.0
//! Audio playback through cpal, and the playback-position clock.
//!
//! [`CpalAudioSink`] implements the [`AudioSink`] port over the system's
//! default output device. The stream plays 16-bit interleaved PCM at the
//! parameters the caller opened it with; pushed buffers queue up and the
//! device callback drains them.
//!
//! # Thread Safety
//!
//! cpal streams are not `Send`, so the stream lives on a dedicated worker
//! thread for its whole life. The sink handle and the device callback share
//! only [`SinkShared`]: a mutex around the buffer queue plus atomics for
//! everything the callback reads per wakeup. The callback never takes any
//! other lock.
//!
//! # Design Notes
//!
//! The playback position doubles as the engine's master clock, so its
//! semantics are deliberate:
//!
//! - it advances only as the callback consumes samples, so pausing
//!   freezes it;
//! - muting keeps consuming (at zero gain) so video keeps pacing;
//! - clearing the queue leaves the last position in place until newly
//!   pushed audio overwrites it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

use crate::config;
use crate::error::{Error, Result};
use crate::media::{MediaBuffer, MediaParameters};
use crate::port::AudioSink;

/// Queued PCM buffers plus the consume offset into the front one.
struct PlayQueue {
    buffers: VecDeque<MediaBuffer>,
    /// Byte offset of the next unplayed sample in the front buffer.
    cursor: usize,
}

impl PlayQueue {
    fn new() -> Self {
        Self {
            buffers: VecDeque::new(),
            cursor: 0,
        }
    }

    fn clear(&mut self) {
        self.buffers.clear();
        self.cursor = 0;
    }
}

/// State shared between the sink handle and the device callback.
struct SinkShared {
    queue: Mutex<PlayQueue>,
    /// PTS of the most recently played sample, in milliseconds.
    position_ms: AtomicI64,
    paused: AtomicBool,
    muted: AtomicBool,
    /// Volume stored as f32 bits for atomic access.
    volume_bits: AtomicU32,
    /// Stream sample rate in Hz.
    rate: AtomicU32,
    /// Stream channel count.
    channels: AtomicU32,
}

impl SinkShared {
    fn new(initial_volume: f32) -> Self {
        Self {
            queue: Mutex::new(PlayQueue::new()),
            position_ms: AtomicI64::new(0),
            paused: AtomicBool::new(false),
            muted: AtomicBool::new(false),
            volume_bits: AtomicU32::new(initial_volume.to_bits()),
            rate: AtomicU32::new(0),
            channels: AtomicU32::new(0),
        }
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    fn set_volume(&self, volume: f32) {
        self.volume_bits.store(volume.to_bits(), Ordering::Relaxed);
    }
}

/// The worker thread keeping the cpal stream alive.
struct SinkWorker {
    /// Dropping this sender tells the worker to shut down.
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// [`AudioSink`] implementation over the default cpal output device.
pub struct CpalAudioSink {
    shared: Arc<SinkShared>,
    worker: Mutex<Option<SinkWorker>>,
    /// Buffer count above which pushes are dropped.
    capacity: usize,
}

impl CpalAudioSink {
    /// Creates an idle sink that drops pushes beyond `capacity` queued
    /// buffers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(SinkShared::new(config::DEFAULT_VOLUME)),
            worker: Mutex::new(None),
            capacity: capacity.max(1),
        }
    }

    /// Creates a sink with queue capacity and initial volume taken from the
    /// engine settings.
    #[must_use]
    pub fn from_config(config: &config::EngineConfig) -> Self {
        let sink = Self::new(config.audio_queue_buffers);
        sink.set_volume(config.volume);
        sink
    }

    /// Sets the volume on a perceptual (quadratic) scale; clamped to
    /// `0.0..=`[`config::MAX_VOLUME`].
    pub fn set_volume(&self, volume: f32) {
        self.shared.set_volume(volume.clamp(0.0, config::MAX_VOLUME));
    }

    /// The current volume setting.
    #[must_use]
    pub fn volume(&self) -> f32 {
        self.shared.volume()
    }

    /// Mutes or unmutes playback; muted playback keeps consuming so the
    /// position clock keeps advancing.
    pub fn set_muted(&self, muted: bool) {
        self.shared.muted.store(muted, Ordering::Relaxed);
    }

    /// Returns whether playback is muted.
    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.shared.muted.load(Ordering::Relaxed)
    }
}

impl Default for CpalAudioSink {
    fn default() -> Self {
        Self::new(config::DEFAULT_AUDIO_QUEUE_BUFFERS)
    }
}

impl AudioSink for CpalAudioSink {
    fn start_play(&self, params: &MediaParameters) -> Result<()> {
        self.close();
        if params.sample_rate == 0 || params.channels == 0 {
            return Err(Error::Audio(format!(
                "Invalid playback parameters: {} Hz, {} channels",
                params.sample_rate, params.channels
            )));
        }

        self.shared.rate.store(params.sample_rate, Ordering::Relaxed);
        self.shared
            .channels
            .store(u32::from(params.channels), Ordering::Relaxed);
        self.shared.position_ms.store(0, Ordering::Relaxed);

        // The stream is built on the worker thread because cpal streams are
        // not Send; the ready channel carries the build outcome back.
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        let shared = Arc::clone(&self.shared);
        let params = *params;
        let handle = std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let stream = match build_stream(&params, &shared) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                // Parks until the sink handle drops its stop sender.
                let _ = stop_rx.recv();
                drop(stream);
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                let Ok(mut worker) = self.worker.lock() else {
                    drop(stop_tx);
                    let _ = handle.join();
                    return Err(Error::Audio("Audio worker state poisoned".to_string()));
                };
                *worker = Some(SinkWorker { stop_tx, handle });
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(Error::Audio("Audio worker exited during startup".to_string()))
            }
        }
    }

    fn push(&self, buffer: MediaBuffer) {
        if buffer.payload.is_empty() {
            return;
        }
        let Ok(mut queue) = self.shared.queue.lock() else {
            return;
        };
        if queue.buffers.len() >= self.capacity {
            log::debug!("Audio queue full, dropping {} bytes", buffer.payload.len());
            return;
        }
        queue.buffers.push_back(buffer);
    }

    fn clear(&self) {
        if let Ok(mut queue) = self.shared.queue.lock() {
            queue.clear();
        }
    }

    fn close(&self) {
        let worker = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(worker) = worker {
            drop(worker.stop_tx);
            let _ = worker.handle.join();
        }
        self.clear();
    }

    fn position_ms(&self) -> i64 {
        self.shared.position_ms.load(Ordering::Relaxed)
    }

    fn set_pause(&self, paused: bool) {
        self.shared.paused.store(paused, Ordering::Relaxed);
    }
}

impl Drop for CpalAudioSink {
    fn drop(&mut self) {
        AudioSink::close(self);
    }
}

fn build_stream(params: &MediaParameters, shared: &Arc<SinkShared>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("No audio output device found".to_string()))?;

    let config = cpal::StreamConfig {
        channels: params.channels,
        sample_rate: cpal::SampleRate(params.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let shared = Arc::clone(shared);
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                render_callback(&shared, data);
            },
            |err| {
                eprintln!("Audio output error: {err}");
            },
            None,
        )
        .map_err(|e| Error::Audio(format!("Failed to build audio stream: {e}")))?;

    stream
        .play()
        .map_err(|e| Error::Audio(format!("Failed to start audio stream: {e}")))?;

    Ok(stream)
}

/// Fills one device buffer from the queue. Runs on the cpal callback
/// thread.
fn render_callback(shared: &SinkShared, data: &mut [i16]) {
    if shared.paused.load(Ordering::Relaxed) {
        data.fill(0);
        return;
    }
    let Ok(mut queue) = shared.queue.lock() else {
        // Mutex poisoned, output silence.
        data.fill(0);
        return;
    };

    let volume = shared.volume();
    // Quadratic curve makes the volume setting perceptually linear.
    let gain = if shared.muted.load(Ordering::Relaxed) {
        0.0
    } else {
        volume * volume
    };
    let rate = shared.rate.load(Ordering::Relaxed).max(1);
    let channels = shared.channels.load(Ordering::Relaxed).max(1);

    if let Some(position) = fill_samples(&mut queue, data, gain, rate, channels) {
        shared.position_ms.store(position, Ordering::Relaxed);
    }
}

/// Copies queued samples into `data` with `gain` applied and pads any
/// shortfall with silence.
///
/// Returns the PTS reached by the last consumed sample, or `None` when
/// nothing was consumed.
#[allow(clippy::cast_possible_truncation)] // millisecond math stays far below i64 range
fn fill_samples(
    queue: &mut PlayQueue,
    data: &mut [i16],
    gain: f32,
    rate: u32,
    channels: u32,
) -> Option<i64> {
    let bytes_per_frame = 2 * channels as usize;
    let mut filled = 0;
    let mut position = None;

    while filled < data.len() {
        let Some(front) = queue.buffers.front() else {
            break;
        };
        if queue.cursor >= front.payload.len() {
            position = Some(buffer_end_ms(front, bytes_per_frame, rate));
            queue.buffers.pop_front();
            queue.cursor = 0;
            continue;
        }

        let available = front.payload.len() - queue.cursor;
        let wanted = (data.len() - filled) * 2;
        let take = available.min(wanted) & !1;
        if take == 0 {
            break;
        }
        for chunk in front.payload[queue.cursor..queue.cursor + take].chunks_exact(2) {
            data[filled] = scale_sample(i16::from_ne_bytes([chunk[0], chunk[1]]), gain);
            filled += 1;
        }
        queue.cursor += take;

        let frames = (queue.cursor / bytes_per_frame) as u64;
        position = Some(front.pts_ms + ((frames * 1000) / u64::from(rate)) as i64);
    }

    data[filled..].fill(0);
    position
}

#[allow(clippy::cast_possible_truncation)] // clamped to the i16 range first
fn scale_sample(sample: i16, gain: f32) -> i16 {
    (f32::from(sample) * gain).clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

#[allow(clippy::cast_possible_truncation)]
fn buffer_end_ms(buffer: &MediaBuffer, bytes_per_frame: usize, rate: u32) -> i64 {
    let frames = (buffer.payload.len() / bytes_per_frame) as u64;
    buffer.pts_ms + ((frames * 1000) / u64::from(rate)) as i64
}
