// SPDX-License-Identifier: MPL-2.0
//! Audio-output port definition.
//!
//! The sink is the engine's clock source: its playback position drives the
//! synchronization loop that paces video to audio. [`crate::audio::CpalAudioSink`]
//! is the bundled implementation.

use crate::error::Result;
use crate::media::{MediaBuffer, MediaParameters};

/// Port for a device audio sink.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` and take `&self`: the host's decode
/// chain pushes PCM from its own threads while the session reads the playback
/// position and propagates pause flags concurrently. Implementations guard
/// their queue with internal locking; the position read must be cheap enough
/// for a 2 ms polling loop.
pub trait AudioSink: Send + Sync {
    /// Opens the output device for the given PCM parameters and begins
    /// consuming queued buffers.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Audio`] if no device matches the
    /// parameters or the stream cannot be built.
    fn start_play(&self, params: &MediaParameters) -> Result<()>;

    /// Queues one PCM buffer for playback, taking ownership of it.
    ///
    /// Must not block the caller: a sink at capacity drops the buffer
    /// instead of waiting for the device to drain.
    fn push(&self, buffer: MediaBuffer);

    /// Drops every queued buffer. Playback resumes from the next push.
    fn clear(&self);

    /// Stops the device stream and clears the queue; idempotent.
    fn close(&self);

    /// Current playback position in milliseconds.
    ///
    /// Derived from the timestamp of the buffer being consumed plus the
    /// frames already delivered from it; returns the last position while
    /// paused and 0 before playback starts.
    fn position_ms(&self) -> i64;

    /// Silences the device without closing it; queued data is kept.
    fn set_pause(&self, paused: bool);
}
