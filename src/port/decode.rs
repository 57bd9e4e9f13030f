// SPDX-License-Identifier: MPL-2.0
//! Decoding port definition.
//!
//! One trait serves both the audio and the video decoder; the session holds
//! one instance per stream. The video instance is additionally paced by the
//! audio clock through [`Decoder::set_sync_target_ms`].

use crate::error::Result;
use crate::media::{MediaBuffer, MediaParameters};

/// Port for packet decoding.
///
/// # Thread Safety
///
/// Implementations must be `Send`. The session owns its decoders exclusively
/// and serializes all calls under its own lock; adapters that run a decode
/// thread internally synchronize their own state.
///
/// # Pacing
///
/// A video decoder must delay frame delivery until its current frame's
/// timestamp is at or below the sync target; the session's synchronization
/// loop refreshes the target from the audio clock every few milliseconds.
/// Audio decoders ignore the target.
pub trait Decoder: Send {
    /// Configures the decoder for a stream.
    ///
    /// `prefer_hardware` asks for a hardware-accelerated path when the
    /// adapter has one; adapters without hardware support ignore it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Open`] if the stream parameters are
    /// not decodable. The session logs this and continues degraded.
    fn open(&mut self, params: &MediaParameters, prefer_hardware: bool) -> Result<()>;

    /// Begins decoding queued packets.
    fn start(&mut self);

    /// Halts decoding. Safe to call when not started.
    fn stop(&mut self);

    /// Drops all buffered packets and undelivered frames.
    fn clear(&mut self);

    /// Queues a packet for decoding, taking ownership of it.
    ///
    /// Returns `false` when the decoder is not open or cannot accept the
    /// packet; the packet is dropped in that case.
    fn send_packet(&mut self, packet: MediaBuffer) -> bool;

    /// Takes the next decoded frame, or `None` when none is ready.
    fn recv_frame(&mut self) -> Option<MediaBuffer>;

    /// Timestamp of the most recently delivered frame, in milliseconds.
    fn pts_ms(&self) -> i64;

    /// Sets the audio-clock position this decoder paces itself against.
    fn set_sync_target_ms(&mut self, target_ms: i64);

    /// Suspends or resumes frame delivery without dropping state.
    fn set_pause(&mut self, paused: bool);
}
