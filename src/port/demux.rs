// SPDX-License-Identifier: MPL-2.0
//! Demuxing port definition.
//!
//! This module defines the [`Demuxer`] trait for container demuxing.
//! Infrastructure adapters (like `FFmpeg`) implement this trait.
//!
//! # Design Notes
//!
//! - The demuxer is **stateful** - it tracks the current read position
//! - Packet delivery to decoders happens on the adapter's own thread;
//!   the session only drives `read()` directly during a seek
//! - Uses engine types only ([`MediaBuffer`], [`MediaParameters`])

use crate::error::Result;
use crate::media::{MediaBuffer, MediaParameters};
use std::path::Path;

// =============================================================================
// Demuxer Trait
// =============================================================================

/// Port for container demuxing.
///
/// Implementations open a media source, expose per-stream parameters, and
/// yield interleaved packets in decode order.
///
/// # Thread Safety
///
/// Implementations must be `Send` for use across threads. The demuxer is
/// **not** required to be `Sync`; the session owns it exclusively and
/// serializes all calls under its own lock.
///
/// # Lifecycle
///
/// 1. Create demuxer instance
/// 2. Call `open()` to open a media source
/// 3. Call `start()` to begin packet delivery
/// 4. Use `seek()` to jump to fractional positions
/// 5. Call `stop()` to halt delivery; `open()` again to switch sources
pub trait Demuxer: Send {
    /// Opens a media source and probes its streams.
    ///
    /// After a successful open, [`audio_params`](Demuxer::audio_params),
    /// [`video_params`](Demuxer::video_params), and
    /// [`total_duration_ms`](Demuxer::total_duration_ms) describe the source.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Open`] if the source cannot be read or
    /// no recognizable stream is found. This failure is fatal to the session.
    fn open(&mut self, path: &Path) -> Result<()>;

    /// Begins delivering packets on the adapter's own thread.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Open`] if delivery cannot start; the
    /// session treats this as fatal and aborts its own start sequence.
    fn start(&mut self) -> Result<()>;

    /// Halts packet delivery. Safe to call when not started.
    fn stop(&mut self);

    /// Seeks to a fractional position in `[0.0, 1.0]` of the total duration.
    ///
    /// Lands on the nearest preceding keyframe; the session discards packets
    /// between the keyframe and the exact target afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Seek`] if the underlying source cannot
    /// reposition.
    fn seek(&mut self, position: f64) -> Result<()>;

    /// Reads the next packet in decode order.
    ///
    /// Returns `None` at end-of-data. Only the session's seek loop calls
    /// this directly; normal delivery runs on the adapter's thread.
    fn read(&mut self) -> Option<MediaBuffer>;

    /// Re-injects `buffer` into the demuxer's output path, bypassing decode.
    ///
    /// Used during seek for audio packets already at or past the target.
    /// Assumes the payload is directly playable PCM; sources whose audio
    /// requires a decode step must not be driven through this path.
    fn notify(&mut self, buffer: MediaBuffer);

    /// Suspends or resumes packet delivery without tearing down state.
    fn set_pause(&mut self, paused: bool);

    /// Parameters of the audio stream, if the source has one.
    fn audio_params(&self) -> Option<MediaParameters>;

    /// Parameters of the video stream, if the source has one.
    fn video_params(&self) -> Option<MediaParameters>;

    /// Total duration of the source in milliseconds, or 0 if unknown.
    fn total_duration_ms(&self) -> i64;
}
