// SPDX-License-Identifier: MPL-2.0
//! PCM conversion to the device-ready output format.
//!
//! This module wraps `FFmpeg`'s software resampler behind a thread-safe
//! handle. One conversion context is alive per [`Resampler`] at a time:
//! [`Resampler::open`] replaces any prior context, [`Resampler::close`]
//! releases it, and [`Resampler::resample`] converts one buffer under the
//! same lock, so a close can never tear a conversion mid-flight.
//!
//! Output is always packed 16-bit signed PCM; rate and channel layout come
//! from the parameters passed to `open`.

use crate::error::{Error, Result};
use crate::media::{MediaBuffer, MediaParameters, SampleFormat};
use ffmpeg_next::software::resampling;
use ffmpeg_next::{frame, ChannelLayout};
use std::sync::Mutex;

/// Fixed output sample representation.
pub const OUTPUT_FORMAT: SampleFormat = SampleFormat::S16;

/// Thread-safe PCM format converter.
///
/// Shared between the session (which opens and closes it around each media
/// source) and the host's audio decode chain (which feeds decoded buffers
/// through [`resample`](Resampler::resample) from its own thread).
#[derive(Default)]
pub struct Resampler {
    state: Mutex<ResampleState>,
}

#[derive(Default)]
struct ResampleState {
    context: Option<resampling::Context>,
    in_params: MediaParameters,
    /// Channel count used for output sizing; see the note in `open`.
    out_channels: usize,
    /// Channel count the conversion actually writes; mirrors
    /// `output_layout`.
    conv_channels: usize,
}

/// Native layout for a source channel count, so wider-than-stereo
/// sources keep every channel on the input side of the conversion.
fn source_layout(channels: u16) -> ChannelLayout {
    ChannelLayout::default(i32::from(channels))
}

/// Device-side layout of the conversion output.
/// Mono stays mono; anything else is downmixed to stereo.
fn output_layout(channels: u16) -> ChannelLayout {
    match channels {
        1 => ChannelLayout::MONO,
        _ => ChannelLayout::STEREO,
    }
}

impl Resampler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures a conversion from `in_params` to packed 16-bit PCM at
    /// `out_params`'s rate and channel layout.
    ///
    /// Any previously open context is discarded first, so a failed open
    /// leaves the resampler closed rather than half-configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resample`] if the conversion backend rejects the
    /// configuration.
    pub fn open(&self, in_params: &MediaParameters, out_params: &MediaParameters) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Resample("state lock poisoned".to_string()))?;

        state.context = None;

        let context = resampling::Context::get(
            in_params.sample_format.into(),
            source_layout(in_params.channels),
            in_params.sample_rate,
            OUTPUT_FORMAT.into(),
            output_layout(out_params.channels),
            out_params.sample_rate,
        )
        .map_err(|e| {
            log::error!("Resampler init failed: {e}");
            Error::Resample(e.to_string())
        })?;

        state.context = Some(context);
        state.in_params = *in_params;
        state.conv_channels = if out_params.channels == 1 { 1 } else { 2 };
        // NOTE: output sizing follows the *source* channel count, not the
        // requested output channel count. Kept as-is until the intended
        // behavior is settled; see DESIGN.md and the sizing test below.
        state.out_channels = usize::from(in_params.channels);
        Ok(())
    }

    /// Releases the conversion context. No-op when none is open.
    pub fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.context = None;
        }
    }

    /// Converts one PCM buffer, taking ownership of it.
    ///
    /// Returns an empty buffer when the input carries no payload, when no
    /// context is open, or when the conversion produces no samples. On
    /// success the payload length follows the sizing rule fixed at open
    /// (source channels x input frames x output sample width) even when
    /// the converter emits fewer samples on this call; the input's
    /// timestamp is carried over verbatim, resampling never alters timing.
    #[must_use]
    pub fn resample(&self, input: MediaBuffer) -> MediaBuffer {
        let Ok(mut state) = self.state.lock() else {
            return MediaBuffer::empty();
        };
        let state = &mut *state;

        if input.payload.is_empty() {
            return MediaBuffer::empty();
        }
        let Some(context) = state.context.as_mut() else {
            return MediaBuffer::empty();
        };

        let Some(input_frame) = fill_input_frame(&input.payload, &state.in_params) else {
            return MediaBuffer::empty();
        };
        let out_bytes =
            state.out_channels * input_frame.samples() * OUTPUT_FORMAT.bytes_per_sample();
        if out_bytes == 0 {
            return MediaBuffer::empty();
        }

        let mut converted = frame::Audio::empty();
        if let Err(e) = context.run(&input_frame, &mut converted) {
            log::error!("Resample failed: {e}");
            return MediaBuffer::empty();
        }

        let produced = converted.samples();
        if produced == 0 {
            return MediaBuffer::empty();
        }

        // The conversion can emit fewer samples than the sized length
        // covers (rate changes) or narrower frames (stereo downmix); the
        // tail past the written region stays zeroed.
        let written = state.conv_channels * produced * OUTPUT_FORMAT.bytes_per_sample();
        let data = converted.data(0);
        let copied = written.min(out_bytes).min(data.len());
        let mut payload = vec![0u8; out_bytes];
        payload[..copied].copy_from_slice(&data[..copied]);

        MediaBuffer::audio(payload, input.pts_ms)
    }
}

/// Builds an `FFmpeg` audio frame from an interleaved or planar payload.
///
/// Returns `None` when the payload holds less than one whole frame or a
/// planar layout is wider than the frame's direct plane array.
fn fill_input_frame(payload: &[u8], params: &MediaParameters) -> Option<frame::Audio> {
    let frame_bytes = params.frame_bytes();
    if frame_bytes == 0 {
        return None;
    }
    let samples = payload.len() / frame_bytes;
    if samples == 0 {
        return None;
    }
    // An audio frame carries at most eight direct plane pointers.
    if params.sample_format.is_planar() && params.channels > 8 {
        return None;
    }

    // The frame must carry the same layout the context was opened with or
    // the converter rejects it as a configuration change.
    let mut input = frame::Audio::new(
        params.sample_format.into(),
        samples,
        source_layout(params.channels),
    );
    input.set_rate(params.sample_rate);

    if params.sample_format.is_planar() {
        let plane_len = samples * params.sample_format.bytes_per_sample();
        let channels = usize::from(params.channels).min(input.planes());
        for ch in 0..channels {
            let src = &payload[ch * plane_len..(ch + 1) * plane_len];
            input.data_mut(ch)[..plane_len].copy_from_slice(src);
        }
    } else {
        let len = samples * frame_bytes;
        input.data_mut(0)[..len].copy_from_slice(&payload[..len]);
    }

    Some(input)
}
