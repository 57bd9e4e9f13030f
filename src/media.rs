// SPDX-License-Identifier: MPL-2.0
//! Core media types shared by every pipeline stage.
//!
//! These are pure data: stream parameters queried from the demuxer, the
//! owned buffers that travel between stages, and the plane layouts the
//! presentation pipeline understands.

use ffmpeg_next::format::sample::Type as SampleType;
use ffmpeg_next::format::Sample;

/// PCM sample representation of an audio stream.
///
/// Packed variants interleave channels in one plane; planar variants carry
/// one plane per channel, concatenated in channel order inside a
/// [`MediaBuffer`] payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    U8,
    #[default]
    S16,
    S32,
    F32,
    F64,
    U8Planar,
    S16Planar,
    S32Planar,
    F32Planar,
    F64Planar,
}

impl SampleFormat {
    /// Returns the width of one sample of one channel, in bytes.
    #[must_use]
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 | SampleFormat::U8Planar => 1,
            SampleFormat::S16 | SampleFormat::S16Planar => 2,
            SampleFormat::S32 | SampleFormat::F32 | SampleFormat::S32Planar
            | SampleFormat::F32Planar => 4,
            SampleFormat::F64 | SampleFormat::F64Planar => 8,
        }
    }

    /// Returns true when each channel occupies its own plane.
    #[must_use]
    pub fn is_planar(self) -> bool {
        matches!(
            self,
            SampleFormat::U8Planar
                | SampleFormat::S16Planar
                | SampleFormat::S32Planar
                | SampleFormat::F32Planar
                | SampleFormat::F64Planar
        )
    }
}

impl From<SampleFormat> for Sample {
    fn from(format: SampleFormat) -> Self {
        match format {
            SampleFormat::U8 => Sample::U8(SampleType::Packed),
            SampleFormat::S16 => Sample::I16(SampleType::Packed),
            SampleFormat::S32 => Sample::I32(SampleType::Packed),
            SampleFormat::F32 => Sample::F32(SampleType::Packed),
            SampleFormat::F64 => Sample::F64(SampleType::Packed),
            SampleFormat::U8Planar => Sample::U8(SampleType::Planar),
            SampleFormat::S16Planar => Sample::I16(SampleType::Planar),
            SampleFormat::S32Planar => Sample::I32(SampleType::Planar),
            SampleFormat::F32Planar => Sample::F32(SampleType::Planar),
            SampleFormat::F64Planar => Sample::F64(SampleType::Planar),
        }
    }
}

/// Chroma-subsampled plane layout of a decoded video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaLayout {
    /// Three independent single-channel planes: Y, U, V (4:2:0).
    Yuv420p,
    /// One luma plane plus one interleaved chroma plane in U-then-V order.
    Nv12,
    /// One luma plane plus one interleaved chroma plane in V-then-U order.
    Nv21,
}

impl ChromaLayout {
    /// Number of planes a frame in this layout carries.
    #[must_use]
    pub fn plane_count(self) -> usize {
        match self {
            ChromaLayout::Yuv420p => 3,
            ChromaLayout::Nv12 | ChromaLayout::Nv21 => 2,
        }
    }

    /// Returns true for the semi-planar layouts, whose single chroma plane
    /// interleaves two channels.
    #[must_use]
    pub fn has_interleaved_chroma(self) -> bool {
        matches!(self, ChromaLayout::Nv12 | ChromaLayout::Nv21)
    }
}

/// Stream parameters queried from the demuxer.
///
/// Immutable once queried for a given open; a new open queries fresh
/// parameters. `total_duration_ms` is meaningful at the demux level only
/// and is zero on per-stream parameter sets that do not carry it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MediaParameters {
    /// Samples per second per channel.
    pub sample_rate: u32,
    /// Channel count of the stream.
    pub channels: u16,
    /// PCM representation of the stream's samples.
    pub sample_format: SampleFormat,
    /// Container duration in milliseconds (demux-level only).
    pub total_duration_ms: i64,
}

impl MediaParameters {
    /// Size in bytes of one interleaved frame (one sample per channel).
    #[must_use]
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * self.sample_format.bytes_per_sample()
    }
}

/// Planes of one decoded video frame.
///
/// Planes are tightly packed (no row padding). Unused plane slots are
/// empty vectors: semi-planar frames fill slots 0 and 1 only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlanes {
    pub planes: [Vec<u8>; 3],
    /// Luma width in pixels.
    pub width: u32,
    /// Luma height in pixels.
    pub height: u32,
    pub layout: ChromaLayout,
}

impl FramePlanes {
    /// Chroma plane width in pixels (half the luma width, rounded up).
    #[must_use]
    pub fn chroma_width(&self) -> u32 {
        self.width.div_ceil(2)
    }

    /// Chroma plane height in pixels (half the luma height, rounded up).
    #[must_use]
    pub fn chroma_height(&self) -> u32 {
        self.height.div_ceil(2)
    }
}

/// Owned payload passed between pipeline stages.
///
/// One type serves demux packets, resampled PCM, and decoded video frames;
/// decoded frames carry their planes in `frame` while the other stages use
/// `payload`. Ownership transfers by move and the payload is released by
/// `Drop` on whichever path consumes it. An empty buffer signals "no data"
/// (end of stream, starved queue) and is never an error by itself.
#[derive(Debug, Clone, Default)]
pub struct MediaBuffer {
    /// Packet bytes or interleaved PCM, depending on the producing stage.
    pub payload: Vec<u8>,
    /// Presentation timestamp in milliseconds, monotonic within a stream.
    pub pts_ms: i64,
    /// True for audio packets and PCM buffers.
    pub is_audio: bool,
    /// Plane data, present on decoded video frames only.
    pub frame: Option<FramePlanes>,
}

impl MediaBuffer {
    /// The "no data" sentinel.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A demux packet.
    #[must_use]
    pub fn packet(payload: Vec<u8>, pts_ms: i64, is_audio: bool) -> Self {
        Self {
            payload,
            pts_ms,
            is_audio,
            frame: None,
        }
    }

    /// An interleaved PCM buffer.
    #[must_use]
    pub fn audio(payload: Vec<u8>, pts_ms: i64) -> Self {
        Self::packet(payload, pts_ms, true)
    }

    /// A decoded video frame.
    #[must_use]
    pub fn video_frame(frame: FramePlanes, pts_ms: i64) -> Self {
        Self {
            payload: Vec::new(),
            pts_ms,
            is_audio: false,
            frame: Some(frame),
        }
    }

    /// True when this buffer carries no packet bytes and no frame planes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty() && self.frame.is_none()
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }
}
