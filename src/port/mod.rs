// SPDX-License-Identifier: MPL-2.0
//! Collaborator contracts (traits) consumed by the playback core.
//!
//! The engine orchestrates demuxing, decoding, audio output, and video
//! presentation without depending on any concrete backend. Hosts inject
//! implementations of these traits when constructing a [`crate::session::Player`].
//!
//! # Available Ports
//!
//! - [`demux`]: container demuxing and packet delivery
//! - [`decode`]: audio/video decoding with an audio-master sync target
//! - [`audio`]: device audio output sink
//! - [`view`]: video presentation onto a host window
//!
//! # Design Notes
//!
//! - All traits use engine types only ([`crate::media`]); no codec or
//!   device handles leak through
//! - [`Demuxer`] and [`Decoder`] are `Send` but not `Sync`: the session
//!   owns them exclusively and serializes access under its own lock
//! - [`AudioSink`] and [`VideoView`] are `Send + Sync`: the host's decode
//!   chain pushes into them from its own threads while the session reads
//!   positions and propagates pause flags

pub mod audio;
pub mod decode;
pub mod demux;
pub mod view;

// Re-export main types for convenience
pub use audio::AudioSink;
pub use decode::Decoder;
pub use demux::Demuxer;
pub use view::{RenderWindow, SharedWindow, VideoView};
