// SPDX-License-Identifier: MPL-2.0
//! `playhead` is a media-playback engine core: session orchestration with
//! an audio-master synchronization loop, audio resampling to device-ready
//! PCM, and a GPU presentation pipeline for decoded video frames.
//!
//! Demuxing and codec decoding stay outside the crate behind the trait
//! contracts in [`port`]; the crate ships working audio output and window
//! presentation adapters for the output side.

#![doc(html_root_url = "https://docs.rs/playhead/0.1.0")]

pub mod audio;
pub mod config;
pub mod error;
pub mod media;
pub mod port;
pub mod render;
pub mod resample;
pub mod session;
