// SPDX-License-Identifier: MPL-2.0
//! Engine tunables, loadable from a TOML file.
//!
//! The engine never picks a config location itself; hosts that persist
//! settings pass explicit paths. Missing or malformed files fall back to
//! defaults so a damaged settings file never blocks playback.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default sync-loop tick in milliseconds.
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 2;
/// Default bound on queued PCM buffers in the audio sink.
pub const DEFAULT_AUDIO_QUEUE_BUFFERS: usize = 64;
/// Default playback volume (1.0 = unity gain).
pub const DEFAULT_VOLUME: f32 = 1.0;
/// Upper volume bound (slider amplification ceiling).
pub const MAX_VOLUME: f32 = 1.5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ask video decoders for a hardware-accelerated path when available.
    pub prefer_hardware_decode: bool,
    /// Tick interval of the audio-master sync loop, in milliseconds.
    pub sync_interval_ms: u64,
    /// Maximum number of PCM buffers the audio sink queues before dropping.
    pub audio_queue_buffers: usize,
    /// Initial playback volume in `[0.0, 1.5]`.
    pub volume: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prefer_hardware_decode: false,
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
            audio_queue_buffers: DEFAULT_AUDIO_QUEUE_BUFFERS,
            volume: DEFAULT_VOLUME,
        }
    }
}

impl EngineConfig {
    /// Returns a copy with out-of-range values pulled back into bounds.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.sync_interval_ms = self.sync_interval_ms.max(1);
        self.audio_queue_buffers = self.audio_queue_buffers.max(1);
        self.volume = self.volume.clamp(0.0, MAX_VOLUME);
        self
    }
}

/// Loads a config from `path`; malformed TOML yields the defaults.
pub fn load_from_path(path: &Path) -> Result<EngineConfig> {
    let content = fs::read_to_string(path)?;
    let config: EngineConfig = toml::from_str(&content).unwrap_or_default();
    Ok(config.sanitized())
}

/// Saves `config` to `path`, creating parent directories as needed.
pub fn save_to_path(config: &EngineConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}
