// SPDX-License-Identifier: MPL-2.0
use std::fmt;

/// Engine-wide error type.
///
/// Fatal conditions (a demuxer that will not open, a graphics device that
/// cannot be acquired) surface as `Err`; "no data" on the media path is a
/// sentinel ([`crate::media::MediaBuffer::empty`]), never an error.
#[derive(Debug, Clone)]
pub enum Error {
    /// A collaborator failed to open (source unavailable, bad configuration).
    Open(String),
    /// A seek request could not be satisfied by the demuxer.
    Seek(String),
    /// The audio conversion backend rejected a configuration or conversion.
    Resample(String),
    /// Graphics context, surface, or pipeline acquisition failed.
    Graphics(String),
    /// Audio device or stream failure.
    Audio(String),
    /// Configuration could not be read or written.
    Config(String),
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Open(e) => write!(f, "Open Error: {}", e),
            Error::Seek(e) => write!(f, "Seek Error: {}", e),
            Error::Resample(e) => write!(f, "Resample Error: {}", e),
            Error::Graphics(e) => write!(f, "Graphics Error: {}", e),
            Error::Audio(e) => write!(f, "Audio Error: {}", e),
            Error::Config(e) => write!(f, "Config Error: {}", e),
            Error::Io(e) => write!(f, "I/O Error: {}", e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<ffmpeg_next::Error> for Error {
    fn from(err: ffmpeg_next::Error) -> Self {
        Error::Resample(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
