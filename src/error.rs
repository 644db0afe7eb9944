//! Error types for Soundstage

use crate::session::SoundId;
use thiserror::Error;

/// Failure reported by an audio backend.
///
/// Every variant carries a stable numeric [`code`](BackendError::code) so host
/// logs keep the "engine error! (code) message" shape regardless of which
/// backend is plugged in.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Engine not initialized")]
    NotInitialized,

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Audio format error: {0}")]
    Format(String),

    #[error("Output device error: {0}")]
    Output(String),

    #[error("Channel limit reached ({0} channels)")]
    ChannelLimit(u32),

    #[error("DSP error: {0}")]
    Dsp(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BackendError {
    pub fn code(&self) -> i32 {
        match self {
            Self::NotInitialized => 1,
            Self::InvalidHandle(_) => 2,
            Self::FileNotFound(_) => 3,
            Self::Format(_) => 4,
            Self::Output(_) => 5,
            Self::ChannelLimit(_) => 6,
            Self::Dsp(_) => 7,
            Self::Configuration(_) => 8,
        }
    }
}

#[derive(Error, Debug)]
pub enum SoundstageError {
    #[error("Engine error ({}): {0}", .0.code())]
    Backend(#[from] BackendError),

    #[error("Failed to load sound '{path}': {source}")]
    SoundLoad {
        path: String,
        #[source]
        source: BackendError,
    },

    #[error("Sound {0} has no active channel")]
    NoActiveChannel(SoundId),

    #[error("Unknown sound {0}")]
    UnknownSound(SoundId),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Global session is already in use on this thread")]
    SessionBusy,
}

pub type Result<T> = std::result::Result<T, SoundstageError>;
