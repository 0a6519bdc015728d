//! Error type definitions for StreamTV
//!
//! This module defines the error hierarchy used throughout the crate.

use thiserror::Error;

/// Library store (playlists and favorites) errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Reading or writing the backing file failed
    #[error("Storage I/O failed: {path} - {message}")]
    Io { path: String, message: String },

    /// Stored document could not be (de)serialized
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Playlist source errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network connection timeouts
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// HTTP errors from the playlist host
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Transport failure before any status was received
    #[error("Request failed: {url} - {message}")]
    Request { url: String, message: String },

    /// Local playlist file could not be read
    #[error("Read failed: {path} - {message}")]
    Read { path: String, message: String },
}

/// Playback session errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// Every escalation was exhausted; the message is the engine's own
    #[error("Playback failed: {message}")]
    Terminal { message: String },

    /// The engine could not be prepared at all
    #[error("Engine unavailable: {message}")]
    EngineUnavailable { message: String },

    /// The stream reference has no usable base URL
    #[error("Invalid stream: {message}")]
    InvalidStream { message: String },
}

impl RepositoryError {
    pub fn io<P: Into<String>>(path: P, error: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

impl SourceError {
    /// Map a reqwest failure for `url` onto the source taxonomy
    pub fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Timeout {
                url: url.to_string(),
            };
        }
        match error.status() {
            Some(status) => Self::Http {
                status: status.as_u16(),
                message: error.to_string(),
            },
            None => Self::Request {
                url: url.to_string(),
                message: error.to_string(),
            },
        }
    }
}

impl PlaybackError {
    pub fn terminal<S: Into<String>>(message: S) -> Self {
        Self::Terminal {
            message: message.into(),
        }
    }

    /// Text shown to the user when the session gives up
    pub fn user_message(&self) -> String {
        match self {
            Self::Terminal { message } => format!("Playback failed: {message}"),
            Self::EngineUnavailable { message } => format!("Error: {message}"),
            Self::InvalidStream { .. } => "Invalid stream URL".to_string(),
        }
    }
}
