//! Contract between a playback session and the media engine that renders it
//!
//! The engine is driven through [`PlaybackEngine`] and reports back through
//! an unbounded channel of [`EngineEvent`]s. Every event is stamped with the
//! attempt that produced it so the session can drop events coming from an
//! instance it already released.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::tracks::{TrackGroup, TrackOverrides};
use crate::models::{DrmActivation, DrmScheme, HeaderMap};

/// Decoder preference handed to the engine; only escalates within a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererMode {
    #[default]
    Hardware = 0,
    PreferSoftware = 1,
    ForceSoftware = 2,
}

impl RendererMode {
    /// Next, more conservative mode; `None` once software decoding is forced
    pub fn escalate(self) -> Option<Self> {
        match self {
            Self::Hardware => Some(Self::PreferSoftware),
            Self::PreferSoftware => Some(Self::ForceSoftware),
            Self::ForceSoftware => None,
        }
    }

    pub fn as_index(self) -> u8 {
        self as u8
    }
}

/// DRM part of a media request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrmRequest {
    pub scheme: DrmScheme,
    pub system_id: Option<Uuid>,
    /// License server; `None` for locally delivered keys
    pub license_uri: Option<String>,
    pub license_headers: HeaderMap,
    /// ClearKey key set answered locally instead of hitting a server
    pub local_keys_json: Option<String>,
}

/// What the engine should open
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRequest {
    pub uri: String,
    pub drm: Option<DrmRequest>,
}

impl MediaRequest {
    pub fn from_activation(base_url: &str, activation: &DrmActivation) -> Self {
        let drm = match activation {
            DrmActivation::None => None,
            DrmActivation::HttpLicense {
                scheme,
                uri,
                headers,
            } => Some(DrmRequest {
                scheme: scheme.clone(),
                system_id: scheme.system_id(),
                license_uri: Some(uri.clone()),
                license_headers: headers.clone(),
                local_keys_json: None,
            }),
            // The scheme is still announced; without it the engine never
            // initializes a decryption session and video stays black.
            DrmActivation::InlineClearKey { keys_json } => Some(DrmRequest {
                scheme: DrmScheme::ClearKey,
                system_id: DrmScheme::ClearKey.system_id(),
                license_uri: None,
                license_headers: HeaderMap::new(),
                local_keys_json: Some(keys_json.clone()),
            }),
        };

        Self {
            uri: base_url.to_string(),
            drm,
        }
    }
}

/// Everything one prepare call needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineRequest {
    pub attempt: u64,
    pub media: MediaRequest,
    pub headers: HeaderMap,
    pub user_agent: String,
    pub renderer_mode: RendererMode,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorCode {
    DecoderInitFailed,
    DecoderQueryFailed,
    DecodingFailed,
    DecodingFormatExceedsCapabilities,
    DecodingFormatUnsupported,
    VideoFrameProcessingFailed,
    NetworkConnectionFailed,
    NetworkTimeout,
    BadHttpStatus(u16),
    ParsingManifestMalformed,
    ParsingContainerUnsupported,
    DrmLicenseAcquisitionFailed,
    DrmSystemError,
    Unspecified,
}

impl EngineErrorCode {
    /// Errors a different decoder may get past
    pub fn is_renderer_failure(&self) -> bool {
        matches!(
            self,
            Self::DecoderInitFailed
                | Self::DecoderQueryFailed
                | Self::DecodingFailed
                | Self::DecodingFormatExceedsCapabilities
                | Self::DecodingFormatUnsupported
                | Self::VideoFrameProcessingFailed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({code:?})")]
pub struct EngineError {
    pub code: EngineErrorCode,
    pub message: String,
}

impl EngineError {
    pub fn new(code: EngineErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    Ready,
    TracksChanged,
    Error(EngineError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub attempt: u64,
    pub kind: EngineEventKind,
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Channel pair an engine implementation reports through
pub fn event_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}

/// Media engine driven by a [`super::session::PlaybackSession`]
#[async_trait]
pub trait PlaybackEngine: Send {
    /// Open `request.media` and start playing
    ///
    /// An `Err` is treated like an error event for the same attempt.
    async fn prepare(&mut self, request: EngineRequest) -> Result<(), EngineError>;

    /// Tear down the current instance; safe to call when nothing is prepared
    fn release(&mut self);

    fn track_groups(&self) -> Vec<TrackGroup>;

    fn apply_track_overrides(&mut self, overrides: &TrackOverrides);
}
