//! Supervised playback: engine contract, retry policy and session driver

pub mod engine;
pub mod retry;
pub mod session;
pub mod tracks;

pub use engine::{
    event_channel, DrmRequest, EngineError, EngineErrorCode, EngineEvent, EngineEventKind,
    EngineRequest, MediaRequest, PlaybackEngine, RendererMode,
};
pub use retry::{
    Escalation, PlaybackRetryController, RetryDecision, RetryPolicy, SessionPhase, SessionState,
};
pub use session::{PlaybackSession, SessionCommand, SessionHandle, SessionReport};
pub use tracks::{
    audio_label, missing_video_override, quality_menu, video_label, GroupTrack, QualityItem, TrackFormat,
    TrackGroup, TrackKind, TrackOverride, TrackOverrides, TrackSelection,
};
