//! Per-session retry state machine
//!
//! ```text
//! Idle ─▶ Initializing ─▶ Ready
//!              │  ▲          │
//!              ▼  │ (delay)  │ error
//!            Failed ◀────────┘
//!              │
//!              ▼
//!           Aborted
//! ```
//!
//! Each engine error is classified with a strict priority: renderer
//! fallback first, then User-Agent rotation for playlist streams, then a
//! one-off combined fallback on the very first failure. Anything left is
//! terminal.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::engine::{EngineError, RendererMode};
use super::tracks::{TrackGroup, TrackKind, TrackOverride, TrackSelection};
use crate::config::PlaybackConfig;
use crate::errors::PlaybackError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    #[default]
    Idle,
    Initializing,
    Ready,
    Failed,
    Aborted,
}

/// Mutable state of one playback session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub renderer_mode: RendererMode,
    pub user_agent_index: usize,
    pub current_stream_url: String,
    pub is_playlist_mode: bool,
    pub phase: SessionPhase,
    pub attempt: u64,
    pub track_selection: TrackSelection,
}

/// Which knob the next attempt turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
    RendererFallback,
    UserAgentRotation,
    FirstFailureFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    Retry {
        escalation: Escalation,
        delay: Duration,
    },
    Abort(PlaybackError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_delay: Duration,
    pub rotation_len: usize,
}

impl From<&PlaybackConfig> for RetryPolicy {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            retry_delay: config.retry_delay,
            rotation_len: config.user_agent_rotation.len(),
        }
    }
}

/// Sole owner of [`SessionState`]
#[derive(Debug)]
pub struct PlaybackRetryController {
    state: SessionState,
    policy: RetryPolicy,
    explicit_user_agent: bool,
}

impl PlaybackRetryController {
    pub fn new(stream_url: impl Into<String>, is_playlist_mode: bool, policy: RetryPolicy) -> Self {
        Self {
            state: SessionState {
                current_stream_url: stream_url.into(),
                is_playlist_mode,
                ..Default::default()
            },
            policy,
            explicit_user_agent: false,
        }
    }

    /// Record whether the resolved stream headers already carry a User-Agent;
    /// such streams are never rotated
    pub fn with_explicit_user_agent(mut self, explicit: bool) -> Self {
        self.explicit_user_agent = explicit;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Enter Initializing for a new attempt and return its number
    pub fn begin_attempt(&mut self) -> u64 {
        self.state.attempt += 1;
        self.state.phase = SessionPhase::Initializing;
        debug!(
            "Attempt {} for '{}' (renderer={:?}, ua_index={})",
            self.state.attempt,
            self.state.current_stream_url,
            self.state.renderer_mode,
            self.state.user_agent_index
        );
        self.state.attempt
    }

    /// Playback reached Ready: escalations start over
    pub fn on_ready(&mut self) {
        if self.state.renderer_mode != RendererMode::Hardware || self.state.user_agent_index != 0 {
            info!(
                "Playback ready after fallback (renderer={:?}, ua_index={}), resetting",
                self.state.renderer_mode, self.state.user_agent_index
            );
        }
        self.state.phase = SessionPhase::Ready;
        self.state.renderer_mode = RendererMode::Hardware;
        self.state.user_agent_index = 0;
    }

    pub fn on_error(&mut self, err: &EngineError) -> RetryDecision {
        if self.state.phase == SessionPhase::Aborted {
            return RetryDecision::Abort(PlaybackError::terminal(&err.message));
        }
        self.state.phase = SessionPhase::Failed;

        let Some(escalation) = self.escalate(err) else {
            error!(
                "Playback of '{}' failed after {} attempts: {}",
                self.state.current_stream_url, self.state.attempt, err
            );
            self.state.phase = SessionPhase::Aborted;
            return RetryDecision::Abort(PlaybackError::terminal(&err.message));
        };

        warn!(
            "Playback error '{}', retrying with {:?} → renderer={:?}, ua_index={}",
            err, escalation, self.state.renderer_mode, self.state.user_agent_index
        );
        RetryDecision::Retry {
            escalation,
            delay: self.policy.retry_delay,
        }
    }

    fn escalate(&mut self, err: &EngineError) -> Option<Escalation> {
        let state = &mut self.state;

        if err.code.is_renderer_failure() {
            if let Some(next) = state.renderer_mode.escalate() {
                state.renderer_mode = next;
                return Some(Escalation::RendererFallback);
            }
        }

        if state.is_playlist_mode
            && !self.explicit_user_agent
            && state.user_agent_index + 1 < self.policy.rotation_len
        {
            state.user_agent_index += 1;
            return Some(Escalation::UserAgentRotation);
        }

        if state.renderer_mode == RendererMode::Hardware && state.user_agent_index == 0 {
            state.renderer_mode = RendererMode::PreferSoftware;
            if state.is_playlist_mode && self.policy.rotation_len > 1 {
                state.user_agent_index = 1;
            }
            return Some(Escalation::FirstFailureFallback);
        }

        None
    }

    /// Manual track choice; the other kind's choice is kept
    pub fn select_track(&mut self, groups: &[TrackGroup], kind: TrackKind, target: Option<TrackOverride>) {
        self.state.track_selection.select(groups, kind, target);
    }

    pub fn force_video_track(&mut self, target: TrackOverride) {
        self.state.track_selection.set_forced_video(target);
    }
}
