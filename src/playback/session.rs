//! Supervised playback of one encoded stream
//!
//! A [`PlaybackSession`] resolves the encoded URL once, then drives the
//! engine attempt by attempt: release the previous instance, prepare a new
//! one with the current renderer mode and User-Agent, and feed whatever the
//! engine reports into the [`PlaybackRetryController`]. Retries wait out the
//! configured delay unless the session is cancelled first.

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::engine::{
    EngineError, EngineEventKind, EngineEventReceiver, EngineRequest, MediaRequest, PlaybackEngine,
    RendererMode,
};
use super::retry::{PlaybackRetryController, RetryDecision, RetryPolicy, SessionPhase};
use super::tracks::{missing_video_override, TrackKind, TrackOverride};
use crate::config::PlaybackConfig;
use crate::errors::{PlaybackError, PlaybackResult};
use crate::models::{DrmActivation, StreamDescriptor};
use crate::streaming::{DrmConfigBuilder, StreamDescriptorResolver};

/// Requests from the UI side while a session runs
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Pin `kind` to a track, or back to Auto with `None`
    SelectTrack {
        kind: TrackKind,
        target: Option<TrackOverride>,
    },
}

/// Control side of a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cancel: CancellationToken,
    commands: mpsc::UnboundedSender<SessionCommand>,
    phase: watch::Receiver<SessionPhase>,
}

impl SessionHandle {
    /// End the session; pending retries are dropped and the engine released
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn select_track(&self, kind: TrackKind, target: Option<TrackOverride>) {
        if self
            .commands
            .send(SessionCommand::SelectTrack { kind, target })
            .is_err()
        {
            debug!("Track selection after session ended, ignoring");
        }
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.clone()
    }
}

/// Summary returned when a session ends without a terminal failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub attempts: u64,
    pub final_phase: SessionPhase,
    pub renderer_mode: RendererMode,
    pub user_agent_index: usize,
}

pub struct PlaybackSession<E: PlaybackEngine> {
    engine: E,
    events: EngineEventReceiver,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    phase_tx: watch::Sender<SessionPhase>,
    cancel: CancellationToken,
    controller: PlaybackRetryController,
    descriptor: StreamDescriptor,
    config: PlaybackConfig,
}

impl<E: PlaybackEngine> PlaybackSession<E> {
    /// Resolve `encoded_url` and set up a session around `engine`
    ///
    /// `events` must be the receiving end of the channel `engine` reports on.
    pub fn new(
        engine: E,
        events: EngineEventReceiver,
        encoded_url: &str,
        is_playlist_mode: bool,
        config: PlaybackConfig,
    ) -> PlaybackResult<(Self, SessionHandle)> {
        let descriptor = StreamDescriptorResolver::resolve(encoded_url);
        if descriptor.base_url.is_empty() {
            return Err(PlaybackError::InvalidStream {
                message: "stream URL is empty".to_string(),
            });
        }

        let controller =
            PlaybackRetryController::new(&descriptor.base_url, is_playlist_mode, RetryPolicy::from(&config))
                .with_explicit_user_agent(descriptor.has_explicit_user_agent());

        let cancel = CancellationToken::new();
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Idle);

        let handle = SessionHandle {
            cancel: cancel.clone(),
            commands: commands_tx,
            phase: phase_rx,
        };

        Ok((
            Self {
                engine,
                events,
                commands,
                phase_tx,
                cancel,
                controller,
                descriptor,
                config,
            },
            handle,
        ))
    }

    /// User-Agent for the next attempt
    ///
    /// Playlist streams walk the rotation list; direct streams use the
    /// application default. A stream-supplied User-Agent always wins at the
    /// header level.
    fn user_agent(&self) -> String {
        let state = self.controller.state();
        if state.is_playlist_mode {
            self.config
                .rotation_user_agent(state.user_agent_index)
                .to_string()
        } else {
            self.config.default_user_agent.clone()
        }
    }

    fn build_request(&self, attempt: u64) -> EngineRequest {
        let user_agent = self.user_agent();
        let headers = StreamDescriptorResolver::request_headers(&self.descriptor, &user_agent);
        let activation = DrmConfigBuilder::build(&self.descriptor, &headers);
        if let DrmActivation::HttpLicense { scheme, .. } = &activation {
            debug!("Attempt {} uses {} license server", attempt, scheme);
        }

        EngineRequest {
            attempt,
            media: MediaRequest::from_activation(&self.descriptor.base_url, &activation),
            user_agent: headers
                .get(crate::models::HEADER_USER_AGENT)
                .cloned()
                .unwrap_or(user_agent),
            headers,
            renderer_mode: self.controller.state().renderer_mode,
            connect_timeout: self.config.engine_connect_timeout,
            read_timeout: self.config.engine_read_timeout,
        }
    }

    async fn start_attempt(&mut self) -> Result<(), EngineError> {
        self.engine.release();
        let attempt = self.controller.begin_attempt();
        self.publish_phase();
        let request = self.build_request(attempt);
        self.engine.prepare(request).await
    }

    /// Start the next attempt, racing the engine's prepare against
    /// cancellation; `None` means the session was cancelled meanwhile
    async fn next_attempt(&mut self) -> Option<Option<EngineError>> {
        let cancel = self.cancel.clone();
        tokio::select! {
            biased;

            _ = cancel.cancelled() => None,
            result = self.start_attempt() => Some(result.err()),
        }
    }

    fn publish_phase(&self) {
        self.phase_tx.send_replace(self.controller.state().phase);
    }

    fn on_ready(&mut self) {
        self.controller.on_ready();
        self.publish_phase();
        info!(
            "Playback ready: '{}' (attempt {})",
            self.descriptor.base_url,
            self.controller.state().attempt
        );

        let groups = self.engine.track_groups();
        if let Some(target) = missing_video_override(&groups) {
            warn!(
                "Video track present but not selected, forcing group '{}' track {}",
                target.group_id, target.track_index
            );
            self.controller.force_video_track(target);
            let overrides = self.controller.state().track_selection.overrides();
            self.engine.apply_track_overrides(&overrides);
        }
    }

    fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SelectTrack { kind, target } => {
                let groups = self.engine.track_groups();
                self.controller.select_track(&groups, kind, target);
                let overrides = self.controller.state().track_selection.overrides();
                self.engine.apply_track_overrides(&overrides);
            }
        }
    }

    fn report(&self) -> SessionReport {
        let state = self.controller.state();
        SessionReport {
            attempts: state.attempt,
            final_phase: state.phase,
            renderer_mode: state.renderer_mode,
            user_agent_index: state.user_agent_index,
        }
    }

    fn finish(&mut self) -> SessionReport {
        self.engine.release();
        info!(
            "Playback session for '{}' ended after {} attempts",
            self.descriptor.base_url,
            self.controller.state().attempt
        );
        self.report()
    }

    /// Drive the session until it is cancelled or fails terminally
    pub async fn run(mut self) -> PlaybackResult<SessionReport> {
        if self.cancel.is_cancelled() {
            return Ok(self.finish());
        }

        let Some(mut pending) = self.next_attempt().await else {
            return Ok(self.finish());
        };

        loop {
            if let Some(err) = pending.take() {
                match self.controller.on_error(&err) {
                    RetryDecision::Abort(failure) => {
                        self.engine.release();
                        self.publish_phase();
                        error!("{}", failure.user_message());
                        return Err(failure);
                    }
                    RetryDecision::Retry { delay, .. } => {
                        self.publish_phase();
                        tokio::select! {
                            _ = self.cancel.cancelled() => return Ok(self.finish()),
                            _ = tokio::time::sleep(delay) => {}
                        }
                        match self.next_attempt().await {
                            Some(err) => pending = err,
                            None => return Ok(self.finish()),
                        }
                        continue;
                    }
                }
            }

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Ok(self.finish()),

                Some(command) = self.commands.recv() => self.on_command(command),

                event = self.events.recv() => {
                    let Some(event) = event else {
                        self.engine.release();
                        return Err(PlaybackError::EngineUnavailable {
                            message: "engine event channel closed".to_string(),
                        });
                    };
                    let current = self.controller.state().attempt;
                    if event.attempt != current {
                        debug!("Dropping stale event from attempt {} (current {})", event.attempt, current);
                        continue;
                    }
                    match event.kind {
                        EngineEventKind::Ready => self.on_ready(),
                        EngineEventKind::TracksChanged => {
                            debug!("Tracks changed on attempt {}", current);
                        }
                        EngineEventKind::Error(err) => pending = Some(err),
                    }
                }
            }
        }
    }
}
