//! Session driver against a scripted engine

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_test::{assert_err, assert_ok};

use streamtv_core::config::PlaybackConfig;
use streamtv_core::errors::PlaybackError;
use streamtv_core::playback::{
    event_channel, EngineError, EngineErrorCode, EngineEvent, EngineEventKind, EngineRequest,
    PlaybackEngine, PlaybackSession, RendererMode, SessionPhase, TrackGroup, TrackOverrides,
};

type Requests = Arc<Mutex<Vec<EngineRequest>>>;

struct FlakyEngine {
    events: tokio::sync::mpsc::UnboundedSender<EngineEvent>,
    script: VecDeque<EngineEventKind>,
    requests: Requests,
}

#[async_trait]
impl PlaybackEngine for FlakyEngine {
    async fn prepare(&mut self, request: EngineRequest) -> Result<(), EngineError> {
        let attempt = request.attempt;
        self.requests.lock().unwrap().push(request);
        match self.script.pop_front() {
            Some(kind) => {
                let _ = self.events.send(EngineEvent { attempt, kind });
                Ok(())
            }
            None => Err(EngineError::new(EngineErrorCode::Unspecified, "engine gave up")),
        }
    }

    fn release(&mut self) {}

    fn track_groups(&self) -> Vec<TrackGroup> {
        Vec::new()
    }

    fn apply_track_overrides(&mut self, _overrides: &TrackOverrides) {}
}

fn start(
    encoded: &str,
    playlist: bool,
    script: Vec<EngineEventKind>,
) -> (
    PlaybackSession<FlakyEngine>,
    streamtv_core::playback::SessionHandle,
    Requests,
) {
    let (tx, rx) = event_channel();
    let requests = Requests::default();
    let engine = FlakyEngine {
        events: tx,
        script: script.into(),
        requests: requests.clone(),
    };
    let (session, handle) = assert_ok!(PlaybackSession::new(
        engine,
        rx,
        encoded,
        playlist,
        PlaybackConfig::default()
    ));
    (session, handle, requests)
}

#[tokio::test(start_paused = true)]
async fn test_first_failure_switches_renderer_and_user_agent() {
    let forbidden = EngineEventKind::Error(EngineError::new(
        EngineErrorCode::BadHttpStatus(403),
        "Response code: 403",
    ));
    let (session, handle, requests) = start(
        "https://cdn.example.com/live.m3u8|User-Agent=Pinned/1.0",
        true,
        vec![forbidden, EngineEventKind::Ready],
    );

    let task = tokio::spawn(session.run());
    let mut phase = handle.subscribe_phase();
    assert_ok!(phase.wait_for(|p| *p == SessionPhase::Ready).await);
    handle.cancel();
    let report = assert_ok!(task.await.unwrap());
    assert_eq!(report.attempts, 2);

    let requests = requests.lock().unwrap();
    assert_eq!(requests[1].renderer_mode, RendererMode::PreferSoftware);
    // The stream's own User-Agent always reaches the engine
    assert!(requests.iter().all(|r| r.user_agent == "Pinned/1.0"));
}

#[tokio::test(start_paused = true)]
async fn test_prepare_failures_end_in_terminal_error() {
    let (session, _handle, requests) = start("https://cdn.example.com/live.m3u8", false, vec![]);

    let err = assert_err!(session.run().await);
    assert_eq!(err, PlaybackError::terminal("engine gave up"));
    assert_eq!(err.user_message(), "Playback failed: engine gave up");
    // First failure falls back once, then nothing is left to try
    assert_eq!(requests.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_waits_configured_delay() {
    let decoder = EngineEventKind::Error(EngineError::new(EngineErrorCode::DecoderInitFailed, "init"));
    let (session, handle, requests) = start(
        "https://cdn.example.com/live.m3u8",
        false,
        vec![decoder, EngineEventKind::Ready],
    );

    let started = tokio::time::Instant::now();
    let task = tokio::spawn(session.run());
    let mut phase = handle.subscribe_phase();
    assert_ok!(phase.wait_for(|p| *p == SessionPhase::Ready).await);
    assert!(started.elapsed() >= PlaybackConfig::default().retry_delay);

    handle.cancel();
    assert_ok!(task.await.unwrap());
    assert_eq!(requests.lock().unwrap().len(), 2);
}
