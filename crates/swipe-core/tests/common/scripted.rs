//! In-memory backend and audio sink for driving `SwipeCore` end to end.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use swipe_core::client::{ApiError, Backend};
use swipe_core::config::Config;
use swipe_core::core::{Command, CoreEvent, Notice, Snapshot, SwipeCore, EVENT_CHANNEL_CAPACITY};
use swipe_core::playback::{AudioSink, SinkError, SinkEvent, SinkEventKind};
use swipe_core::protocol::{
    CandidateSong, CardMedia, ScoredSong, SessionId, StartSessionRequest, SwipeDecision,
    SwipeRequest, TrackId, UserProfile,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;

pub fn songs(prefix: &str, n: usize) -> Vec<CandidateSong> {
    (0..n)
        .map(|i| CandidateSong {
            track_id: TrackId(format!("{}{}", prefix, i)),
            name: format!("Track {}", i),
            artists: "Various".into(),
            genre: "pop".into(),
        })
        .collect()
}

pub fn scored(prefix: &str, n: usize) -> Vec<ScoredSong> {
    songs(prefix, n)
        .into_iter()
        .enumerate()
        .map(|(i, song)| ScoredSong {
            song,
            energy: 0.1 * i as f64,
            popularity: 50.0 + i as f64,
            danceability: 0.5,
        })
        .collect()
}

pub fn media_with_preview(id: &str) -> CardMedia {
    CardMedia {
        image: Some(format!("https://img.example/{}.jpg", id)),
        preview_url: Some(format!("https://preview.example/{}.mp3", id)),
        ..CardMedia::default()
    }
}

#[derive(Debug, Clone)]
pub struct Script {
    pub genres: Vec<String>,
    pub songs: Vec<CandidateSong>,
    /// Missing entries answer with all-null media.
    pub media: HashMap<String, CardMedia>,
    pub media_delay: HashMap<String, Duration>,
    /// `None` answers with a 500.
    pub recommendations: Option<Vec<ScoredSong>>,
    /// The first N swipe calls fail.
    pub commit_failures: usize,
    /// Swipe calls never answer.
    pub hang_commits: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            genres: vec!["jazz".into(), "pop".into(), "rock".into()],
            songs: songs("t", 3),
            media: HashMap::new(),
            media_delay: HashMap::new(),
            recommendations: Some(scored("r", 3)),
            commit_failures: 0,
            hang_commits: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Genres,
    Register(UserProfile),
    Start(StartSessionRequest),
    Media(TrackId),
    Swipe(SwipeRequest),
    Recommendations(SessionId),
}

pub struct ScriptedBackend {
    script: Mutex<Script>,
    calls: Mutex<Vec<BackendCall>>,
}

impl ScriptedBackend {
    pub fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn swipes(&self) -> Vec<SwipeRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Swipe(req) => Some(req),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn list_genres(&self) -> Result<Vec<String>, ApiError> {
        self.record(BackendCall::Genres);
        Ok(self.script.lock().unwrap().genres.clone())
    }

    async fn register(&self, profile: &UserProfile) -> Result<SessionId, ApiError> {
        self.record(BackendCall::Register(profile.clone()));
        Ok(SessionId("session-42".into()))
    }

    async fn start_session(
        &self,
        request: &StartSessionRequest,
    ) -> Result<Vec<CandidateSong>, ApiError> {
        self.record(BackendCall::Start(request.clone()));
        Ok(self.script.lock().unwrap().songs.clone())
    }

    async fn card_media(&self, track_id: &TrackId) -> Result<CardMedia, ApiError> {
        self.record(BackendCall::Media(track_id.clone()));
        let (delay, media) = {
            let script = self.script.lock().unwrap();
            (
                script.media_delay.get(&track_id.0).copied(),
                script.media.get(&track_id.0).cloned().unwrap_or_default(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(media)
    }

    async fn commit_swipe(&self, decision: &SwipeDecision) -> Result<(), ApiError> {
        self.record(BackendCall::Swipe(decision.to_request()));
        let hang = {
            let mut script = self.script.lock().unwrap();
            if script.commit_failures > 0 {
                script.commit_failures -= 1;
                return Err(ApiError::Transport("connection reset".into()));
            }
            script.hang_commits
        };
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn recommendations(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ScoredSong>, ApiError> {
        self.record(BackendCall::Recommendations(session_id.clone()));
        match self.script.lock().unwrap().recommendations.clone() {
            Some(list) => Ok(list),
            None => Err(ApiError::Status {
                status: 500,
                message: "model unavailable".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Load(String),
    Play,
    Pause,
    Volume(f32),
    Muted(bool),
    Rewind,
    Stop,
}

/// Records every call and reports `Ready` right after each load.
#[derive(Clone)]
pub struct RecordingSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
    events: mpsc::Sender<CoreEvent>,
}

impl RecordingSink {
    pub fn new(events: mpsc::Sender<CoreEvent>) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: SinkCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn load(&mut self, generation: u64, url: &str, _volume: f32) -> Result<(), SinkError> {
        self.record(SinkCall::Load(url.to_string()));
        let _ = self.events.try_send(CoreEvent::Sink(SinkEvent {
            generation,
            kind: SinkEventKind::Ready,
        }));
        Ok(())
    }

    async fn play(&mut self) -> Result<(), SinkError> {
        self.record(SinkCall::Play);
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), SinkError> {
        self.record(SinkCall::Pause);
        Ok(())
    }

    async fn set_volume(&mut self, volume: f32) -> Result<(), SinkError> {
        self.record(SinkCall::Volume(volume));
        Ok(())
    }

    async fn set_muted(&mut self, muted: bool) -> Result<(), SinkError> {
        self.record(SinkCall::Muted(muted));
        Ok(())
    }

    async fn rewind(&mut self) -> Result<(), SinkError> {
        self.record(SinkCall::Rewind);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SinkError> {
        self.record(SinkCall::Stop);
        Ok(())
    }
}

/// True if some `Load` happened while an earlier source was still playing.
pub fn overlapping_playback(calls: &[SinkCall]) -> bool {
    let mut audible = false;
    for call in calls {
        match call {
            SinkCall::Load(_) if audible => return true,
            SinkCall::Play => audible = true,
            SinkCall::Stop | SinkCall::Pause => audible = false,
            _ => {}
        }
    }
    false
}

pub struct Harness {
    pub tx: mpsc::Sender<CoreEvent>,
    pub snapshots: watch::Receiver<Snapshot>,
    pub notices: broadcast::Receiver<Notice>,
    pub backend: Arc<ScriptedBackend>,
    pub sink: RecordingSink,
}

impl Harness {
    pub fn start(script: Script) -> Self {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let backend = Arc::new(ScriptedBackend::new(script));
        let sink = RecordingSink::new(tx.clone());
        let core = SwipeCore::new(
            Config::default(),
            backend.clone(),
            Box::new(sink.clone()),
            tx.clone(),
        );
        let snapshots = core.subscribe();
        let notices = core.notices();
        tokio::spawn(core.run(rx));
        Self {
            tx,
            snapshots,
            notices,
            backend,
            sink,
        }
    }

    pub async fn send(&self, cmd: Command) {
        self.tx
            .send(CoreEvent::Command(cmd))
            .await
            .expect("core should be running");
    }

    pub async fn wait_for<F>(&mut self, what: &str, pred: F) -> Snapshot
    where
        F: Fn(&Snapshot) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(120);
        loop {
            let snap = self.snapshots.borrow_and_update().clone();
            if pred(&snap) {
                return snap;
            }
            match tokio::time::timeout_at(deadline, self.snapshots.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => panic!("core stopped while waiting for {what}"),
                Err(_) => panic!("timed out waiting for {what}; last snapshot: {snap:?}"),
            }
        }
    }

    pub async fn register_and_start(&mut self, genres: &[&str]) -> Snapshot {
        self.send(Command::Register {
            name: "Ana".into(),
            email: "ana@example.com".into(),
        })
        .await;
        self.wait_for("genres", |s| !s.genres.is_empty()).await;
        self.send(Command::SubmitGenres(
            genres.iter().map(|g| g.to_string()).collect(),
        ))
        .await;
        self.wait_for("first card", |s| {
            s.card.as_ref().is_some_and(|c| c.position == 0)
        })
        .await
    }

    /// Wait for card `position` to be active and idle, then decide on it.
    pub async fn decide_on(&mut self, position: usize, cmd: Command) -> Snapshot {
        let snap = self
            .wait_for("card ready", |s| {
                s.card
                    .as_ref()
                    .is_some_and(|c| c.position == position && !c.committing)
            })
            .await;
        self.send(cmd).await;
        snap
    }

    pub async fn next_notice(&mut self) -> Notice {
        tokio::time::timeout(Duration::from_secs(60), self.notices.recv())
            .await
            .expect("no notice arrived")
            .expect("notice channel closed")
    }
}
