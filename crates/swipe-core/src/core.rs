/// SwipeCore: single-owner event loop for the whole client.
///
/// FlowController, SwipeSession and PlaybackController are owned here and
/// touched by no other task. The UI sends `Command`s, spawned backend calls
/// report back as `Outcome`s, the audio sink pushes `SinkEvent`s, and a fixed
/// ticker drives animations and fades. After every event the loop publishes a
/// fresh `Snapshot` on a watch channel; user-facing messages go out on a
/// broadcast channel as `Notice`s.
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::{ApiError, Backend};
use crate::config::Config;
use crate::flow::{Advance, FlowController, Step};
use crate::gesture::Pose;
use crate::playback::{
    AudioSink, PlaybackController, PlaybackOwner, PlaybackView, SinkEvent,
};
use crate::protocol::{
    CandidateSong, CardMedia, Decision, ScoredSong, SessionId, SwipeDecision, TrackId,
    UserProfile,
};
use crate::session::{MediaOutcome, MediaStatus, SwipeSession};

pub const TICK_INTERVAL: Duration = Duration::from_millis(33);
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── inputs ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadGenres,
    Register { name: String, email: String },
    SubmitGenres(Vec<String>),
    DragStart,
    /// Signed columns from where the drag started.
    DragMove(f32),
    DragRelease,
    Decide(Decision),
    TogglePlayback,
    SetMuted(bool),
    /// Play or stop the preview of a recommendation row.
    PlayResult(usize),
    StopResult,
    Restart,
    Shutdown,
}

/// Result of a spawned backend call or timer.
#[derive(Debug)]
pub enum Outcome {
    Genres(Result<Vec<String>, ApiError>),
    Registered(Result<SessionId, ApiError>),
    SessionStarted(Result<Vec<CandidateSong>, ApiError>),
    CardMedia {
        position: usize,
        track_id: TrackId,
        result: Result<CardMedia, ApiError>,
    },
    RetryCardMedia {
        position: usize,
        track_id: TrackId,
    },
    SwipeCommitted {
        decision: SwipeDecision,
        attempt: u32,
        result: Result<(), ApiError>,
    },
    /// Settling pause of the given run is over.
    SettleElapsed(u64),
    /// Loading stopped waiting for unresolved commits of this run.
    CommitWaitElapsed(u64),
    Recommendations(Result<Vec<ScoredSong>, ApiError>),
    RowMedia {
        index: usize,
        result: Result<CardMedia, ApiError>,
    },
}

#[derive(Debug)]
pub enum CoreEvent {
    Command(Command),
    Outcome(Outcome),
    Sink(SinkEvent),
    Tick(Instant),
}

// ── outputs ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardView {
    pub position: usize,
    pub song: CandidateSong,
    pub media: MediaStatus,
    pub loading: bool,
    pub art_loaded: bool,
    pub committing: bool,
}

/// Everything the UI renders, as of the last processed event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub step: Step,
    pub busy: bool,
    pub profile: Option<UserProfile>,
    pub genres: Vec<String>,
    pub genres_loading: bool,
    pub max_genres: usize,
    /// (active index, queue length)
    pub position: Option<(usize, usize)>,
    pub card: Option<CardView>,
    pub pose: Pose,
    pub playback: PlaybackView,
    pub recommendations: Vec<ScoredSong>,
    pub recommendations_at: Option<DateTime<Local>>,
    pub liked: usize,
    pub commits_in_flight: usize,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            step: Step::Registration,
            busy: false,
            profile: None,
            genres: Vec::new(),
            genres_loading: false,
            max_genres: 0,
            position: None,
            card: None,
            pose: Pose::neutral(),
            playback: PlaybackView {
                state: crate::playback::PlaybackState::Idle,
                owner: None,
                progress: 0.0,
                muted: false,
                has_source: false,
            },
            recommendations: Vec::new(),
            recommendations_at: None,
            liked: 0,
            commits_in_flight: 0,
        }
    }
}

// ── SwipeCore ─────────────────────────────────────────────────────────────────

pub struct SwipeCore {
    config: Config,
    backend: Arc<dyn Backend>,
    flow: FlowController,
    session: SwipeSession,
    playback: PlaybackController,
    genres: Vec<String>,
    genres_loading: bool,
    event_tx: mpsc::Sender<CoreEvent>,
    snapshot_tx: watch::Sender<Snapshot>,
    notice_tx: broadcast::Sender<Notice>,
    /// Logical swipe decisions whose commit has not resolved yet.
    commits_in_flight: usize,
    /// Incremented per swipe run; tags settle timers.
    run: u64,
    settled: bool,
    /// Set once Loading has waited long enough for commits of this run.
    commit_wait_over: bool,
    row_request: Option<usize>,
    recommendations_at: Option<DateTime<Local>>,
}

impl SwipeCore {
    pub fn new(
        config: Config,
        backend: Arc<dyn Backend>,
        sink: Box<dyn AudioSink>,
        event_tx: mpsc::Sender<CoreEvent>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(Snapshot::default());
        let (notice_tx, _) = broadcast::channel(64);
        let flow = FlowController::new(config.flow.max_genres);
        let session = SwipeSession::new(config.swipe.clone());
        let playback = PlaybackController::new(sink, config.playback.clone());
        let core = Self {
            config,
            backend,
            flow,
            session,
            playback,
            genres: Vec::new(),
            genres_loading: false,
            event_tx,
            snapshot_tx,
            notice_tx,
            commits_in_flight: 0,
            run: 0,
            settled: false,
            commit_wait_over: false,
            row_request: None,
            recommendations_at: None,
        };
        core.publish();
        core
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }

    /// Run until `Command::Shutdown`.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<CoreEvent>) -> anyhow::Result<()> {
        info!("SwipeCore: starting event loop");

        let tick_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                let now = interval.tick().await;
                if tick_tx.send(CoreEvent::Tick(now)).await.is_err() {
                    break;
                }
            }
        });

        while let Some(evt) = event_rx.recv().await {
            match evt {
                CoreEvent::Command(Command::Shutdown) => {
                    info!("SwipeCore: shutdown requested");
                    break;
                }
                CoreEvent::Command(cmd) => {
                    debug!("SwipeCore: command {:?}", cmd);
                    self.handle_command(cmd).await;
                }
                CoreEvent::Outcome(outcome) => self.handle_outcome(outcome).await,
                CoreEvent::Sink(evt) => self.playback.on_sink_event(evt).await,
                CoreEvent::Tick(now) => self.handle_tick(now).await,
            }
            self.publish();
        }

        self.playback.release().await;
        self.publish();
        info!("SwipeCore: stopped");
        Ok(())
    }

    // ── commands ──────────────────────────────────────────────────────────────

    async fn handle_command(&mut self, cmd: Command) {
        let now = Instant::now();
        match cmd {
            Command::LoadGenres => self.load_genres(),

            Command::Register { name, email } => {
                match self.flow.begin_register(UserProfile::new(name, email)) {
                    Ok(profile) => self.spawn_call(move |backend| async move {
                        Outcome::Registered(backend.register(&profile).await)
                    }),
                    Err(e) => self.notify(Severity::Warning, e.to_string()),
                }
            }

            Command::SubmitGenres(genres) => match self.flow.begin_genres(&genres) {
                Ok(request) => {
                    info!("SwipeCore: starting run with {:?}", request.genres);
                    self.spawn_call(move |backend| async move {
                        Outcome::SessionStarted(backend.start_session(&request).await)
                    })
                }
                Err(e) => self.notify(Severity::Warning, e.to_string()),
            },

            Command::DragStart => {
                self.session.drag_start();
            }
            Command::DragMove(offset) => self.session.drag_move(offset),
            Command::DragRelease => {
                if let Some(decision) = self.session.release(now) {
                    self.begin_commit(decision, now).await;
                }
            }
            Command::Decide(decision) => {
                if self.session.trigger(decision, now).is_some() {
                    self.begin_commit(decision, now).await;
                }
            }

            Command::TogglePlayback => {
                self.playback.toggle().await;
            }
            Command::SetMuted(muted) => self.playback.set_muted(muted).await,

            Command::PlayResult(index) => self.play_result(index).await,
            Command::StopResult => {
                self.row_request = None;
                if matches!(self.playback.owner(), Some(PlaybackOwner::ResultRow(_))) {
                    self.playback.release().await;
                }
            }

            Command::Restart => match self.flow.restart() {
                Ok(()) => {
                    self.clear_run().await;
                    if self.genres.is_empty() {
                        self.load_genres();
                    }
                }
                Err(e) => self.notify(Severity::Warning, e.to_string()),
            },

            // handled by the run loop
            Command::Shutdown => {}
        }
    }

    fn load_genres(&mut self) {
        if self.genres_loading {
            return;
        }
        self.genres_loading = true;
        self.spawn_call(|backend| async move { Outcome::Genres(backend.list_genres().await) });
    }

    /// A gesture or button committed. The decision record is built now; the
    /// backend hears about it once the animation completes.
    async fn begin_commit(&mut self, decision: Decision, now: Instant) {
        match self.flow.decision_for(decision) {
            Ok(record) => {
                info!("SwipeCore: {:?} on {}", decision, record.track_id);
                self.session.hold(record);
                self.playback.fade_out_and_stop(now).await;
            }
            Err(e) => {
                warn!("SwipeCore: commit without active card: {}", e);
                self.session.abort();
            }
        }
    }

    async fn play_result(&mut self, index: usize) {
        if self.flow.step() != Step::Recommendations {
            return;
        }
        if self.playback.owner() == Some(PlaybackOwner::ResultRow(index))
            || self.row_request == Some(index)
        {
            self.row_request = None;
            self.playback.release().await;
            return;
        }
        let Some(row) = self.flow.recommendations().get(index) else {
            return;
        };
        let track_id = row.song.track_id.clone();
        self.playback.release().await;
        self.row_request = Some(index);
        self.spawn_call(move |backend| async move {
            Outcome::RowMedia {
                index,
                result: backend.card_media(&track_id).await,
            }
        });
    }

    // ── outcomes ──────────────────────────────────────────────────────────────

    async fn handle_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Genres(result) => {
                self.genres_loading = false;
                match result {
                    Ok(genres) => {
                        info!("SwipeCore: {} genres", genres.len());
                        self.genres = genres;
                    }
                    Err(e) => self.notify(
                        Severity::Warning,
                        format!("Couldn't load genres: {} (press g to retry)", e),
                    ),
                }
            }

            Outcome::Registered(result) => match self.flow.on_registered(result) {
                Ok(()) => {
                    if let Some(session) = self.flow.session() {
                        let msg = format!("Welcome, {}", session.profile.name);
                        self.notify(Severity::Info, msg);
                    }
                    if self.genres.is_empty() {
                        self.load_genres();
                    }
                }
                Err(e) => self.notify(Severity::Error, format!("Registration failed: {}", e)),
            },

            Outcome::SessionStarted(result) => match self.flow.on_session_started(result) {
                Ok(()) => {
                    self.run += 1;
                    self.settled = false;
                    self.commit_wait_over = false;
                    self.activate_current();
                }
                Err(e) => self.notify(Severity::Error, format!("Couldn't start: {}", e)),
            },

            Outcome::CardMedia {
                position,
                track_id,
                result,
            } => match self.session.on_card_media(position, &track_id, result) {
                MediaOutcome::Stale => {}
                MediaOutcome::Applied { preview } => {
                    if self.session.is_committing() {
                        // art still shows; the card is already leaving
                        debug!(
                            "SwipeCore: media for {} arrived mid-commit, not playing",
                            track_id
                        );
                    } else {
                        self.playback
                            .attach(PlaybackOwner::ActiveCard, preview.as_deref())
                            .await;
                    }
                }
                MediaOutcome::RetryAfter(delay) => {
                    debug!("SwipeCore: media for {} rate limited, retry in {:?}", track_id, delay);
                    self.spawn_timer(delay, Outcome::RetryCardMedia { position, track_id });
                }
            },

            Outcome::RetryCardMedia { position, track_id } => {
                if self.session.is_active(position, &track_id) {
                    self.fetch_card_media(position, track_id);
                }
            }

            Outcome::SwipeCommitted {
                decision,
                attempt,
                result,
            } => self.on_swipe_committed(decision, attempt, result),

            Outcome::SettleElapsed(run) => {
                if run == self.run {
                    self.settled = true;
                    if self.commits_in_flight > 0 {
                        debug!(
                            "SwipeCore: {} commits unresolved, waiting up to {:?}",
                            self.commits_in_flight,
                            self.config.flow.commit_wait()
                        );
                        self.spawn_timer(
                            self.config.flow.commit_wait(),
                            Outcome::CommitWaitElapsed(run),
                        );
                    }
                    self.maybe_request_recommendations();
                }
            }

            Outcome::CommitWaitElapsed(run) => {
                if run == self.run && self.flow.step() == Step::Loading {
                    if self.commits_in_flight > 0 {
                        warn!(
                            "SwipeCore: {} commits still unresolved, asking for recommendations anyway",
                            self.commits_in_flight
                        );
                    }
                    self.commit_wait_over = true;
                    self.maybe_request_recommendations();
                }
            }

            Outcome::Recommendations(result) => {
                match self.flow.on_recommendations(result) {
                    Ok(()) => self.recommendations_at = Some(Local::now()),
                    Err(e) => {
                        self.clear_run().await;
                        self.notify(
                            Severity::Error,
                            format!("Couldn't build your playlist: {}. Pick genres again.", e),
                        );
                    }
                }
            }

            Outcome::RowMedia { index, result } => {
                if self.row_request != Some(index) || self.flow.step() != Step::Recommendations {
                    debug!("SwipeCore: dropping media for row {}", index);
                    return;
                }
                self.row_request = None;
                match result {
                    Ok(media) if media.has_preview() => {
                        self.playback
                            .attach(PlaybackOwner::ResultRow(index), media.preview_url.as_deref())
                            .await;
                    }
                    Ok(_) => self.notify(Severity::Info, "No preview for this track".to_string()),
                    Err(e) => {
                        self.notify(Severity::Warning, format!("Couldn't load preview: {}", e))
                    }
                }
            }
        }
    }

    async fn handle_tick(&mut self, now: Instant) {
        self.playback.tick(now).await;
        if let Some(decision) = self.session.tick(now) {
            self.complete_commit(decision).await;
        }
    }

    /// The commit animation finished: advance the cursor, send the decision,
    /// and show the next card or move on to loading.
    async fn complete_commit(&mut self, decision: SwipeDecision) {
        match self.flow.advance(&decision) {
            Ok(advance) => {
                self.commits_in_flight += 1;
                self.spawn_commit(decision, 1, Duration::ZERO);
                match advance {
                    Advance::Next(_) => self.activate_current(),
                    Advance::Exhausted => {
                        self.session.finish();
                        self.playback.stop_owner(PlaybackOwner::ActiveCard).await;
                        self.spawn_timer(
                            self.config.flow.settle_delay(),
                            Outcome::SettleElapsed(self.run),
                        );
                    }
                }
            }
            Err(e) => {
                warn!("SwipeCore: dropping decision for {}: {}", decision.track_id, e);
                self.session.abort();
            }
        }
    }

    fn on_swipe_committed(
        &mut self,
        decision: SwipeDecision,
        attempt: u32,
        result: Result<(), ApiError>,
    ) {
        match result {
            Ok(()) => {
                debug!("SwipeCore: {} recorded", decision.track_id);
                self.commits_in_flight = self.commits_in_flight.saturating_sub(1);
            }
            Err(e) if attempt <= self.config.flow.swipe_commit_retries => {
                let backoff = self.config.flow.retry_backoff(attempt);
                warn!(
                    "SwipeCore: commit for {} failed ({}), retry {} in {:?}",
                    decision.track_id, e, attempt, backoff
                );
                self.spawn_commit(decision, attempt + 1, backoff);
            }
            Err(e) => {
                warn!("SwipeCore: giving up on {}: {}", decision.track_id, e);
                self.commits_in_flight = self.commits_in_flight.saturating_sub(1);
                self.notify(
                    Severity::Warning,
                    format!("Your choice for {} wasn't saved: {}", decision.track_id, e),
                );
            }
        }
        self.maybe_request_recommendations();
    }

    fn maybe_request_recommendations(&mut self) {
        if self.flow.step() != Step::Loading || !self.settled {
            return;
        }
        if self.commits_in_flight > 0 && !self.commit_wait_over {
            return;
        }
        match self.flow.begin_recommendations() {
            Ok(session_id) => {
                self.settled = false;
                self.commit_wait_over = false;
                self.spawn_call(move |backend| async move {
                    Outcome::Recommendations(backend.recommendations(&session_id).await)
                });
            }
            Err(e) => debug!("SwipeCore: recommendations not requested: {}", e),
        }
    }

    fn activate_current(&mut self) {
        let Some((position, song)) = self.flow.current().map(|(p, s)| (p, s.clone())) else {
            return;
        };
        let track_id = self.session.activate(position, song);
        self.fetch_card_media(position, track_id);
    }

    fn fetch_card_media(&self, position: usize, track_id: TrackId) {
        self.spawn_call(move |backend| async move {
            let result = backend.card_media(&track_id).await;
            Outcome::CardMedia {
                position,
                track_id,
                result,
            }
        });
    }

    fn spawn_commit(&self, decision: SwipeDecision, attempt: u32, delay: Duration) {
        self.spawn_call(move |backend| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let result = backend.commit_swipe(&decision).await;
            Outcome::SwipeCommitted {
                decision,
                attempt,
                result,
            }
        });
    }

    async fn clear_run(&mut self) {
        self.session.finish();
        self.playback.release().await;
        self.row_request = None;
        self.recommendations_at = None;
        self.settled = false;
        self.commit_wait_over = false;
    }

    // ── plumbing ──────────────────────────────────────────────────────────────

    fn spawn_timer(&self, delay: Duration, outcome: Outcome) {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(CoreEvent::Outcome(outcome)).await;
        });
    }

    fn spawn_call<F, Fut>(&self, call: F)
    where
        F: FnOnce(Arc<dyn Backend>) -> Fut + Send + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let outcome = call(backend).await;
            if tx.send(CoreEvent::Outcome(outcome)).await.is_err() {
                debug!("SwipeCore: outcome after shutdown");
            }
        });
    }

    fn notify(&self, severity: Severity, message: String) {
        match severity {
            Severity::Info => info!("notice: {}", message),
            _ => warn!("notice: {}", message),
        }
        let _ = self.notice_tx.send(Notice { severity, message });
    }

    fn snapshot(&self) -> Snapshot {
        let now = Instant::now();
        Snapshot {
            step: self.flow.step(),
            busy: self.flow.is_busy(),
            profile: self.flow.session().map(|s| s.profile.clone()),
            genres: self.genres.clone(),
            genres_loading: self.genres_loading,
            max_genres: self.flow.max_genres(),
            position: self.flow.position(),
            card: self.session.card().map(|c| CardView {
                position: c.position,
                song: c.song.clone(),
                media: c.media.clone(),
                loading: c.loading,
                art_loaded: c.art_loaded,
                committing: self.session.is_committing(),
            }),
            pose: self.session.pose(now),
            playback: self.playback.view(),
            recommendations: self.flow.recommendations().to_vec(),
            recommendations_at: self.recommendations_at,
            liked: self.flow.liked(),
            commits_in_flight: self.commits_in_flight,
        }
    }

    fn publish(&self) {
        let next = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
