//! Single-source playback.
//!
//! [`PlaybackController`] owns the only [`AudioSink`] in the process. Every
//! acquisition silences the previous source before loading the next one, and
//! stamps a new generation so late events from a replaced source are dropped.

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::PlaybackConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    Fading,
    Ended,
}

/// Who holds the audio right now. Selects what happens at end of track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackOwner {
    ActiveCard,
    ResultRow(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEventKind {
    Ready,
    Progress(f32),
    Ended,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinkEvent {
    pub generation: u64,
    pub kind: SinkEventKind,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
    #[error("audio output refused {op}: {reason}")]
    Rejected { op: &'static str, reason: String },
}

/// An audio output. Readiness, progress and end of track come back
/// asynchronously as [`SinkEvent`]s tagged with the generation passed to
/// `load`.
#[async_trait]
pub trait AudioSink: Send {
    async fn load(&mut self, generation: u64, url: &str, volume: f32) -> Result<(), SinkError>;
    async fn play(&mut self) -> Result<(), SinkError>;
    async fn pause(&mut self) -> Result<(), SinkError>;
    async fn set_volume(&mut self, volume: f32) -> Result<(), SinkError>;
    async fn set_muted(&mut self, muted: bool) -> Result<(), SinkError>;
    async fn rewind(&mut self) -> Result<(), SinkError>;
    async fn stop(&mut self) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackView {
    pub state: PlaybackState,
    pub owner: Option<PlaybackOwner>,
    pub progress: f32,
    pub muted: bool,
    pub has_source: bool,
}

#[derive(Debug, Clone, Copy)]
struct Fade {
    started: Instant,
    step: u32,
}

pub struct PlaybackController {
    sink: Box<dyn AudioSink>,
    config: PlaybackConfig,
    state: PlaybackState,
    owner: Option<PlaybackOwner>,
    generation: u64,
    progress: f32,
    muted: bool,
    has_source: bool,
    fade: Option<Fade>,
}

impl PlaybackController {
    pub fn new(sink: Box<dyn AudioSink>, config: PlaybackConfig) -> Self {
        Self {
            sink,
            config,
            state: PlaybackState::Idle,
            owner: None,
            generation: 0,
            progress: 0.0,
            muted: false,
            has_source: false,
            fade: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn owner(&self) -> Option<PlaybackOwner> {
        self.owner
    }

    pub fn view(&self) -> PlaybackView {
        PlaybackView {
            state: self.state,
            owner: self.owner,
            progress: self.progress,
            muted: self.muted,
            has_source: self.has_source,
        }
    }

    /// Silence whatever is playing, then bind `url` for `owner`. `None`
    /// leaves the controller idle with no playable source.
    pub async fn attach(&mut self, owner: PlaybackOwner, url: Option<&str>) {
        self.release().await;
        self.owner = Some(owner);

        let Some(url) = url.filter(|u| !u.is_empty()) else {
            debug!("playback: {:?} has no preview", owner);
            return;
        };

        self.has_source = true;
        self.state = PlaybackState::Loading;
        info!("playback: loading for {:?} (gen {})", owner, self.generation);
        if let Err(e) = self
            .sink
            .load(self.generation, url, self.config.default_volume)
            .await
        {
            warn!("playback: load failed: {}", e);
            self.state = PlaybackState::Paused;
        }
    }

    /// Stop and unbind the current source. Safe to call when idle.
    pub async fn release(&mut self) {
        if self.has_source || self.state != PlaybackState::Idle {
            if let Err(e) = self.sink.stop().await {
                warn!("playback: stop failed: {}", e);
            }
        }
        self.generation += 1;
        self.state = PlaybackState::Idle;
        self.owner = None;
        self.has_source = false;
        self.progress = 0.0;
        self.fade = None;
    }

    /// Release only if `owner` still holds the audio.
    pub async fn stop_owner(&mut self, owner: PlaybackOwner) {
        if self.owner == Some(owner) {
            self.release().await;
        }
    }

    pub async fn on_sink_event(&mut self, event: SinkEvent) {
        if event.generation != self.generation {
            debug!(
                "playback: dropping {:?} from gen {} (current {})",
                event.kind, event.generation, self.generation
            );
            return;
        }

        match event.kind {
            SinkEventKind::Ready => {
                if self.state == PlaybackState::Loading {
                    self.autoplay().await;
                }
            }
            SinkEventKind::Progress(ratio) => {
                if self.state == PlaybackState::Playing && ratio.is_finite() {
                    self.progress = ratio.clamp(0.0, 1.0);
                }
            }
            SinkEventKind::Ended => {
                if self.state == PlaybackState::Playing {
                    self.on_ended().await;
                }
            }
            SinkEventKind::Failed(reason) => {
                if matches!(self.state, PlaybackState::Loading | PlaybackState::Playing) {
                    debug!("playback: source failed: {}", reason);
                    self.state = PlaybackState::Paused;
                }
            }
        }
    }

    async fn autoplay(&mut self) {
        match self.sink.play().await {
            Ok(()) => self.state = PlaybackState::Playing,
            Err(e) => {
                // not surfaced; the user can resume with toggle
                debug!("playback: autoplay refused: {}", e);
                self.state = PlaybackState::Paused;
            }
        }
    }

    async fn on_ended(&mut self) {
        self.state = PlaybackState::Ended;
        self.progress = 1.0;
        match self.owner {
            Some(PlaybackOwner::ActiveCard) => {
                self.progress = 0.0;
                let looped = match self.sink.rewind().await {
                    Ok(()) => self.sink.play().await,
                    Err(e) => Err(e),
                };
                self.state = match looped {
                    Ok(()) => PlaybackState::Playing,
                    Err(e) => {
                        debug!("playback: loop failed: {}", e);
                        PlaybackState::Paused
                    }
                };
            }
            _ => self.release().await,
        }
    }

    /// Play/pause. Returns false when there is nothing to toggle.
    pub async fn toggle(&mut self) -> bool {
        if !self.has_source {
            return false;
        }
        match self.state {
            PlaybackState::Playing => match self.sink.pause().await {
                Ok(()) => {
                    self.state = PlaybackState::Paused;
                    true
                }
                Err(e) => {
                    warn!("playback: pause failed: {}", e);
                    false
                }
            },
            PlaybackState::Paused => {
                self.autoplay().await;
                self.state == PlaybackState::Playing
            }
            _ => false,
        }
    }

    pub async fn set_muted(&mut self, muted: bool) {
        if let Err(e) = self.sink.set_muted(muted).await {
            warn!("playback: mute failed: {}", e);
            return;
        }
        self.muted = muted;
    }

    /// Ramp the volume down, then release. Anything not audible is released
    /// at once; an idle controller is left alone.
    pub async fn fade_out_and_stop(&mut self, now: Instant) {
        match self.state {
            PlaybackState::Idle | PlaybackState::Fading => {}
            PlaybackState::Playing => {
                debug!("playback: fading out");
                self.state = PlaybackState::Fading;
                self.fade = Some(Fade {
                    started: now,
                    step: 0,
                });
            }
            _ => self.release().await,
        }
    }

    /// Advance an in-progress fade.
    pub async fn tick(&mut self, now: Instant) {
        let Some(mut fade) = self.fade else {
            return;
        };
        let steps = self.config.fade_steps.max(1);
        let total = self.config.fade_out().as_secs_f32();
        let elapsed = now.saturating_duration_since(fade.started).as_secs_f32();
        let fraction = if total > 0.0 {
            (elapsed / total).min(1.0)
        } else {
            1.0
        };

        if fraction >= 1.0 {
            if let Err(e) = self.sink.pause().await {
                debug!("playback: pause after fade failed: {}", e);
            }
            self.release().await;
            return;
        }

        let due = (fraction * steps as f32).floor() as u32;
        if due > fade.step {
            fade.step = due;
            let volume = self.config.default_volume * (1.0 - due as f32 / steps as f32);
            if let Err(e) = self.sink.set_volume(volume).await {
                debug!("playback: fade step failed: {}", e);
            }
        }
        self.fade = Some(fade);
    }
}
