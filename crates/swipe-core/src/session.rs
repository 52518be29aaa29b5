use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::client::ApiError;
use crate::config::SwipeConfig;
use crate::gesture::{GestureRecognizer, Pose};
use crate::protocol::{CandidateSong, CardMedia, Decision, SwipeDecision, TrackId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MediaStatus {
    Pending,
    Ready(CardMedia),
    /// Fetch failed; the card shows no art and no player.
    Unavailable,
}

/// Everything transient about the active card. Rebuilt from scratch every
/// time a new candidate becomes active.
#[derive(Debug, Clone, PartialEq)]
pub struct CardContext {
    pub position: usize,
    pub song: CandidateSong,
    pub media: MediaStatus,
    pub loading: bool,
    pub art_loaded: bool,
    rate_limit_retried: bool,
}

impl CardContext {
    fn new(position: usize, song: CandidateSong) -> Self {
        Self {
            position,
            song,
            media: MediaStatus::Pending,
            loading: true,
            art_loaded: false,
            rate_limit_retried: false,
        }
    }

    fn is(&self, position: usize, track_id: &TrackId) -> bool {
        self.position == position && &self.song.track_id == track_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaOutcome {
    /// Response was for a card that is no longer active.
    Stale,
    /// Media applied; attach this preview, if any.
    Applied { preview: Option<String> },
    /// Fetch again for the same card after this long.
    RetryAfter(Duration),
}

/// Per-card orchestration: the active card's media and its gesture.
#[derive(Debug)]
pub struct SwipeSession {
    card: Option<CardContext>,
    gesture: GestureRecognizer,
    held: Option<SwipeDecision>,
}

impl SwipeSession {
    pub fn new(config: SwipeConfig) -> Self {
        Self {
            card: None,
            gesture: GestureRecognizer::new(config),
            held: None,
        }
    }

    pub fn card(&self) -> Option<&CardContext> {
        self.card.as_ref()
    }

    /// Make `song` the active card. Returns the track to fetch media for.
    pub fn activate(&mut self, position: usize, song: CandidateSong) -> TrackId {
        let track_id = song.track_id.clone();
        debug!("session: card {} is {}", position, track_id);
        self.card = Some(CardContext::new(position, song));
        self.gesture.reset();
        self.held = None;
        track_id
    }

    pub fn is_active(&self, position: usize, track_id: &TrackId) -> bool {
        self.card.as_ref().is_some_and(|c| c.is(position, track_id))
    }

    pub fn on_card_media(
        &mut self,
        position: usize,
        track_id: &TrackId,
        result: Result<CardMedia, ApiError>,
    ) -> MediaOutcome {
        let Some(card) = self.card.as_mut().filter(|c| c.is(position, track_id)) else {
            debug!("session: stale media for {} at {}", track_id, position);
            return MediaOutcome::Stale;
        };

        match result {
            Ok(media) => {
                card.loading = false;
                card.art_loaded = media.has_art();
                let preview = media.preview_url.clone().filter(|u| !u.is_empty());
                card.media = MediaStatus::Ready(media);
                MediaOutcome::Applied { preview }
            }
            Err(ApiError::RateLimited { retry_after }) if !card.rate_limit_retried => {
                card.rate_limit_retried = true;
                MediaOutcome::RetryAfter(retry_after)
            }
            Err(e) => {
                debug!("session: no media for {}: {}", track_id, e);
                card.loading = false;
                card.media = MediaStatus::Unavailable;
                MediaOutcome::Applied { preview: None }
            }
        }
    }

    pub fn drag_start(&mut self) -> bool {
        self.card.is_some() && self.gesture.drag_start()
    }

    pub fn drag_move(&mut self, offset: f32) {
        self.gesture.drag_move(offset);
    }

    pub fn release(&mut self, now: Instant) -> Option<Decision> {
        self.gesture.release(now)
    }

    pub fn trigger(&mut self, decision: Decision, now: Instant) -> Option<Decision> {
        if self.card.is_none() {
            return None;
        }
        self.gesture.trigger(decision, now)
    }

    /// Keep the decision record until the commit animation finishes.
    pub fn hold(&mut self, decision: SwipeDecision) {
        self.held = Some(decision);
    }

    pub fn is_committing(&self) -> bool {
        self.gesture.is_locked()
    }

    /// Returns the held decision once its animation has completed.
    pub fn tick(&mut self, now: Instant) -> Option<SwipeDecision> {
        self.gesture.tick(now)?;
        let held = self.held.take();
        if held.is_none() {
            self.gesture.abort();
        }
        held
    }

    pub fn pose(&self, now: Instant) -> Pose {
        if self.card.is_none() {
            return Pose::neutral();
        }
        self.gesture.pose(now)
    }

    /// No active card any more (queue done or run cleared).
    pub fn finish(&mut self) {
        self.card = None;
        self.held = None;
        self.gesture.reset();
    }

    pub fn abort(&mut self) {
        self.held = None;
        self.gesture.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SessionId;

    fn song(id: &str) -> CandidateSong {
        CandidateSong {
            track_id: TrackId::from(id),
            name: id.to_uppercase(),
            artists: "Someone".into(),
            genre: "rock".into(),
        }
    }

    fn media(preview: Option<&str>) -> CardMedia {
        CardMedia {
            image: Some("http://img/1.jpg".into()),
            preview_url: preview.map(str::to_string),
            ..CardMedia::default()
        }
    }

    fn held(id: &str, decision: Decision) -> SwipeDecision {
        SwipeDecision {
            session_id: SessionId("s".into()),
            track_id: TrackId::from(id),
            decision,
        }
    }

    #[test]
    fn stale_media_does_not_touch_next_card() {
        let mut s = SwipeSession::new(SwipeConfig::default());
        let k = s.activate(0, song("k"));
        let k1 = s.activate(1, song("k1"));

        let late = s.on_card_media(0, &k, Ok(media(Some("http://p/k.mp3"))));
        assert_eq!(late, MediaOutcome::Stale);
        assert_eq!(s.card().unwrap().media, MediaStatus::Pending);
        assert!(s.card().unwrap().loading);

        let out = s.on_card_media(1, &k1, Ok(media(Some("http://p/k1.mp3"))));
        assert_eq!(
            out,
            MediaOutcome::Applied {
                preview: Some("http://p/k1.mp3".into())
            }
        );
        assert!(s.card().unwrap().art_loaded);
    }

    #[test]
    fn null_media_still_swipeable() {
        let now = Instant::now();
        let mut s = SwipeSession::new(SwipeConfig::default());
        let id = s.activate(0, song("abc123"));
        let out = s.on_card_media(0, &id, Ok(CardMedia::default()));
        assert_eq!(out, MediaOutcome::Applied { preview: None });
        let card = s.card().unwrap();
        assert!(!card.art_loaded);
        assert!(matches!(&card.media, MediaStatus::Ready(m) if !m.has_preview()));

        assert!(s.drag_start());
        s.drag_move(-30.0);
        assert_eq!(s.release(now), Some(Decision::Dislike));
    }

    #[test]
    fn fetch_error_degrades_to_unavailable() {
        let mut s = SwipeSession::new(SwipeConfig::default());
        let id = s.activate(0, song("x"));
        let out = s.on_card_media(0, &id, Err(ApiError::Transport("reset".into())));
        assert_eq!(out, MediaOutcome::Applied { preview: None });
        assert_eq!(s.card().unwrap().media, MediaStatus::Unavailable);
        assert!(!s.card().unwrap().loading);
    }

    #[test]
    fn rate_limit_retries_once_per_card() {
        let limited = || {
            Err(ApiError::RateLimited {
                retry_after: Duration::from_secs(2),
            })
        };
        let mut s = SwipeSession::new(SwipeConfig::default());
        let id = s.activate(0, song("x"));
        assert_eq!(
            s.on_card_media(0, &id, limited()),
            MediaOutcome::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(
            s.on_card_media(0, &id, limited()),
            MediaOutcome::Applied { preview: None }
        );

        // a fresh card gets its own retry
        let id = s.activate(1, song("y"));
        assert!(matches!(
            s.on_card_media(1, &id, limited()),
            MediaOutcome::RetryAfter(_)
        ));
    }

    #[test]
    fn held_decision_released_once_after_animation() {
        let start = Instant::now();
        let mut s = SwipeSession::new(SwipeConfig::default());
        s.activate(0, song("a"));
        assert_eq!(s.trigger(Decision::Like, start), Some(Decision::Like));
        s.hold(held("a", Decision::Like));
        assert_eq!(s.trigger(Decision::Dislike, start), None);

        assert_eq!(s.tick(start + Duration::from_millis(10)), None);
        let done = start + Duration::from_millis(400);
        assert_eq!(s.tick(done), Some(held("a", Decision::Like)));
        assert_eq!(s.tick(done), None);
    }

    #[test]
    fn activation_resets_pose_and_context() {
        let now = Instant::now();
        let mut s = SwipeSession::new(SwipeConfig::default());
        s.activate(0, song("a"));
        s.trigger(Decision::Like, now);
        s.activate(1, song("b"));
        assert!(!s.is_committing());
        assert!(s.pose(now).is_neutral());
        let card = s.card().unwrap();
        assert_eq!(card.position, 1);
        assert_eq!(card.media, MediaStatus::Pending);
    }

    #[test]
    fn no_card_means_no_gesture() {
        let mut s = SwipeSession::new(SwipeConfig::default());
        assert!(!s.drag_start());
        assert_eq!(s.trigger(Decision::Like, Instant::now()), None);
    }
}
