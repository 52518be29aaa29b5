use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::SwipeConfig;
use crate::protocol::Decision;

/// Columns a committed card travels before it is fully off-screen.
pub const OFFSCREEN_OFFSET: f32 = 80.0;

/// Visual state of the active card at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pose {
    pub offset: f32,
    /// Degrees, same sign as `offset`.
    pub rotation: f32,
    pub like_opacity: f32,
    pub dislike_opacity: f32,
    pub card_opacity: f32,
}

impl Default for Pose {
    fn default() -> Self {
        Self::neutral()
    }
}

impl Pose {
    pub fn neutral() -> Self {
        Self {
            offset: 0.0,
            rotation: 0.0,
            like_opacity: 0.0,
            dislike_opacity: 0.0,
            card_opacity: 1.0,
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.offset == 0.0 && self.rotation == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Dragging,
    Committing {
        decision: Decision,
        started: Instant,
        from: f32,
    },
    /// Animation finished; waiting for the owner to reset for the next card.
    Settled { decision: Decision },
}

/// Turns horizontal drag offsets and discrete triggers into at most one
/// decision per card.
#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    config: SwipeConfig,
    phase: Phase,
    offset: f32,
}

impl GestureRecognizer {
    pub fn new(config: SwipeConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            offset: 0.0,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, Phase::Dragging)
    }

    /// True from the moment a commit starts until `reset`.
    pub fn is_locked(&self) -> bool {
        matches!(self.phase, Phase::Committing { .. } | Phase::Settled { .. })
    }

    pub fn drag_start(&mut self) -> bool {
        if self.is_locked() {
            debug!("gesture: drag ignored during commit");
            return false;
        }
        self.phase = Phase::Dragging;
        self.offset = 0.0;
        true
    }

    /// `offset` is the signed distance from where the drag started.
    pub fn drag_move(&mut self, offset: f32) {
        if self.is_dragging() && offset.is_finite() {
            self.offset = offset;
        }
    }

    /// Ends the drag. Commits if the threshold was crossed, otherwise springs
    /// back to the neutral pose.
    pub fn release(&mut self, now: Instant) -> Option<Decision> {
        if !self.is_dragging() {
            return None;
        }
        if self.offset.abs() > self.config.commit_threshold {
            let decision = Decision::from_offset(self.offset);
            self.begin_commit(decision, now);
            Some(decision)
        } else {
            self.phase = Phase::Idle;
            self.offset = 0.0;
            None
        }
    }

    /// Button or key commit. Ignored while another commit is animating.
    pub fn trigger(&mut self, decision: Decision, now: Instant) -> Option<Decision> {
        if self.is_locked() {
            debug!("gesture: {:?} ignored, commit already running", decision);
            return None;
        }
        self.begin_commit(decision, now);
        Some(decision)
    }

    fn begin_commit(&mut self, decision: Decision, now: Instant) {
        self.phase = Phase::Committing {
            decision,
            started: now,
            from: self.offset,
        };
    }

    /// Returns the decision exactly once, when its animation completes.
    pub fn tick(&mut self, now: Instant) -> Option<Decision> {
        if let Phase::Committing {
            decision, started, ..
        } = self.phase
        {
            if now.saturating_duration_since(started) >= self.config.commit_animation() {
                self.phase = Phase::Settled { decision };
                self.offset = decision.direction() * OFFSCREEN_OFFSET;
                return Some(decision);
            }
        }
        None
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.offset = 0.0;
    }

    /// Recover from a broken animation or card swap mid-gesture.
    pub fn abort(&mut self) {
        if self.phase != Phase::Idle {
            debug!("gesture: aborted from {:?}", self.phase);
        }
        self.reset();
    }

    pub fn pose(&self, now: Instant) -> Pose {
        match self.phase {
            Phase::Idle => Pose::neutral(),
            Phase::Dragging => self.pose_at(self.offset, 1.0),
            Phase::Committing {
                decision,
                started,
                from,
            } => {
                let t = self.progress(started, now);
                let target = decision.direction() * OFFSCREEN_OFFSET;
                self.pose_at(from + (target - from) * t, 1.0 - t)
            }
            Phase::Settled { decision } => {
                self.pose_at(decision.direction() * OFFSCREEN_OFFSET, 0.0)
            }
        }
    }

    fn progress(&self, started: Instant, now: Instant) -> f32 {
        let total = self.config.commit_animation();
        if total == Duration::ZERO {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(started);
        (elapsed.as_secs_f32() / total.as_secs_f32()).clamp(0.0, 1.0)
    }

    fn pose_at(&self, offset: f32, card_opacity: f32) -> Pose {
        let intensity = if self.config.overlay_span > 0.0 {
            (offset.abs() / self.config.overlay_span).min(self.config.max_overlay_opacity)
        } else {
            self.config.max_overlay_opacity
        };
        let (like_opacity, dislike_opacity) = if offset > 0.0 {
            (intensity, 0.0)
        } else if offset < 0.0 {
            (0.0, intensity)
        } else {
            (0.0, 0.0)
        };
        Pose {
            offset,
            rotation: offset * self.config.rotation_factor,
            like_opacity,
            dislike_opacity,
            card_opacity: card_opacity.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recognizer() -> GestureRecognizer {
        GestureRecognizer::new(SwipeConfig::default())
    }

    #[test]
    fn short_drag_springs_back() {
        let now = Instant::now();
        let mut g = recognizer();
        for offset in [0.0, 5.0, -12.0, 12.0] {
            assert!(g.drag_start());
            g.drag_move(offset);
            assert_eq!(g.release(now), None);
            let pose = g.pose(now);
            assert_eq!(pose.offset, 0.0);
            assert_eq!(pose.rotation, 0.0);
            assert!(!g.is_dragging());
        }
    }

    #[test]
    fn long_drag_commits_in_its_direction() {
        let now = Instant::now();
        let mut g = recognizer();
        g.drag_start();
        g.drag_move(-20.0);
        assert_eq!(g.release(now), Some(Decision::Dislike));
        assert!(g.is_locked());

        let mut g = recognizer();
        g.drag_start();
        g.drag_move(12.5);
        assert_eq!(g.release(now), Some(Decision::Like));
    }

    #[test]
    fn overlay_follows_sign_and_caps() {
        let now = Instant::now();
        let mut g = recognizer();
        g.drag_start();
        g.drag_move(8.0);
        let pose = g.pose(now);
        assert_eq!(pose.like_opacity, 0.5);
        assert_eq!(pose.dislike_opacity, 0.0);
        assert!((pose.rotation - 0.8).abs() < 1e-6);

        g.drag_move(-100.0);
        let pose = g.pose(now);
        assert_eq!(pose.like_opacity, 0.0);
        assert_eq!(pose.dislike_opacity, 0.8);
    }

    #[test]
    fn second_trigger_during_commit_is_ignored() {
        let now = Instant::now();
        let mut g = recognizer();
        g.drag_start();
        g.drag_move(30.0);
        assert_eq!(g.release(now), Some(Decision::Like));
        assert_eq!(g.trigger(Decision::Dislike, now), None);
        assert_eq!(g.trigger(Decision::Like, now), None);
        assert!(!g.drag_start());
        assert!(g.is_locked());
    }

    #[test]
    fn tick_fires_once_after_animation() {
        let start = Instant::now();
        let mut g = recognizer();
        assert_eq!(g.trigger(Decision::Like, start), Some(Decision::Like));
        assert_eq!(g.tick(start + Duration::from_millis(100)), None);

        let mid = g.pose(start + Duration::from_millis(150));
        assert!(mid.offset > 0.0 && mid.offset < OFFSCREEN_OFFSET);
        assert!(mid.card_opacity < 1.0 && mid.card_opacity > 0.0);

        let done = start + Duration::from_millis(300);
        assert_eq!(g.tick(done), Some(Decision::Like));
        assert_eq!(g.tick(done + Duration::from_millis(50)), None);
        assert_eq!(g.pose(done).card_opacity, 0.0);
        // still locked until the owner resets for the next card
        assert_eq!(g.trigger(Decision::Dislike, done), None);

        g.reset();
        assert!(g.pose(done).is_neutral());
        assert_eq!(g.trigger(Decision::Dislike, done), Some(Decision::Dislike));
    }

    #[test]
    fn abort_mid_commit_leaves_usable_recognizer() {
        let now = Instant::now();
        let mut g = recognizer();
        g.drag_start();
        g.drag_move(40.0);
        g.release(now);
        g.abort();
        assert!(!g.is_locked());
        assert!(!g.is_dragging());
        assert!(g.pose(now).is_neutral());
        assert!(g.drag_start());
    }
}
