//! AppState: read-only data handed to every component.
//!
//! The App event loop is the only writer. The snapshot is replaced wholesale
//! whenever the core publishes a new one.

use swipe_core::config::ListenConfig;
use swipe_core::core::Snapshot;
use swipe_core::protocol::TrackId;

use crate::widgets::toast::SPINNER_FRAMES;

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub snapshot: Snapshot,
    pub listen: ListenConfig,
    /// UI ticks since start; drives spinners.
    pub ticks: usize,
}

impl AppState {
    pub fn new(snapshot: Snapshot, listen: ListenConfig) -> Self {
        Self {
            snapshot,
            listen,
            ticks: 0,
        }
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER_FRAMES[self.ticks % SPINNER_FRAMES.len()]
    }

    pub fn track_url(&self, track_id: &TrackId) -> String {
        self.listen.track_url(&track_id.0)
    }
}
