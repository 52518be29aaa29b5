//! Action enum: everything a component can ask the App to do.

use swipe_core::core::Command;
use swipe_core::protocol::TrackId;

use crate::widgets::toast::Severity;

/// One screen per flow step, plus the help popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    Registration,
    GenrePicker,
    SwipeCard,
    Loading,
    Results,
    HelpOverlay,
}

#[derive(Debug, Clone)]
pub enum Action {
    // ── Core ─────────────────────────────────────────────────────────────────
    Core(Command),

    // ── Links ────────────────────────────────────────────────────────────────
    OpenTrack(TrackId),
    CopyTrackLink(TrackId),

    // ── UI ───────────────────────────────────────────────────────────────────
    Toast(Severity, String),
    ToggleHelp,
    Quit,
}
