//! The active candidate as a draggable card.
//!
//! The card follows the pose published by the core: it slides horizontally
//! by the drag offset, shows the LIKE / NOPE stamps at their current
//! opacity and dims as it leaves. Mouse drags are reported as column deltas
//! from where the press started.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use swipe_core::core::{CardView, Command};
use swipe_core::playback::{PlaybackOwner, PlaybackState};
use swipe_core::protocol::Decision;
use swipe_core::session::MediaStatus;

use crate::action::{Action, ComponentId};
use crate::app_state::AppState;
use crate::component::Component;
use crate::theme::{
    fade, style_muted, style_secondary, C_CARD_BG, C_DISLIKE, C_LIKE, C_LOADING, C_PANEL_BORDER_FOCUSED,
    C_PRIMARY, C_SECONDARY, C_TAG,
};
use crate::widgets::{progress_bar::draw_progress, truncate};

const CARD_WIDTH: u16 = 50;
const CARD_HEIGHT: u16 = 14;

pub struct SwipeCard {
    drag_origin: Option<u16>,
    card_area: Rect,
    dislike_button: Rect,
    like_button: Rect,
}

fn contains(r: Rect, column: u16, row: u16) -> bool {
    column >= r.x && column < r.x + r.width && row >= r.y && row < r.y + r.height
}

/// Slide `base` by `offset` columns and clip it to `bounds`.
fn shifted(base: Rect, offset: f32, bounds: Rect) -> Rect {
    let x = i32::from(base.x) + offset.round() as i32;
    let left = x.max(i32::from(bounds.x));
    let right = (x + i32::from(base.width)).min(i32::from(bounds.x + bounds.width));
    if right <= left {
        return Rect::new(bounds.x, base.y, 0, 0);
    }
    Rect::new(left as u16, base.y, (right - left) as u16, base.height)
}

fn tilt_glyph(rotation: f32) -> &'static str {
    if rotation > 0.5 {
        "⟋"
    } else if rotation < -0.5 {
        "⟍"
    } else {
        "│"
    }
}

impl SwipeCard {
    pub fn new() -> Self {
        Self {
            drag_origin: None,
            card_area: Rect::default(),
            dislike_button: Rect::default(),
            like_button: Rect::default(),
        }
    }

    fn card_lines<'a>(card: &'a CardView, state: &AppState, width: usize) -> Vec<Line<'a>> {
        let pose = &state.snapshot.pose;
        let o = pose.card_opacity;
        let text = |c| Style::default().fg(fade(c, o));

        let stamp = |label: &'static str, color, opacity: f32| {
            if opacity > 0.01 {
                Span::styled(
                    label,
                    Style::default()
                        .fg(fade(color, opacity))
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                Span::raw(" ".repeat(label.chars().count()))
            }
        };
        let gap = width.saturating_sub(12);
        let stamps = Line::from(vec![
            stamp("✗ NOPE", C_DISLIKE, pose.dislike_opacity),
            Span::raw(" ".repeat(gap)),
            stamp("LIKE ♥", C_LIKE, pose.like_opacity),
        ]);

        let media = match &card.media {
            MediaStatus::Ready(m) => Some(m),
            _ => None,
        };
        let art = if card.art_loaded {
            let url = media.and_then(|m| m.image.as_deref()).unwrap_or_default();
            Line::from(vec![
                Span::styled("▣ ", text(C_TAG)),
                Span::styled(truncate(url, width.saturating_sub(2)), text(C_SECONDARY)),
            ])
        } else if card.loading {
            Line::from(Span::styled(
                format!("{} fetching artwork…", state.spinner()),
                text(C_LOADING),
            ))
        } else {
            Line::from(Span::styled("♪ no artwork", text(C_SECONDARY)))
        };

        let title = media
            .and_then(|m| m.name.as_deref())
            .filter(|n| !n.is_empty())
            .unwrap_or(card.song.name.as_str());
        let artists = media
            .and_then(|m| m.artists.as_deref())
            .filter(|a| !a.is_empty())
            .unwrap_or(card.song.artists.as_str());

        let mut lines = vec![
            stamps,
            Line::from(""),
            art,
            Line::from(""),
            Line::from(Span::styled(
                truncate(title, width),
                text(C_PRIMARY).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(truncate(artists, width), text(C_SECONDARY))),
        ];
        if let Some(album) = media.and_then(|m| m.album.as_deref()).filter(|a| !a.is_empty()) {
            lines.push(Line::from(Span::styled(
                truncate(album, width),
                text(C_SECONDARY).add_modifier(Modifier::ITALIC),
            )));
        }
        if !card.song.genre.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("#{}", truncate(&card.song.genre, width.saturating_sub(1))),
                text(C_TAG),
            )));
        }
        lines
    }

    fn playback_label(state: &AppState) -> Option<&'static str> {
        let playback = &state.snapshot.playback;
        if playback.owner != Some(PlaybackOwner::ActiveCard) {
            return None;
        }
        if !playback.has_source {
            return Some("no preview");
        }
        Some(match playback.state {
            PlaybackState::Loading => "loading",
            PlaybackState::Playing | PlaybackState::Ended => "▶",
            PlaybackState::Paused => "❚❚",
            PlaybackState::Fading => "…",
            PlaybackState::Idle => "■",
        })
    }
}

impl Default for SwipeCard {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for SwipeCard {
    fn id(&self) -> ComponentId {
        ComponentId::SwipeCard
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        let card = state.snapshot.card.as_ref();
        match key.code {
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('x') => {
                vec![Action::Core(Command::Decide(Decision::Dislike))]
            }
            KeyCode::Right | KeyCode::Char('l') => {
                vec![Action::Core(Command::Decide(Decision::Like))]
            }
            KeyCode::Char(' ') => vec![Action::Core(Command::TogglePlayback)],
            KeyCode::Char('m') => vec![Action::Core(Command::SetMuted(
                !state.snapshot.playback.muted,
            ))],
            KeyCode::Char('o') => card
                .map(|c| vec![Action::OpenTrack(c.song.track_id.clone())])
                .unwrap_or_default(),
            KeyCode::Char('y') => card
                .map(|c| vec![Action::CopyTrackLink(c.song.track_id.clone())])
                .unwrap_or_default(),
            _ => vec![],
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, _state: &AppState) -> Vec<Action> {
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if contains(self.dislike_button, event.column, event.row) {
                    return vec![Action::Core(Command::Decide(Decision::Dislike))];
                }
                if contains(self.like_button, event.column, event.row) {
                    return vec![Action::Core(Command::Decide(Decision::Like))];
                }
                if contains(self.card_area, event.column, event.row) {
                    self.drag_origin = Some(event.column);
                    return vec![Action::Core(Command::DragStart)];
                }
                vec![]
            }
            MouseEventKind::Drag(MouseButton::Left) => match self.drag_origin {
                Some(origin) => {
                    let offset = f32::from(event.column) - f32::from(origin);
                    vec![Action::Core(Command::DragMove(offset))]
                }
                None => vec![],
            },
            MouseEventKind::Up(MouseButton::Left) => match self.drag_origin.take() {
                Some(_) => vec![Action::Core(Command::DragRelease)],
                None => vec![],
            },
            _ => vec![],
        }
    }

    fn on_action(&mut self, _action: &Action, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let snap = &state.snapshot;
        let Some(card) = snap.card.as_ref() else {
            self.card_area = Rect::default();
            return;
        };

        let width = CARD_WIDTH.min(area.width.saturating_sub(4));
        let height = CARD_HEIGHT.min(area.height.saturating_sub(4));
        let base = Rect::new(
            area.x + (area.width.saturating_sub(width)) / 2,
            area.y + 1 + (area.height.saturating_sub(height + 3)) / 2,
            width,
            height,
        );

        if let Some((pos, total)) = snap.position {
            let header = format!("card {} of {}  ·  liked {}", pos + 1, total, snap.liked);
            frame.render_widget(
                Paragraph::new(Span::styled(header, style_secondary())).alignment(Alignment::Center),
                Rect::new(area.x, area.y, area.width, 1),
            );
        }

        let rect = shifted(base, snap.pose.offset, area);
        self.card_area = if card.committing { Rect::default() } else { rect };
        if rect.width > 2 && rect.height > 2 {
            let border = if focused && self.drag_origin.is_some() {
                C_PANEL_BORDER_FOCUSED
            } else {
                C_SECONDARY
            };
            let block = Block::default()
                .borders(Borders::ALL)
                .title(Span::styled(
                    format!(" {} ", tilt_glyph(snap.pose.rotation)),
                    style_muted(),
                ))
                .border_style(Style::default().fg(fade(border, snap.pose.card_opacity)))
                .style(Style::default().bg(C_CARD_BG));
            let inner = block.inner(rect);
            frame.render_widget(Clear, rect);
            frame.render_widget(block, rect);

            let text_width = base.width.saturating_sub(2) as usize;
            let lines = Self::card_lines(card, state, text_width);
            frame.render_widget(Paragraph::new(lines), inner);

            if let Some(label) = Self::playback_label(state) {
                let bar_area = Rect::new(
                    inner.x,
                    inner.y + inner.height.saturating_sub(1),
                    inner.width,
                    inner.height.min(1),
                );
                if snap.playback.has_source {
                    let label = if snap.playback.muted {
                        format!("{} muted", label)
                    } else {
                        label.to_string()
                    };
                    draw_progress(frame, bar_area, snap.playback.progress, &label);
                } else {
                    frame.render_widget(Paragraph::new(Span::styled(label, style_muted())), bar_area);
                }
            }
        }

        let buttons_y = base.y + base.height + 1;
        if buttons_y < area.y + area.height {
            let dislike = Rect::new(base.x + 2, buttons_y, 5, 1);
            let like = Rect::new((base.x + base.width).saturating_sub(7), buttons_y, 5, 1);
            let button = |glyph: &'static str, color| {
                Paragraph::new(Span::styled(
                    glyph,
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ))
            };
            frame.render_widget(button("[✗]", C_DISLIKE), dislike);
            frame.render_widget(button("[♥]", C_LIKE), like);
            self.dislike_button = dislike;
            self.like_button = like;

            let hint = "← nope · → like · drag the card · space play/pause · m mute";
            if buttons_y + 1 < area.y + area.height {
                frame.render_widget(
                    Paragraph::new(Span::styled(hint, style_muted())).alignment(Alignment::Center),
                    Rect::new(area.x, buttons_y + 1, area.width, 1),
                );
            }
        }
    }
}
