//! The generated playlist: one row per recommendation with score bars.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use swipe_core::core::Command;
use swipe_core::playback::{PlaybackOwner, PlaybackState};
use swipe_core::protocol::ScoredSong;

use crate::action::{Action, ComponentId};
use crate::app_state::AppState;
use crate::component::Component;
use crate::theme::{
    style_accent, style_default, style_focused_border, style_muted, style_playing,
    style_secondary, style_selected, C_DANCE, C_ENERGY, C_POPULARITY, C_TAG,
};
use crate::widgets::progress_bar::score_span;
use crate::widgets::scrollable_list::ScrollableList;
use crate::widgets::truncate;

const SCORE_WIDTH: usize = 5;

pub struct ResultsList {
    list: ScrollableList<ScoredSong>,
    list_area: Rect,
}

impl ResultsList {
    pub fn new() -> Self {
        Self {
            list: ScrollableList::new(|_: &ScoredSong, _: &str| true),
            list_area: Rect::default(),
        }
    }

    fn sync(&mut self, state: &AppState) {
        if self.list.items != state.snapshot.recommendations {
            self.list.set_items(state.snapshot.recommendations.clone());
            self.list.select_first();
        }
    }

    fn playing_row(state: &AppState) -> Option<usize> {
        match state.snapshot.playback.owner {
            Some(PlaybackOwner::ResultRow(i)) => Some(i),
            _ => None,
        }
    }

    fn row_line<'a>(
        idx: usize,
        item: &'a ScoredSong,
        width: usize,
        cursor: bool,
        state: &AppState,
    ) -> Line<'a> {
        let playing = Self::playing_row(state) == Some(idx);
        let marker = if !playing {
            "  ".to_string()
        } else if state.snapshot.playback.state == PlaybackState::Loading {
            format!("{} ", state.spinner())
        } else {
            "▶ ".to_string()
        };

        let bars_width = 3 * (SCORE_WIDTH + 5);
        let genre_width = 12;
        let text_width = width.saturating_sub(bars_width + genre_width + 6);
        let title = format!("{} · {}", item.song.name, item.song.artists);

        let base = if cursor { style_selected() } else { style_default() };
        let mut spans = vec![
            Span::styled(marker, style_playing()),
            Span::styled(format!("{:>2}. ", idx + 1), style_muted()),
            Span::styled(
                format!("{:<w$}", truncate(&title, text_width), w = text_width),
                base,
            ),
            Span::styled(
                format!(" {:<w$}", truncate(&item.song.genre, genre_width), w = genre_width),
                Style::default().fg(C_TAG),
            ),
            Span::raw(" "),
        ];
        spans.extend(score_span("nrg", ScoredSong::unit_score(item.energy), SCORE_WIDTH, C_ENERGY));
        spans.extend(score_span(
            "pop",
            ScoredSong::unit_score(item.popularity),
            SCORE_WIDTH,
            C_POPULARITY,
        ));
        spans.extend(score_span(
            "dnc",
            ScoredSong::unit_score(item.danceability),
            SCORE_WIDTH,
            C_DANCE,
        ));
        Line::from(spans)
    }
}

impl Default for ResultsList {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for ResultsList {
    fn id(&self) -> ComponentId {
        ComponentId::Results
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        self.sync(state);
        let selected = self.list.selected_item().map(|s| s.song.track_id.clone());
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.list.select_up(1);
                vec![]
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.list.select_down(1);
                vec![]
            }
            KeyCode::Home | KeyCode::Char('g') => {
                self.list.select_first();
                vec![]
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.list.select_last();
                vec![]
            }
            KeyCode::Enter | KeyCode::Char(' ') => self
                .list
                .selected_original_index()
                .map(|i| vec![Action::Core(Command::PlayResult(i))])
                .unwrap_or_default(),
            KeyCode::Esc | KeyCode::Char('s') => vec![Action::Core(Command::StopResult)],
            KeyCode::Char('o') => selected.map(|id| vec![Action::OpenTrack(id)]).unwrap_or_default(),
            KeyCode::Char('y') => selected
                .map(|id| vec![Action::CopyTrackLink(id)])
                .unwrap_or_default(),
            KeyCode::Char('r') => vec![Action::Core(Command::Restart)],
            _ => vec![],
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, state: &AppState) -> Vec<Action> {
        self.sync(state);
        let area = self.list_area;
        match event.kind {
            MouseEventKind::Down(MouseButton::Left)
                if event.column >= area.x
                    && event.column < area.x + area.width
                    && event.row >= area.y
                    && event.row < area.y + area.height =>
            {
                self.list
                    .handle_click((event.row - area.y) as usize)
                    .map(|i| vec![Action::Core(Command::PlayResult(i))])
                    .unwrap_or_default()
            }
            MouseEventKind::ScrollUp => {
                self.list.select_up(1);
                vec![]
            }
            MouseEventKind::ScrollDown => {
                self.list.select_down(1);
                vec![]
            }
            _ => vec![],
        }
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        if let Action::Core(Command::Restart) = action {
            self.list.set_items(Vec::new());
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        self.sync(state);
        let snap = &state.snapshot;

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(area);

        let name = snap.profile.as_ref().map(|p| p.name.as_str()).unwrap_or("you");
        let mut header = vec![
            Span::styled(format!("{} songs for {}", self.list.total_len(), name), style_accent()),
            Span::styled(format!("  · liked {}", snap.liked), style_secondary()),
        ];
        if let Some(at) = snap.recommendations_at {
            header.push(Span::styled(
                format!("  · made {}", at.format("%H:%M")),
                style_muted(),
            ));
        }
        frame.render_widget(Paragraph::new(Line::from(header)), rows[0]);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(if focused {
                style_focused_border()
            } else {
                style_muted()
            });
        let inner = block.inner(rows[1]);
        frame.render_widget(block, rows[1]);
        self.list_area = inner;

        let height = inner.height as usize;
        self.list.ensure_visible(height);
        let cursor = self.list.selected_original_index();
        let width = inner.width as usize;
        let lines: Vec<Line> = self
            .list
            .visible_items(height)
            .into_iter()
            .map(|(idx, item)| Self::row_line(idx, item, width, Some(idx) == cursor, state))
            .collect();
        frame.render_widget(Paragraph::new(lines), inner);

        frame.render_widget(
            Paragraph::new(Span::styled(
                "enter play/stop · o open · y copy link · r start over · ? help",
                style_muted().add_modifier(Modifier::ITALIC),
            )),
            rows[2],
        );
    }
}
