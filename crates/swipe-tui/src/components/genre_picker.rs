//! Multi-select genre list with a `/` filter.
//!
//! Selection is capped at the core's `max_genres`; a toggle past the cap is
//! refused here rather than sent and rejected. Enter does nothing until at
//! least one genre is picked.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use swipe_core::core::Command;

use crate::action::{Action, ComponentId};
use crate::app_state::AppState;
use crate::component::Component;
use crate::theme::{
    style_accent, style_default, style_focused_border, style_muted, style_secondary,
    style_selected, C_ACCENT, C_TAG,
};
use crate::widgets::filter_input::{FilterAction, FilterInput};
use crate::widgets::scrollable_list::ScrollableList;
use crate::widgets::toast::Severity;

pub struct GenrePicker {
    list: ScrollableList<String>,
    filter: FilterInput,
    selected: Vec<String>,
    list_area: Rect,
}

impl GenrePicker {
    pub fn new() -> Self {
        Self {
            list: ScrollableList::new(|genre: &String, query: &str| {
                genre.to_lowercase().contains(&query.to_lowercase())
            }),
            filter: FilterInput::new("filter genres"),
            selected: Vec::new(),
            list_area: Rect::default(),
        }
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// Pick up a new genre list from the snapshot, dropping selections that
    /// are no longer offered.
    fn sync(&mut self, state: &AppState) {
        if self.list.items != state.snapshot.genres {
            self.list.set_items(state.snapshot.genres.clone());
            let genres = &state.snapshot.genres;
            self.selected.retain(|g| genres.contains(g));
        }
    }

    fn toggle(&mut self, genre: String, max: usize) -> Vec<Action> {
        if let Some(pos) = self.selected.iter().position(|g| *g == genre) {
            self.selected.remove(pos);
            return vec![];
        }
        if self.selected.len() >= max {
            return vec![Action::Toast(
                Severity::Info,
                format!("Pick at most {} genres", max),
            )];
        }
        self.selected.push(genre);
        vec![]
    }

    fn toggle_current(&mut self, state: &AppState) -> Vec<Action> {
        match self.list.selected_item().cloned() {
            Some(genre) => self.toggle(genre, state.snapshot.max_genres),
            None => vec![],
        }
    }

    fn submit(&self, state: &AppState) -> Vec<Action> {
        if self.selected.is_empty() || state.snapshot.busy {
            return vec![];
        }
        vec![Action::Core(Command::SubmitGenres(self.selected.clone()))]
    }
}

impl Default for GenrePicker {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for GenrePicker {
    fn id(&self) -> ComponentId {
        ComponentId::GenrePicker
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        self.sync(state);

        if self.filter.is_active() {
            match self.filter.handle_key(key) {
                FilterAction::Changed(q) => self.list.set_filter(&q),
                FilterAction::Cancelled => self.list.set_filter(""),
                FilterAction::Confirmed => {}
            }
            return vec![];
        }

        match key.code {
            KeyCode::Char('/') => {
                self.filter.activate();
                vec![]
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.list.select_up(1);
                vec![]
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.list.select_down(1);
                vec![]
            }
            KeyCode::PageUp => {
                self.list.select_up(10);
                vec![]
            }
            KeyCode::PageDown => {
                self.list.select_down(10);
                vec![]
            }
            KeyCode::Home => {
                self.list.select_first();
                vec![]
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.list.select_last();
                vec![]
            }
            KeyCode::Char(' ') => self.toggle_current(state),
            KeyCode::Enter => self.submit(state),
            KeyCode::Char('g') if !state.snapshot.genres_loading => {
                vec![Action::Core(Command::LoadGenres)]
            }
            KeyCode::Char('c') => {
                self.selected.clear();
                vec![]
            }
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
                match self.list.handle_click((event.row - area.y) as usize) {
                    Some(idx) => {
                        let genre = self.list.items[idx].clone();
                        self.toggle(genre, state.snapshot.max_genres)
                    }
                    None => vec![],
                }
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

    fn on_action(&mut self, _action: &Action, _state: &AppState) -> Vec<Action> {
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
                Constraint::Length(1),
            ])
            .split(area);

        let mut header = vec![Span::styled(
            format!("Pick up to {} genres ", snap.max_genres),
            style_accent(),
        )];
        header.push(Span::styled(
            format!("({} selected)", self.selected.len()),
            style_secondary(),
        ));
        if let Some(profile) = &snap.profile {
            header.push(Span::styled(format!("  · {}", profile.name), style_muted()));
        }
        let chips: Vec<Span> = if self.selected.is_empty() {
            vec![Span::styled("nothing picked yet", style_muted())]
        } else {
            self.selected
                .iter()
                .flat_map(|g| {
                    [
                        Span::styled(format!("[{}]", g), Style::default().fg(C_TAG)),
                        Span::raw(" "),
                    ]
                })
                .collect()
        };
        frame.render_widget(
            Paragraph::new(vec![Line::from(header), Line::from(chips)]),
            rows[0],
        );

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

        if snap.genres_loading && self.list.total_len() == 0 {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    format!("{} loading genres…", state.spinner()),
                    style_secondary(),
                )),
                inner,
            );
        } else if self.list.total_len() == 0 {
            frame.render_widget(
                Paragraph::new(Span::styled("no genres yet, press g to retry", style_muted())),
                inner,
            );
        } else {
            let height = inner.height as usize;
            self.list.ensure_visible(height);
            let cursor = self.list.selected_original_index();
            let lines: Vec<Line> = self
                .list
                .visible_items(height)
                .into_iter()
                .map(|(idx, genre)| {
                    let picked = self.selected.contains(genre);
                    let mark = if picked { "[x] " } else { "[ ] " };
                    let style = if Some(idx) == cursor {
                        style_selected()
                    } else if picked {
                        Style::default().fg(C_ACCENT)
                    } else {
                        style_default()
                    };
                    Line::from(vec![Span::styled(mark, style), Span::styled(genre.as_str(), style)])
                })
                .collect();
            frame.render_widget(Paragraph::new(lines), inner);
        }

        if self.filter.is_active() || !self.filter.text().is_empty() {
            self.filter.draw(frame, rows[2]);
        }

        let hint = if self.selected.is_empty() {
            "space pick · / filter · g reload · ? help"
        } else {
            "space pick · enter start swiping · c clear · ? help"
        };
        frame.render_widget(
            Paragraph::new(Span::styled(hint, style_muted().add_modifier(Modifier::ITALIC))),
            rows[3],
        );
    }

    fn captures_text(&self) -> bool {
        self.filter.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;

    fn state() -> AppState {
        let mut state = AppState::default();
        state.snapshot.genres = ["jazz", "pop", "rock", "metal", "soul", "funk"]
            .iter()
            .map(|g| g.to_string())
            .collect();
        state.snapshot.max_genres = 5;
        state
    }

    fn press(picker: &mut GenrePicker, state: &AppState, code: KeyCode) -> Vec<Action> {
        picker.handle_key(KeyEvent::new(code, KeyModifiers::NONE), state)
    }

    #[test]
    fn enter_is_inert_without_a_pick() {
        let state = state();
        let mut picker = GenrePicker::new();
        assert!(press(&mut picker, &state, KeyCode::Enter).is_empty());
    }

    #[test]
    fn selection_is_capped() {
        let state = state();
        let mut picker = GenrePicker::new();
        for _ in 0..5 {
            assert!(press(&mut picker, &state, KeyCode::Char(' ')).is_empty());
            press(&mut picker, &state, KeyCode::Down);
        }
        let refused = press(&mut picker, &state, KeyCode::Char(' '));
        assert!(matches!(refused.as_slice(), [Action::Toast(Severity::Info, _)]));
        assert_eq!(picker.selected().len(), 5);
        assert!(!picker.selected().contains(&"funk".to_string()));
    }

    #[test]
    fn filter_then_pick_submits_in_pick_order() {
        let state = state();
        let mut picker = GenrePicker::new();
        press(&mut picker, &state, KeyCode::Char('/'));
        assert!(picker.captures_text());
        for c in "ro".chars() {
            press(&mut picker, &state, KeyCode::Char(c));
        }
        press(&mut picker, &state, KeyCode::Enter);
        press(&mut picker, &state, KeyCode::Char(' '));
        press(&mut picker, &state, KeyCode::Up);

        let actions = press(&mut picker, &state, KeyCode::Enter);
        assert!(matches!(
            actions.as_slice(),
            [Action::Core(Command::SubmitGenres(g))] if g == &vec!["rock".to_string()]
        ));
    }

    #[test]
    fn reloaded_genres_drop_stale_picks() {
        let mut state = state();
        let mut picker = GenrePicker::new();
        press(&mut picker, &state, KeyCode::Char(' '));
        assert_eq!(picker.selected(), ["jazz".to_string()]);
        state.snapshot.genres = vec!["pop".into()];
        press(&mut picker, &state, KeyCode::Down);
        assert!(picker.selected().is_empty());
    }
}
