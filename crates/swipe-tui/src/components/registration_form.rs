//! Name + email form shown before anything else.

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use swipe_core::core::Command;
use swipe_core::protocol::UserProfile;
use tui_input::{backend::crossterm::EventHandler, Input};

use super::centered_rect;
use crate::action::{Action, ComponentId};
use crate::app_state::AppState;
use crate::component::Component;
use crate::theme::{
    style_accent, style_focused_border, style_muted, style_secondary, C_FILTER_FG, C_PRIMARY,
};
use crate::widgets::toast::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Email,
}

pub struct RegistrationForm {
    name: Input,
    email: Input,
    field: Field,
    name_area: Rect,
    email_area: Rect,
}

impl RegistrationForm {
    pub fn new() -> Self {
        Self {
            name: Input::default(),
            email: Input::default(),
            field: Field::Name,
            name_area: Rect::default(),
            email_area: Rect::default(),
        }
    }

    fn input_mut(&mut self) -> &mut Input {
        match self.field {
            Field::Name => &mut self.name,
            Field::Email => &mut self.email,
        }
    }

    fn switch_field(&mut self) {
        self.field = match self.field {
            Field::Name => Field::Email,
            Field::Email => Field::Name,
        };
    }

    fn submit(&mut self, state: &AppState) -> Vec<Action> {
        if state.snapshot.busy {
            return vec![];
        }
        let profile = UserProfile::new(self.name.value(), self.email.value());
        if let Some(problem) = profile.problem() {
            self.field = if profile.name.is_empty() {
                Field::Name
            } else {
                Field::Email
            };
            return vec![Action::Toast(Severity::Warning, problem.to_string())];
        }
        vec![Action::Core(Command::Register {
            name: profile.name,
            email: profile.email,
        })]
    }

    fn draw_field(&self, frame: &mut Frame, area: Rect, label: &str, input: &Input, focused: bool) {
        let width = area.width.saturating_sub(2) as usize;
        let scroll = input.visual_scroll(width);
        let visible: String = input.value().chars().skip(scroll).collect();
        let block = Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(format!(" {} ", label), style_secondary()))
            .border_style(if focused {
                style_focused_border()
            } else {
                style_muted()
            });
        let text_style = if focused {
            Style::default().fg(C_FILTER_FG)
        } else {
            Style::default().fg(C_PRIMARY)
        };
        frame.render_widget(
            Paragraph::new(Span::styled(visible, text_style)).block(block),
            area,
        );
        if focused {
            let x = area.x + 1 + (input.visual_cursor() - scroll) as u16;
            frame.set_cursor_position((x.min(area.x + area.width.saturating_sub(2)), area.y + 1));
        }
    }
}

impl Default for RegistrationForm {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for RegistrationForm {
    fn id(&self) -> ComponentId {
        ComponentId::Registration
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        match key.code {
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.switch_field();
                vec![]
            }
            KeyCode::Enter if self.field == Field::Name => {
                self.field = Field::Email;
                vec![]
            }
            KeyCode::Enter => self.submit(state),
            _ => {
                self.input_mut().handle_event(&Event::Key(key));
                vec![]
            }
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, _state: &AppState) -> Vec<Action> {
        if let MouseEventKind::Down(MouseButton::Left) = event.kind {
            let hit = |r: Rect| {
                event.column >= r.x
                    && event.column < r.x + r.width
                    && event.row >= r.y
                    && event.row < r.y + r.height
            };
            if hit(self.name_area) {
                self.field = Field::Name;
            } else if hit(self.email_area) {
                self.field = Field::Email;
            }
        }
        vec![]
    }

    fn on_action(&mut self, _action: &Action, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let popup = centered_rect(60, 13, area);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
            ])
            .split(popup);

        frame.render_widget(
            Paragraph::new(vec![
                Line::from(Span::styled("spotiswipe", style_accent())),
                Line::from(Span::styled(
                    "swipe through songs, get a playlist",
                    style_secondary(),
                )),
            ]),
            rows[0],
        );

        self.name_area = rows[2];
        self.email_area = rows[3];
        self.draw_field(frame, rows[2], "name", &self.name, focused && self.field == Field::Name);
        self.draw_field(frame, rows[3], "email", &self.email, focused && self.field == Field::Email);

        let status = if state.snapshot.busy {
            Line::from(vec![
                Span::styled(format!("{} ", state.spinner()), style_accent()),
                Span::styled("signing in…", style_secondary()),
            ])
        } else {
            Line::from(Span::styled(
                "tab switch field · enter continue · ctrl+c quit",
                style_muted().add_modifier(Modifier::ITALIC),
            ))
        };
        frame.render_widget(Paragraph::new(status), rows[5]);
    }

    fn captures_text(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;

    fn press(form: &mut RegistrationForm, state: &AppState, code: KeyCode) -> Vec<Action> {
        form.handle_key(KeyEvent::new(code, KeyModifiers::NONE), state)
    }

    fn type_str(form: &mut RegistrationForm, state: &AppState, s: &str) {
        for c in s.chars() {
            press(form, state, KeyCode::Char(c));
        }
    }

    #[test]
    fn enter_moves_to_email_then_registers() {
        let state = AppState::default();
        let mut form = RegistrationForm::new();
        type_str(&mut form, &state, "Ana");
        assert!(press(&mut form, &state, KeyCode::Enter).is_empty());
        type_str(&mut form, &state, "ana@example.com");
        let actions = press(&mut form, &state, KeyCode::Enter);
        assert!(matches!(
            actions.as_slice(),
            [Action::Core(Command::Register { name, email })]
                if name == "Ana" && email == "ana@example.com"
        ));
    }

    #[test]
    fn invalid_email_is_caught_locally() {
        let state = AppState::default();
        let mut form = RegistrationForm::new();
        type_str(&mut form, &state, "Ana");
        press(&mut form, &state, KeyCode::Tab);
        type_str(&mut form, &state, "nope");
        let actions = press(&mut form, &state, KeyCode::Enter);
        assert!(matches!(actions.as_slice(), [Action::Toast(Severity::Warning, _)]));
        assert_eq!(form.field, Field::Email);
    }

    #[test]
    fn busy_form_ignores_submit() {
        let mut state = AppState::default();
        state.snapshot.busy = true;
        let mut form = RegistrationForm::new();
        type_str(&mut form, &state, "Ana");
        press(&mut form, &state, KeyCode::Tab);
        type_str(&mut form, &state, "ana@example.com");
        assert!(press(&mut form, &state, KeyCode::Enter).is_empty());
    }
}
