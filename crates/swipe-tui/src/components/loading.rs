//! Shown between the last swipe and the recommendations.

use ratatui::crossterm::event::{KeyEvent, MouseEvent};
use ratatui::{
    layout::{Alignment, Rect},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::centered_rect;
use crate::action::{Action, ComponentId};
use crate::app_state::AppState;
use crate::component::Component;
use crate::theme::{style_accent, style_muted, style_secondary};

pub struct LoadingView;

impl Component for LoadingView {
    fn id(&self) -> ComponentId {
        ComponentId::Loading
    }

    fn handle_key(&mut self, _key: KeyEvent, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn handle_mouse(&mut self, _event: MouseEvent, _area: Rect, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn on_action(&mut self, _action: &Action, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, state: &AppState) {
        let snap = &state.snapshot;
        let total = snap.position.map(|(_, total)| total).unwrap_or(0);
        let mut lines = vec![
            Line::from(vec![
                Span::styled(format!("{} ", state.spinner()), style_accent()),
                Span::styled("Building your playlist", style_accent()),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                format!("you liked {} of {} songs", snap.liked, total),
                style_secondary(),
            )),
        ];
        if snap.commits_in_flight > 0 {
            lines.push(Line::from(Span::styled(
                format!("saving {} more choice(s)…", snap.commits_in_flight),
                style_muted(),
            )));
        }
        frame.render_widget(
            Paragraph::new(lines).alignment(Alignment::Center),
            centered_rect(60, 4, area),
        );
    }
}
