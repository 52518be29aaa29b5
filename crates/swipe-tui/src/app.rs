//! App: component-based event loop.
//!
//! - `App` owns one screen component per step plus the help overlay and
//!   toasts. `AppState` is the read-only view every component draws from.
//! - Terminal input, core snapshots and core notices arrive as `AppMessage`
//!   over one mpsc channel fed by background tasks.
//! - Components return `Vec<Action>`; the App dispatches them. Commands for
//!   the core leave through `core_tx`.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEvent,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame, Terminal,
};
use swipe_core::config::ListenConfig;
use swipe_core::core::{Command, CoreEvent, Notice, Snapshot};
use swipe_core::flow::Step;
use swipe_core::platform;
use swipe_core::playback::PlaybackState;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::action::Action;
use crate::app_state::AppState;
use crate::component::Component;
use crate::components::{
    genre_picker::GenrePicker, help_overlay::HelpOverlay, loading::LoadingView,
    recommendations::ResultsList, registration_form::RegistrationForm, swipe_card::SwipeCard,
};
use crate::theme::{style_accent, style_muted, style_playing, style_secondary, C_BG};
use crate::widgets::toast::{Severity, ToastManager};

const UI_TICK: Duration = Duration::from_millis(100);
const MAX_DRAIN: usize = 64;

enum AppMessage {
    Event(Event),
    Snapshot(Snapshot),
    Notice(Notice),
}

/// One component per step.
struct Screens {
    registration: RegistrationForm,
    genre_picker: GenrePicker,
    swipe_card: SwipeCard,
    loading: LoadingView,
    results: ResultsList,
}

impl Screens {
    fn new() -> Self {
        Self {
            registration: RegistrationForm::new(),
            genre_picker: GenrePicker::new(),
            swipe_card: SwipeCard::new(),
            loading: LoadingView,
            results: ResultsList::new(),
        }
    }

    fn for_step(&mut self, step: Step) -> &mut dyn Component {
        match step {
            Step::Registration => &mut self.registration,
            Step::GenreSelection => &mut self.genre_picker,
            Step::Swiping => &mut self.swipe_card,
            Step::Loading => &mut self.loading,
            Step::Recommendations => &mut self.results,
        }
    }

    fn all_mut(&mut self) -> [&mut dyn Component; 5] {
        [
            &mut self.registration,
            &mut self.genre_picker,
            &mut self.swipe_card,
            &mut self.loading,
            &mut self.results,
        ]
    }
}

pub struct App {
    state: AppState,
    screens: Screens,
    help_overlay: HelpOverlay,
    toast: ToastManager,
    core_tx: mpsc::Sender<CoreEvent>,
    body_area: Rect,
    should_quit: bool,
}

impl App {
    pub fn new(listen: ListenConfig, core_tx: mpsc::Sender<CoreEvent>, snapshot: Snapshot) -> Self {
        Self {
            state: AppState::new(snapshot, listen),
            screens: Screens::new(),
            help_overlay: HelpOverlay::new(),
            toast: ToastManager::new(),
            core_tx,
            body_area: Rect::default(),
            should_quit: false,
        }
    }

    pub async fn run(
        mut self,
        mut snapshots: watch::Receiver<Snapshot>,
        mut notices: broadcast::Receiver<Notice>,
    ) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal ready, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);

        // ── Background task: keyboard/mouse events ────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || {
            while !event_tx.is_closed() {
                match event::poll(Duration::from_millis(250)) {
                    Ok(true) => match event::read() {
                        Ok(ev) => {
                            if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    },
                    Ok(false) => {}
                    Err(_) => break,
                }
            }
        });

        // ── Background task: core snapshots ───────────────────────────────────
        let snap_tx = tx.clone();
        tokio::spawn(async move {
            while snapshots.changed().await.is_ok() {
                let snap = snapshots.borrow_and_update().clone();
                if snap_tx.send(AppMessage::Snapshot(snap)).await.is_err() {
                    break;
                }
            }
        });

        // ── Background task: core notices ─────────────────────────────────────
        let notice_tx = tx.clone();
        tokio::spawn(async move {
            loop {
                match notices.recv().await {
                    Ok(notice) => {
                        if notice_tx.send(AppMessage::Notice(notice)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("notice receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        drop(tx);

        let mut ui_tick = tokio::time::interval(UI_TICK);
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    needs_redraw = self.handle_message(msg).await;
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        let Ok(next) = rx.try_recv() else { break };
                        drained += 1;
                        needs_redraw |= self.handle_message(next).await;
                    }
                }

                _ = ui_tick.tick() => {
                    self.state.ticks = self.state.ticks.wrapping_add(1);
                    self.toast.tick();
                    let tick_actions = {
                        let step = self.state.snapshot.step;
                        self.screens.for_step(step).tick(&self.state)
                    };
                    for action in tick_actions {
                        self.dispatch(action).await;
                    }
                    needs_redraw = true;
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        info!("ui stopped");

        Ok(())
    }

    /// Returns true if the screen needs a redraw.
    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(Event::Key(key)) => {
                for action in self.handle_key(key) {
                    self.dispatch(action).await;
                }
                true
            }
            AppMessage::Event(Event::Mouse(mouse)) => {
                for action in self.handle_mouse(mouse) {
                    self.dispatch(action).await;
                }
                true
            }
            AppMessage::Event(Event::Resize(_, _)) => true,
            AppMessage::Event(_) => false,
            AppMessage::Snapshot(snap) => {
                if snap.step != self.state.snapshot.step {
                    info!("ui: step {:?} -> {:?}", self.state.snapshot.step, snap.step);
                }
                self.state.snapshot = snap;
                true
            }
            AppMessage::Notice(notice) => {
                self.toast.notice(notice);
                true
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return vec![Action::Quit];
        }
        if self.help_overlay.visible {
            return self.help_overlay.handle_key(key, &self.state);
        }

        let step = self.state.snapshot.step;
        let screen = self.screens.for_step(step);
        debug!("key {:?} -> {:?}", key.code, screen.id());
        if !screen.captures_text() {
            match key.code {
                KeyCode::Char('q') => return vec![Action::Quit],
                KeyCode::Char('?') => return vec![Action::ToggleHelp],
                _ => {}
            }
        }
        screen.handle_key(key, &self.state)
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) -> Vec<Action> {
        if self.help_overlay.visible {
            return vec![];
        }
        let step = self.state.snapshot.step;
        self.screens
            .for_step(step)
            .handle_mouse(mouse, self.body_area, &self.state)
    }

    async fn dispatch(&mut self, action: Action) {
        let mut queue = VecDeque::from([action]);
        while let Some(action) = queue.pop_front() {
            let state = &self.state;
            for screen in self.screens.all_mut() {
                queue.extend(screen.on_action(&action, state));
            }
            queue.extend(self.help_overlay.on_action(&action, state));
            self.apply_action(action).await;
        }
    }

    async fn apply_action(&mut self, action: Action) {
        match action {
            Action::Core(cmd) => self.send(cmd).await,
            Action::OpenTrack(track_id) => {
                let url = self.state.track_url(&track_id);
                match platform::open_url(&url) {
                    Ok(()) => self.toast.info(format!("opening {}", url)),
                    Err(e) => {
                        warn!("open {}: {}", url, e);
                        self.toast.error(format!("couldn't open link: {}", e));
                    }
                }
            }
            Action::CopyTrackLink(track_id) => {
                let url = self.state.track_url(&track_id);
                match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(url.clone())) {
                    Ok(()) => self.toast.success(format!("copied: {}", url)),
                    Err(e) => {
                        warn!("clipboard error: {}", e);
                        self.toast.error(format!("clipboard error: {}", e));
                    }
                }
            }
            Action::Toast(severity, message) => match severity {
                Severity::Info => self.toast.info(message),
                Severity::Success => self.toast.success(message),
                Severity::Warning => self.toast.warning(message),
                Severity::Error => self.toast.error(message),
            },
            Action::ToggleHelp => {}
            Action::Quit => self.should_quit = true,
        }
    }

    async fn send(&mut self, cmd: Command) {
        debug!("ui -> core: {:?}", cmd);
        if self.core_tx.send(CoreEvent::Command(cmd)).await.is_err() {
            warn!("core is gone; quitting");
            self.should_quit = true;
        }
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        self.draw_header(frame, rows[0]);

        let body = rows[1].inner(ratatui::layout::Margin::new(2, 1));
        self.body_area = body;
        let step = self.state.snapshot.step;
        let focused = !self.help_overlay.visible;
        self.screens
            .for_step(step)
            .draw(frame, body, focused, &self.state);

        self.draw_status(frame, rows[2]);
        self.help_overlay.draw(frame, area, true, &self.state);
        self.toast.draw(frame, area);
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let current = self.state.snapshot.step;
        let steps = [
            (Step::Registration, "sign in"),
            (Step::GenreSelection, "genres"),
            (Step::Swiping, "swipe"),
            (Step::Loading, "mixing"),
            (Step::Recommendations, "playlist"),
        ];
        let mut spans = vec![Span::styled(" spotiswipe  ", style_accent())];
        for (i, (step, label)) in steps.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" › ", style_muted()));
            }
            let style = if *step == current {
                style_accent()
            } else {
                style_muted()
            };
            spans.push(Span::styled(*label, style));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let snap = &self.state.snapshot;
        let mut spans = Vec::new();
        if let Some(profile) = &snap.profile {
            spans.push(Span::styled(format!(" {} ", profile.name), style_secondary()));
        }
        let playback = match snap.playback.state {
            PlaybackState::Playing => Some(("▶ playing", style_playing())),
            PlaybackState::Paused => Some(("❚❚ paused", style_secondary())),
            PlaybackState::Loading => Some(("loading preview", style_muted())),
            PlaybackState::Fading => Some(("fading", style_muted())),
            PlaybackState::Idle | PlaybackState::Ended => None,
        };
        if let Some((label, style)) = playback {
            spans.push(Span::styled(format!(" {} ", label), style));
        }
        if snap.playback.muted {
            spans.push(Span::styled(" muted ", style_muted()));
        }
        if snap.busy {
            spans.push(Span::styled(format!(" {} ", self.state.spinner()), style_accent()));
        }
        spans.push(Span::styled(" ? help · q quit", style_muted()));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}
