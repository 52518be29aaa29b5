mod action;
mod app;
mod app_state;
mod component;
mod components;
mod mpv;
mod theme;
mod widgets;

use std::sync::Arc;
use std::time::Duration;

use swipe_core::client::HttpBackend;
use swipe_core::config::Config;
use swipe_core::core::{Command, CoreEvent, SwipeCore, EVENT_CHANNEL_CAPACITY};
use swipe_core::platform;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("tui.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG wins; otherwise debug for our code, quiet HTTP internals.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("spotiswipe log: {}", log_path.display());
    tracing::info!("spotiswipe starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("config unreadable ({}), using defaults", e);
            Config::default()
        }
    };
    tracing::info!("backend at {}", config.backend.base_url);

    // ── Core ─────────────────────────────────────────────────────────────────
    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    let (event_tx, event_rx) = mpsc::channel::<CoreEvent>(EVENT_CHANNEL_CAPACITY);
    let mut sink = mpv::MpvSink::new(event_tx.clone());
    sink.start_in_background();
    let core = SwipeCore::new(config.clone(), backend, Box::new(sink), event_tx.clone());
    let snapshots = core.subscribe();
    let notices = core.notices();

    let core_task = tokio::spawn(async move {
        if let Err(e) = core.run(event_rx).await {
            tracing::error!("SwipeCore exited with error: {}", e);
        }
    });

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let initial = snapshots.borrow().clone();
    let app = app::App::new(config.listen.clone(), event_tx.clone(), initial);
    let result = app.run(snapshots, notices).await;

    // Stop the core so the preview is silenced and mpv goes away with the sink.
    let _ = event_tx.send(CoreEvent::Command(Command::Shutdown)).await;
    if tokio::time::timeout(Duration::from_secs(2), core_task).await.is_err() {
        tracing::warn!("core did not stop in time");
    }
    tracing::info!("spotiswipe stopped");

    result
}
