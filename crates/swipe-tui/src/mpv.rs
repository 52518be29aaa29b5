/// mpv-backed audio output for previews.
///
/// ```text
///   MpvSink (AudioSink, owned by SwipeCore)
///         │  spawns mpv in the background at startup, or on first load
///         ├── writer_task   ← PendingRequest via mpsc, serialised → socket
///         ├── reader_task   ← JSON lines from socket
///         │                      ├── response (request_id) → oneshot reply
///         │                      └── event / property-change → forward_events
///         └── forward_events ← MpvEvent → CoreEvent::Sink stamped with generation
/// ```
///
/// Unix uses a domain socket, Windows a named pipe `\\.\pipe\<name>`.
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use swipe_core::core::CoreEvent;
use swipe_core::platform;
use swipe_core::playback::{AudioSink, SinkError, SinkEvent, SinkEventKind};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

// ── global request-id counter ─────────────────────────────────────────────────

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

// ── observation property IDs ──────────────────────────────────────────────────

pub const OBS_TIME_POS: u64 = 1;
pub const OBS_DURATION: u64 = 2;
pub const OBS_EOF_REACHED: u64 = 3;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String,
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// Unsolicited mpv message (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.raw.get("event")?.as_str()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }
}

// ── handle ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn set_property(&self, name: &str, value: Value) -> anyhow::Result<()> {
        self.send(json!(["set_property", name, value])).await?;
        Ok(())
    }

    async fn observe_properties(&self) {
        let props = [
            (OBS_TIME_POS, "time-pos"),
            (OBS_DURATION, "duration"),
            (OBS_EOF_REACHED, "eof-reached"),
        ];
        for (id, name) in &props {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }
}

fn volume_pct(volume: f32) -> f64 {
    f64::from((volume * 100.0).clamp(0.0, 100.0)).round()
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process. The process is killed when the driver drops.
pub struct MpvDriver {
    socket_name: String,
    process: Option<tokio::process::Child>,
}

impl MpvDriver {
    pub fn new() -> Self {
        Self {
            socket_name: platform::mpv_socket_name(),
            process: None,
        }
    }

    fn command(&self) -> anyhow::Result<tokio::process::Command> {
        let mpv_binary =
            platform::find_mpv_binary().ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;
        let mut cmd = tokio::process::Command::new(mpv_binary);
        cmd.arg("--no-video")
            .arg("--idle=yes")
            .arg("--keep-open=yes")
            .arg("--pause")
            .arg(platform::mpv_socket_arg(&self.socket_name))
            .arg("--quiet")
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .kill_on_drop(true);
        Ok(cmd)
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        let stderr_path = platform::data_dir().join("mpv-stderr.log");
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;

        let child = self.command()?.stderr(stderr_file).spawn()?;
        info!("mpv: spawned process with pid {:?}", child.id());
        self.process = Some(child);

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(BufReader::new(read_half), write_half, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }

        let child = self.command()?.stderr(std::process::Stdio::null()).spawn()?;
        self.process = Some(child);

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(BufReader::new(read_half), write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

impl Drop for MpvDriver {
    fn drop(&mut self) {
        #[cfg(unix)]
        let _ = std::fs::remove_file(&self.socket_name);
    }
}

fn start_io_tasks<R, W>(
    reader: BufReader<R>,
    writer: W,
    event_tx: mpsc::Sender<MpvEvent>,
) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);
    tokio::spawn(writer_task(writer, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(reader, pending, event_tx));
    MpvHandle { tx: cmd_tx }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn fail_pending(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_pending(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let Some(tx) = pending.lock().await.remove(&req_id) else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                        continue;
                    };
                    let result = if val["error"].as_str() == Some("success") {
                        Ok(val)
                    } else {
                        let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                        debug!("mpv reader: response req={} err={}", req_id, err);
                        Err(anyhow::anyhow!("mpv error: {}", err))
                    };
                    let _ = tx.send(result);
                } else if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_pending(&pending, "mpv IPC read error").await;
                break;
            }
        }
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── event translation ─────────────────────────────────────────────────────────

/// Tracks the last known position and length of the loaded file.
#[derive(Debug, Default)]
struct Position {
    time_pos: Option<f64>,
    duration: Option<f64>,
}

impl Position {
    fn fraction(&self) -> Option<f32> {
        match (self.time_pos, self.duration) {
            (Some(pos), Some(dur)) if dur > 0.0 => Some((pos / dur).clamp(0.0, 1.0) as f32),
            _ => None,
        }
    }
}

fn translate(event: &MpvEvent, position: &mut Position) -> Option<SinkEventKind> {
    if let Some((id, data)) = event.as_property_change() {
        return match id {
            OBS_TIME_POS => {
                position.time_pos = data.as_f64();
                position.fraction().map(SinkEventKind::Progress)
            }
            OBS_DURATION => {
                position.duration = data.as_f64();
                position.fraction().map(SinkEventKind::Progress)
            }
            OBS_EOF_REACHED if data.as_bool() == Some(true) => Some(SinkEventKind::Ended),
            _ => None,
        };
    }

    match event.event_name()? {
        "start-file" => {
            *position = Position::default();
            None
        }
        "file-loaded" => Some(SinkEventKind::Ready),
        "end-file" if event.raw.get("reason").and_then(Value::as_str) == Some("error") => {
            let reason = event
                .raw
                .get("file_error")
                .and_then(Value::as_str)
                .unwrap_or("playback error");
            Some(SinkEventKind::Failed(reason.to_string()))
        }
        _ => None,
    }
}

async fn forward_events(
    mut rx: mpsc::Receiver<MpvEvent>,
    generation: Arc<AtomicU64>,
    core_tx: mpsc::Sender<CoreEvent>,
) {
    let mut position = Position::default();
    while let Some(event) = rx.recv().await {
        let Some(kind) = translate(&event, &mut position) else {
            continue;
        };
        let event = SinkEvent {
            generation: generation.load(Ordering::Acquire),
            kind,
        };
        if core_tx.send(CoreEvent::Sink(event)).await.is_err() {
            break;
        }
    }
    debug!("mpv: event forwarder exiting");
}

// ── sink ──────────────────────────────────────────────────────────────────────

type Startup = JoinHandle<anyhow::Result<(MpvDriver, MpvHandle)>>;

/// Spawn mpv, connect, observe the properties we translate and start
/// forwarding its events to the core.
async fn start_mpv(
    driver: &mut MpvDriver,
    generation: Arc<AtomicU64>,
    core_tx: mpsc::Sender<CoreEvent>,
) -> anyhow::Result<MpvHandle> {
    let (event_tx, event_rx) = mpsc::channel(256);
    let handle = driver.spawn_and_connect(event_tx).await?;
    handle.observe_properties().await;
    tokio::spawn(forward_events(event_rx, generation, core_tx));
    Ok(handle)
}

pub struct MpvSink {
    driver: Option<MpvDriver>,
    handle: Option<MpvHandle>,
    starting: Option<Startup>,
    generation: Arc<AtomicU64>,
    muted: bool,
    core_tx: mpsc::Sender<CoreEvent>,
}

impl MpvSink {
    pub fn new(core_tx: mpsc::Sender<CoreEvent>) -> Self {
        Self {
            driver: None,
            handle: None,
            starting: None,
            generation: Arc::new(AtomicU64::new(0)),
            muted: false,
            core_tx,
        }
    }

    /// Start mpv off the core's event loop so the first preview doesn't wait
    /// for the IPC socket.
    pub fn start_in_background(&mut self) {
        if self.handle.is_some() || self.starting.is_some() {
            return;
        }
        let generation = self.generation.clone();
        let core_tx = self.core_tx.clone();
        self.starting = Some(tokio::spawn(async move {
            let mut driver = MpvDriver::new();
            let handle = start_mpv(&mut driver, generation, core_tx).await?;
            Ok::<_, anyhow::Error>((driver, handle))
        }));
    }

    /// Take over the background start, waiting only if it is still running.
    async fn adopt_background_start(&mut self) {
        let Some(task) = self.starting.take() else {
            return;
        };
        match task.await {
            Ok(Ok((driver, handle))) => {
                info!("mpv: background start ready");
                self.driver = Some(driver);
                self.handle = Some(handle);
            }
            Ok(Err(e)) => warn!("mpv: background start failed: {}", e),
            Err(e) => warn!("mpv: background start aborted: {}", e),
        }
    }

    /// Connected handle, spawning mpv if it isn't running.
    async fn connect(&mut self) -> Result<MpvHandle, SinkError> {
        self.adopt_background_start().await;
        if let Some(handle) = self.handle.as_ref().filter(|h| !h.is_closed()) {
            return Ok(handle.clone());
        }

        let driver = self.driver.get_or_insert_with(MpvDriver::new);
        let handle = start_mpv(driver, self.generation.clone(), self.core_tx.clone())
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    async fn command(&mut self, op: &'static str, command: Value) -> Result<(), SinkError> {
        let Some(handle) = self.handle.clone() else {
            return Err(SinkError::Unavailable("mpv not started".into()));
        };
        handle.send(command).await.map(|_| ()).map_err(|e| SinkError::Rejected {
            op,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl AudioSink for MpvSink {
    async fn load(&mut self, generation: u64, url: &str, volume: f32) -> Result<(), SinkError> {
        let handle = self.connect().await?;
        self.generation.store(generation, Ordering::Release);
        let rejected = |op: &'static str| move |e: anyhow::Error| SinkError::Rejected {
            op,
            reason: e.to_string(),
        };
        handle
            .set_property("pause", json!(true))
            .await
            .map_err(rejected("pause"))?;
        handle
            .set_property("volume", json!(volume_pct(volume)))
            .await
            .map_err(rejected("volume"))?;
        handle
            .set_property("mute", json!(self.muted))
            .await
            .map_err(rejected("mute"))?;
        debug!("mpv: loadfile {}", url);
        handle
            .send(json!(["loadfile", url]))
            .await
            .map_err(rejected("load"))?;
        Ok(())
    }

    async fn play(&mut self) -> Result<(), SinkError> {
        self.command("play", json!(["set_property", "pause", false]))
            .await
    }

    async fn pause(&mut self) -> Result<(), SinkError> {
        self.command("pause", json!(["set_property", "pause", true]))
            .await
    }

    async fn set_volume(&mut self, volume: f32) -> Result<(), SinkError> {
        self.command(
            "volume",
            json!(["set_property", "volume", volume_pct(volume)]),
        )
        .await
    }

    async fn set_muted(&mut self, muted: bool) -> Result<(), SinkError> {
        if self.handle.is_some() {
            self.command("mute", json!(["set_property", "mute", muted]))
                .await?;
        }
        self.muted = muted;
        Ok(())
    }

    async fn rewind(&mut self) -> Result<(), SinkError> {
        self.command("rewind", json!(["seek", 0, "absolute"])).await
    }

    async fn stop(&mut self) -> Result<(), SinkError> {
        if self.handle.is_none() {
            return Ok(());
        }
        self.command("stop", json!(["stop"])).await
    }
}

impl Drop for MpvSink {
    fn drop(&mut self) {
        // dropping the task's driver kills a half-started mpv
        if let Some(task) = self.starting.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(raw: Value) -> MpvEvent {
        MpvEvent { raw }
    }

    #[test]
    fn progress_needs_both_position_and_duration() {
        let mut pos = Position::default();
        let t = event(json!({"event": "property-change", "id": OBS_TIME_POS, "data": 7.5}));
        assert_eq!(translate(&t, &mut pos), None);

        let d = event(json!({"event": "property-change", "id": OBS_DURATION, "data": 30.0}));
        assert_eq!(translate(&d, &mut pos), Some(SinkEventKind::Progress(0.25)));
    }

    #[test]
    fn new_file_resets_position() {
        let mut pos = Position {
            time_pos: Some(10.0),
            duration: Some(30.0),
        };
        assert_eq!(translate(&event(json!({"event": "start-file"})), &mut pos), None);
        assert_eq!(pos.fraction(), None);
    }

    #[test]
    fn lifecycle_events_map_to_sink_events() {
        let mut pos = Position::default();
        assert_eq!(
            translate(&event(json!({"event": "file-loaded"})), &mut pos),
            Some(SinkEventKind::Ready)
        );
        let eof = event(json!({"event": "property-change", "id": OBS_EOF_REACHED, "data": true}));
        assert_eq!(translate(&eof, &mut pos), Some(SinkEventKind::Ended));
        let not_eof =
            event(json!({"event": "property-change", "id": OBS_EOF_REACHED, "data": false}));
        assert_eq!(translate(&not_eof, &mut pos), None);
    }

    #[test]
    fn only_errored_end_file_is_a_failure() {
        let mut pos = Position::default();
        let stopped = event(json!({"event": "end-file", "reason": "stop"}));
        assert_eq!(translate(&stopped, &mut pos), None);
        let failed = event(json!({
            "event": "end-file",
            "reason": "error",
            "file_error": "loading failed"
        }));
        assert_eq!(
            translate(&failed, &mut pos),
            Some(SinkEventKind::Failed("loading failed".into()))
        );
    }

    #[tokio::test]
    async fn connect_uses_the_background_start() {
        let (core_tx, _core_rx) = mpsc::channel(8);
        let mut sink = MpvSink::new(core_tx);
        let (tx, _requests) = mpsc::channel(8);
        sink.starting = Some(tokio::spawn(async move {
            Ok::<_, anyhow::Error>((MpvDriver::new(), MpvHandle { tx }))
        }));

        let handle = sink.connect().await.unwrap();
        assert!(!handle.is_closed());
        assert!(sink.starting.is_none());
        assert!(sink.driver.is_some());
    }

    #[tokio::test]
    async fn failed_background_start_is_cleared() {
        let (core_tx, _core_rx) = mpsc::channel(8);
        let mut sink = MpvSink::new(core_tx);
        sink.starting = Some(tokio::spawn(async {
            Err::<(MpvDriver, MpvHandle), _>(anyhow::anyhow!("mpv binary not found"))
        }));

        sink.adopt_background_start().await;
        assert!(sink.starting.is_none());
        assert!(sink.handle.is_none());
    }

    #[test]
    fn volume_is_a_clamped_percentage() {
        assert_eq!(volume_pct(0.5), 50.0);
        assert_eq!(volume_pct(1.7), 100.0);
        assert_eq!(volume_pct(-0.2), 0.0);
    }
}
