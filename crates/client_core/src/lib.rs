use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde::Serialize;
use shared::{
    domain::{FileDownload, LogEntry, LogLevel, ProgressUpdate, SystemStatus},
    error::{ControlRejected, ErrorBody},
    protocol::{ClientRequest, ServerEvent},
};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

pub mod state;

pub use state::{RunState, SessionState};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_FINAL_STEP: u32 = 5;
pub const DEFAULT_LOG_CAPACITY: usize = 2000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const EVENT_CHANNEL_PATH: &str = "/ws";
const EVENT_BUFFER: usize = 1024;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("server url must start with http:// or https://")]
    InvalidAddress,
    #[error("event channel is not connected")]
    NotConnected,
}

/// Fixed-delay redial policy for the event channel. The default client
/// dials once and otherwise keeps the transport's own behavior: no
/// retries.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub final_step: u32,
    pub log_capacity: usize,
    pub request_timeout: Duration,
    pub reconnect: Option<ReconnectPolicy>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            final_step: DEFAULT_FINAL_STEP,
            log_capacity: DEFAULT_LOG_CAPACITY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reconnect: None,
        }
    }
}

/// State-change notifications fanned out to the render layer. A
/// notification says what moved; rendering pulls a fresh snapshot.
#[derive(Debug, Clone)]
pub enum DashboardEvent {
    ConnectionChanged(bool),
    LogAppended(LogEntry),
    LogsCleared,
    ProgressChanged(ProgressUpdate),
    FilesChanged(Vec<FileDownload>),
    RunStateChanged(RunState),
    ChannelError(String),
}

struct ChannelHandle {
    outbound: mpsc::UnboundedSender<ClientRequest>,
    task: JoinHandle<()>,
}

/// One dashboard session: the event-channel transport, the session state
/// fold, and the three control operations against the backend API.
pub struct DashboardClient {
    http: Client,
    config: ClientConfig,
    session: Mutex<SessionState>,
    channel: Mutex<Option<ChannelHandle>>,
    events: broadcast::Sender<DashboardEvent>,
}

#[derive(Debug, Serialize)]
struct StartRequest {
    skip_api: bool,
}

impl DashboardClient {
    pub fn new(config: ClientConfig) -> Result<Arc<Self>> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build http client")?;
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let session = SessionState::new(config.final_step, config.log_capacity);
        Ok(Arc::new(Self {
            http,
            config,
            session: Mutex::new(session),
            channel: Mutex::new(None),
            events,
        }))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionState {
        self.session.lock().await.clone()
    }

    /// Opens the event channel. Idempotent while a channel task is live:
    /// one channel per session, repeat calls are no-ops.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        let ws_url = event_channel_url(&self.config.server_url)?;

        let mut channel = self.channel.lock().await;
        if let Some(handle) = channel.as_ref() {
            if !handle.task.is_finished() {
                return Ok(());
            }
        }

        let (stream, _) = connect_async(&ws_url)
            .await
            .with_context(|| format!("failed to connect event channel: {ws_url}"))?;
        info!(%ws_url, "channel: connected");
        self.set_connected(true).await;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(channel_task(
            Arc::downgrade(self),
            ws_url,
            stream,
            outbound_rx,
            self.config.reconnect,
        ));
        *channel = Some(ChannelHandle {
            outbound: outbound_tx,
            task,
        });
        Ok(())
    }

    /// Closes the event channel and flips the connection flag. Run state
    /// is untouched: channel liveness says nothing about the backend run.
    pub async fn disconnect(&self) {
        let handle = self.channel.lock().await.take();
        if let Some(handle) = handle {
            handle.task.abort();
        }
        self.set_connected(false).await;
    }

    /// Asks the backend to reset the shared log. The local list is only
    /// cleared when the round-trip `logs_cleared` event arrives, so both
    /// sides stay consistent.
    pub async fn clear_logs(&self) -> Result<()> {
        let channel = self.channel.lock().await;
        let handle = channel
            .as_ref()
            .filter(|handle| !handle.task.is_finished())
            .ok_or(TransportError::NotConnected)?;
        handle
            .outbound
            .send(ClientRequest::ClearLogs)
            .map_err(|_| TransportError::NotConnected)?;
        Ok(())
    }

    /// Appends a client-originated notice directly, with no server
    /// round-trip. These entries describe client-side events and have no
    /// backend record.
    pub async fn add_log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Utc::now().format("%H:%M:%S").to_string(),
            message: message.into(),
            level,
            step: None,
        };
        self.session.lock().await.push_log(entry.clone());
        let _ = self.events.send(DashboardEvent::LogAppended(entry));
    }

    /// Requests an automation start. Every outcome lands in the log; this
    /// never returns an error to the caller.
    pub async fn start(&self, skip_api: bool) {
        info!(skip_api, "control: requesting automation start");
        let request = self
            .http
            .post(format!("{}/api/start", self.config.server_url))
            .json(&StartRequest { skip_api });
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                let changed = self.session.lock().await.start_accepted();
                if changed {
                    let _ = self
                        .events
                        .send(DashboardEvent::RunStateChanged(RunState::Running));
                }
                let message = if skip_api {
                    "Automation started (generation API skipped)"
                } else {
                    "Automation started"
                };
                self.add_log(LogLevel::Success, message).await;
            }
            Ok(response) => {
                let rejected = rejection(response).await;
                warn!(status = rejected.status, "control: start rejected");
                self.add_log(
                    LogLevel::Error,
                    format!("Failed to start automation: {rejected}"),
                )
                .await;
            }
            Err(err) => {
                self.add_log(LogLevel::Error, format!("Failed to start automation: {err}"))
                    .await;
            }
        }
    }

    /// Requests an automation stop. On failure the run flag is left as-is;
    /// the backend's actual state is unknown until the next status poll.
    pub async fn stop(&self) {
        info!("control: requesting automation stop");
        let request = self.http.post(format!("{}/api/stop", self.config.server_url));
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                let changed = self.session.lock().await.stop_accepted();
                if changed {
                    let _ = self
                        .events
                        .send(DashboardEvent::RunStateChanged(RunState::Idle));
                }
                self.add_log(LogLevel::Warning, "Automation stopped").await;
            }
            Ok(response) => {
                let rejected = rejection(response).await;
                warn!(status = rejected.status, "control: stop rejected");
                self.add_log(
                    LogLevel::Error,
                    format!("Failed to stop automation: {rejected}"),
                )
                .await;
            }
            Err(err) => {
                self.add_log(LogLevel::Error, format!("Failed to stop automation: {err}"))
                    .await;
            }
        }
    }

    /// Fetches the backend readiness snapshot. Does not touch the log
    /// list; the caller gates the start action on the result.
    pub async fn status(&self) -> Result<SystemStatus> {
        let status = self
            .http
            .get(format!("{}/api/status", self.config.server_url))
            .send()
            .await
            .context("failed to request system status")?
            .error_for_status()
            .context("status request rejected")?
            .json::<SystemStatus>()
            .await
            .context("invalid system status payload")?;
        Ok(status)
    }

    /// Hyperlink target for one ready file. Artifacts carrying their own
    /// URL are linked as-is; everything else goes through the backend's
    /// download route.
    pub fn download_url(&self, file: &FileDownload) -> String {
        if let Some(url) = &file.download_url {
            return url.clone();
        }
        let encoded: String =
            url::form_urlencoded::byte_serialize(file.path.as_bytes()).collect();
        format!("{}/api/download/{encoded}", self.config.server_url)
    }

    async fn set_connected(&self, connected: bool) {
        let changed = self.session.lock().await.set_connected(connected);
        if changed {
            info!(connected, "channel: connection state changed");
            let _ = self
                .events
                .send(DashboardEvent::ConnectionChanged(connected));
        }
    }

    /// Single choke point for inbound frames: malformed payloads are
    /// dropped here with a diagnostic and never reach the fold.
    async fn ingest_frame(&self, text: &str) {
        match serde_json::from_str::<ServerEvent>(text) {
            Ok(event) => self.apply_server_event(event).await,
            Err(err) => {
                warn!(%err, "channel: dropping malformed server event");
                let _ = self
                    .events
                    .send(DashboardEvent::ChannelError(format!(
                        "invalid server event: {err}"
                    )));
            }
        }
    }

    async fn apply_server_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::LogMessage(entry) => {
                self.session.lock().await.push_log(entry.clone());
                let _ = self.events.send(DashboardEvent::LogAppended(entry));
            }
            ServerEvent::ProgressUpdate(update) => {
                let finished = self.session.lock().await.set_progress(update);
                let _ = self.events.send(DashboardEvent::ProgressChanged(update));
                if finished {
                    info!(step = update.step, "channel: automation run completed");
                    let _ = self
                        .events
                        .send(DashboardEvent::RunStateChanged(RunState::Idle));
                }
            }
            ServerEvent::FilesReady { files } => {
                info!(count = files.len(), "channel: files ready");
                self.session.lock().await.replace_files(files.clone());
                let _ = self.events.send(DashboardEvent::FilesChanged(files));
            }
            ServerEvent::LogsCleared => {
                self.session.lock().await.clear_logs();
                let _ = self.events.send(DashboardEvent::LogsCleared);
            }
        }
    }
}

impl Drop for DashboardClient {
    fn drop(&mut self) {
        // The channel task only holds a weak handle back to the client, so
        // the last owner dropping must abort it to close the socket.
        if let Some(handle) = self.channel.get_mut().take() {
            handle.task.abort();
        }
    }
}

/// Folds a non-success control response into the server-reported error
/// message when the body carries one.
async fn rejection(response: reqwest::Response) -> ControlRejected {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => ControlRejected::new(status.as_u16(), body.error),
        Err(_) => ControlRejected::new(status.as_u16(), format!("server returned {status}")),
    }
}

fn event_channel_url(server_url: &str) -> Result<String, TransportError> {
    let ws_base = if server_url.starts_with("https://") {
        server_url.replacen("https://", "wss://", 1)
    } else if server_url.starts_with("http://") {
        server_url.replacen("http://", "ws://", 1)
    } else {
        return Err(TransportError::InvalidAddress);
    };
    Ok(format!(
        "{}{EVENT_CHANNEL_PATH}",
        ws_base.trim_end_matches('/')
    ))
}

/// Owns the websocket for the life of the session. Every exit path flips
/// the connection flag off; with a reconnect policy configured the task
/// redials between connections instead of exiting.
async fn channel_task(
    client: Weak<DashboardClient>,
    ws_url: String,
    first: WsStream,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientRequest>,
    reconnect: Option<ReconnectPolicy>,
) {
    let mut stream = Some(first);
    let mut attempts: u32 = 0;

    loop {
        if let Some(current) = stream.take() {
            drive_channel(&client, current, &mut outbound_rx).await;
            let Some(strong) = client.upgrade() else { break };
            strong.set_connected(false).await;
        } else {
            match connect_async(&ws_url).await {
                Ok((next, _)) => {
                    attempts = 0;
                    let Some(strong) = client.upgrade() else { break };
                    info!(%ws_url, "channel: reconnected");
                    strong.set_connected(true).await;
                    stream = Some(next);
                    continue;
                }
                Err(err) => {
                    warn!(%err, "channel: redial failed");
                    let Some(strong) = client.upgrade() else { break };
                    let _ = strong.events.send(DashboardEvent::ChannelError(format!(
                        "event channel connect failed: {err}"
                    )));
                }
            }
        }

        let Some(policy) = reconnect else { break };
        attempts += 1;
        if policy.max_attempts.is_some_and(|max| attempts > max) {
            warn!(attempts, "channel: reconnect attempts exhausted");
            break;
        }
        tokio::time::sleep(policy.delay).await;
    }
}

/// Pumps one live connection: outbound requests drain to the socket,
/// inbound text frames go through the decode choke point into the fold.
async fn drive_channel(
    client: &Weak<DashboardClient>,
    stream: WsStream,
    outbound_rx: &mut mpsc::UnboundedReceiver<ClientRequest>,
) {
    let (mut writer, mut reader) = stream.split();
    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                let Some(request) = outgoing else { return };
                let text = match serde_json::to_string(&request) {
                    Ok(text) => text,
                    Err(_) => continue,
                };
                if writer.send(Message::Text(text)).await.is_err() {
                    return;
                }
            }
            incoming = reader.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let Some(strong) = client.upgrade() else { return };
                        strong.ingest_frame(&text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        if let Some(strong) = client.upgrade() {
                            warn!(%err, "channel: receive failed");
                            let _ = strong.events.send(DashboardEvent::ChannelError(format!(
                                "event channel receive failed: {err}"
                            )));
                        }
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
