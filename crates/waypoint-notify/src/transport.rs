use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use crate::auth::Session;
use crate::error::NotifyError;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Push channel lifecycle, as observed by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Absent,
    Connecting,
    Open,
    Closed,
}

/// Derive the push endpoint from the REST base address: substitute the push
/// scheme, fix the path, and attach the credential as a query parameter (the
/// channel has no separate handshake).
pub fn notification_socket_url(base: &Url, session: &Session) -> Result<Url, NotifyError> {
    let scheme = match base.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(NotifyError::InvalidConfig(format!(
                "cannot derive push scheme from '{other}'"
            )))
        }
    };
    let host = base
        .host_str()
        .ok_or_else(|| NotifyError::InvalidConfig("api base url has no host".to_string()))?;
    let mut endpoint = format!("{scheme}://{host}");
    if let Some(port) = base.port() {
        endpoint.push_str(&format!(":{port}"));
    }
    endpoint.push_str(&format!("/ws/notifications/{}", session.user_id));
    let mut url = Url::parse(&endpoint)
        .map_err(|err| NotifyError::InvalidConfig(format!("invalid push endpoint: {err}")))?;
    url.query_pairs_mut().append_pair("token", &session.token);
    Ok(url)
}

/// Zero-or-one live WebSocket per session.
///
/// Inbound text frames are forwarded unmodified to the event router. There is
/// no reconnect: a dropped socket stays down until the session identity
/// changes, and the reconciliation fetch restores correctness in the
/// meantime.
pub struct PushChannel {
    task: Option<tokio::task::JoinHandle<()>>,
}

impl PushChannel {
    pub async fn connect(
        url: Url,
        frames: mpsc::UnboundedSender<String>,
        state: Arc<watch::Sender<ConnectionState>>,
    ) -> Result<Self, NotifyError> {
        state.send_replace(ConnectionState::Connecting);
        let (ws_stream, _) = match connect_async(url.as_str()).await {
            Ok(connected) => connected,
            Err(err) => {
                state.send_replace(ConnectionState::Closed);
                return Err(err.into());
            }
        };
        state.send_replace(ConnectionState::Open);
        debug!(target: "notify::transport", "push channel open");

        let task = tokio::spawn(run_channel(ws_stream, frames, state));
        Ok(Self { task: Some(task) })
    }

    /// Idempotent teardown; closing an already-closed channel is a no-op.
    pub async fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_channel(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    frames: mpsc::UnboundedSender<String>,
    state: Arc<watch::Sender<ConnectionState>>,
) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Keepalive pings; intermediaries tear down silent sockets.
    let ping_task = tokio::spawn(async move {
        let mut ticker = interval(KEEPALIVE_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if ws_sender.send(Message::Ping(Vec::new())).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if frames.send(text).is_err() {
                    break;
                }
            }
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => {
                    if frames.send(text).is_err() {
                        break;
                    }
                }
                Err(_) => {
                    warn!(target: "notify::transport", "dropping non-utf8 binary frame");
                }
            },
            Ok(Message::Close(_)) => break,
            Err(err) => {
                debug!(target: "notify::transport", error = %err, "push channel read failed");
                break;
            }
            _ => {}
        }
    }

    state.send_replace(ConnectionState::Closed);
    ping_task.abort();
}
