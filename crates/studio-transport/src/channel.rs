//! WebSocket control channel
//!
//! One background task owns the socket. It connects, announces itself with a
//! `hello`, pumps frames both ways, and on any unexpected close waits a fixed
//! delay and tries again, forever. Decoded directives are handed to the
//! runtime as [`ChannelEvent`]s; protocol errors are logged and dropped
//! without touching the connection.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use studio_core::{StudioError, StudioResult};
use studio_wire::{encode_outbound, parse_inbound, InboundMessage, OutboundMessage, WireError};
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::ReconnectGuard;

/// Channel configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Orchestrator endpoint (`ws://` or `wss://`)
    pub url: String,
    /// Fixed delay between reconnect attempts
    pub reconnect_delay_ms: u64,
    /// Connect attempts that take longer than this are abandoned
    pub connect_timeout_ms: u64,
    /// Name sent in the `hello` envelope
    pub client_name: String,
    /// Buffered inbound events before backpressure
    pub inbound_buffer: usize,
    /// Buffered outbound messages while disconnected
    pub outbound_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            url: "ws://127.0.0.1:8765/studio".to_string(),
            reconnect_delay_ms: 2000,
            connect_timeout_ms: 5000,
            client_name: "studio-director".to_string(),
            inbound_buffer: 1024,
            outbound_buffer: 256,
        }
    }
}

impl ChannelConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> StudioResult<()> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| StudioError::Config(format!("invalid channel url {}: {}", self.url, e)))?;
        match parsed.scheme() {
            "ws" | "wss" => Ok(()),
            other => Err(StudioError::Config(format!(
                "channel url must use ws:// or wss://, got {}://",
                other
            ))),
        }
    }
}

/// Events surfaced by the channel task
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected { reason: String },
    Message(InboundMessage),
    /// A frame that could not be decoded; the connection stays open
    Rejected(WireError),
}

/// Handle for talking to the channel task
#[derive(Clone)]
pub struct ChannelHandle {
    outbound: mpsc::Sender<OutboundMessage>,
    reconnect: Arc<Notify>,
    shutdown: Arc<Notify>,
    guard: Arc<ReconnectGuard>,
}

impl ChannelHandle {
    /// Queue a message for the orchestrator. Messages queued while
    /// disconnected are flushed on the next connection.
    pub async fn send(&self, message: OutboundMessage) -> StudioResult<()> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| StudioError::ConnectionClosed)
    }

    /// Non-blocking variant of [`send`](Self::send)
    pub fn try_send(&self, message: OutboundMessage) -> StudioResult<()> {
        self.outbound
            .try_send(message)
            .map_err(|e| StudioError::ConnectionFailed(e.to_string()))
    }

    /// Drop the current connection (if any) and reconnect immediately.
    /// Returns false when a connect attempt is already in flight.
    pub fn request_reconnect(&self) -> bool {
        if self.guard.is_in_flight() {
            debug!("reconnect already in flight, ignoring request");
            return false;
        }
        self.reconnect.notify_one();
        true
    }

    /// Stop the channel task
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    pub fn guard(&self) -> &Arc<ReconnectGuard> {
        &self.guard
    }

    /// A handle with no socket behind it. Outbound messages land on the
    /// returned receiver; reconnect and shutdown requests go nowhere.
    pub fn detached(capacity: usize) -> (ChannelHandle, mpsc::Receiver<OutboundMessage>) {
        let (outbound, receiver) = mpsc::channel(capacity.max(1));
        let handle = ChannelHandle {
            outbound,
            reconnect: Arc::new(Notify::new()),
            shutdown: Arc::new(Notify::new()),
            guard: ReconnectGuard::new(),
        };
        (handle, receiver)
    }
}

/// Client side of the orchestrator channel
pub struct MessageChannel;

impl MessageChannel {
    /// Start the channel task. The returned receiver yields events until the
    /// task stops (handle shutdown, or the receiver is dropped).
    pub fn spawn(
        config: ChannelConfig,
    ) -> StudioResult<(ChannelHandle, mpsc::Receiver<ChannelEvent>)> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::channel(config.inbound_buffer.max(1));
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_buffer.max(1));
        let handle = ChannelHandle {
            outbound: outbound_tx,
            reconnect: Arc::new(Notify::new()),
            shutdown: Arc::new(Notify::new()),
            guard: ReconnectGuard::new(),
        };

        let task_handle = handle.clone();
        tokio::spawn(async move {
            run_channel(config, task_handle, outbound_rx, events_tx).await;
        });

        Ok((handle, events_rx))
    }
}

/// How a session ended
enum SessionEnd {
    /// Connection lost; go through the reconnect delay
    Lost(String),
    /// Reconnect requested; skip the delay
    Restart,
    /// Stop the channel entirely
    Stop,
}

async fn run_channel(
    config: ChannelConfig,
    handle: ChannelHandle,
    mut outbound: mpsc::Receiver<OutboundMessage>,
    events: mpsc::Sender<ChannelEvent>,
) {
    let delay = config.reconnect_delay();

    loop {
        if events.is_closed() {
            break;
        }

        let Some(permit) = handle.guard.try_begin() else {
            // Someone else holds the permit; wait our turn.
            tokio::time::sleep(delay).await;
            continue;
        };

        info!(url = %config.url, attempt = handle.guard.attempts(), "connecting to orchestrator");
        let attempt = tokio::time::timeout(config.connect_timeout(), connect_async(&config.url)).await;
        drop(permit);

        let end = match attempt {
            Ok(Ok((stream, _response))) => {
                info!(url = %config.url, "orchestrator channel connected");
                if events.send(ChannelEvent::Connected).await.is_err() {
                    break;
                }
                let end = run_session(stream, &config, &handle, &mut outbound, &events).await;
                let reason = match &end {
                    SessionEnd::Lost(reason) => reason.clone(),
                    SessionEnd::Restart => "reconnect requested".to_string(),
                    SessionEnd::Stop => "shutdown".to_string(),
                };
                let _ = events.send(ChannelEvent::Disconnected { reason }).await;
                end
            }
            Ok(Err(e)) => SessionEnd::Lost(e.to_string()),
            Err(_) => SessionEnd::Lost("connect timed out".to_string()),
        };

        match end {
            SessionEnd::Stop => break,
            SessionEnd::Restart => continue,
            SessionEnd::Lost(reason) => {
                warn!(
                    %reason,
                    retry_in_ms = config.reconnect_delay_ms,
                    "orchestrator channel down, will reconnect"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = handle.reconnect.notified() => {}
                    _ = handle.shutdown.notified() => break,
                }
            }
        }
    }

    debug!("channel task stopped");
}

async fn run_session<S>(
    stream: tokio_tungstenite::WebSocketStream<S>,
    config: &ChannelConfig,
    handle: &ChannelHandle,
    outbound: &mut mpsc::Receiver<OutboundMessage>,
    events: &mpsc::Sender<ChannelEvent>,
) -> SessionEnd
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = stream.split();

    match encode_outbound(&OutboundMessage::hello(config.client_name.clone())) {
        Ok(hello) => {
            if let Err(e) = write.send(Message::Text(hello)).await {
                return SessionEnd::Lost(e.to_string());
            }
        }
        Err(e) => warn!(error = %e, "failed to encode hello"),
    }

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let event = match parse_inbound(&text) {
                        Ok(message) => {
                            debug!(kind = message.kind().as_str(), "directive received");
                            ChannelEvent::Message(message)
                        }
                        Err(e) => {
                            warn!(error = %e, "dropping undecodable frame");
                            ChannelEvent::Rejected(e)
                        }
                    };
                    if events.send(event).await.is_err() {
                        return SessionEnd::Stop;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(e) = write.send(Message::Pong(payload)).await {
                        return SessionEnd::Lost(e.to_string());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .unwrap_or_else(|| "closed by peer".to_string());
                    return SessionEnd::Lost(reason);
                }
                Some(Ok(_)) => debug!("ignoring non-text frame"),
                Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                None => return SessionEnd::Lost("stream ended".to_string()),
            },
            message = outbound.recv() => match message {
                Some(message) => match encode_outbound(&message) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            return SessionEnd::Lost(e.to_string());
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to encode outbound message"),
                },
                None => return SessionEnd::Stop,
            },
            _ = handle.reconnect.notified() => {
                let _ = write.send(Message::Close(None)).await;
                return SessionEnd::Restart;
            }
            _ = handle.shutdown.notified() => {
                let _ = write.send(Message::Close(None)).await;
                return SessionEnd::Stop;
            }
        }
    }
}
