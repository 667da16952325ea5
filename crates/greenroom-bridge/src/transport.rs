// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ChatTransport` implementation over the device-bridge WebSocket.
//!
//! The transport dials the sidecar, pumps its event frames into the
//! [`ChatTransport::next_event`] stream, and correlates `send` commands with
//! their `send_result` answers. Credential presence is tracked with a marker
//! file: the sidecar stores the actual pairing keys, the gateway only needs
//! to know whether a restore is worth attempting.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use greenroom_core::GreenroomError;
use greenroom_core::events::{CloseReason, TransportEvent};
use greenroom_core::traits::transport::ChatTransport;
use greenroom_core::types::{ExternalId, MessageEnvelope};

use crate::wire::{BridgeCommand, BridgeEvent};

/// How long a send waits for its `send_result` before giving up.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Marker file name under the credential directory.
const CREDENTIAL_MARKER: &str = "device.paired";

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type SendWaiters = Arc<Mutex<HashMap<String, oneshot::Sender<Result<ExternalId, GreenroomError>>>>>;

/// Transport to the device-bridge sidecar.
pub struct BridgeTransport {
    url: String,
    credential_dir: PathBuf,
    writer: Mutex<Option<WsSink>>,
    events_rx: Mutex<mpsc::Receiver<TransportEvent>>,
    events_tx: mpsc::Sender<TransportEvent>,
    pending_sends: SendWaiters,
}

impl BridgeTransport {
    pub fn new(url: impl Into<String>, credential_dir: impl Into<PathBuf>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            url: url.into(),
            credential_dir: credential_dir.into(),
            writer: Mutex::new(None),
            events_rx: Mutex::new(events_rx),
            events_tx,
            pending_sends: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn marker_path(&self) -> PathBuf {
        self.credential_dir.join(CREDENTIAL_MARKER)
    }

    fn store_credential_marker(&self) {
        store_marker(&self.credential_dir);
    }

    fn clear_credential_marker(&self) {
        clear_marker(&self.credential_dir);
    }

    async fn send_command(&self, command: &BridgeCommand) -> Result<(), GreenroomError> {
        let json = serde_json::to_string(command)
            .map_err(|e| GreenroomError::Internal(format!("command serialization: {e}")))?;
        let mut writer = self.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            return Err(GreenroomError::transport("bridge not connected"));
        };
        sink.send(Message::Text(json.into()))
            .await
            .map_err(|e| GreenroomError::Transport {
                message: "bridge command send failed".to_string(),
                source: Some(Box::new(e)),
            })
    }
}

fn store_marker(dir: &Path) {
    if let Err(e) = std::fs::create_dir_all(dir)
        .and_then(|()| std::fs::write(dir.join(CREDENTIAL_MARKER), b"paired\n"))
    {
        warn!(error = %e, dir = %dir.display(), "credential marker write failed");
    }
}

fn clear_marker(dir: &Path) {
    let path = dir.join(CREDENTIAL_MARKER);
    if path.exists()
        && let Err(e) = std::fs::remove_file(&path)
    {
        warn!(error = %e, "credential marker removal failed");
    }
}

/// Read loop: sidecar frames into transport events.
async fn read_loop(
    mut reader: futures::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    events: mpsc::Sender<TransportEvent>,
    pending_sends: SendWaiters,
    marker_store: impl Fn(bool) + Send + 'static,
) {
    let mut saw_close = false;

    while let Some(frame) = reader.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "bridge socket error");
                break;
            }
        };

        let event: BridgeEvent = match serde_json::from_str(&text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "undecodable bridge frame");
                continue;
            }
        };

        let transport_event = match event {
            BridgeEvent::Qr { code } => Some(TransportEvent::PairingCode { code }),
            BridgeEvent::Open => {
                marker_store(true);
                Some(TransportEvent::ConnectionOpened)
            }
            BridgeEvent::Close { reason, logged_out } => {
                saw_close = true;
                if logged_out {
                    marker_store(false);
                    Some(TransportEvent::ConnectionClosed {
                        reason: CloseReason::LoggedOut,
                    })
                } else {
                    Some(TransportEvent::ConnectionClosed {
                        reason: CloseReason::TransportError(reason),
                    })
                }
            }
            BridgeEvent::Message { envelope, from_me } => {
                Some(TransportEvent::MessageReceived { envelope, from_me })
            }
            BridgeEvent::Status {
                external_id,
                status,
            } => Some(TransportEvent::MessageStatus {
                external_id: ExternalId::new(external_id),
                status,
            }),
            BridgeEvent::SendResult {
                id,
                external_id,
                error,
            } => {
                let waiter = pending_sends.lock().await.remove(&id);
                match waiter {
                    Some(tx) => {
                        let result = match (external_id, error) {
                            (Some(ext), None) => Ok(ExternalId::new(ext)),
                            (_, Some(message)) => Err(GreenroomError::transport(message)),
                            (None, None) => {
                                Err(GreenroomError::transport("send_result without id"))
                            }
                        };
                        let _ = tx.send(result);
                    }
                    None => debug!(id = %id, "send_result for unknown correlation id"),
                }
                None
            }
        };

        if let Some(transport_event) = transport_event
            && events.send(transport_event).await.is_err()
        {
            return;
        }
    }

    // Socket gone without a close frame: surface it as a transient close so
    // the session manager schedules a reconnect.
    if !saw_close {
        let _ = events
            .send(TransportEvent::ConnectionClosed {
                reason: CloseReason::TransportError("bridge socket closed".to_string()),
            })
            .await;
    }
    debug!("bridge read loop ended");
}

#[async_trait]
impl ChatTransport for BridgeTransport {
    async fn connect(&self) -> Result<(), GreenroomError> {
        let restore = self.has_credentials();
        info!(url = %self.url, restore, "dialing device bridge");

        let (stream, _response) =
            connect_async(self.url.as_str())
                .await
                .map_err(|e| {
                    // The manager reacts to the close event; the error return
                    // is informational.
                    let events = self.events_tx.clone();
                    let detail = e.to_string();
                    tokio::spawn(async move {
                        let _ = events
                            .send(TransportEvent::ConnectionClosed {
                                reason: CloseReason::TransportError(detail),
                            })
                            .await;
                    });
                    GreenroomError::Transport {
                        message: format!("bridge dial failed: {}", self.url),
                        source: Some(Box::new(e)),
                    }
                })?;

        let (sink, reader) = stream.split();
        *self.writer.lock().await = Some(sink);

        let events = self.events_tx.clone();
        let pending = self.pending_sends.clone();
        let dir = self.credential_dir.clone();
        tokio::spawn(read_loop(reader, events, pending, move |present| {
            if present {
                store_marker(&dir);
            } else {
                clear_marker(&dir);
            }
        }));

        self.send_command(&BridgeCommand::Connect { restore }).await
    }

    async fn disconnect(&self) -> Result<(), GreenroomError> {
        let result = self.send_command(&BridgeCommand::Disconnect).await;
        *self.writer.lock().await = None;
        result
    }

    async fn logout(&self) -> Result<(), GreenroomError> {
        // Invalidate locally even if the sidecar is unreachable.
        self.clear_credential_marker();
        let result = self.send_command(&BridgeCommand::Logout).await;
        *self.writer.lock().await = None;
        result
    }

    async fn send(&self, envelope: &MessageEnvelope) -> Result<ExternalId, GreenroomError> {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending_sends.lock().await.insert(id.clone(), tx);

        let command = BridgeCommand::Send {
            id: id.clone(),
            envelope: envelope.clone(),
        };
        if let Err(e) = self.send_command(&command).await {
            self.pending_sends.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(SEND_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GreenroomError::transport("bridge dropped send waiter")),
            Err(_) => {
                self.pending_sends.lock().await.remove(&id);
                Err(GreenroomError::Timeout {
                    duration: SEND_TIMEOUT,
                })
            }
        }
    }

    async fn next_event(&self) -> Result<TransportEvent, GreenroomError> {
        self.events_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| GreenroomError::transport("bridge event stream closed"))
    }

    fn has_credentials(&self) -> bool {
        self.marker_path().exists()
    }
}
