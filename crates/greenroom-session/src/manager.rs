// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session manager actor: owns the device-session state machine and the
//! reconnect timer.
//!
//! The actor is the only writer of [`SessionState`]. It pumps transport
//! events through the pure transition function, executes the resulting
//! effects, forwards message traffic to the relay, and serves explicit
//! connect/disconnect commands. The reconnect timer is a singleton: a new
//! close event while a retry is pending replaces the deadline instead of
//! stacking a second timer.

use std::sync::Arc;
use std::time::Duration;

use greenroom_core::GreenroomError;
use greenroom_core::events::{SessionEvent, TransportEvent};
use greenroom_core::traits::broker::{Broker, EXCHANGE_EVENTS};
use greenroom_core::traits::transport::ChatTransport;
use greenroom_core::types::{SessionState, SessionStatus};
use rand::Rng;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::{Effect, transition};

/// Exponential backoff with full jitter for reconnect attempts.
///
/// Attempts are unbounded: the device bridge is expected to come back, and
/// the cap keeps the retry rate low under persistent failure.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub cap: Duration,
    /// Disabled only in timing tests.
    pub jitter: bool,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            jitter: true,
        }
    }

    /// Delay before the retry with the given attempt number (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt.min(16)));
        let max = exp.min(self.cap);
        if !self.jitter {
            return max;
        }
        let ms = rand::thread_rng().gen_range(0..=max.as_millis() as u64);
        Duration::from_millis(ms)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(60))
    }
}

/// Commands accepted by the manager loop.
#[derive(Debug)]
enum SessionCommand {
    Connect,
    Disconnect {
        logout: bool,
        reason: Option<String>,
    },
}

/// Cloneable handle for querying and commanding the session manager.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: Arc<Mutex<SessionState>>,
}

impl SessionHandle {
    /// Current state snapshot.
    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    /// Current status, for quick gating checks.
    pub async fn status(&self) -> SessionStatus {
        self.state.lock().await.status
    }

    /// Request a (re)connect. No-op when already connected.
    pub fn connect(&self) -> Result<(), GreenroomError> {
        self.commands
            .send(SessionCommand::Connect)
            .map_err(|_| GreenroomError::Internal("session manager stopped".into()))
    }

    /// Request teardown. A `"logout"` reason additionally invalidates
    /// credentials; any other reason is echoed in the disconnected event.
    pub fn disconnect(&self, reason: Option<String>) -> Result<(), GreenroomError> {
        let logout = reason.as_deref() == Some("logout");
        self.commands
            .send(SessionCommand::Disconnect { logout, reason })
            .map_err(|_| GreenroomError::Internal("session manager stopped".into()))
    }
}

/// The supervising actor. Construct with [`SessionManager::new`], then drive
/// with [`SessionManager::run`] on its own task.
pub struct SessionManager {
    transport: Arc<dyn ChatTransport>,
    broker: Arc<dyn Broker>,
    state: Arc<Mutex<SessionState>>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    /// Lifecycle events out to the realtime broadcaster.
    events: mpsc::UnboundedSender<SessionEvent>,
    /// Message traffic forwarded to the relay.
    inbound: mpsc::UnboundedSender<TransportEvent>,
    policy: ReconnectPolicy,
    reconnect_at: Option<Instant>,
    attempt: u32,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        broker: Arc<dyn Broker>,
        events: mpsc::UnboundedSender<SessionEvent>,
        inbound: mpsc::UnboundedSender<TransportEvent>,
        policy: ReconnectPolicy,
    ) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(SessionState::disconnected()));
        let handle = SessionHandle {
            commands: command_tx,
            state: state.clone(),
        };
        let manager = Self {
            transport,
            broker,
            state,
            commands: command_rx,
            events,
            inbound,
            policy,
            reconnect_at: None,
            attempt: 0,
        };
        (manager, handle)
    }

    /// Main loop. Returns when the shutdown token fires or the transport
    /// event stream errors out terminally.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("session manager started");
        loop {
            let deadline = self.reconnect_at.unwrap_or_else(Instant::now);
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("session manager shutting down");
                    return;
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => return,
                    }
                }
                _ = sleep_until(deadline), if self.reconnect_at.is_some() => {
                    self.reconnect_at = None;
                    self.retry_connect().await;
                }
                event = self.transport.next_event() => {
                    match event {
                        Ok(event) => self.handle_event(event).await,
                        Err(e) => {
                            warn!(error = %e, "transport event stream error");
                        }
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect => {
                let mut state = self.state.lock().await;
                if state.status == SessionStatus::Connected {
                    debug!("connect requested while connected, ignoring");
                    return;
                }
                // Entry into QrPending happens on the pairing event, which
                // carries the payload; until then the handshake is in flight.
                state.status = SessionStatus::Connecting;
                state.session_id = None;
                state.qr_payload = None;
                drop(state);

                info!(
                    cached_credentials = self.transport.has_credentials(),
                    "starting device-session handshake"
                );
                if let Err(e) = self.transport.connect().await {
                    warn!(error = %e, "handshake start failed, awaiting close event");
                }
            }
            SessionCommand::Disconnect { logout, reason } => {
                self.reconnect_at = None;
                self.attempt = 0;

                let result = if logout {
                    self.transport.logout().await
                } else {
                    self.transport.disconnect().await
                };
                if let Err(e) = result {
                    warn!(error = %e, "transport teardown failed");
                }

                let reason = if logout {
                    "logged_out".to_string()
                } else {
                    reason.unwrap_or_else(|| "user_disconnect".to_string())
                };
                {
                    let mut state = self.state.lock().await;
                    state.status = if logout {
                        SessionStatus::LoggedOut
                    } else {
                        SessionStatus::Disconnected
                    };
                    state.session_id = None;
                    state.qr_payload = None;
                }
                info!(%reason, "session torn down");
                self.emit(SessionEvent::Disconnected { reason }).await;
            }
        }
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        if matches!(
            event,
            TransportEvent::MessageReceived { .. } | TransportEvent::MessageStatus { .. }
        ) && self.inbound.send(event.clone()).is_err()
        {
            warn!("relay receiver gone, dropping message event");
        }

        let t = {
            let state = self.state.lock().await;
            transition(&state, &event)
        };
        *self.state.lock().await = t.next.clone();

        for effect in t.effects {
            match effect {
                Effect::EmitEvent(session_event) => self.emit(session_event).await,
                Effect::ScheduleReconnect => {
                    let delay = self.policy.delay(self.attempt);
                    self.attempt += 1;
                    // Replaces any pending deadline: the timer is a singleton.
                    self.reconnect_at = Some(Instant::now() + delay);
                    info!(
                        attempt = self.attempt,
                        delay_ms = delay.as_millis() as u64,
                        "reconnect scheduled"
                    );
                }
                Effect::CancelReconnect => {
                    self.reconnect_at = None;
                    self.attempt = 0;
                }
                Effect::ClearCredentials => {
                    if let Err(e) = self.transport.logout().await {
                        warn!(error = %e, "credential invalidation failed");
                    }
                }
            }
        }
    }

    async fn retry_connect(&mut self) {
        {
            let mut state = self.state.lock().await;
            if state.status != SessionStatus::Reconnecting {
                return;
            }
            state.status = SessionStatus::Connecting;
        }
        info!(attempt = self.attempt, "reconnect attempt");
        if let Err(e) = self.transport.connect().await {
            warn!(error = %e, "reconnect attempt failed, awaiting close event");
        }
    }

    /// Deliver a lifecycle event to both consumers. Failures are logged and
    /// independent: a broker outage never blocks the realtime surface.
    async fn emit(&self, event: SessionEvent) {
        match serde_json::to_vec(&event) {
            Ok(payload) => {
                if let Err(e) = self
                    .broker
                    .publish(EXCHANGE_EVENTS, event.routing_key(), &payload)
                    .await
                {
                    warn!(error = %e, routing_key = event.routing_key(), "session event publish failed");
                }
            }
            Err(e) => warn!(error = %e, "session event serialization failed"),
        }
        if self.events.send(event).is_err() {
            debug!("no realtime consumer for session event");
        }
    }
}
