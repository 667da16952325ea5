// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event vocabularies for the three surfaces of the gateway.
//!
//! [`TransportEvent`] is what the device-session transport emits,
//! [`SessionEvent`] is what the session manager publishes after a state
//! transition, and [`RealtimeEvent`] is the wire format pushed to dashboard
//! subscribers and onto the broker's event exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    ChatId, DeliveryStatus, ExternalId, MessageEnvelope, SessionId, SessionState,
};

/// Why a device-session connection closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum CloseReason {
    /// The user logged the device out; terminal, credentials invalidated.
    LoggedOut,
    /// Transient transport failure; the session manager will retry.
    TransportError(String),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::LoggedOut => write!(f, "logged_out"),
            CloseReason::TransportError(detail) => write!(f, "transport_error: {detail}"),
        }
    }
}

/// Native events emitted by the device-session transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TransportEvent {
    /// A pairing token was issued for the companion device.
    PairingCode { code: String },
    /// The handshake completed and the session is live.
    ConnectionOpened,
    /// The connection dropped; `reason` decides logout vs. reconnect.
    ConnectionClosed { reason: CloseReason },
    /// A message was observed on the session (either direction).
    MessageReceived {
        envelope: MessageEnvelope,
        /// Set for self-originated messages (echoes of our own sends).
        from_me: bool,
    },
    /// The provider reported a delivery-status change for an earlier send.
    MessageStatus {
        external_id: ExternalId,
        status: DeliveryStatus,
    },
}

/// Lifecycle events emitted by the session manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SessionEvent {
    QrReady { qr_payload: String },
    Connected { session_id: SessionId },
    Disconnected { reason: String },
}

impl SessionEvent {
    /// Routing key under which this event is published on the events exchange.
    pub fn routing_key(&self) -> &'static str {
        match self {
            SessionEvent::QrReady { .. } => "session.qr",
            SessionEvent::Connected { .. } => "session.connected",
            SessionEvent::Disconnected { .. } => "session.disconnected",
        }
    }
}

/// Shallow per-chat activity update, committed in coalesced batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUpdate {
    pub chat_id: ChatId,
    /// Field-wise last-write-wins partial update (JSON object).
    pub fields: serde_json::Value,
}

/// Events pushed to realtime dashboard subscribers.
///
/// Tagged with the `type` field the dashboards switch on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RealtimeEvent {
    #[serde(rename = "session:qr", rename_all = "camelCase")]
    SessionQr {
        qr_payload: String,
        session_id: Option<SessionId>,
    },
    #[serde(rename = "session:connected", rename_all = "camelCase")]
    SessionConnected { session_id: SessionId },
    #[serde(rename = "session:disconnected", rename_all = "camelCase")]
    SessionDisconnected { reason: String },
    /// Full snapshot, sent on subscribe and on throttled refreshes.
    #[serde(rename = "session:state", rename_all = "camelCase")]
    SessionState { state: SessionState },
    #[serde(rename = "message:in", rename_all = "camelCase")]
    MessageIn { envelope: MessageEnvelope },
    #[serde(rename = "message:status", rename_all = "camelCase")]
    MessageStatus {
        client_message_id: Option<String>,
        external_id: ExternalId,
        status: DeliveryStatus,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "chat:update", rename_all = "camelCase")]
    ChatUpdate { update: ChatUpdate },
}

impl RealtimeEvent {
    /// Lift a session lifecycle event into the realtime vocabulary.
    pub fn from_session_event(event: &SessionEvent) -> Self {
        match event {
            SessionEvent::QrReady { qr_payload } => RealtimeEvent::SessionQr {
                qr_payload: qr_payload.clone(),
                session_id: None,
            },
            SessionEvent::Connected { session_id } => RealtimeEvent::SessionConnected {
                session_id: session_id.clone(),
            },
            SessionEvent::Disconnected { reason } => RealtimeEvent::SessionDisconnected {
                reason: reason.clone(),
            },
        }
    }

    /// Build a status event for a freshly acknowledged outbound send.
    pub fn status_for(envelope: &MessageEnvelope, status: DeliveryStatus) -> Self {
        RealtimeEvent::MessageStatus {
            client_message_id: envelope.client_message_id.clone(),
            external_id: envelope.external_id.clone(),
            status,
            timestamp: Utc::now(),
        }
    }
}
