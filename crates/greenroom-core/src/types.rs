// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical session and message types shared across the Greenroom workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Opaque identifier for one authenticated device session.
///
/// Regenerated on every successful pairing or reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh session identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a conversation on the chat network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-assigned (or locally generated) message identifier.
///
/// Primary dedup key for inbound deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalId(pub String);

impl ExternalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a local identifier for messages the provider has not named yet.
    pub fn generate() -> Self {
        Self(format!("local-{}", uuid::Uuid::new_v4()))
    }

    /// Whether the id was assigned by the provider, as opposed to generated
    /// locally or missing. Provider ids are trusted as unique; local ones
    /// are not and need the content-fingerprint fallback.
    pub fn is_provider_assigned(&self) -> bool {
        !self.0.is_empty() && !self.0.starts_with("local-")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Device-session lifecycle status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No device session; initial state and explicit-teardown terminal.
    Disconnected,
    /// Pairing token issued, waiting for the companion device to scan it.
    QrPending,
    /// Pairing accepted, handshake in progress.
    Connecting,
    /// Handshake complete; the message relay is active.
    Connected,
    /// Connection lost for a transient reason; a single retry is scheduled.
    Reconnecting,
    /// Explicit logout; credentials cleared, fresh pairing required.
    LoggedOut,
}

impl SessionStatus {
    /// States in which no further transitions happen without an explicit command.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::LoggedOut)
    }
}

/// Snapshot of the device-session state machine.
///
/// Invariants: `qr_payload` is `Some` iff `status == QrPending`;
/// `session_id` is `Some` iff `status == Connected`. Mutated only by the
/// session manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub status: SessionStatus,
    pub session_id: Option<SessionId>,
    /// Opaque pairing token, present only while pairing is pending.
    pub qr_payload: Option<String>,
    pub last_activity_at: DateTime<Utc>,
}

impl SessionState {
    /// Initial state at gateway start.
    pub fn disconnected() -> Self {
        Self {
            status: SessionStatus::Disconnected,
            session_id: None,
            qr_payload: None,
            last_activity_at: Utc::now(),
        }
    }

    /// Checks the qr_payload/session_id presence invariants.
    pub fn invariants_hold(&self) -> bool {
        let qr_ok = self.qr_payload.is_some() == (self.status == SessionStatus::QrPending);
        let sid_ok = self.session_id.is_some() == (self.status == SessionStatus::Connected);
        qr_ok && sid_ok
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::disconnected()
    }
}

/// Direction of a message relative to the device session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Content type of a message body.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Image,
    Audio,
    Document,
    Video,
}

/// Delivery lifecycle of a message envelope.
///
/// The only mutable field of an envelope post-creation; envelopes are never
/// deleted, only superseded by newer status events with the same external id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
}

/// Canonical message representation exchanged between the relay and the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    pub external_id: ExternalId,
    /// Caller-supplied correlation id for outbound sends, echoed in status events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
    pub chat_id: ChatId,
    pub direction: Direction,
    pub content_type: ContentType,
    /// Message text, or a reference to the payload for media content.
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub delivery_status: DeliveryStatus,
}

impl MessageEnvelope {
    /// Build an inbound envelope as observed on the device session.
    pub fn inbound(
        external_id: ExternalId,
        chat_id: ChatId,
        content_type: ContentType,
        body: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            external_id,
            client_message_id: None,
            chat_id,
            direction: Direction::Inbound,
            content_type,
            body: body.into(),
            timestamp,
            delivery_status: DeliveryStatus::Delivered,
        }
    }

    /// Build an outbound envelope submitted by a caller.
    pub fn outbound(
        chat_id: ChatId,
        content_type: ContentType,
        body: impl Into<String>,
        client_message_id: Option<String>,
    ) -> Self {
        Self {
            external_id: ExternalId::generate(),
            client_message_id,
            chat_id,
            direction: Direction::Outbound,
            content_type,
            body: body.into(),
            timestamp: Utc::now(),
            delivery_status: DeliveryStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_state_holds_invariants() {
        let state = SessionState::disconnected();
        assert_eq!(state.status, SessionStatus::Disconnected);
        assert!(state.invariants_hold());
    }

    #[test]
    fn qr_payload_without_qr_pending_violates_invariant() {
        let mut state = SessionState::disconnected();
        state.qr_payload = Some("token".into());
        assert!(!state.invariants_hold());
    }

    #[test]
    fn connected_requires_session_id() {
        let mut state = SessionState::disconnected();
        state.status = SessionStatus::Connected;
        assert!(!state.invariants_hold());
        state.session_id = Some(SessionId::generate());
        assert!(state.invariants_hold());
    }

    #[test]
    fn terminal_states() {
        assert!(SessionStatus::Disconnected.is_terminal());
        assert!(SessionStatus::LoggedOut.is_terminal());
        assert!(!SessionStatus::Connected.is_terminal());
        assert!(!SessionStatus::Reconnecting.is_terminal());
    }

    #[test]
    fn envelope_serde_uses_camel_case() {
        let env = MessageEnvelope::outbound(
            ChatId("chat-1".into()),
            ContentType::Text,
            "hello",
            Some("client-1".into()),
        );
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"externalId\""));
        assert!(json.contains("\"clientMessageId\":\"client-1\""));
        assert!(json.contains("\"deliveryStatus\":\"pending\""));

        let parsed: MessageEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, env);
    }

    #[test]
    fn inbound_envelope_starts_delivered() {
        let env = MessageEnvelope::inbound(
            ExternalId("ext-1".into()),
            ChatId("chat-1".into()),
            ContentType::Text,
            "hi",
            Utc::now(),
        );
        assert_eq!(env.direction, Direction::Inbound);
        assert_eq!(env.delivery_status, DeliveryStatus::Delivered);
        assert!(env.client_message_id.is_none());
    }

    #[test]
    fn generated_ids_are_not_provider_assigned() {
        assert!(!ExternalId::generate().is_provider_assigned());
        assert!(!ExternalId::new("").is_provider_assigned());
        assert!(ExternalId::new("3EB0A9C7").is_provider_assigned());
    }

    #[test]
    fn content_type_parses_from_wire_strings() {
        use std::str::FromStr;
        assert_eq!(ContentType::from_str("text").unwrap(), ContentType::Text);
        assert_eq!(ContentType::from_str("image").unwrap(), ContentType::Image);
        assert!(ContentType::from_str("sticker").is_err());
    }
}
