// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock device-session transport for deterministic testing.
//!
//! `MockTransport` implements `ChatTransport` with injectable transport
//! events and captured outbound sends for assertion in tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use greenroom_core::GreenroomError;
use greenroom_core::events::TransportEvent;
use greenroom_core::traits::transport::ChatTransport;
use greenroom_core::types::{ExternalId, MessageEnvelope};

/// A mock device-session transport for testing.
///
/// Provides two queues:
/// - **events**: Events injected via `inject_event()` are returned by `next_event()`
/// - **sent**: Envelopes passed to `send()` are captured and retrievable via `sent_envelopes()`
pub struct MockTransport {
    events: Arc<Mutex<VecDeque<TransportEvent>>>,
    notify: Arc<Notify>,
    sent: Arc<Mutex<Vec<MessageEnvelope>>>,
    fail_sends: AtomicBool,
    credentials: AtomicBool,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl MockTransport {
    /// Create a mock transport with empty queues and no cached credentials.
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_sends: AtomicBool::new(false),
            credentials: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    /// Inject a transport event into the queue.
    ///
    /// The next call to `next_event()` will return this event.
    pub async fn inject_event(&self, event: TransportEvent) {
        self.events.lock().await.push_back(event);
        self.notify.notify_one();
    }

    /// Get all envelopes that were sent through `send()`.
    pub async fn sent_envelopes(&self) -> Vec<MessageEnvelope> {
        self.sent.lock().await.clone()
    }

    /// Get the count of sent envelopes.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Make every subsequent `send()` fail with a transport error.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Control what `has_credentials()` reports.
    pub fn set_credentials(&self, present: bool) {
        self.credentials.store(present, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn connect(&self) -> Result<(), GreenroomError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), GreenroomError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn logout(&self) -> Result<(), GreenroomError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.credentials.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, envelope: &MessageEnvelope) -> Result<ExternalId, GreenroomError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(GreenroomError::transport("mock send failure"));
        }
        self.sent.lock().await.push(envelope.clone());
        Ok(ExternalId::new(format!("mock-ext-{}", uuid::Uuid::new_v4())))
    }

    async fn next_event(&self) -> Result<TransportEvent, GreenroomError> {
        loop {
            {
                let mut queue = self.events.lock().await;
                if let Some(event) = queue.pop_front() {
                    return Ok(event);
                }
            }
            // Wait for notification that a new event was injected
            self.notify.notified().await;
        }
    }

    fn has_credentials(&self) -> bool {
        self.credentials.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenroom_core::events::CloseReason;

    #[tokio::test]
    async fn next_event_returns_injected_events_in_order() {
        let transport = MockTransport::new();
        transport
            .inject_event(TransportEvent::PairingCode {
                code: "qr-1".into(),
            })
            .await;
        transport.inject_event(TransportEvent::ConnectionOpened).await;

        assert_eq!(
            transport.next_event().await.unwrap(),
            TransportEvent::PairingCode {
                code: "qr-1".into()
            }
        );
        assert_eq!(
            transport.next_event().await.unwrap(),
            TransportEvent::ConnectionOpened
        );
    }

    #[tokio::test]
    async fn next_event_waits_for_injection() {
        let transport = Arc::new(MockTransport::new());
        let injector = transport.clone();

        tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            injector
                .inject_event(TransportEvent::ConnectionClosed {
                    reason: CloseReason::LoggedOut,
                })
                .await;
        });

        let event = tokio::time::timeout(
            tokio::time::Duration::from_secs(2),
            transport.next_event(),
        )
        .await
        .expect("next_event timed out")
        .unwrap();
        assert!(matches!(event, TransportEvent::ConnectionClosed { .. }));
    }

    #[tokio::test]
    async fn send_captures_envelopes_and_can_fail() {
        use greenroom_core::types::{ChatId, ContentType};

        let transport = MockTransport::new();
        let envelope = MessageEnvelope::outbound(
            ChatId::new("chat-1"),
            ContentType::Text,
            "hello",
            None,
        );

        let id = transport.send(&envelope).await.unwrap();
        assert!(id.as_str().starts_with("mock-ext-"));
        assert_eq!(transport.sent_count().await, 1);

        transport.fail_sends(true);
        assert!(transport.send(&envelope).await.is_err());
        assert_eq!(transport.sent_count().await, 1);
    }

    #[tokio::test]
    async fn logout_clears_credentials() {
        let transport = MockTransport::new();
        transport.set_credentials(true);
        assert!(transport.has_credentials());

        transport.logout().await.unwrap();
        assert!(!transport.has_credentials());
        assert_eq!(transport.logout_calls(), 1);
    }
}
