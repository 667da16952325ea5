// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound relay: prefetch-1 consumer on the outbound queue.
//!
//! Deliveries are processed strictly one at a time, preserving queue order.
//! A send is attempted only while the session is connected; anything else is
//! nacked with requeue so the broker redelivers once the session recovers.
//! Malformed payloads are the one exception: they are acked and dropped,
//! since requeueing them would redeliver the same garbage forever.

use std::sync::Arc;

use greenroom_core::GreenroomError;
use greenroom_core::events::RealtimeEvent;
use greenroom_core::traits::broker::{
    Broker, Delivery, EXCHANGE_EVENTS, QUEUE_OUTBOUND, RK_MESSAGE_STATUS,
};
use greenroom_core::traits::transport::ChatTransport;
use greenroom_core::types::{DeliveryStatus, MessageEnvelope, SessionStatus};
use greenroom_session::SessionHandle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Consumes the outbound queue and pushes messages through the device session.
pub struct OutboundRelay {
    broker: Arc<dyn Broker>,
    transport: Arc<dyn ChatTransport>,
    session: SessionHandle,
    realtime: mpsc::UnboundedSender<RealtimeEvent>,
}

impl OutboundRelay {
    pub fn new(
        broker: Arc<dyn Broker>,
        transport: Arc<dyn ChatTransport>,
        session: SessionHandle,
        realtime: mpsc::UnboundedSender<RealtimeEvent>,
    ) -> Self {
        Self {
            broker,
            transport,
            session,
            realtime,
        }
    }

    /// Start the consumer and process deliveries until shutdown.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), GreenroomError> {
        let mut deliveries = self.broker.consume(QUEUE_OUTBOUND, 1).await?;
        info!(queue = QUEUE_OUTBOUND, "outbound relay consuming");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                delivery = deliveries.recv() => {
                    match delivery {
                        Some(delivery) => self.handle_delivery(delivery).await,
                        None => {
                            warn!("outbound delivery stream closed");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    async fn handle_delivery(&self, delivery: Delivery) {
        let mut envelope: MessageEnvelope = match serde_json::from_slice(&delivery.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "undecodable outbound payload, dropping");
                if let Err(e) = delivery.acker.ack().await {
                    warn!(error = %e, "ack of dropped payload failed");
                }
                return;
            }
        };

        if self.session.status().await != SessionStatus::Connected {
            debug!(
                external_id = %envelope.external_id,
                "session not connected, requeueing outbound message"
            );
            if let Err(e) = delivery.acker.nack_requeue().await {
                warn!(error = %e, "nack failed");
            }
            return;
        }

        match self.transport.send(&envelope).await {
            Ok(provider_id) => {
                envelope.external_id = provider_id;
                envelope.delivery_status = DeliveryStatus::Sent;

                if let Err(e) = delivery.acker.ack().await {
                    warn!(error = %e, "ack failed after successful send");
                }
                self.publish_sent_status(&envelope).await;
            }
            Err(e) => {
                warn!(
                    external_id = %envelope.external_id,
                    error = %e,
                    "send failed, requeueing for redelivery"
                );
                // No status event: the caller observes nothing until a later
                // attempt succeeds.
                if let Err(e) = delivery.acker.nack_requeue().await {
                    warn!(error = %e, "nack failed");
                }
            }
        }
    }

    async fn publish_sent_status(&self, envelope: &MessageEnvelope) {
        let event = RealtimeEvent::status_for(envelope, DeliveryStatus::Sent);
        match serde_json::to_vec(&event) {
            Ok(payload) => {
                if let Err(e) = self
                    .broker
                    .publish(EXCHANGE_EVENTS, RK_MESSAGE_STATUS, &payload)
                    .await
                {
                    warn!(error = %e, "sent-status publish failed");
                }
            }
            Err(e) => warn!(error = %e, "sent-status serialization failed"),
        }
        if self.realtime.send(event).is_err() {
            debug!("no realtime consumer for sent status");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenroom_core::events::TransportEvent;
    use greenroom_core::types::{ChatId, ContentType};
    use greenroom_session::{ReconnectPolicy, SessionManager};
    use greenroom_test_utils::{AckOutcome, MockBroker, MockTransport};

    struct Fixture {
        broker: Arc<MockBroker>,
        transport: Arc<MockTransport>,
        realtime: mpsc::UnboundedReceiver<RealtimeEvent>,
        shutdown: CancellationToken,
    }

    async fn start(connected: bool) -> Fixture {
        let broker = Arc::new(MockBroker::new());
        let transport = Arc::new(MockTransport::new());
        let shutdown = CancellationToken::new();

        let (session_events_tx, _session_events_rx) = mpsc::unbounded_channel();
        let (inbound_tx, _inbound_rx) = mpsc::unbounded_channel();
        let (manager, handle) = SessionManager::new(
            transport.clone(),
            broker.clone(),
            session_events_tx,
            inbound_tx,
            ReconnectPolicy::default(),
        );
        tokio::spawn(manager.run(shutdown.clone()));

        if connected {
            transport.inject_event(TransportEvent::ConnectionOpened).await;
        }

        let (realtime_tx, realtime_rx) = mpsc::unbounded_channel();
        let relay = OutboundRelay::new(
            broker.clone(),
            transport.clone(),
            handle,
            realtime_tx,
        );
        let relay_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _ = relay.run(relay_shutdown).await;
        });
        settle().await;

        Fixture {
            broker,
            transport,
            realtime: realtime_rx,
            shutdown,
        }
    }

    async fn settle() {
        for _ in 0..30 {
            tokio::task::yield_now().await;
        }
    }

    fn payload(body: &str) -> Vec<u8> {
        let envelope = MessageEnvelope::outbound(
            ChatId::new("chat-1"),
            ContentType::Text,
            body,
            Some("client-1".into()),
        );
        serde_json::to_vec(&envelope).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn successful_send_acks_and_publishes_sent_status() {
        let mut fx = start(true).await;

        let probe = fx.broker.deliver(QUEUE_OUTBOUND, payload("hello")).await;
        settle().await;

        assert_eq!(probe.outcome().await, Some(AckOutcome::Acked));
        assert_eq!(fx.transport.sent_count().await, 1);

        let published = fx
            .broker
            .published_to(EXCHANGE_EVENTS, RK_MESSAGE_STATUS)
            .await;
        assert_eq!(published.len(), 1);
        let status: RealtimeEvent = serde_json::from_slice(&published[0].payload).unwrap();
        assert!(matches!(
            status,
            RealtimeEvent::MessageStatus {
                status: DeliveryStatus::Sent,
                ..
            }
        ));
        match fx.realtime.try_recv() {
            Ok(RealtimeEvent::MessageStatus {
                client_message_id, ..
            }) => assert_eq!(client_message_id.as_deref(), Some("client-1")),
            other => panic!("expected message:status, got {other:?}"),
        }
        fx.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_nacks_and_publishes_nothing() {
        let mut fx = start(true).await;
        fx.transport.fail_sends(true);

        let probe = fx.broker.deliver(QUEUE_OUTBOUND, payload("hello")).await;
        settle().await;

        assert_eq!(probe.outcome().await, Some(AckOutcome::NackedRequeue));
        assert!(
            fx.broker
                .published_to(EXCHANGE_EVENTS, RK_MESSAGE_STATUS)
                .await
                .is_empty()
        );
        assert!(fx.realtime.try_recv().is_err());
        fx.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_session_requeues_without_sending() {
        let fx = start(false).await;

        let probe = fx.broker.deliver(QUEUE_OUTBOUND, payload("hello")).await;
        settle().await;

        assert_eq!(probe.outcome().await, Some(AckOutcome::NackedRequeue));
        assert_eq!(fx.transport.sent_count().await, 0);
        fx.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn undecodable_payload_is_acked_and_dropped() {
        let fx = start(true).await;

        let probe = fx
            .broker
            .deliver(QUEUE_OUTBOUND, b"not json".to_vec())
            .await;
        settle().await;

        assert_eq!(probe.outcome().await, Some(AckOutcome::Acked));
        assert_eq!(fx.transport.sent_count().await, 0);
        fx.shutdown.cancel();
    }
}
