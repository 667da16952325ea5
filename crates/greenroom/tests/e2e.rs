// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end gateway pipeline tests over mock transport and broker.
//!
//! Wires the session manager, relays, and realtime broadcaster together the
//! same way `greenroom serve` does, then drives the transport with injected
//! events and observes the broker and a realtime subscriber.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use greenroom_core::events::{RealtimeEvent, TransportEvent};
use greenroom_core::traits::broker::{EXCHANGE_MESSAGES, QUEUE_OUTBOUND, RK_INBOUND};
use greenroom_core::types::{
    ChatId, ContentType, ExternalId, MessageEnvelope, SessionStatus,
};
use greenroom_gateway::{Broadcaster, run_event_pump, spawn_snapshot_refresher};
use greenroom_relay::{InboundRelay, OutboundRelay, spawn_chat_update_forwarder};
use greenroom_resilience::{DedupCache, Throttle, UpdateCoalescer};
use greenroom_session::{ReconnectPolicy, SessionHandle, SessionManager};
use greenroom_test_utils::{AckOutcome, MockBroker, MockTransport};

struct Gateway {
    transport: Arc<MockTransport>,
    broker: Arc<MockBroker>,
    session: SessionHandle,
    broadcaster: Arc<Broadcaster>,
    shutdown: CancellationToken,
}

/// Assemble the full pipeline the way `greenroom serve` does.
fn start() -> Gateway {
    let transport = Arc::new(MockTransport::new());
    let broker = Arc::new(MockBroker::new());
    let shutdown = CancellationToken::new();

    let (session_events_tx, session_events_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (manager, session) = SessionManager::new(
        transport.clone(),
        broker.clone(),
        session_events_tx,
        inbound_tx,
        ReconnectPolicy::default(),
    );
    tokio::spawn(manager.run(shutdown.clone()));

    let (realtime_tx, realtime_rx) = mpsc::unbounded_channel();
    let broadcaster = Arc::new(Broadcaster::new(session.clone()));
    let (refresh, refresh_rx) = Throttle::spawn(Duration::from_millis(2_000));
    spawn_snapshot_refresher(
        broadcaster.clone(),
        session.clone(),
        refresh_rx,
        shutdown.clone(),
    );
    tokio::spawn(run_event_pump(
        broadcaster.clone(),
        session_events_rx,
        realtime_rx,
        refresh,
        shutdown.clone(),
    ));

    let dedup = Arc::new(Mutex::new(DedupCache::new(5_000, 1_000)));
    let (coalescer, batches) = UpdateCoalescer::spawn(Duration::from_millis(750));
    let inbound_relay = InboundRelay::new(broker.clone(), dedup, coalescer, realtime_tx.clone());
    tokio::spawn(inbound_relay.run(inbound_rx, shutdown.clone()));
    spawn_chat_update_forwarder(batches, realtime_tx.clone(), shutdown.clone());

    let outbound_relay = OutboundRelay::new(
        broker.clone(),
        transport.clone(),
        session.clone(),
        realtime_tx,
    );
    let outbound_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = outbound_relay.run(outbound_shutdown).await;
    });

    Gateway {
        transport,
        broker,
        session,
        broadcaster,
        shutdown,
    }
}

async fn settle() {
    for _ in 0..30 {
        tokio::task::yield_now().await;
    }
}

/// Drain everything currently buffered for a subscriber.
fn drain(rx: &mut mpsc::Receiver<RealtimeEvent>) -> Vec<RealtimeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn pairing_then_open_reaches_connected_with_prior_subscriber() {
    let gw = start();

    // Subscriber connects before any lifecycle event.
    let (_ws_id, mut rx) = gw.broadcaster.subscribe().await;
    settle().await;

    gw.transport
        .inject_event(TransportEvent::PairingCode {
            code: "qr-token-1".into(),
        })
        .await;
    settle().await;

    let snapshot = gw.session.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::QrPending);
    assert_eq!(snapshot.qr_payload.as_deref(), Some("qr-token-1"));
    assert!(snapshot.session_id.is_none());

    gw.transport
        .inject_event(TransportEvent::ConnectionOpened)
        .await;
    settle().await;

    let snapshot = gw.session.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Connected);
    assert!(snapshot.qr_payload.is_none());
    assert!(snapshot.session_id.is_some());

    // The pre-subscribed observer saw the snapshot first, then qr before
    // connected.
    let events = drain(&mut rx);
    assert!(matches!(events[0], RealtimeEvent::SessionState { .. }));
    let qr_at = events
        .iter()
        .position(|e| matches!(e, RealtimeEvent::SessionQr { .. }))
        .expect("session:qr observed");
    let connected_at = events
        .iter()
        .position(|e| matches!(e, RealtimeEvent::SessionConnected { .. }))
        .expect("session:connected observed");
    assert!(qr_at < connected_at);

    gw.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn duplicate_inbound_delivery_reaches_subscribers_once() {
    let gw = start();
    let (_ws_id, mut rx) = gw.broadcaster.subscribe().await;
    settle().await;
    drain(&mut rx); // snapshot

    let envelope = MessageEnvelope::inbound(
        ExternalId::new("ext-1"),
        ChatId::new("chat-1"),
        ContentType::Text,
        "hello",
        chrono::Utc::now(),
    );
    for _ in 0..2 {
        gw.transport
            .inject_event(TransportEvent::MessageReceived {
                envelope: envelope.clone(),
                from_me: false,
            })
            .await;
    }
    settle().await;

    assert_eq!(
        gw.broker
            .published_to(EXCHANGE_MESSAGES, RK_INBOUND)
            .await
            .len(),
        1
    );
    let inbound: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, RealtimeEvent::MessageIn { .. }))
        .collect();
    assert_eq!(inbound.len(), 1);

    gw.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn outbound_delivery_is_sent_and_acked_when_connected() {
    let gw = start();
    gw.transport
        .inject_event(TransportEvent::ConnectionOpened)
        .await;
    settle().await;
    assert_eq!(gw.session.status().await, SessionStatus::Connected);

    let envelope = MessageEnvelope::outbound(
        ChatId::new("chat-1"),
        ContentType::Text,
        "on my way",
        Some("client-1".into()),
    );
    let probe = gw
        .broker
        .deliver(QUEUE_OUTBOUND, serde_json::to_vec(&envelope).unwrap())
        .await;
    settle().await;

    assert_eq!(gw.transport.sent_count().await, 1);
    assert_eq!(probe.outcome().await, Some(AckOutcome::Acked));

    gw.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn outbound_delivery_is_requeued_while_disconnected() {
    let gw = start();
    settle().await;
    assert_eq!(gw.session.status().await, SessionStatus::Disconnected);

    let envelope = MessageEnvelope::outbound(
        ChatId::new("chat-1"),
        ContentType::Text,
        "queued for later",
        None,
    );
    let probe = gw
        .broker
        .deliver(QUEUE_OUTBOUND, serde_json::to_vec(&envelope).unwrap())
        .await;
    settle().await;

    assert_eq!(gw.transport.sent_count().await, 0);
    assert_eq!(probe.outcome().await, Some(AckOutcome::NackedRequeue));

    gw.shutdown.cancel();
}
