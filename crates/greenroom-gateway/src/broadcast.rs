// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime broadcaster: fans session and message state out to dashboard
//! subscribers.
//!
//! Every subscriber gets the current session-state snapshot before any live
//! event, so a dashboard that connects mid-lifecycle renders correctly.
//! Delivery is uniform (no per-subscriber filtering); a slow subscriber is
//! counted as lagged and the event is dropped for it, never buffered
//! unboundedly.

use std::sync::Arc;

use dashmap::DashMap;
use greenroom_core::events::{RealtimeEvent, SessionEvent};
use greenroom_resilience::Throttle;
use greenroom_session::SessionHandle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-subscriber buffer depth before events are dropped as lagged.
const SUBSCRIBER_BUFFER: usize = 64;

/// Structured result of one broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastOutcome {
    /// Subscribers that received the event.
    pub delivered: usize,
    /// Subscribers whose buffer was full; the event was dropped for them.
    pub lagged: usize,
}

/// Fans realtime events out to all connected dashboard clients.
pub struct Broadcaster {
    senders: DashMap<String, mpsc::Sender<RealtimeEvent>>,
    session: SessionHandle,
}

impl Broadcaster {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            senders: DashMap::new(),
            session,
        }
    }

    /// Register a new subscriber.
    ///
    /// The current session-state snapshot is queued before the subscriber is
    /// visible to `broadcast`, so it always arrives first.
    pub async fn subscribe(&self) -> (String, mpsc::Receiver<RealtimeEvent>) {
        let ws_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);

        let snapshot = self.session.snapshot().await;
        // Cannot fail: the channel is fresh and empty.
        let _ = tx
            .send(RealtimeEvent::SessionState { state: snapshot })
            .await;

        self.senders.insert(ws_id.clone(), tx);
        debug!(ws_id = %ws_id, subscribers = self.senders.len(), "subscriber added");
        (ws_id, rx)
    }

    /// Remove a subscriber. Local cleanup only.
    pub fn unsubscribe(&self, ws_id: &str) {
        self.senders.remove(ws_id);
        debug!(ws_id, subscribers = self.senders.len(), "subscriber removed");
    }

    /// Deliver one event to every subscriber.
    ///
    /// Closed subscribers are pruned; full ones are counted as lagged.
    pub fn broadcast(&self, event: &RealtimeEvent) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();
        let mut dead = Vec::new();

        for entry in self.senders.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => outcome.lagged += 1,
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(entry.key().clone()),
            }
        }
        for ws_id in dead {
            self.senders.remove(&ws_id);
        }
        outcome
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.senders.len()
    }
}

/// Pump session and relay events into the broadcaster.
///
/// Session lifecycle events additionally request a throttled full-snapshot
/// rebroadcast, so dashboards converge even if they missed an event.
pub async fn run_event_pump(
    broadcaster: Arc<Broadcaster>,
    mut session_events: mpsc::UnboundedReceiver<SessionEvent>,
    mut realtime_events: mpsc::UnboundedReceiver<RealtimeEvent>,
    refresh: Throttle<()>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            event = session_events.recv() => {
                let Some(event) = event else { return };
                broadcaster.broadcast(&RealtimeEvent::from_session_event(&event));
                refresh.call(());
            }
            event = realtime_events.recv() => {
                let Some(event) = event else { return };
                broadcaster.broadcast(&event);
            }
        }
    }
}

/// Serve throttled snapshot-refresh requests.
pub fn spawn_snapshot_refresher(
    broadcaster: Arc<Broadcaster>,
    session: SessionHandle,
    mut requests: mpsc::UnboundedReceiver<()>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                request = requests.recv() => {
                    if request.is_none() {
                        return;
                    }
                    let state = session.snapshot().await;
                    broadcaster.broadcast(&RealtimeEvent::SessionState { state });
                }
            }
        }
    });
}
