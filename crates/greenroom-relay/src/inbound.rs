// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound relay: device-session traffic into the broker and the realtime
//! surface.
//!
//! For every message observed on the session: suppress echoes of our own
//! sends, collapse duplicate deliveries through the dedup cache, then publish
//! to the inbound queue and broadcast to dashboards. Publish and broadcast
//! are independent best-effort side effects; a broker outage never blocks
//! the realtime surface.

use std::collections::HashMap;
use std::sync::Arc;

use greenroom_core::events::{RealtimeEvent, TransportEvent};
use greenroom_core::traits::broker::{
    Broker, EXCHANGE_EVENTS, EXCHANGE_MESSAGES, RK_INBOUND, RK_MESSAGE_STATUS,
};
use greenroom_core::types::{ChatId, MessageEnvelope};
use greenroom_resilience::{DedupCache, UpdateCoalescer};
use serde_json::json;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest message preview carried in a chat update.
const PREVIEW_LEN: usize = 80;

/// Ceiling on the per-chat unread tally carried in chat updates.
const UNREAD_CAP: u64 = 999;

/// Most chats tracked for unread tallies before the map is reset wholesale.
/// The tallies are advisory display hints, losing them on reset is acceptable.
const UNREAD_CHAT_LIMIT: usize = 10_000;

/// Relays inbound session traffic to the broker and realtime subscribers.
pub struct InboundRelay {
    broker: Arc<dyn Broker>,
    dedup: Arc<Mutex<DedupCache>>,
    coalescer: UpdateCoalescer,
    realtime: mpsc::UnboundedSender<RealtimeEvent>,
    /// Running unread tally per chat for the coalesced chat updates.
    unread: Mutex<HashMap<ChatId, u64>>,
}

impl InboundRelay {
    pub fn new(
        broker: Arc<dyn Broker>,
        dedup: Arc<Mutex<DedupCache>>,
        coalescer: UpdateCoalescer,
        realtime: mpsc::UnboundedSender<RealtimeEvent>,
    ) -> Self {
        Self {
            broker,
            dedup,
            coalescer,
            realtime,
            unread: Mutex::new(HashMap::new()),
        }
    }

    /// Consume message events forwarded by the session manager until the
    /// channel closes or shutdown fires.
    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        shutdown: CancellationToken,
    ) {
        info!("inbound relay started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                event = events.recv() => {
                    match event {
                        Some(TransportEvent::MessageReceived { envelope, from_me }) => {
                            self.handle_message(envelope, from_me).await;
                        }
                        Some(TransportEvent::MessageStatus { external_id, status }) => {
                            let event = RealtimeEvent::MessageStatus {
                                client_message_id: None,
                                external_id,
                                status,
                                timestamp: chrono::Utc::now(),
                            };
                            self.publish_status(&event).await;
                            let _ = self.realtime.send(event);
                        }
                        Some(_) => {}
                        None => return,
                    }
                }
            }
        }
    }

    async fn handle_message(&self, envelope: MessageEnvelope, from_me: bool) {
        if from_me {
            debug!(external_id = %envelope.external_id, "echo suppressed");
            return;
        }

        if self.dedup.lock().await.is_duplicate(&envelope) {
            debug!(external_id = %envelope.external_id, "duplicate delivery dropped");
            return;
        }

        match serde_json::to_vec(&envelope) {
            Ok(payload) => {
                if let Err(e) = self
                    .broker
                    .publish(EXCHANGE_MESSAGES, RK_INBOUND, &payload)
                    .await
                {
                    warn!(error = %e, external_id = %envelope.external_id, "inbound publish failed");
                }
            }
            Err(e) => warn!(error = %e, "inbound envelope serialization failed"),
        }

        let unread = bump_unread(&mut *self.unread.lock().await, &envelope.chat_id);
        self.coalescer.enqueue(
            envelope.chat_id.clone(),
            json!({
                "lastMessagePreview": preview(&envelope.body),
                "lastActivityAt": envelope.timestamp,
                "unreadCount": unread,
            }),
        );

        if self
            .realtime
            .send(RealtimeEvent::MessageIn { envelope })
            .is_err()
        {
            debug!("no realtime consumer for inbound message");
        }
    }

    async fn publish_status(&self, event: &RealtimeEvent) {
        match serde_json::to_vec(event) {
            Ok(payload) => {
                if let Err(e) = self
                    .broker
                    .publish(EXCHANGE_EVENTS, RK_MESSAGE_STATUS, &payload)
                    .await
                {
                    warn!(error = %e, "status publish failed");
                }
            }
            Err(e) => warn!(error = %e, "status serialization failed"),
        }
    }
}

/// Bump a chat's unread tally, saturating at [`UNREAD_CAP`]. Once the map
/// tracks [`UNREAD_CHAT_LIMIT`] chats, a new chat resets it wholesale.
fn bump_unread(unread: &mut HashMap<ChatId, u64>, chat_id: &ChatId) -> u64 {
    if unread.len() >= UNREAD_CHAT_LIMIT && !unread.contains_key(chat_id) {
        debug!(chats = unread.len(), "unread tally map reset");
        unread.clear();
    }
    let count = unread.entry(chat_id.clone()).or_insert(0);
    *count = count.saturating_add(1).min(UNREAD_CAP);
    *count
}

fn preview(body: &str) -> String {
    if body.chars().count() <= PREVIEW_LEN {
        body.to_string()
    } else {
        body.chars().take(PREVIEW_LEN).collect()
    }
}

/// Forward committed chat-update batches to the realtime surface.
pub fn spawn_chat_update_forwarder(
    mut batches: mpsc::UnboundedReceiver<Vec<greenroom_core::events::ChatUpdate>>,
    realtime: mpsc::UnboundedSender<RealtimeEvent>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                batch = batches.recv() => {
                    let Some(batch) = batch else { return };
                    for update in batch {
                        if realtime
                            .send(RealtimeEvent::ChatUpdate { update })
                            .is_err()
                        {
                            return;
                        }
                    }
                }
            }
        }
    });
}
