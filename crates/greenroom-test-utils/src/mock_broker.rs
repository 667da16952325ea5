// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory broker for deterministic testing.
//!
//! `MockBroker` implements the `Broker` seam with topic-style routing between
//! published payloads and active consumers, records every publish for
//! assertion, and hands out ack probes so tests can observe whether a
//! delivery was acked or nacked.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use greenroom_core::GreenroomError;
use greenroom_core::traits::broker::{
    Broker, Delivery, DeliveryAcker, TopologyDescriptor,
};

/// One recorded publish.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
}

/// How a delivery was resolved by its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Acked,
    NackedRequeue,
}

/// Observer handle for one delivery handed to a consumer.
#[derive(Clone)]
pub struct AckProbe {
    outcome: Arc<Mutex<Option<AckOutcome>>>,
}

impl AckProbe {
    pub async fn outcome(&self) -> Option<AckOutcome> {
        *self.outcome.lock().await
    }
}

struct RecordingAcker {
    outcome: Arc<Mutex<Option<AckOutcome>>>,
}

#[async_trait]
impl DeliveryAcker for RecordingAcker {
    async fn ack(&self) -> Result<(), GreenroomError> {
        *self.outcome.lock().await = Some(AckOutcome::Acked);
        Ok(())
    }

    async fn nack_requeue(&self) -> Result<(), GreenroomError> {
        *self.outcome.lock().await = Some(AckOutcome::NackedRequeue);
        Ok(())
    }
}

/// An in-memory broker for testing.
///
/// Publishes are recorded and, when a topology has been declared, routed to
/// any active consumer whose queue binding matches the routing key.
pub struct MockBroker {
    topology: Mutex<Option<TopologyDescriptor>>,
    published: Mutex<Vec<PublishedMessage>>,
    consumers: Mutex<HashMap<String, mpsc::Sender<Delivery>>>,
    probes: Mutex<Vec<AckProbe>>,
    fail_publishes: std::sync::atomic::AtomicBool,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            topology: Mutex::new(None),
            published: Mutex::new(Vec::new()),
            consumers: Mutex::new(HashMap::new()),
            probes: Mutex::new(Vec::new()),
            fail_publishes: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Get all recorded publishes.
    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().await.clone()
    }

    /// Get recorded publishes to one exchange/routing-key pair.
    pub async fn published_to(&self, exchange: &str, routing_key: &str) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .await
            .iter()
            .filter(|p| p.exchange == exchange && p.routing_key == routing_key)
            .cloned()
            .collect()
    }

    /// Make every subsequent `publish()` fail with a broker error.
    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publishes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Push a delivery straight into a queue's consumer, bypassing routing.
    ///
    /// Returns a probe the test can use to observe the ack outcome.
    pub async fn deliver(&self, queue: &str, payload: Vec<u8>) -> AckProbe {
        let probe = AckProbe {
            outcome: Arc::new(Mutex::new(None)),
        };
        let delivery = Delivery {
            payload,
            acker: Box::new(RecordingAcker {
                outcome: probe.outcome.clone(),
            }),
        };
        if let Some(tx) = self.consumers.lock().await.get(queue) {
            let _ = tx.send(delivery).await;
        }
        self.probes.lock().await.push(probe.clone());
        probe
    }

    /// Probes for every delivery created so far, in creation order.
    pub async fn probes(&self) -> Vec<AckProbe> {
        self.probes.lock().await.clone()
    }

    async fn route(&self, exchange: &str, routing_key: &str, payload: &[u8]) {
        let topology = self.topology.lock().await;
        let Some(topology) = topology.as_ref() else {
            return;
        };
        for queue in &topology.queues {
            if queue.exchange == exchange && topic_matches(queue.routing_key, routing_key) {
                let probe = AckProbe {
                    outcome: Arc::new(Mutex::new(None)),
                };
                let delivery = Delivery {
                    payload: payload.to_vec(),
                    acker: Box::new(RecordingAcker {
                        outcome: probe.outcome.clone(),
                    }),
                };
                if let Some(tx) = self.consumers.lock().await.get(queue.name) {
                    let _ = tx.send(delivery).await;
                }
                self.probes.lock().await.push(probe);
            }
        }
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MockBroker {
    async fn declare_topology(
        &self,
        topology: &TopologyDescriptor,
    ) -> Result<(), GreenroomError> {
        *self.topology.lock().await = Some(topology.clone());
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), GreenroomError> {
        if self
            .fail_publishes
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(GreenroomError::broker("mock publish failure"));
        }
        self.published.lock().await.push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload: payload.to_vec(),
        });
        self.route(exchange, routing_key, payload).await;
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        prefetch: u16,
    ) -> Result<mpsc::Receiver<Delivery>, GreenroomError> {
        let (tx, rx) = mpsc::channel(prefetch.max(1) as usize);
        self.consumers.lock().await.insert(queue.to_string(), tx);
        Ok(rx)
    }
}

/// Topic-pattern match with single-segment `*` wildcards, e.g. `session.*`
/// matches `session.qr` but not `session.qr.extra`.
fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern_parts: Vec<&str> = pattern.split('.').collect();
    let key_parts: Vec<&str> = routing_key.split('.').collect();
    if pattern_parts.len() != key_parts.len() {
        return false;
    }
    pattern_parts
        .iter()
        .zip(&key_parts)
        .all(|(p, k)| *p == "*" || p == k)
}
