// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message-broker seam and the static topology descriptor.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::GreenroomError;

/// Topic exchange carrying message traffic (inbound/outbound envelopes).
pub const EXCHANGE_MESSAGES: &str = "messaging.messages";
/// Topic exchange carrying session lifecycle and delivery-status events.
pub const EXCHANGE_EVENTS: &str = "messaging.events";

/// Durable queue the relay's outbound consumer pulls from.
pub const QUEUE_OUTBOUND: &str = "msg.outbound";
/// Durable queue inbound envelopes are published into.
pub const QUEUE_INBOUND: &str = "msg.inbound";
/// Durable queue collecting everything under `session.*`.
pub const QUEUE_SESSION_EVENTS: &str = "session.events";

pub const RK_OUTBOUND: &str = "outbound";
pub const RK_INBOUND: &str = "inbound";
pub const RK_SESSION_WILDCARD: &str = "session.*";
/// Delivery-status events ride the events exchange under the session prefix
/// so the `session.*` binding captures them.
pub const RK_MESSAGE_STATUS: &str = "session.message-status";

/// One topic exchange in the topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: &'static str,
}

/// One durable queue and its binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: &'static str,
    pub exchange: &'static str,
    pub routing_key: &'static str,
}

/// Static exchange/queue/binding graph, declared idempotently at startup
/// and never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyDescriptor {
    pub exchanges: Vec<ExchangeSpec>,
    pub queues: Vec<QueueSpec>,
}

impl TopologyDescriptor {
    /// The fixed gateway topology.
    pub fn standard() -> Self {
        Self {
            exchanges: vec![
                ExchangeSpec {
                    name: EXCHANGE_MESSAGES,
                },
                ExchangeSpec {
                    name: EXCHANGE_EVENTS,
                },
            ],
            queues: vec![
                QueueSpec {
                    name: QUEUE_OUTBOUND,
                    exchange: EXCHANGE_MESSAGES,
                    routing_key: RK_OUTBOUND,
                },
                QueueSpec {
                    name: QUEUE_INBOUND,
                    exchange: EXCHANGE_MESSAGES,
                    routing_key: RK_INBOUND,
                },
                QueueSpec {
                    name: QUEUE_SESSION_EVENTS,
                    exchange: EXCHANGE_EVENTS,
                    routing_key: RK_SESSION_WILDCARD,
                },
            ],
        }
    }
}

/// Acknowledgement handle for one broker delivery.
///
/// Handlers must resolve every delivery exactly once: `ack` on successful
/// processing, `nack_requeue` to have the broker redeliver.
#[async_trait]
pub trait DeliveryAcker: Send + Sync {
    async fn ack(&self) -> Result<(), GreenroomError>;
    async fn nack_requeue(&self) -> Result<(), GreenroomError>;
}

/// One delivery pulled from a queue.
pub struct Delivery {
    pub payload: Vec<u8>,
    pub acker: Box<dyn DeliveryAcker>,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Durable exchange/queue messaging middleware with at-least-once delivery.
///
/// `publish` returns a structured result; callers decide whether to retry,
/// drop, or escalate. The adapter itself never panics on broker loss.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Create-if-missing declaration of the full topology.
    async fn declare_topology(
        &self,
        topology: &TopologyDescriptor,
    ) -> Result<(), GreenroomError>;

    /// Publish one payload to `exchange` under `routing_key`.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), GreenroomError>;

    /// Start consuming `queue` with the given prefetch window.
    ///
    /// Deliveries are not auto-acked; the receiver must resolve each one
    /// through its [`DeliveryAcker`].
    async fn consume(
        &self,
        queue: &str,
        prefetch: u16,
    ) -> Result<mpsc::Receiver<Delivery>, GreenroomError>;
}
