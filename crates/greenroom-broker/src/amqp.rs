// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AMQP implementation of the [`Broker`] seam using lapin.
//!
//! One connection, one channel. Topology is declared create-if-missing at
//! startup. Channel loss degrades `publish` to an error result the caller
//! can log and continue from; it never terminates the process.

use async_trait::async_trait;
use futures::StreamExt;
use greenroom_core::GreenroomError;
use greenroom_core::traits::broker::{Broker, Delivery, DeliveryAcker, TopologyDescriptor};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Broker adapter over a single AMQP connection.
pub struct AmqpBroker {
    // Held so the connection outlives the channel handles.
    _connection: Connection,
    channel: Channel,
}

impl AmqpBroker {
    /// Connect to the broker and open the shared channel.
    pub async fn connect(url: &str) -> Result<Self, GreenroomError> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| amqp_err("broker connect failed", e))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| amqp_err("channel open failed", e))?;
        info!(url, "connected to broker");
        Ok(Self {
            _connection: connection,
            channel,
        })
    }
}

fn amqp_err(message: &str, source: lapin::Error) -> GreenroomError {
    GreenroomError::Broker {
        message: message.to_string(),
        source: Some(Box::new(source)),
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn declare_topology(
        &self,
        topology: &TopologyDescriptor,
    ) -> Result<(), GreenroomError> {
        for exchange in &topology.exchanges {
            self.channel
                .exchange_declare(
                    exchange.name,
                    ExchangeKind::Topic,
                    ExchangeDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| amqp_err("exchange declare failed", e))?;
            debug!(exchange = exchange.name, "declared topic exchange");
        }

        for queue in &topology.queues {
            self.channel
                .queue_declare(
                    queue.name,
                    QueueDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| amqp_err("queue declare failed", e))?;
            self.channel
                .queue_bind(
                    queue.name,
                    queue.exchange,
                    queue.routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| amqp_err("queue bind failed", e))?;
            debug!(
                queue = queue.name,
                exchange = queue.exchange,
                routing_key = queue.routing_key,
                "declared and bound queue"
            );
        }

        info!(
            exchanges = topology.exchanges.len(),
            queues = topology.queues.len(),
            "broker topology declared"
        );
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), GreenroomError> {
        self.channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_delivery_mode(2), // persistent
            )
            .await
            .map_err(|e| amqp_err("publish failed", e))?
            .await
            .map_err(|e| amqp_err("publish confirm failed", e))?;
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        prefetch: u16,
    ) -> Result<mpsc::Receiver<Delivery>, GreenroomError> {
        self.channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| amqp_err("basic_qos failed", e))?;

        let mut consumer = self
            .channel
            .basic_consume(
                queue,
                &format!("greenroom-{queue}"),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| amqp_err("consume start failed", e))?;

        let (tx, rx) = mpsc::channel(prefetch.max(1) as usize);
        let queue_name = queue.to_string();
        tokio::spawn(async move {
            while let Some(next) = consumer.next().await {
                let delivery = match next {
                    Ok(delivery) => delivery,
                    Err(e) => {
                        error!(queue = %queue_name, error = %e, "consumer stream error");
                        continue;
                    }
                };
                let delivery = Delivery {
                    payload: delivery.data,
                    acker: Box::new(LapinAcker {
                        acker: delivery.acker,
                    }),
                };
                if tx.send(delivery).await.is_err() {
                    debug!(queue = %queue_name, "delivery receiver dropped, stopping consumer");
                    return;
                }
            }
            warn!(queue = %queue_name, "consumer stream ended");
        });

        Ok(rx)
    }
}

struct LapinAcker {
    acker: lapin::acker::Acker,
}

#[async_trait]
impl DeliveryAcker for LapinAcker {
    async fn ack(&self) -> Result<(), GreenroomError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| amqp_err("ack failed", e))
    }

    async fn nack_requeue(&self) -> Result<(), GreenroomError> {
        self.acker
            .nack(BasicNackOptions {
                requeue: true,
                ..Default::default()
            })
            .await
            .map_err(|e| amqp_err("nack failed", e))
    }
}
