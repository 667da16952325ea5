// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Update coalescer: merges partial entity updates and commits them as one
//! batch after a quiescence window.
//!
//! Multiple partial updates to the same key within the window collapse into
//! a single committed update with field-wise last-write-wins merge. The timer
//! is armed by the first enqueue of a batch and is not extended by later
//! enqueues, so a steady stream of updates still commits periodically.

use std::collections::HashMap;
use std::time::Duration;

use greenroom_core::events::ChatUpdate;
use greenroom_core::types::ChatId;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

enum Command {
    Enqueue { key: ChatId, fields: serde_json::Value },
    Flush,
}

/// Handle to a running coalescer task.
///
/// Committed batches arrive on the receiver returned by [`spawn`], one
/// `ChatUpdate` per distinct key, in first-enqueue order.
#[derive(Clone)]
pub struct UpdateCoalescer {
    tx: mpsc::UnboundedSender<Command>,
}

impl UpdateCoalescer {
    /// Spawn the coalescer task with the given quiescence window.
    pub fn spawn(window: Duration) -> (Self, mpsc::UnboundedReceiver<Vec<ChatUpdate>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, out_tx, window));
        (Self { tx }, out_rx)
    }

    /// Merge a partial update for `key` into the pending batch.
    ///
    /// `fields` should be a JSON object; its entries overwrite any pending
    /// entries for the same key (shallow last-write-wins).
    pub fn enqueue(&self, key: ChatId, fields: serde_json::Value) {
        if self
            .tx
            .send(Command::Enqueue { key, fields })
            .is_err()
        {
            warn!("coalescer task gone, dropping update");
        }
    }

    /// Cancel the pending timer and commit all accumulated updates now.
    pub fn flush(&self) {
        let _ = self.tx.send(Command::Flush);
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Command>,
    out: mpsc::UnboundedSender<Vec<ChatUpdate>>,
    window: Duration,
) {
    let mut pending: HashMap<ChatId, serde_json::Value> = HashMap::new();
    let mut order: Vec<ChatId> = Vec::new();
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            cmd = rx.recv() => {
                match cmd {
                    Some(Command::Enqueue { key, fields }) => {
                        if !pending.contains_key(&key) {
                            order.push(key.clone());
                        }
                        merge_shallow(pending.entry(key).or_insert_with(
                            || serde_json::Value::Object(Default::default()),
                        ), fields);
                        // Arm the timer only if no commit is already pending.
                        if deadline.is_none() {
                            deadline = Some(Instant::now() + window);
                        }
                    }
                    Some(Command::Flush) => {
                        deadline = None;
                        commit(&mut pending, &mut order, &out);
                    }
                    None => {
                        commit(&mut pending, &mut order, &out);
                        return;
                    }
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                commit(&mut pending, &mut order, &out);
            }
        }
    }
}

fn commit(
    pending: &mut HashMap<ChatId, serde_json::Value>,
    order: &mut Vec<ChatId>,
    out: &mpsc::UnboundedSender<Vec<ChatUpdate>>,
) {
    if pending.is_empty() {
        return;
    }
    let batch: Vec<ChatUpdate> = order
        .drain(..)
        .filter_map(|key| {
            pending.remove(&key).map(|fields| ChatUpdate {
                chat_id: key,
                fields,
            })
        })
        .collect();
    debug!(updates = batch.len(), "committing coalesced batch");
    let _ = out.send(batch);
}

/// Merge `incoming` into `target` with shallow field-wise last-write-wins.
///
/// Non-object incoming values replace the target wholesale.
fn merge_shallow(target: &mut serde_json::Value, incoming: serde_json::Value) {
    match (target.as_object_mut(), incoming) {
        (Some(target_map), serde_json::Value::Object(incoming_map)) => {
            for (field, value) in incoming_map {
                target_map.insert(field, value);
            }
        }
        (_, other) => *target = other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::{advance, pause};

    const WINDOW: Duration = Duration::from_millis(750);

    #[tokio::test]
    async fn same_key_collapses_to_one_commit() {
        pause();
        let (coalescer, mut batches) = UpdateCoalescer::spawn(WINDOW);

        coalescer.enqueue(ChatId::new("chat-1"), json!({"unread": 1, "preview": "a"}));
        coalescer.enqueue(ChatId::new("chat-1"), json!({"unread": 2}));
        coalescer.enqueue(ChatId::new("chat-1"), json!({"preview": "c"}));
        tokio::task::yield_now().await;

        advance(WINDOW + Duration::from_millis(1)).await;

        let batch = batches.recv().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].chat_id, ChatId::new("chat-1"));
        // Last write wins per field.
        assert_eq!(batch[0].fields, json!({"unread": 2, "preview": "c"}));
    }

    #[tokio::test]
    async fn distinct_keys_commit_in_first_enqueue_order() {
        pause();
        let (coalescer, mut batches) = UpdateCoalescer::spawn(WINDOW);

        coalescer.enqueue(ChatId::new("chat-b"), json!({"unread": 1}));
        coalescer.enqueue(ChatId::new("chat-a"), json!({"unread": 1}));
        coalescer.enqueue(ChatId::new("chat-b"), json!({"unread": 2}));
        tokio::task::yield_now().await;

        advance(WINDOW + Duration::from_millis(1)).await;

        let batch = batches.recv().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].chat_id, ChatId::new("chat-b"));
        assert_eq!(batch[1].chat_id, ChatId::new("chat-a"));
    }

    #[tokio::test]
    async fn flush_commits_immediately() {
        pause();
        let (coalescer, mut batches) = UpdateCoalescer::spawn(WINDOW);

        coalescer.enqueue(ChatId::new("chat-1"), json!({"unread": 1}));
        coalescer.flush();

        let batch = batches.recv().await.unwrap();
        assert_eq!(batch.len(), 1);

        // Timer was cancelled: nothing more arrives after the window.
        advance(WINDOW * 2).await;
        assert!(batches.try_recv().is_err());
    }

    #[tokio::test]
    async fn timer_not_extended_by_later_enqueues() {
        pause();
        let (coalescer, mut batches) = UpdateCoalescer::spawn(WINDOW);

        coalescer.enqueue(ChatId::new("chat-1"), json!({"unread": 1}));
        tokio::task::yield_now().await;
        advance(WINDOW / 2).await;
        coalescer.enqueue(ChatId::new("chat-1"), json!({"unread": 2}));
        tokio::task::yield_now().await;

        // Window measured from the first enqueue, so half remains.
        advance(WINDOW / 2 + Duration::from_millis(1)).await;
        let batch = batches.recv().await.unwrap();
        assert_eq!(batch[0].fields, json!({"unread": 2}));
    }
}
