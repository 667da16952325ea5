// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded dedup cache for collapsing duplicate message deliveries.
//!
//! Primary key is the provider-assigned external id. When ids are unreliable
//! (some providers reuse or omit them on redelivery), a per-chat content
//! fingerprint catches immediate re-delivery of the same message. Capacity is
//! bounded with trim-to-tail eviction: once the id store exceeds the ceiling,
//! it is cut down to the most recent tail rather than cleared wholesale.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use greenroom_core::types::{ChatId, ExternalId, MessageEnvelope};
use tracing::debug;

/// Bounded record of recently observed message ids and content fingerprints.
///
/// Not thread-safe by itself; callers hold it behind a `tokio::sync::Mutex`
/// since mutations only interleave at await points.
pub struct DedupCache {
    capacity: usize,
    retain: usize,
    ids: HashSet<String>,
    order: VecDeque<String>,
    last_fingerprint: HashMap<ChatId, u64>,
}

impl DedupCache {
    /// Create a cache that trims to `retain` entries once `capacity` is exceeded.
    pub fn new(capacity: usize, retain: usize) -> Self {
        debug_assert!(retain < capacity, "retain must be below capacity");
        Self {
            capacity,
            retain,
            ids: HashSet::new(),
            order: VecDeque::new(),
            last_fingerprint: HashMap::new(),
        }
    }

    /// Whether this external id has been seen (and not yet evicted).
    pub fn has(&self, id: &ExternalId) -> bool {
        self.ids.contains(id.as_str())
    }

    /// Record an external id. Returns `true` when it was newly inserted,
    /// `false` when it was already present (a duplicate delivery).
    pub fn remember(&mut self, id: &ExternalId) -> bool {
        if !self.ids.insert(id.as_str().to_string()) {
            return false;
        }
        self.order.push_back(id.as_str().to_string());
        self.trim();
        true
    }

    /// Content fingerprint used as the fallback dedup key.
    pub fn fingerprint(chat_id: &ChatId, body: &str, timestamp: &DateTime<Utc>) -> u64 {
        let mut hasher = std::hash::DefaultHasher::new();
        chat_id.as_str().hash(&mut hasher);
        body.hash(&mut hasher);
        timestamp.timestamp_millis().hash(&mut hasher);
        hasher.finish()
    }

    /// Record a content fingerprint for a chat. Returns `true` when it differs
    /// from the most recent fingerprint seen for that chat.
    ///
    /// Only the single most recent fingerprint per chat is kept: this catches
    /// immediate re-delivery but deliberately not duplicates separated by
    /// other messages in the same chat.
    pub fn remember_fingerprint(&mut self, chat_id: &ChatId, fingerprint: u64) -> bool {
        match self.last_fingerprint.insert(chat_id.clone(), fingerprint) {
            Some(previous) => previous != fingerprint,
            None => true,
        }
    }

    /// Combined check: record the envelope and report whether it is a
    /// duplicate delivery.
    ///
    /// A fresh provider-assigned id is always accepted: two distinct messages
    /// may legitimately share chat, body, and timestamp granularity ("ok"
    /// sent twice in the same millisecond). The fingerprint verdict applies
    /// only to local or missing ids, where the id itself proves nothing.
    pub fn is_duplicate(&mut self, envelope: &MessageEnvelope) -> bool {
        let fresh_id = self.remember(&envelope.external_id);
        let fingerprint =
            Self::fingerprint(&envelope.chat_id, &envelope.body, &envelope.timestamp);
        let fresh_fingerprint = self.remember_fingerprint(&envelope.chat_id, fingerprint);

        if !fresh_id {
            debug!(external_id = %envelope.external_id, "duplicate delivery by id");
            return true;
        }
        if envelope.external_id.is_provider_assigned() {
            return false;
        }
        if !fresh_fingerprint {
            debug!(chat_id = %envelope.chat_id, "duplicate delivery by fingerprint");
            return true;
        }
        false
    }

    /// Number of ids currently held.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the cache holds no ids.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn trim(&mut self) {
        if self.order.len() <= self.capacity {
            return;
        }
        let evicted = self.order.len() - self.retain;
        for _ in 0..evicted {
            if let Some(old) = self.order.pop_front() {
                self.ids.remove(&old);
            }
        }
        debug!(evicted, retained = self.retain, "dedup cache trimmed");
    }
}
