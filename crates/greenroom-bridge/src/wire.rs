// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire protocol spoken with the device-bridge sidecar.
//!
//! The sidecar owns the actual chat-network socket; this gateway drives it
//! with tagged-JSON commands and consumes its tagged-JSON events. Command
//! frames are tagged with `op`, event frames with `event`.

use serde::{Deserialize, Serialize};

use greenroom_core::types::{DeliveryStatus, MessageEnvelope};

/// Gateway -> sidecar command frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeCommand {
    /// Start (or restore) the device session.
    Connect {
        /// Whether the sidecar should try stored credentials before pairing.
        restore: bool,
    },
    /// Tear the session down, keeping credentials.
    Disconnect,
    /// Tear the session down and invalidate credentials.
    Logout,
    /// Send one message; the sidecar answers with a `send_result` frame
    /// carrying the same correlation id.
    Send {
        id: String,
        envelope: MessageEnvelope,
    },
}

/// Sidecar -> gateway event frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// A pairing token is ready to display.
    Qr { code: String },
    /// The device session is live.
    Open,
    /// The device session closed.
    Close { reason: String, logged_out: bool },
    /// A message was observed on the session.
    Message {
        envelope: MessageEnvelope,
        from_me: bool,
    },
    /// The provider reported a delivery-status change.
    Status {
        external_id: String,
        status: DeliveryStatus,
    },
    /// Resolution of an earlier `send` command.
    SendResult {
        id: String,
        #[serde(default)]
        external_id: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
}
