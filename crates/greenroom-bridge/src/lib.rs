// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device-bridge transport.
//!
//! Implements the `ChatTransport` seam against a sidecar process that owns
//! the real chat-network socket, speaking the tagged-JSON protocol in
//! [`wire`] over a WebSocket.

pub mod transport;
pub mod wire;

pub use transport::BridgeTransport;
pub use wire::{BridgeCommand, BridgeEvent};
