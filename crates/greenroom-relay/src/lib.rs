// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bidirectional message relay between the device session and the broker.
//!
//! [`inbound::InboundRelay`] normalizes session traffic into the broker and
//! the realtime surface; [`outbound::OutboundRelay`] drains the outbound
//! queue one message at a time with explicit ack/nack discipline.

pub mod inbound;
pub mod outbound;

pub use inbound::{InboundRelay, spawn_chat_update_forwarder};
pub use outbound::OutboundRelay;
