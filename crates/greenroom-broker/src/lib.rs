// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AMQP broker topology adapter.
//!
//! Implements the [`greenroom_core::traits::broker::Broker`] seam over a
//! real AMQP broker via lapin. The static topology lives in core; this crate
//! only knows how to declare and drive it.

pub mod amqp;

pub use amqp::AmqpBroker;
