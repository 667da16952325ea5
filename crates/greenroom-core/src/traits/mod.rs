// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams the gateway is composed through.

pub mod broker;
pub mod transport;

pub use broker::{Broker, Delivery, DeliveryAcker, TopologyDescriptor};
pub use transport::ChatTransport;
