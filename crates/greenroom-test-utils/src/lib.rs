// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the Greenroom workspace.
//!
//! Mock implementations of the transport and broker seams, plus small
//! helpers for building test fixtures.

pub mod mock_broker;
pub mod mock_transport;

pub use mock_broker::{AckOutcome, AckProbe, MockBroker, PublishedMessage};
pub use mock_transport::MockTransport;
