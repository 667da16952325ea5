// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for the Greenroom gateway.
//!
//! Three small mechanisms shared by the relay and the realtime surface:
//!
//! - [`DedupCache`] collapses duplicate broker/transport deliveries.
//! - [`UpdateCoalescer`] batches partial chat updates behind a quiescence
//!   window.
//! - [`Throttle`] enforces a minimum interval between expensive refreshes
//!   without dropping the latest request.

pub mod coalesce;
pub mod dedup;
pub mod throttle;

pub use coalesce::UpdateCoalescer;
pub use dedup::DedupCache;
pub use throttle::Throttle;
