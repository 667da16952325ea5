// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP command surface and WebSocket realtime broadcaster.
//!
//! The command surface accepts connect/disconnect/send requests and answers
//! status queries; the realtime surface pushes session and message state to
//! subscribed dashboards with an initial snapshot on subscribe.

pub mod broadcast;
pub mod handlers;
pub mod server;
pub mod ws;

pub use broadcast::{Broadcaster, BroadcastOutcome, run_event_pump, spawn_snapshot_refresher};
pub use server::{GatewayState, ServerConfig, build_router, start_server};
