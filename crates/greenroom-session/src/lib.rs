// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device-session state machine and reconnect supervision.
//!
//! The state machine itself is a pure function in [`state`]; the actor in
//! [`manager`] owns the transport, executes effects, and guards the
//! singleton reconnect timer.

pub mod manager;
pub mod state;

pub use manager::{ReconnectPolicy, SessionHandle, SessionManager};
pub use state::{Effect, Transition, transition};
