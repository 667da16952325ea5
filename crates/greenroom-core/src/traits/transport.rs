// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device-session transport seam.

use async_trait::async_trait;

use crate::error::GreenroomError;
use crate::events::TransportEvent;
use crate::types::{ExternalId, MessageEnvelope};

/// The single authenticated connection to the external chat network.
///
/// Implementations own the native socket/handshake; the session manager
/// drives them through this seam and consumes their event stream. All
/// methods take `&self` so the transport can be shared behind an `Arc`
/// between the manager loop and the relay's outbound consumer.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Start (or restart) the device-session handshake.
    ///
    /// Resolution is observational: success or failure is reported through
    /// the event stream, not the return value.
    async fn connect(&self) -> Result<(), GreenroomError>;

    /// Tear the session down without touching stored credentials.
    async fn disconnect(&self) -> Result<(), GreenroomError>;

    /// Tear the session down and invalidate stored credentials.
    async fn logout(&self) -> Result<(), GreenroomError>;

    /// Send one outbound message through the live session.
    ///
    /// Returns the provider-assigned external id on success. Fails with
    /// [`GreenroomError::Transport`] when the session is not usable.
    async fn send(&self, envelope: &MessageEnvelope) -> Result<ExternalId, GreenroomError>;

    /// Await the next native event from the session.
    async fn next_event(&self) -> Result<TransportEvent, GreenroomError>;

    /// Whether pairing credentials are cached from an earlier session.
    ///
    /// Decides whether `connect()` goes straight to `Connecting` or must
    /// issue a fresh pairing token first.
    fn has_credentials(&self) -> bool;
}
