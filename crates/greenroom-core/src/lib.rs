// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Greenroom messaging session gateway.
//!
//! This crate provides the canonical session/message types, event
//! vocabularies, error taxonomy, and the trait seams (`ChatTransport`,
//! `Broker`) the rest of the workspace plugs into.

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::GreenroomError;
pub use events::{CloseReason, RealtimeEvent, SessionEvent, TransportEvent};
pub use types::{
    ChatId, ContentType, DeliveryStatus, Direction, ExternalId, MessageEnvelope, SessionId,
    SessionState, SessionStatus,
};

pub use traits::{Broker, ChatTransport, Delivery, DeliveryAcker, TopologyDescriptor};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_cover_failure_taxonomy() {
        let _config = GreenroomError::Config("test".into());
        let _transport = GreenroomError::Transport {
            message: "test".into(),
            source: None,
        };
        let _auth = GreenroomError::Auth("test".into());
        let _broker = GreenroomError::Broker {
            message: "test".into(),
            source: None,
        };
        let _validation = GreenroomError::Validation("test".into());
        let _timeout = GreenroomError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = GreenroomError::Internal("test".into());
    }

    #[test]
    fn session_status_has_six_variants() {
        use std::str::FromStr;

        let variants = [
            SessionStatus::Disconnected,
            SessionStatus::QrPending,
            SessionStatus::Connecting,
            SessionStatus::Connected,
            SessionStatus::Reconnecting,
            SessionStatus::LoggedOut,
        ];
        assert_eq!(variants.len(), 6);

        // Display and FromStr round-trip for all variants.
        for variant in &variants {
            let s = variant.to_string();
            let parsed = SessionStatus::from_str(&s).expect("should parse back");
            assert_eq!(*variant, parsed);
        }
    }

    #[test]
    fn trait_seams_are_object_safe() {
        fn _assert_transport(_: &dyn ChatTransport) {}
        fn _assert_broker(_: &dyn Broker) {}
        fn _assert_acker(_: &dyn DeliveryAcker) {}
    }
}
