// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Greenroom gateway.
//!
//! The variants map onto the gateway's failure taxonomy: transport errors
//! are transient (reconnect supervision or nack/requeue), auth errors are
//! terminal for the session, broker errors degrade publishing to a no-op,
//! and validation errors are rejected at the command surface. None of them
//! is ever allowed to terminate the process.

use thiserror::Error;

/// The primary error type used across all Greenroom crates.
#[derive(Debug, Error)]
pub enum GreenroomError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Transient device-session transport errors (handshake or send failure).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Terminal authentication failure (explicit logout / invalid credentials).
    /// Fatal to the current session, not to the process.
    #[error("auth error: {0}")]
    Auth(String),

    /// Broker publish/consume failure (channel down, declare refused).
    #[error("broker error: {message}")]
    Broker {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed command input, rejected synchronously with no state mutation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GreenroomError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a broker error without an underlying source.
    pub fn broker(message: impl Into<String>) -> Self {
        Self::Broker {
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error should be treated as transient (retry/requeue)
    /// rather than terminal for the session.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Broker { .. } | Self::Timeout { .. }
        )
    }
}
