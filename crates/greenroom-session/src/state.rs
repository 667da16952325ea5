// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure transition function for the device-session state machine.
//!
//! The manager feeds every transport event through [`transition`] and then
//! executes the returned effects. Keeping the function pure means the whole
//! edge set is testable without a live transport or a running timer.

use chrono::Utc;
use greenroom_core::events::{CloseReason, SessionEvent, TransportEvent};
use greenroom_core::types::{SessionId, SessionState, SessionStatus};

/// Side effects the manager must execute after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Publish a lifecycle event to the broker and the realtime surface.
    EmitEvent(SessionEvent),
    /// Arm (or reset) the singleton reconnect timer.
    ScheduleReconnect,
    /// Disarm the reconnect timer and reset the backoff counter.
    CancelReconnect,
    /// Invalidate stored pairing credentials.
    ClearCredentials,
}

/// Result of applying one transport event to the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: SessionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(state: &SessionState) -> Self {
        Self {
            next: state.clone(),
            effects: Vec::new(),
        }
    }
}

/// Apply one transport event to the session state.
///
/// Message traffic events touch only `last_activity_at`; the relay handles
/// their payloads separately.
pub fn transition(state: &SessionState, event: &TransportEvent) -> Transition {
    match event {
        TransportEvent::PairingCode { code } => {
            // A live session never regresses to pairing without a close first.
            if state.status == SessionStatus::Connected {
                return Transition::unchanged(state);
            }
            Transition {
                next: SessionState {
                    status: SessionStatus::QrPending,
                    session_id: None,
                    qr_payload: Some(code.clone()),
                    last_activity_at: Utc::now(),
                },
                effects: vec![
                    Effect::CancelReconnect,
                    Effect::EmitEvent(SessionEvent::QrReady {
                        qr_payload: code.clone(),
                    }),
                ],
            }
        }

        TransportEvent::ConnectionOpened => {
            let session_id = SessionId::generate();
            Transition {
                next: SessionState {
                    status: SessionStatus::Connected,
                    session_id: Some(session_id.clone()),
                    qr_payload: None,
                    last_activity_at: Utc::now(),
                },
                effects: vec![
                    Effect::CancelReconnect,
                    Effect::EmitEvent(SessionEvent::Connected { session_id }),
                ],
            }
        }

        TransportEvent::ConnectionClosed { reason } => {
            // A close observed while already down changes nothing.
            if state.status.is_terminal() {
                return Transition::unchanged(state);
            }
            match reason {
                CloseReason::LoggedOut => Transition {
                    next: SessionState {
                        status: SessionStatus::LoggedOut,
                        session_id: None,
                        qr_payload: None,
                        last_activity_at: Utc::now(),
                    },
                    effects: vec![
                        Effect::CancelReconnect,
                        Effect::ClearCredentials,
                        Effect::EmitEvent(SessionEvent::Disconnected {
                            reason: reason.to_string(),
                        }),
                    ],
                },
                CloseReason::TransportError(_) => Transition {
                    next: SessionState {
                        status: SessionStatus::Reconnecting,
                        session_id: None,
                        qr_payload: None,
                        last_activity_at: Utc::now(),
                    },
                    effects: vec![
                        Effect::ScheduleReconnect,
                        Effect::EmitEvent(SessionEvent::Disconnected {
                            reason: reason.to_string(),
                        }),
                    ],
                },
            }
        }

        TransportEvent::MessageReceived { .. } | TransportEvent::MessageStatus { .. } => {
            let mut next = state.clone();
            next.last_activity_at = Utc::now();
            Transition {
                next,
                effects: Vec::new(),
            }
        }
    }
}
