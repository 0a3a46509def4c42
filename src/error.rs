//! Domain error types shared across the session, transport, and dispatch
//! modules.

use thiserror::Error;

use crate::session::SessionPhase;

/// Failure at the media transport layer.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("transport rejected join for meeting {meeting_id}: {reason}")]
    JoinFailed { meeting_id: String, reason: String },

    #[error("transport failed to end call for meeting {meeting_id}: {reason}")]
    EndFailed { meeting_id: String, reason: String },
}

/// Failure to schedule an AI agent for a meeting.
///
/// A single failed attempt, not a final verdict: the dispatch coordinator
/// retries before reporting a terminal `Failed` status.
#[derive(Debug, Clone, Error)]
#[error("agent dispatch failed for meeting {meeting_id}: {reason}")]
pub struct DispatchError {
    pub meeting_id: String,
    pub reason: String,
}

/// Errors surfaced to callers of the session service.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The caller asked for an operation that is not legal in the session's
    /// current state and is not one of the defined idempotent no-ops.
    #[error("'{operation}' is not legal for a session in the {} state", .phase.as_str())]
    InvalidTransition {
        operation: &'static str,
        phase: SessionPhase,
    },

    #[error("no session for meeting {0}")]
    UnknownMeeting(String),
}
