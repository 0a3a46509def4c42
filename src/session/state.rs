//! Session state types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchStatus;

/// Phase of a meeting session lifecycle.
///
/// Phases only ever move forward: `Lobby → Active → Ended`. `Ended` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Lobby,
    Active,
    Ended,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Active => "active",
            Self::Ended => "ended",
        }
    }
}

/// Mutable state of one session, guarded by the machine's lock.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub meeting_name: String,
    pub dispatch_status: DispatchStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn new(meeting_name: String) -> Self {
        Self {
            phase: SessionPhase::Lobby,
            meeting_name,
            dispatch_status: DispatchStatus::NotRequested,
            created_at: Utc::now(),
            ended_at: None,
            last_error: None,
        }
    }
}

/// Read-only view of a session, serialized on the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub meeting_id: String,
    pub meeting_name: String,
    pub phase: SessionPhase,
    pub dispatch_status: DispatchStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}
