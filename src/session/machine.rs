//! Session lifecycle state machine.
//!
//! One machine per meeting id. Every transition runs under the session lock,
//! so transitions for one meeting are totally ordered; the lock is held
//! across the transport call on purpose, so a join and a leave for the same
//! meeting can never interleave.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dispatch::{DispatchCoordinator, DispatchOutcome, DispatchStatus};
use crate::error::SessionError;
use crate::transport::Transport;

use super::state::{SessionPhase, SessionSnapshot, SessionState};

pub struct SessionMachine {
    meeting_id: String,
    transport: Arc<dyn Transport>,
    dispatch: Arc<DispatchCoordinator>,
    state: Mutex<SessionState>,
}

impl SessionMachine {
    pub fn new(
        meeting_id: String,
        meeting_name: String,
        transport: Arc<dyn Transport>,
        dispatch: Arc<DispatchCoordinator>,
    ) -> Self {
        Self {
            meeting_id,
            transport,
            dispatch,
            state: Mutex::new(SessionState::new(meeting_name)),
        }
    }

    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    /// Join the meeting.
    ///
    /// From the lobby: joins the call at the transport, moves to `Active`,
    /// and requests an agent. The agent request is tracked in the background;
    /// its outcome never delays the join. A join while already `Active` or
    /// `Ended` is an idempotent no-op; the transport is not called again.
    pub async fn request_join(&self) -> Result<SessionPhase, SessionError> {
        let mut state = self.state.lock().await;
        match state.phase {
            SessionPhase::Active | SessionPhase::Ended => {
                debug!(
                    "Duplicate join for meeting {} while {}, no-op",
                    self.meeting_id,
                    state.phase.as_str()
                );
                Ok(state.phase)
            }
            SessionPhase::Lobby => {
                if let Err(e) = self.transport.join(&self.meeting_id).await {
                    warn!("Join failed for meeting {}: {}", self.meeting_id, e);
                    state.last_error = Some(e.to_string());
                    return Err(e.into());
                }

                state.phase = SessionPhase::Active;
                state.last_error = None;
                state.dispatch_status = DispatchStatus::Pending;
                info!(
                    "Meeting {} ({}) is active, requesting agent",
                    self.meeting_id, state.meeting_name
                );

                // Returns once tracked; the external call runs out-of-band.
                self.dispatch.connect(&self.meeting_id).await;

                Ok(SessionPhase::Active)
            }
        }
    }

    /// Leave the meeting. Always converges to `Ended`.
    ///
    /// From `Active`: ends the call at the transport (best-effort; a
    /// transport error is logged, not surfaced, since the session must end
    /// either way) and cancels dispatch tracking. From the lobby: nothing
    /// was joined, so the transport is not called. From `Ended`: no-op.
    pub async fn request_leave(&self) -> SessionPhase {
        let mut state = self.state.lock().await;
        match state.phase {
            SessionPhase::Ended => {
                debug!("Leave for meeting {} already ended, no-op", self.meeting_id);
                SessionPhase::Ended
            }
            SessionPhase::Lobby => {
                Self::mark_ended(&mut state);
                info!("Meeting {} left from lobby", self.meeting_id);
                SessionPhase::Ended
            }
            SessionPhase::Active => {
                if let Err(e) = self.transport.end_call(&self.meeting_id).await {
                    warn!(
                        "Failed to end call for meeting {}: {}. Ending session anyway.",
                        self.meeting_id, e
                    );
                    state.last_error = Some(e.to_string());
                }

                Self::mark_ended(&mut state);
                if state.dispatch_status == DispatchStatus::Pending {
                    state.dispatch_status = DispatchStatus::Cancelled;
                }
                self.dispatch.cancel(&self.meeting_id).await;

                info!("Meeting {} ended", self.meeting_id);
                SessionPhase::Ended
            }
        }
    }

    /// Involuntary disconnect pushed by the transport.
    ///
    /// From `Active` this converges to the same terminal state as a
    /// voluntary leave. A disconnect for a lobby session refers to a call
    /// that was never joined and is rejected as a client error.
    pub async fn on_transport_disconnect(&self) -> Result<SessionPhase, SessionError> {
        {
            let state = self.state.lock().await;
            match state.phase {
                SessionPhase::Lobby => {
                    return Err(SessionError::InvalidTransition {
                        operation: "transport disconnect",
                        phase: SessionPhase::Lobby,
                    });
                }
                SessionPhase::Ended => return Ok(SessionPhase::Ended),
                SessionPhase::Active => {}
            }
        }

        warn!(
            "Transport disconnected meeting {}, ending session",
            self.meeting_id
        );
        Ok(self.request_leave().await)
    }

    /// Record the resolved dispatch outcome.
    ///
    /// Once the session has ended the outcome is logged for observability
    /// only; it triggers no transition and no further external call.
    pub async fn on_dispatch_outcome(&self, outcome: DispatchOutcome) {
        let mut state = self.state.lock().await;
        if state.phase == SessionPhase::Ended {
            info!(
                "Dispatch outcome {:?} for ended meeting {} recorded for observability only",
                outcome, self.meeting_id
            );
            return;
        }

        state.dispatch_status = match outcome {
            DispatchOutcome::Succeeded => DispatchStatus::Succeeded,
            DispatchOutcome::Failed => {
                // The meeting stays valid without an agent.
                warn!(
                    "Meeting {} is active without an agent, dispatch failed",
                    self.meeting_id
                );
                DispatchStatus::Failed
            }
        };
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            meeting_id: self.meeting_id.clone(),
            meeting_name: state.meeting_name.clone(),
            phase: state.phase,
            dispatch_status: state.dispatch_status,
            created_at: state.created_at,
            ended_at: state.ended_at,
            last_error: state.last_error.clone(),
        }
    }

    fn mark_ended(state: &mut SessionState) {
        state.phase = SessionPhase::Ended;
        state.ended_at = Some(chrono::Utc::now());
    }
}
