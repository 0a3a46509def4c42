//! Service facade over the registry, machines, and dispatch coordinator.
//!
//! This is what the HTTP surface calls into. It owns the wiring: the
//! dispatch-outcome router task that feeds coordinator events back into the
//! owning session, and the grace-period eviction of ended sessions.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::dispatch::{AgentDispatcher, DispatchCoordinator, DispatchPolicy};
use crate::error::SessionError;
use crate::transport::Transport;

use super::registry::SessionRegistry;
use super::state::{SessionPhase, SessionSnapshot};

pub struct SessionService {
    registry: Arc<SessionRegistry>,
    coordinator: Arc<DispatchCoordinator>,
    grace_period: Duration,
}

impl SessionService {
    /// Build the service and spawn its dispatch-outcome router.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        transport: Arc<dyn Transport>,
        dispatcher: Arc<dyn AgentDispatcher>,
        policy: DispatchPolicy,
        grace_period: Duration,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel(64);
        let coordinator = Arc::new(DispatchCoordinator::new(dispatcher, policy, tx));
        let registry = Arc::new(SessionRegistry::new(transport, Arc::clone(&coordinator)));

        // Route resolved dispatch outcomes back to the owning session. The
        // task exits when the coordinator (and its sender) is dropped.
        let router_registry = Arc::clone(&registry);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match router_registry.get(&event.meeting_id).await {
                    Some(session) => session.on_dispatch_outcome(event.outcome).await,
                    None => debug!(
                        "Dispatch outcome for meeting {} arrived after eviction, dropped",
                        event.meeting_id
                    ),
                }
            }
        });

        Self {
            registry,
            coordinator,
            grace_period,
        }
    }

    /// Join a meeting, creating its session on first contact.
    pub async fn join(
        &self,
        meeting_id: &str,
        meeting_name: &str,
    ) -> Result<SessionPhase, SessionError> {
        let session = self.registry.get_or_create(meeting_id, meeting_name).await;
        session.request_join().await
    }

    /// Leave a meeting. Errors only when no session exists for the id.
    pub async fn leave(&self, meeting_id: &str) -> Result<SessionPhase, SessionError> {
        let session = self
            .registry
            .get(meeting_id)
            .await
            .ok_or_else(|| SessionError::UnknownMeeting(meeting_id.to_string()))?;

        let phase = session.request_leave().await;
        self.schedule_evict(meeting_id.to_string());
        Ok(phase)
    }

    /// Involuntary disconnect notification from the transport.
    pub async fn transport_disconnect(&self, meeting_id: &str) -> Result<SessionPhase, SessionError> {
        let session = self
            .registry
            .get(meeting_id)
            .await
            .ok_or_else(|| SessionError::UnknownMeeting(meeting_id.to_string()))?;

        let phase = session.on_transport_disconnect().await?;
        self.schedule_evict(meeting_id.to_string());
        Ok(phase)
    }

    pub async fn snapshot(&self, meeting_id: &str) -> Option<SessionSnapshot> {
        match self.registry.get(meeting_id).await {
            Some(session) => Some(session.snapshot().await),
            None => None,
        }
    }

    pub async fn list(&self) -> Vec<SessionSnapshot> {
        self.registry.snapshots().await
    }

    /// Evict the session once the grace period has elapsed. The grace period
    /// lets late dispatch-outcome callbacks still find the session.
    fn schedule_evict(&self, meeting_id: String) {
        let registry = Arc::clone(&self.registry);
        let coordinator = Arc::clone(&self.coordinator);
        let grace_period = self.grace_period;

        tokio::spawn(async move {
            sleep(grace_period).await;
            if registry.evict(&meeting_id).await {
                coordinator.forget(&meeting_id).await;
                info!("Garbage-collected ended meeting {}", meeting_id);
            }
        });
    }
}
