//! Process-wide registry of live session machines.
//!
//! One machine per meeting id, created lazily on the first join request.
//! The map is the only state shared across meetings; everything else is
//! private to one session.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dispatch::DispatchCoordinator;
use crate::transport::Transport;

use super::machine::SessionMachine;
use super::state::{SessionPhase, SessionSnapshot};

pub struct SessionRegistry {
    transport: Arc<dyn Transport>,
    dispatch: Arc<DispatchCoordinator>,
    sessions: Mutex<HashMap<String, Arc<SessionMachine>>>,
}

impl SessionRegistry {
    pub fn new(transport: Arc<dyn Transport>, dispatch: Arc<DispatchCoordinator>) -> Self {
        Self {
            transport,
            dispatch,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the session for a meeting id, creating it in the lobby if it
    /// does not exist. Lookup and construction happen under one lock, so
    /// concurrent callers for the same id always get the same instance.
    pub async fn get_or_create(&self, meeting_id: &str, meeting_name: &str) -> Arc<SessionMachine> {
        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(meeting_id) {
            return Arc::clone(existing);
        }

        info!("Creating session for meeting {} ({})", meeting_id, meeting_name);
        let machine = Arc::new(SessionMachine::new(
            meeting_id.to_string(),
            meeting_name.to_string(),
            Arc::clone(&self.transport),
            Arc::clone(&self.dispatch),
        ));
        sessions.insert(meeting_id.to_string(), Arc::clone(&machine));
        machine
    }

    pub async fn get(&self, meeting_id: &str) -> Option<Arc<SessionMachine>> {
        self.sessions.lock().await.get(meeting_id).map(Arc::clone)
    }

    /// Remove an ended session from the registry.
    ///
    /// Refuses to evict a session that has not reached `Ended`. Eviction is
    /// best-effort cleanup and must never tear down a live session. Returns
    /// whether an entry was removed.
    pub async fn evict(&self, meeting_id: &str) -> bool {
        let session = match self.get(meeting_id).await {
            Some(session) => session,
            None => return false,
        };

        // Ended is terminal, so this check cannot go stale before the remove.
        if session.snapshot().await.phase != SessionPhase::Ended {
            warn!(
                "Refusing to evict meeting {}, session has not ended",
                meeting_id
            );
            return false;
        }

        self.sessions.lock().await.remove(meeting_id);
        debug!("Evicted session for meeting {}", meeting_id);
        true
    }

    /// Snapshots of every registered session.
    pub async fn snapshots(&self) -> Vec<SessionSnapshot> {
        let sessions: Vec<Arc<SessionMachine>> =
            self.sessions.lock().await.values().map(Arc::clone).collect();

        let mut snapshots = Vec::with_capacity(sessions.len());
        for session in sessions {
            snapshots.push(session.snapshot().await);
        }
        snapshots
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
