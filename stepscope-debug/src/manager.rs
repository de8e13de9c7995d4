//! Debug session management.
//!
//! Sessions are keyed by unguessable uuid-v4 strings and live in process
//! memory. Each session sits behind its own mutex, so two concurrent
//! commands against the same session resolve one at a time in arrival
//! order. Retention is bounded: expired sessions are swept
//! opportunistically on create, and a hard cap evicts the oldest.

use crate::session::DebugSession;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use stepscope_core::TraceEvent;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

pub struct DebugSessionManager {
    sessions: RwLock<HashMap<String, Arc<Mutex<DebugSession>>>>,
    ttl: Duration,
    max_sessions: usize,
}

impl DebugSessionManager {
    #[must_use]
    pub fn new(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Create a session over a precomputed trace, returning its ID.
    pub async fn create(
        &self,
        events: Vec<TraceEvent>,
        breakpoints: impl IntoIterator<Item = u32> + Send,
    ) -> String {
        self.sweep_expired().await;

        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            evict_oldest(&mut sessions);
        }
        let session_id = Uuid::new_v4().to_string();
        sessions.insert(
            session_id.clone(),
            Arc::new(Mutex::new(DebugSession::new(events, breakpoints))),
        );
        debug!(%session_id, count = sessions.len(), "debug session created");
        session_id
    }

    /// Look up a session. `None` surfaces as a 404 at the boundary.
    pub async fn get(&self, session_id: &str) -> Option<Arc<Mutex<DebugSession>>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Destroy a session explicitly.
    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions older than the TTL. Sessions currently executing a
    /// command are left alone.
    pub async fn sweep_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            session
                .try_lock()
                .map_or(true, |guard| guard.created_at().elapsed() < self.ttl)
        });
        let swept = before - sessions.len();
        if swept > 0 {
            debug!(swept, "expired debug sessions removed");
        }
        swept
    }
}

fn evict_oldest(sessions: &mut HashMap<String, Arc<Mutex<DebugSession>>>) {
    let oldest = sessions
        .iter()
        .filter_map(|(id, session)| {
            session
                .try_lock()
                .ok()
                .map(|guard| (id.clone(), guard.created_at()))
        })
        .min_by_key(|(_, created)| *created)
        .map(|(id, _)| id);
    if let Some(id) = oldest {
        warn!(session_id = %id, "session cap reached, evicting oldest session");
        sessions.remove(&id);
    }
}
