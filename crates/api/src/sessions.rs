use chrono::Utc;
use dashmap::DashMap;
use rebalancer_core::session::Session;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Live sessions keyed by id. Sessions idle for longer than the TTL are
/// dropped together with their report.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, Arc<Session>>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new());
        self.sessions.insert(session.id, Arc::clone(&session));
        tracing::info!(session_id = %session.id, "session created");
        session
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        let session = self.sessions.get(&id).map(|s| Arc::clone(s.value()))?;
        if session.is_idle_since(self.cutoff()) {
            self.sessions.remove(&id);
            tracing::info!(session_id = %id, "session expired");
            return None;
        }
        session.touch();
        Some(session)
    }

    pub fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            tracing::info!(session_id = %id, "session ended");
        }
        removed
    }

    pub fn purge_expired(&self) -> usize {
        let cutoff = self.cutoff();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_idle_since(cutoff));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    fn cutoff(&self) -> chrono::DateTime<Utc> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        Utc::now()
            .checked_sub_signed(ttl)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC)
    }
}
