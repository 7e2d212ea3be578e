use crate::domain::report::AnalysisReport;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// Holds the most recent validated report of one session.
///
/// `get` hands out a shared snapshot, so any number of display consumers can
/// read while the slot stays untouched.
#[derive(Debug, Default)]
pub struct ReportStore {
    slot: RwLock<Option<Arc<AnalysisReport>>>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, report: Arc<AnalysisReport>) {
        *self.slot.write() = Some(report);
    }

    pub fn get(&self) -> Option<Arc<AnalysisReport>> {
        self.slot.read().clone()
    }

    pub fn clear(&self) {
        *self.slot.write() = None;
    }

    pub fn is_empty(&self) -> bool {
        self.slot.read().is_none()
    }
}

/// Session-scoped context handed to the analysis action and display consumers.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    last_seen: RwLock<DateTime<Utc>>,
    store: ReportStore,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_seen: RwLock::new(now),
            store: ReportStore::new(),
        }
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    pub fn touch(&self) {
        *self.last_seen.write() = Utc::now();
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        *self.last_seen.read()
    }

    pub fn is_idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_seen() < cutoff
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
