use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Opaque session identifier handed to the HTTP caller.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimal per-session state. Mutated only on session start and after a
/// completed turn; abandoned turns leave the record untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub subject_id: String,
    pub created_at: DateTime<Utc>,
    pub turns: u64,
}

impl SessionRecord {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self { subject_id: subject_id.into(), created_at: Utc::now(), turns: 0 }
    }
}

/// Process-wide session map.
///
/// `turn_guard` hands out a per-session lock so concurrent turns for the same
/// session serialize while distinct sessions proceed in parallel.
pub trait SessionStore: Send + Sync {
    fn get(&self, id: &SessionId) -> Option<SessionRecord>;
    fn put(&self, id: SessionId, record: SessionRecord);
    fn delete(&self, id: &SessionId);
    fn turn_guard(&self, id: &SessionId) -> Option<Arc<Mutex<()>>>;
    fn record_turn(&self, id: &SessionId);
}

struct SessionEntry {
    record: SessionRecord,
    turn_lock: Arc<Mutex<()>>,
}

#[derive(Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<SessionId, SessionEntry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, id: &SessionId) -> Option<SessionRecord> {
        let entries = self.entries.read().ok()?;
        entries.get(id).map(|entry| entry.record.clone())
    }

    fn put(&self, id: SessionId, record: SessionRecord) {
        if let Ok(mut entries) = self.entries.write() {
            let turn_lock = entries
                .get(&id)
                .map(|existing| Arc::clone(&existing.turn_lock))
                .unwrap_or_else(|| Arc::new(Mutex::new(())));
            entries.insert(id, SessionEntry { record, turn_lock });
        }
    }

    fn delete(&self, id: &SessionId) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(id);
        }
    }

    fn turn_guard(&self, id: &SessionId) -> Option<Arc<Mutex<()>>> {
        let entries = self.entries.read().ok()?;
        entries.get(id).map(|entry| Arc::clone(&entry.turn_lock))
    }

    fn record_turn(&self, id: &SessionId) {
        if let Ok(mut entries) = self.entries.write() {
            if let Some(entry) = entries.get_mut(id) {
                entry.record.turns += 1;
            }
        }
    }
}
