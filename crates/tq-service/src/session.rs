use std::collections::HashMap;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tq_frame::Table;

/// Uploaded tables under the name they were uploaded as, upload order kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub tables: Vec<(String, Table)>,
}

impl Session {
    /// The table queries run against.
    #[must_use]
    pub fn primary_table(&self) -> Option<&Table> {
        self.tables.first().map(|(_, table)| table)
    }

    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|(name, _)| name.clone()).collect()
    }
}

pub trait SessionStore {
    fn insert(&mut self, session: Session);
    /// `None` for unknown or expired ids.
    fn load(&mut self, id: &str) -> Option<Session>;
}

#[derive(Debug)]
struct StoredSession {
    session: Session,
    created_at: Instant,
}

/// In-process sessions that expire `ttl` after creation.
#[derive(Debug)]
pub struct MemorySessionStore {
    ttl: Duration,
    sessions: HashMap<String, StoredSession>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: HashMap::new(),
        }
    }

    pub fn insert_at(&mut self, session: Session, now: Instant) {
        self.evict_expired(now);
        self.sessions.insert(
            session.id.clone(),
            StoredSession {
                session,
                created_at: now,
            },
        );
    }

    pub fn load_at(&mut self, id: &str, now: Instant) -> Option<Session> {
        self.evict_expired(now);
        self.sessions.get(id).map(|stored| stored.session.clone())
    }

    fn evict_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.sessions
            .retain(|_, stored| now.saturating_duration_since(stored.created_at) < ttl);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn insert(&mut self, session: Session) {
        self.insert_at(session, Instant::now());
    }

    fn load(&mut self, id: &str) -> Option<Session> {
        self.load_at(id, Instant::now())
    }
}

/// 32 hex characters derived from the wall clock, a process-wide counter
/// and `seed`.
#[must_use]
pub fn new_session_id(seed: &str) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(nanos.to_le_bytes());
    hasher.update(count.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(seed.as_bytes());
    hasher
        .finalize()
        .iter()
        .take(16)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
