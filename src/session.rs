//! In-memory conversation sessions.
//!
//! Sessions live only for the life of the process. Two limits keep the map
//! bounded: sessions idle longer than the TTL are dropped whenever the store
//! is touched, and once `max_sessions` is reached the least recently used
//! session makes room for a new one.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;
use uuid::Uuid;

use curriculum_rag_core::models::ChatMessage;

use crate::config::SessionConfig;

struct Session {
    messages: Vec<ChatMessage>,
    last_seen: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            last_seen: Instant::now(),
        }
    }
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    history_window: usize,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_limits(config.history_window, config.ttl(), config.max_sessions)
    }

    pub fn with_limits(history_window: usize, ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            history_window,
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    // Every critical section leaves the map consistent, so a poisoned lock
    // is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn purge_expired(&self, sessions: &mut HashMap<String, Session>) {
        let before = sessions.len();
        let ttl = self.ttl;
        sessions.retain(|_, s| s.last_seen.elapsed() <= ttl);
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, "expired sessions removed");
        }
    }

    fn make_room(&self, sessions: &mut HashMap<String, Session>) {
        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, s)| s.last_seen)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                    debug!(session_id = %id, "least recently used session evicted");
                }
                None => break,
            }
        }
    }

    /// Resolve `id` to a session, creating it when absent or unknown.
    ///
    /// Returns the session id and its most recent `history_window` messages.
    pub fn get_or_create(&self, id: Option<&str>) -> (String, Vec<ChatMessage>) {
        let id = id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut sessions = self.lock();
        self.purge_expired(&mut sessions);

        if !sessions.contains_key(&id) {
            self.make_room(&mut sessions);
            sessions.insert(id.clone(), Session::new());
        }

        let history = match sessions.get_mut(&id) {
            Some(session) => {
                session.last_seen = Instant::now();
                let start = session.messages.len().saturating_sub(self.history_window);
                session.messages[start..].to_vec()
            }
            None => Vec::new(),
        };
        (id, history)
    }

    /// Append a message, recreating the session if it vanished meanwhile.
    pub fn append(&self, id: &str, message: ChatMessage) {
        let mut sessions = self.lock();
        if !sessions.contains_key(id) {
            self.make_room(&mut sessions);
        }
        let session = sessions.entry(id.to_string()).or_insert_with(Session::new);
        session.messages.push(message);
        session.last_seen = Instant::now();
    }

    /// Remove a session. Unknown ids are ignored.
    pub fn delete(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        let mut sessions = self.lock();
        self.purge_expired(&mut sessions);
        sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
