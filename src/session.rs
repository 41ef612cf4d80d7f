use rustc_hash::FxHashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Per-visitor state. Lives in memory only and is never persisted.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub api_key: String,
    pub last_question: Option<String>,
    /// Last successful answer, already wrapped for display.
    pub last_answer: Option<String>,
    /// Answer failure not yet superseded by a successful answer.
    pub last_error: Option<String>,
}

impl Session {
    pub fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

struct Entry {
    session: Session,
    last_seen: Instant,
}

/// In-memory sessions keyed by cookie id.
///
/// Only sessions holding a key are stored. Entries idle longer than the
/// timeout are dropped, and past the cap the least recently seen go first.
pub struct SessionStore {
    sessions: Mutex<FxHashMap<Uuid, Entry>>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(idle_timeout: Duration, max_sessions: usize) -> Self {
        SessionStore {
            sessions: Mutex::new(FxHashMap::default()),
            idle_timeout,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Returns the live session for `id`, or a fresh id with an empty
    /// session. Nothing is stored until `save`.
    pub fn load(&self, id: Option<Uuid>) -> (Uuid, Session) {
        let sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());
        match id.and_then(|id| sessions.get(&id).map(|entry| (id, entry))) {
            Some((id, entry)) if entry.last_seen.elapsed() <= self.idle_timeout => {
                (id, entry.session.clone())
            }
            _ => (Uuid::new_v4(), Session::default()),
        }
    }

    pub fn save(&self, id: Uuid, session: Session) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());
        if !session.has_key() {
            sessions.remove(&id);
            return;
        }

        sessions.insert(
            id,
            Entry {
                session,
                last_seen: Instant::now(),
            },
        );

        let idle_timeout = self.idle_timeout;
        sessions.retain(|_, entry| entry.last_seen.elapsed() <= idle_timeout);

        while sessions.len() > self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| *id);
            match oldest {
                Some(oldest) => {
                    tracing::debug!("Evicting idle session {}", oldest);
                    sessions.remove(&oldest);
                }
                None => break,
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(key: &str) -> Session {
        Session {
            api_key: key.to_string(),
            ..Session::default()
        }
    }

    #[test]
    fn test_unknown_id_gets_fresh_session() {
        let store = SessionStore::new();
        let stale = Uuid::new_v4();
        let (id, session) = store.load(Some(stale));
        assert_ne!(id, stale);
        assert!(!session.has_key());
    }

    #[test]
    fn test_loading_alone_stores_nothing() {
        let store = SessionStore::new();
        for _ in 0..10_000 {
            store.load(None);
        }
        assert_eq!(store.len(), 0);

        let (id, session) = store.load(None);
        store.save(id, session);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_saved_session_is_reloaded() {
        let store = SessionStore::new();
        let (id, mut session) = store.load(None);
        session.api_key = "sk-test".to_string();
        session.last_answer = Some("Los Gatos".to_string());
        session.last_error = Some("Error getting answer: timeout".to_string());
        store.save(id, session);

        let (same, reloaded) = store.load(Some(id));
        assert_eq!(same, id);
        assert_eq!(reloaded.api_key, "sk-test");
        assert_eq!(reloaded.last_answer.as_deref(), Some("Los Gatos"));
        assert_eq!(
            reloaded.last_error.as_deref(),
            Some("Error getting answer: timeout")
        );
    }

    #[test]
    fn test_clearing_key_removes_session() {
        let store = SessionStore::new();
        let (id, _) = store.load(None);
        store.save(id, keyed("sk-test"));
        assert_eq!(store.len(), 1);

        store.save(id, Session::default());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_idle_sessions_expire() {
        let store = SessionStore::with_limits(Duration::from_millis(1), 100);
        let id = Uuid::new_v4();
        store.save(id, keyed("sk-test"));
        std::thread::sleep(Duration::from_millis(10));

        let (fresh, session) = store.load(Some(id));
        assert_ne!(fresh, id);
        assert!(!session.has_key());

        store.save(Uuid::new_v4(), keyed("sk-other"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cap_evicts_least_recently_seen() {
        let store = SessionStore::with_limits(Duration::from_secs(60), 2);
        let first = Uuid::new_v4();
        store.save(first, keyed("sk-1"));
        std::thread::sleep(Duration::from_millis(5));
        store.save(Uuid::new_v4(), keyed("sk-2"));
        std::thread::sleep(Duration::from_millis(5));
        store.save(Uuid::new_v4(), keyed("sk-3"));

        assert_eq!(store.len(), 2);
        let (id, _) = store.load(Some(first));
        assert_ne!(id, first);
    }

    #[test]
    fn test_whitespace_key_does_not_count() {
        assert!(!keyed("   ").has_key());
    }
}
