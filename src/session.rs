//! Bounded per-session conversation history.
//!
//! Sessions live only in memory. Each keeps the most recent
//! `max_history` exchanges (one user message plus one assistant reply);
//! older exchanges are dropped.
//!
//! The session map is locked only long enough to find or insert an
//! entry. Each session has its own mutex, so writes to different
//! sessions never wait on each other.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

/// One user message and the assistant's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

#[derive(Debug, Default)]
struct Session {
    exchanges: VecDeque<Exchange>,
}

pub struct SessionManager {
    max_history: usize,
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionManager {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history: max_history.max(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start an empty session and return its opaque id.
    pub fn create_session(&self) -> String {
        let id = Self::new_session_id();
        self.session(&id);
        id
    }

    /// A fresh session id that is not registered until the first
    /// [`add_exchange`](Self::add_exchange).
    pub fn new_session_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// History for `session_id` rendered as alternating `User:` /
    /// `Assistant:` lines, oldest first. `None` for no id, an unknown id,
    /// or an empty session.
    pub fn get_history(&self, session_id: Option<&str>) -> Option<String> {
        let session = self.existing(session_id?)?;
        let session = session.lock().unwrap_or_else(|e| e.into_inner());
        if session.exchanges.is_empty() {
            return None;
        }
        Some(
            session
                .exchanges
                .iter()
                .map(|e| format!("User: {}\nAssistant: {}", e.user, e.assistant))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    /// Append an exchange, creating the session if needed, then drop the
    /// oldest exchanges beyond `max_history`.
    pub fn add_exchange(&self, session_id: &str, user: &str, assistant: &str) {
        let session = self.session(session_id);
        let mut session = session.lock().unwrap_or_else(|e| e.into_inner());
        session.exchanges.push_back(Exchange {
            user: user.to_string(),
            assistant: assistant.to_string(),
        });
        while session.exchanges.len() > self.max_history {
            session.exchanges.pop_front();
        }
    }

    /// Retained exchanges, oldest first.
    pub fn exchanges(&self, session_id: &str) -> Vec<Exchange> {
        self.existing(session_id)
            .map(|s| {
                let s = s.lock().unwrap_or_else(|e| e.into_inner());
                s.exchanges.iter().cloned().collect()
            })
            .unwrap_or_default()
    }

    /// Forget a session's history. The id stays valid.
    pub fn clear_session(&self, session_id: &str) {
        if let Some(session) = self.existing(session_id) {
            session
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .exchanges
                .clear();
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn existing(&self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned()
    }

    fn session(&self, session_id: &str) -> Arc<Mutex<Session>> {
        if let Some(session) = self.existing(session_id) {
            return session;
        }
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sessions_have_unique_ids_and_no_history() {
        let manager = SessionManager::new(2);
        let a = manager.create_session();
        let b = manager.create_session();
        assert_ne!(a, b);
        assert_eq!(manager.session_count(), 2);
        assert_eq!(manager.get_history(Some(&a)), None);
        assert_eq!(manager.get_history(None), None);
    }

    #[test]
    fn history_keeps_most_recent_pairs() {
        let manager = SessionManager::new(2);
        let id = manager.create_session();
        manager.add_exchange(&id, "q1", "a1");
        manager.add_exchange(&id, "q2", "a2");
        manager.add_exchange(&id, "q3", "a3");

        assert_eq!(
            manager.get_history(Some(&id)).unwrap(),
            "User: q2\nAssistant: a2\nUser: q3\nAssistant: a3"
        );
        assert_eq!(manager.exchanges(&id).len(), 2);
    }

    #[test]
    fn unknown_id_is_created_on_first_exchange() {
        let manager = SessionManager::new(2);
        assert_eq!(manager.get_history(Some("client-chosen")), None);
        manager.add_exchange("client-chosen", "hi", "hello");
        assert_eq!(
            manager.get_history(Some("client-chosen")).unwrap(),
            "User: hi\nAssistant: hello"
        );
    }

    #[test]
    fn sessions_do_not_share_history() {
        let manager = SessionManager::new(2);
        let a = manager.create_session();
        let b = manager.create_session();
        manager.add_exchange(&a, "only in a", "ok");
        assert_eq!(manager.get_history(Some(&b)), None);
        manager.clear_session(&a);
        assert_eq!(manager.get_history(Some(&a)), None);
    }

    #[test]
    fn concurrent_writes_to_different_sessions() {
        let manager = Arc::new(SessionManager::new(3));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    let id = format!("s{}", i);
                    for n in 0..10 {
                        manager.add_exchange(&id, &format!("q{}", n), &format!("a{}", n));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(manager.session_count(), 8);
        for i in 0..8 {
            let ex = manager.exchanges(&format!("s{}", i));
            assert_eq!(ex.len(), 3);
            assert_eq!(ex[2].user, "q9");
        }
    }
}
