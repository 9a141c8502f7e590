use crate::formatters::now_iso;
use crate::storage::{read_soft, KeyValueStorage};
use crate::types::{Session, SessionUpsert, DEFAULT_SESSION_TITLE};
use std::sync::{Arc, PoisonError, RwLock};

pub const SESSIONS_STORAGE_KEY: &str = "rag_sessions_v1";

/// Ordered list of conversation sessions, mirrored to long-lived storage.
///
/// New sessions are inserted at the head; updating an existing session keeps
/// its position. Every mutation rewrites the full list. Persistence is best
/// effort: a failed write is logged and the in-memory list stays
/// authoritative.
pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
    sessions: RwLock<Vec<Session>>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        let sessions = Self::load(storage.as_ref());
        Self {
            storage,
            sessions: RwLock::new(sessions),
        }
    }

    pub fn load(storage: &dyn KeyValueStorage) -> Vec<Session> {
        let Some(raw) = read_soft(storage, SESSIONS_STORAGE_KEY) else {
            return vec![];
        };
        match serde_json::from_str::<Vec<Session>>(&raw) {
            Ok(sessions) => sessions,
            Err(err) => {
                tracing::warn!(error = %err, "stored sessions are unreadable; starting empty");
                vec![]
            }
        }
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_session(&self, id: &str) -> Option<Session> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    pub fn upsert_session(&self, incoming: SessionUpsert) -> Session {
        self.upsert_session_at(incoming, &now_iso())
    }

    pub(crate) fn upsert_session_at(&self, incoming: SessionUpsert, now: &str) -> Session {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let SessionUpsert {
            id,
            title,
            messages,
            created_at,
        } = incoming;
        let created_at = created_at.unwrap_or_else(|| now.to_string());

        let stored = match sessions.iter_mut().find(|s| s.id == id) {
            Some(existing) => {
                if let Some(title) = title {
                    existing.title = title;
                }
                if let Some(messages) = messages {
                    existing.messages = messages;
                }
                // createdAt is fixed by the first write that set it.
                if existing.created_at.is_none() {
                    existing.created_at = Some(created_at);
                }
                existing.updated_at = Some(now.to_string());
                existing.clone()
            }
            None => {
                let session = Session {
                    id,
                    title: title.unwrap_or_else(|| DEFAULT_SESSION_TITLE.to_string()),
                    messages: messages.unwrap_or_default(),
                    created_at: Some(created_at),
                    updated_at: Some(now.to_string()),
                };
                sessions.insert(0, session.clone());
                session
            }
        };

        self.persist(&sessions);
        stored
    }

    pub fn remove_session(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        if sessions.len() == before {
            return false;
        }
        self.persist(&sessions);
        true
    }

    fn persist(&self, sessions: &[Session]) {
        let payload = match serde_json::to_string(sessions) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize sessions");
                return;
            }
        };
        if let Err(err) = self.storage.set(SESSIONS_STORAGE_KEY, &payload) {
            tracing::warn!(error = %err, "failed to persist sessions");
        }
    }
}
