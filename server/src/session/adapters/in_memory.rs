use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::session::store::{Session, SessionStore, SessionStoreError};

/// In-memory implementation of SessionStore
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    /// Thread-safe storage of sessions
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    /// Idle time after which a session expires. `None` keeps sessions forever.
    ttl: Option<Duration>,
}

impl InMemorySessionStore {
    /// Create a new InMemorySessionStore
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Some(ttl),
        }
    }
}

fn lock_error(e: impl std::fmt::Display) -> SessionStoreError {
    SessionStoreError::StorageError(format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, id: String) -> Result<Session, SessionStoreError> {
        let mut session = Session::new(id.clone());
        session.touch(self.ttl);

        let mut sessions = self.sessions.write().map_err(lock_error)?;
        sessions.insert(id, session.clone());
        debug!("Created session: {}", session.id);

        Ok(session)
    }

    async fn get_session(&self, id: &str) -> Result<Session, SessionStoreError> {
        let sessions = self.sessions.read().map_err(lock_error)?;

        let session = sessions
            .get(id)
            .cloned()
            .ok_or_else(|| SessionStoreError::NotFound(id.to_string()))?;

        if session.is_expired() {
            return Err(SessionStoreError::NotFound(format!(
                "Session expired: {}",
                id
            )));
        }

        Ok(session)
    }

    async fn touch_session(&self, id: &str) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().map_err(lock_error)?;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionStoreError::NotFound(id.to_string()))?;
        session.touch(self.ttl);
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().map_err(lock_error)?;

        if sessions.remove(id).is_none() {
            return Err(SessionStoreError::NotFound(id.to_string()));
        }

        debug!("Deleted session: {}", id);
        Ok(())
    }

    async fn cleanup_expired_sessions(&self) -> Result<usize, SessionStoreError> {
        let mut sessions = self.sessions.write().map_err(lock_error)?;

        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        let count = before - sessions.len();

        if count > 0 {
            info!("Cleaned up {} expired sessions", count);
        }

        Ok(count)
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, SessionStoreError> {
        let sessions = self.sessions.read().map_err(lock_error)?;

        let active_sessions: Vec<Session> = sessions
            .values()
            .filter(|session| !session.is_expired())
            .cloned()
            .collect();

        debug!("Listed {} active sessions", active_sessions.len());
        Ok(active_sessions)
    }
}
