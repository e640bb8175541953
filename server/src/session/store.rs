use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tutor_core::Conversation;

/// Error type for session store operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionStoreError {
    /// Session not found
    #[error("Session not found: {0}")]
    NotFound(String),
    /// Error occurred during a store operation
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// One user's session: its timestamps and its conversation.
///
/// Clones share the conversation. The async mutex around it is what keeps a
/// session to a single in-flight model call.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session identifier
    pub id: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Last time the session was accessed or modified
    pub updated_at: DateTime<Utc>,
    /// Optional time when the session expires
    pub expires_at: Option<DateTime<Utc>>,
    pub conversation: Arc<Mutex<Conversation>>,
}

impl Session {
    /// Create a new session with the given ID
    pub fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            expires_at: None,
            conversation: Arc::new(Mutex::new(Conversation::new())),
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            Utc::now() > expires_at
        } else {
            false
        }
    }

    /// Marks the session as used and slides its expiry forward by `ttl`
    pub fn touch(&mut self, ttl: Option<Duration>) {
        let now = Utc::now();
        self.updated_at = now;
        if let Some(ttl) = ttl {
            self.expires_at = Some(now + ttl);
        }
    }
}

/// Trait defining the interface for session stores
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Create a new session with the given ID
    async fn create_session(&self, id: String) -> Result<Session, SessionStoreError>;

    /// Get a session by ID
    async fn get_session(&self, id: &str) -> Result<Session, SessionStoreError>;

    /// Refresh a session's `updated_at` and expiry
    async fn touch_session(&self, id: &str) -> Result<(), SessionStoreError>;

    /// Delete a session by ID
    async fn delete_session(&self, id: &str) -> Result<(), SessionStoreError>;

    /// Delete expired sessions
    async fn cleanup_expired_sessions(&self) -> Result<usize, SessionStoreError>;

    /// List all active (non-expired) sessions
    async fn list_sessions(&self) -> Result<Vec<Session>, SessionStoreError>;
}

/// Type alias for Arc-wrapped SessionStore trait objects
pub type SessionStoreRef = Arc<dyn SessionStore>;
