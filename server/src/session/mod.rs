//! Session management for the tutor daemon
//!
//! Each session owns one `Conversation`. Sessions are kept behind the `SessionStore`
//! trait so the storage backend can change without touching the HTTP layer.

pub mod adapters;
pub mod store;

pub use adapters::InMemorySessionStore;
pub use store::{Session, SessionStore, SessionStoreError, SessionStoreRef};
