//! Explicit dump/load hooks for a (not-implemented-here) backing store.
//!
//! Persistence/config/secret storage is out of scope (spec.md §1); the
//! core only needs typed async hooks it can call at session-close and at
//! shutdown. Grounded in `querymt::session::SessionStore`'s async-trait
//! shape, narrowed to the dump/load pair this spec actually calls for.

use crate::query::Launcher;
use crate::session::session::SessionStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The persisted shape named in spec.md §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSession {
    pub launcher: Launcher,
    pub create_ts: i64,
    pub last_interact_ts: i64,
    pub prompt: serde_json::Value,
    pub default_prompt: serde_json::Value,
    pub token_counts: serde_json::Value,
    pub status: PersistedStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistedStatus {
    OnGoing,
    ExplicitlyClosed,
    Expired,
}

impl From<SessionStatus> for PersistedStatus {
    fn from(s: SessionStatus) -> Self {
        match s {
            SessionStatus::OnGoing => PersistedStatus::OnGoing,
            SessionStatus::ExplicitlyClosed => PersistedStatus::ExplicitlyClosed,
            SessionStatus::Expired => PersistedStatus::Expired,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backing store unavailable: {0}")]
    Unavailable(String),
}

/// Capability for persisting/restoring session state. The core calls
/// `dump` on session-close and on shutdown, and `load` to restore a
/// previously-closed session; it never assumes a store is configured.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn dump(&self, session: &PersistedSession) -> Result<(), StoreError>;
    async fn load(&self, launcher: &Launcher) -> Result<Option<PersistedSession>, StoreError>;
}

/// A store that discards everything; the default when no backing store is
/// configured, so `dump`/`load` calls are always safe to make.
pub struct NullSessionStore;

#[async_trait]
impl SessionStore for NullSessionStore {
    async fn dump(&self, _session: &PersistedSession) -> Result<(), StoreError> {
        Ok(())
    }

    async fn load(&self, _launcher: &Launcher) -> Result<Option<PersistedSession>, StoreError> {
        Ok(None)
    }
}
