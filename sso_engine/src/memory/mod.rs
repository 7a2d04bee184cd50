//! An in-memory session backend.
//!
//! Sessions live in a [`DashMap`], so each read-modify-write of a single session (notably
//! [`SessionManagement::take_nonce`]) happens under that entry's shard lock. Cloning the store is cheap and every
//! clone shares the same sessions, which is how actix workers see one store.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use log::*;
use sso_common::SessionId;

use crate::{SessionManagement, SessionStoreError};

#[derive(Debug, Clone)]
struct SessionRecord {
    nonce: Option<String>,
    expires_at: DateTime<Utc>,
}

impl SessionRecord {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<DashMap<SessionId, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, including expired ones that have not been swept yet.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn with_live_session<T, F>(&self, id: &SessionId, f: F) -> Result<T, SessionStoreError>
    where F: FnOnce(&mut SessionRecord) -> T {
        match self.sessions.get_mut(id) {
            Some(mut record) if record.is_live(Utc::now()) => Ok(f(record.value_mut())),
            _ => Err(SessionStoreError::SessionNotFound),
        }
    }
}

impl SessionManagement for MemorySessionStore {
    async fn create_session(&self, id: &SessionId, expires_at: DateTime<Utc>) -> Result<(), SessionStoreError> {
        match self.sessions.entry(id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(SessionRecord { nonce: None, expires_at });
                trace!("🗝️ Session created, expires at {expires_at}");
                Ok(())
            },
            Entry::Occupied(_) => Err(SessionStoreError::BackendError("Session id is already in use".into())),
        }
    }

    async fn session_exists(&self, id: &SessionId) -> Result<bool, SessionStoreError> {
        Ok(self.sessions.get(id).map(|r| r.is_live(Utc::now())).unwrap_or(false))
    }

    async fn fetch_nonce(&self, id: &SessionId) -> Result<Option<String>, SessionStoreError> {
        self.with_live_session(id, |r| r.nonce.clone())
    }

    async fn set_nonce(&self, id: &SessionId, nonce: &str) -> Result<(), SessionStoreError> {
        self.with_live_session(id, |r| {
            if r.nonce.is_some() {
                debug!("🗝️ Replacing an outstanding SSO nonce");
            }
            r.nonce = Some(nonce.to_string());
        })
    }

    async fn clear_nonce(&self, id: &SessionId) -> Result<(), SessionStoreError> {
        self.with_live_session(id, |r| r.nonce = None)
    }

    async fn take_nonce(&self, id: &SessionId) -> Result<Option<String>, SessionStoreError> {
        self.with_live_session(id, |r| r.nonce.take())
    }

    async fn remove_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, SessionStoreError> {
        let mut removed = 0u64;
        self.sessions.retain(|_, record| {
            let keep = record.is_live(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
