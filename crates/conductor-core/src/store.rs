//! Session persistence.
//!
//! The [`SessionStore`] is the only component allowed to persist a
//! [`Session`]; everything else mutates an in-memory copy and hands it
//! back. The reference implementation is in-memory; a durable backend
//! implements the same trait and must round-trip history and trace in
//! order.

use crate::config::HistoryConfig;
use crate::session::{Session, SessionStatus};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(Uuid),
    #[error("session store failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session by id.
    async fn get(&self, session_id: Uuid) -> Result<Session, StoreError>;

    /// Upsert a session; bumps `last_message_at`.
    async fn save(&self, session: &mut Session) -> Result<(), StoreError>;

    /// Create a session with empty history and trace, status ACTIVE.
    async fn create(
        &self,
        agent_name: &str,
        history_config: Option<HistoryConfig>,
    ) -> Result<Session, StoreError>;

    /// List sessions, most recently created first.
    async fn list(&self, limit: usize) -> Result<Vec<Session>, StoreError>;

    /// Delete a session. Returns whether it existed.
    async fn delete(&self, session_id: Uuid) -> Result<bool, StoreError>;

    async fn update_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
    ) -> Result<(), StoreError>;

    /// Per-session mutex serializing whole-request read-modify-write
    /// cycles. Holding it across a request makes concurrent requests
    /// against one session appear linearized.
    fn lock_for(&self, session_id: Uuid) -> Arc<Mutex<()>>;
}

/// In-memory store backed by a concurrent map. Sessions are cloned in and
/// out, so the round-trip property holds by construction.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<Uuid, Session>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: Uuid) -> Result<Session, StoreError> {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound(session_id))
    }

    async fn save(&self, session: &mut Session) -> Result<(), StoreError> {
        session.last_message_at = chrono::Utc::now();
        self.sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn create(
        &self,
        agent_name: &str,
        history_config: Option<HistoryConfig>,
    ) -> Result<Session, StoreError> {
        let mut session = Session::new(agent_name, history_config.unwrap_or_default());
        self.save(&mut session).await?;
        Ok(session)
    }

    async fn list(&self, limit: usize) -> Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn delete(&self, session_id: Uuid) -> Result<bool, StoreError> {
        self.locks.remove(&session_id);
        Ok(self.sessions.remove(&session_id).is_some())
    }

    async fn update_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
    ) -> Result<(), StoreError> {
        let mut session = self.get(session_id).await?;
        session.status = status;
        self.save(&mut session).await
    }

    fn lock_for(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
