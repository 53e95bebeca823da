//! # Session Stores
//!
//! Where sessions live between turns.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::db::FlowDb;
use super::session::Session;

/// Loads and saves whole sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<Session>>;
    async fn save(&self, session: &Session) -> Result<()>;
}

/// Process-local store
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }
}

/// Store backed by [`FlowDb`]
pub struct SqliteSessionStore {
    db: FlowDb,
}

impl SqliteSessionStore {
    pub fn new(db: FlowDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, id: &str) -> Result<Option<Session>> {
        let db = self.db.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.load_session(&id)).await?
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let db = self.db.clone();
        let session = session.clone();
        tokio::task::spawn_blocking(move || db.save_session(&session)).await?
    }
}
