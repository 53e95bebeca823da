//! # Flow Database
//!
//! SQLite persistence for conversation sessions. One row per session, with
//! the state and event history stored as JSON.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::session::{Session, SessionState};
use crate::swarm::events::FlowEvent;

/// Schema version for migrations
const SCHEMA_VERSION: i32 = 1;

/// Database handle shared by the SQLite session store
#[derive(Clone)]
pub struct FlowDb {
    conn: Arc<Mutex<Connection>>,
}

impl FlowDb {
    /// Open or create a database at `path`
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(path.as_ref()).context("Failed to open flow database")?;
        Self::with_connection(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_version < 1 {
            Self::migrate_v1(&conn)?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [1],
            )?;
            tracing::info!("Flow database migrated to version 1");
        }

        Ok(())
    }

    /// Migration to version 1 - sessions table
    fn migrate_v1(conn: &Connection) -> Result<()> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                state_json TEXT NOT NULL DEFAULT '{}',
                events_json TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(())
    }

    // =========================================================================
    // Session Methods
    // =========================================================================

    /// Load a session by id
    pub fn load_session(&self, id: &str) -> Result<Option<Session>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT state_json, events_json FROM sessions WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((state_json, events_json)) = row else {
            return Ok(None);
        };

        let state: SessionState = serde_json::from_str(&state_json)
            .with_context(|| format!("Corrupt state for session '{}'", id))?;
        let events: Vec<FlowEvent> = serde_json::from_str(&events_json)
            .with_context(|| format!("Corrupt events for session '{}'", id))?;

        Ok(Some(Session {
            id: id.to_string(),
            state,
            events,
        }))
    }

    /// Save a session (upsert)
    pub fn save_session(&self, session: &Session) -> Result<()> {
        let state_json = serde_json::to_string(&session.state)?;
        let events_json = serde_json::to_string(&session.events)?;

        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            r#"
            INSERT INTO sessions (id, state_json, events_json, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                state_json = ?2,
                events_json = ?3,
                updated_at = ?4
            "#,
            params![
                session.id,
                state_json,
                events_json,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;

        tracing::debug!(session = %session.id, version = session.state.version, "Session saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::StateDelta;
    use crate::state::stage::ProjectStage;

    #[test]
    fn test_open_creates_tables() {
        let dir = tempfile::tempdir().unwrap();
        let db = FlowDb::open_at(dir.path().join("nested/flow.db")).unwrap();
        let conn = db.conn.lock().unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='sessions'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_schema_version_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.db");

        // Open twice - should not fail on second open
        let db1 = FlowDb::open_at(&path).unwrap();
        drop(db1);

        let db2 = FlowDb::open_at(&path).unwrap();
        let conn = db2.conn.lock().unwrap();
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_session_crud() {
        let db = FlowDb::open_in_memory().unwrap();
        assert!(db.load_session("missing").unwrap().is_none());

        let mut session = Session::new("s-1");
        session.push_user_message("你好");
        session.record(FlowEvent::state_only(
            "Agentic_PM",
            StateDelta::Greeted {
                project_stage: ProjectStage::Discovery,
            },
        ));
        db.save_session(&session).unwrap();

        let loaded = db.load_session("s-1").unwrap().unwrap();
        assert_eq!(loaded, session);

        session.push_user_message("新需求");
        db.save_session(&session).unwrap();
        assert_eq!(db.load_session("s-1").unwrap().unwrap().events.len(), 3);
    }
}
