//! SQLite session backing

use super::{canonicalize_email, unix_now, Session, SessionStore};
use crate::error::{PersonaError, Result};
use crate::{clamp_duration, SESSION_MAX_DURATION};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 4;

/// Session store persisted in a SQLite database
#[derive(Debug, Default)]
pub struct SqliteSessionStore {
    pool: RwLock<Option<SqlitePool>>,
}

impl SqliteSessionStore {
    /// Create an unopened store
    pub fn new() -> Self {
        Self::default()
    }

    async fn pool(&self) -> Result<SqlitePool> {
        self.pool.read().await.clone().ok_or(PersonaError::StoreNotOpen)
    }

    /// Access the pool for direct queries in tests
    #[cfg(test)]
    pub(crate) async fn test_pool(&self) -> SqlitePool {
        self.pool().await.unwrap()
    }
}

fn is_in_memory(location: &str) -> bool {
    let location = location.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
    location.starts_with(":memory:") || location.contains("mode=memory")
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn open(&self, location: &str) -> Result<()> {
        let mut guard = self.pool.write().await;
        if guard.is_some() {
            return Err(PersonaError::AlreadyOpen);
        }

        let in_memory = is_in_memory(location);
        let mut options = SqliteConnectOptions::from_str(location)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // An in-memory database lives and dies with its only connection
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
        };

        let pool = pool_options.connect_with(options).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL,
                email_canonical TEXT NOT NULL UNIQUE,
                duration INTEGER NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )
            "#,
        )
        .execute(&pool)
        .await?;

        info!(location = %location, in_memory, "Opened SQLite session store");
        *guard = Some(pool);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(pool) = self.pool.write().await.take() {
            pool.close().await;
            info!("Closed SQLite session store");
        }
        Ok(())
    }

    async fn create_session(&self, email: &str, duration: i64) -> Result<()> {
        let pool = self.pool().await?;
        let canonical = canonicalize_email(email);
        let duration = clamp_duration(duration, SESSION_MAX_DURATION);

        let result = sqlx::query(
            r#"
            INSERT INTO sessions (email, email_canonical, duration, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(email_canonical) DO UPDATE SET
                email = excluded.email,
                duration = excluded.duration,
                created_at = excluded.created_at
            "#,
        )
        .bind(email)
        .bind(&canonical)
        .bind(duration)
        .bind(unix_now())
        .execute(&pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersonaError::WriteRejected);
        }

        debug!(email = %canonical, duration, "Created session");
        Ok(())
    }

    async fn has_live_session(&self, email: &str) -> Result<bool> {
        let pool = self.pool().await?;
        let canonical = canonicalize_email(email);

        let row = sqlx::query(
            "SELECT 1 FROM sessions WHERE email_canonical = ? AND created_at + duration > ?",
        )
        .bind(&canonical)
        .bind(unix_now())
        .fetch_optional(&pool)
        .await?;

        debug!(email = %canonical, live = row.is_some(), "Checked session");
        Ok(row.is_some())
    }

    async fn session(&self, email: &str) -> Result<Option<Session>> {
        let pool = self.pool().await?;

        let row = sqlx::query(
            "SELECT email, email_canonical, duration, created_at FROM sessions WHERE email_canonical = ?",
        )
        .bind(canonicalize_email(email))
        .fetch_optional(&pool)
        .await?;

        row.map(|row| -> Result<Session> {
            Ok(Session {
                email: row.try_get("email")?,
                email_canonical: row.try_get("email_canonical")?,
                duration: row.try_get("duration")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn open_store() -> SqliteSessionStore {
        let store = SqliteSessionStore::new();
        store.open("sqlite::memory:").await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_and_check_case_insensitive() {
        let store = open_store().await;
        store.create_session("User@Example.com", 100_000).await.unwrap();

        assert!(store.has_live_session("user@example.com").await.unwrap());
        assert!(store.has_live_session("USER@EXAMPLE.COM").await.unwrap());

        let session = store.session("user@example.com").await.unwrap().unwrap();
        assert_eq!(session.email, "User@Example.com");
        assert_eq!(session.duration, SESSION_MAX_DURATION);
    }

    #[tokio::test]
    async fn test_unknown_email_is_not_live() {
        let store = open_store().await;
        assert!(!store.has_live_session("nobody@example.com").await.unwrap());
        assert!(store.session("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_not_live() {
        let store = open_store().await;
        let pool = store.test_pool().await;

        sqlx::query(
            "INSERT INTO sessions (email, email_canonical, duration, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind("old@example.com")
        .bind("old@example.com")
        .bind(60_i64)
        .bind(unix_now() - 3600)
        .execute(&pool)
        .await
        .unwrap();

        assert!(!store.has_live_session("old@example.com").await.unwrap());
        assert!(store.session("old@example.com").await.unwrap().is_some());

        // A new session replaces the expired row
        store.create_session("Old@Example.com", 60).await.unwrap();
        assert!(store.has_live_session("old@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_duration_is_not_live() {
        let store = open_store().await;
        store.create_session("zero@example.com", 0).await.unwrap();
        assert!(!store.has_live_session("zero@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row() {
        let store = open_store().await;
        store.create_session("a@example.com", 60).await.unwrap();
        store.create_session("A@EXAMPLE.COM", 120).await.unwrap();

        let pool = store.test_pool().await;
        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM sessions")
            .fetch_one(&pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(count, 1);

        let session = store.session("a@example.com").await.unwrap().unwrap();
        assert_eq!(session.email, "A@EXAMPLE.COM");
        assert_eq!(session.duration, 120);
    }

    #[tokio::test]
    async fn test_concurrent_creates_on_file() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("sessions.db");

        let store = Arc::new(SqliteSessionStore::new());
        store.open(location.to_str().unwrap()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let email = if i % 2 == 0 { "Race@Example.com" } else { "race@example.com" };
                store.create_session(email, 600).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let pool = store.test_pool().await;
        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM sessions")
            .fetch_one(&pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(count, 1);
        assert!(store.has_live_session("race@example.com").await.unwrap());

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_twice_and_unopened() {
        let store = SqliteSessionStore::new();
        assert!(matches!(
            store.has_live_session("a@example.com").await,
            Err(PersonaError::StoreNotOpen)
        ));
        assert!(matches!(
            store.create_session("a@example.com", 60).await,
            Err(PersonaError::StoreNotOpen)
        ));

        // Closing a store that was never opened is fine
        store.close().await.unwrap();

        store.open("sqlite::memory:").await.unwrap();
        assert!(matches!(
            store.open("sqlite::memory:").await,
            Err(PersonaError::AlreadyOpen)
        ));

        store.close().await.unwrap();
        assert!(matches!(
            store.session("a@example.com").await,
            Err(PersonaError::StoreNotOpen)
        ));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("persist.db");
        let location = location.to_str().unwrap();

        let store = SqliteSessionStore::new();
        store.open(location).await.unwrap();
        store.create_session("keep@example.com", 600).await.unwrap();
        store.close().await.unwrap();

        store.open(location).await.unwrap();
        assert!(store.has_live_session("keep@example.com").await.unwrap());
    }

    #[test]
    fn test_in_memory_detection() {
        assert!(is_in_memory(":memory:"));
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file:sessions?mode=memory"));
        assert!(!is_in_memory("sqlite://sessions.db"));
        assert!(!is_in_memory("/var/lib/persona/sessions.db"));
    }
}
