//! Sessions
//!
//! A session records that a user authenticated with the provider and may be
//! issued certificates for a bounded time. Sessions are keyed by the
//! case-folded email address, hold at most one row per address, and are never
//! purged: expiry is evaluated whenever a session is looked up.

mod memory;
mod sqlite;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

use crate::error::Result;
use crate::{clamp_duration, SESSION_MAX_DURATION};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Canonical form of an email address used as the session key
pub fn canonicalize_email(email: &str) -> String {
    email.to_lowercase()
}

/// Current time, in unix seconds
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A stored session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Email address as submitted
    pub email: String,
    /// Case-folded email address
    pub email_canonical: String,
    /// Validity in seconds, at most [`SESSION_MAX_DURATION`]
    pub duration: i64,
    /// Creation time, unix seconds
    pub created_at: i64,
}

impl Session {
    /// Build a session for `email` created at `created_at`, clamping the
    /// requested duration.
    pub fn new(email: &str, requested_duration: i64, created_at: i64) -> Self {
        Self {
            email: email.to_string(),
            email_canonical: canonicalize_email(email),
            duration: clamp_duration(requested_duration, SESSION_MAX_DURATION),
            created_at,
        }
    }

    /// Expiry, unix seconds
    pub fn expires_at(&self) -> i64 {
        self.created_at + self.duration
    }

    /// Whether the session is still valid at `now`
    pub fn is_live(&self, now: i64) -> bool {
        self.expires_at() > now
    }
}

/// Session backing
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Open the backing at `location`. Fails with `AlreadyOpen` when called twice.
    async fn open(&self, location: &str) -> Result<()>;

    /// Release the backing. Does nothing when it was never opened.
    async fn close(&self) -> Result<()>;

    /// Record a session for `email`, replacing any session stored under the
    /// same canonical address.
    async fn create_session(&self, email: &str, duration: i64) -> Result<()>;

    /// Whether `email` has an unexpired session
    async fn has_live_session(&self, email: &str) -> Result<bool>;

    /// Stored session for `email`, expired or not
    async fn session(&self, email: &str) -> Result<Option<Session>>;
}

/// Available session backings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// SQLite database file (or `:memory:`)
    #[default]
    Sqlite,
    /// Process-local map, lost on exit
    Memory,
}

impl StoreKind {
    /// Create an unopened store of this kind
    pub fn build(&self) -> Arc<dyn SessionStore> {
        match self {
            StoreKind::Sqlite => Arc::new(SqliteSessionStore::new()),
            StoreKind::Memory => Arc::new(MemorySessionStore::new()),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Sqlite => f.write_str("sqlite"),
            StoreKind::Memory => f.write_str("memory"),
        }
    }
}
