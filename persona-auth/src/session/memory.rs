//! In-memory session backing

use super::{canonicalize_email, unix_now, Session, SessionStore};
use crate::error::{PersonaError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Session store kept in process memory
///
/// Useful for tests and single-process deployments; sessions do not survive
/// a restart. The `location` passed to `open` is only logged.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<Option<HashMap<String, Session>>>,
}

impl MemorySessionStore {
    /// Create an unopened store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `session` as-is, bypassing clamping and the clock
    #[cfg(test)]
    pub(crate) async fn insert(&self, session: Session) {
        if let Some(sessions) = self.sessions.write().await.as_mut() {
            sessions.insert(session.email_canonical.clone(), session);
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn open(&self, location: &str) -> Result<()> {
        let mut guard = self.sessions.write().await;
        if guard.is_some() {
            return Err(PersonaError::AlreadyOpen);
        }

        *guard = Some(HashMap::new());
        info!(location = %location, "Opened in-memory session store");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.sessions.write().await.take().is_some() {
            info!("Closed in-memory session store");
        }
        Ok(())
    }

    async fn create_session(&self, email: &str, duration: i64) -> Result<()> {
        let session = Session::new(email, duration, unix_now());

        let mut guard = self.sessions.write().await;
        let sessions = guard.as_mut().ok_or(PersonaError::StoreNotOpen)?;

        debug!(email = %session.email_canonical, duration = session.duration, "Created session");
        sessions.insert(session.email_canonical.clone(), session);
        Ok(())
    }

    async fn has_live_session(&self, email: &str) -> Result<bool> {
        let guard = self.sessions.read().await;
        let sessions = guard.as_ref().ok_or(PersonaError::StoreNotOpen)?;

        let canonical = canonicalize_email(email);
        let live = sessions
            .get(&canonical)
            .is_some_and(|session| session.is_live(unix_now()));

        debug!(email = %canonical, live, "Checked session");
        Ok(live)
    }

    async fn session(&self, email: &str) -> Result<Option<Session>> {
        let guard = self.sessions.read().await;
        let sessions = guard.as_ref().ok_or(PersonaError::StoreNotOpen)?;
        Ok(sessions.get(&canonicalize_email(email)).cloned())
    }
}
