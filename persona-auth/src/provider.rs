//! Identity provider facade
//!
//! Ties the key holder, certificate issuer, session store and support
//! document together behind the operations an HTTP layer calls.

use crate::certificate::{stringified_i64, CertificateIssuer};
use crate::config::IdpConfig;
use crate::error::Result;
use crate::keys::KeyHolder;
use crate::session::{MemorySessionStore, SessionStore};
use crate::support_document::SupportDocument;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Body of a session check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSessionRequest {
    /// Email to check
    pub email: String,
}

/// Body of a certificate request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRequest {
    /// Email to certify
    pub email: String,

    /// User agent public key
    #[serde(rename = "public-key")]
    pub public_key: BTreeMap<String, String>,

    /// Requested validity, seconds; untrusted and clamped
    #[serde(with = "stringified_i64")]
    pub duration: i64,
}

/// A configured identity provider
pub struct IdentityProvider {
    config: IdpConfig,
    keys: Arc<KeyHolder>,
    sessions: Arc<dyn SessionStore>,
    issuer: CertificateIssuer,
    support_document: SupportDocument,
    support_document_json: Vec<u8>,
}

impl IdentityProvider {
    /// Validate `config` and bring up everything it describes.
    ///
    /// A publishing provider loads its key file and opens its session backing.
    /// A delegating provider does neither: its session calls fail with
    /// `StoreNotOpen` and issuance fails with `KeyNotSet`.
    pub async fn from_config(config: IdpConfig) -> Result<Self> {
        config.check()?;

        let keys = Arc::new(KeyHolder::with_layout(config.signature_layout));

        let sessions = if config.is_delegated() {
            info!(authority = %config.delegation.host, "Delegating identity provider");
            Arc::new(MemorySessionStore::new()) as Arc<dyn SessionStore>
        } else {
            keys.load_file(&config.private_key.file, config.private_key.algorithm())?;

            let sessions = config.session.store.build();
            sessions.open(&config.session.backing).await?;
            sessions
        };

        Self::new(config, keys, sessions)
    }

    /// Assemble a provider from parts. `sessions` should already be open.
    pub fn new(
        config: IdpConfig,
        keys: Arc<KeyHolder>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        let support_document = SupportDocument::generate(&config, &keys)?;
        let support_document_json = support_document.to_json()?;
        let issuer = CertificateIssuer::new(keys.clone(), config.issuer.clone());

        info!(
            issuer = %config.issuer,
            delegated = config.is_delegated(),
            "Identity provider ready"
        );

        Ok(Self {
            config,
            keys,
            sessions,
            issuer,
            support_document,
            support_document_json,
        })
    }

    /// Support document JSON, as served
    pub fn support_document(&self) -> &[u8] {
        &self.support_document_json
    }

    /// Support document
    pub fn support_document_value(&self) -> &SupportDocument {
        &self.support_document
    }

    /// Whether the requested email has a live session
    pub async fn check_session(&self, request: &CheckSessionRequest) -> Result<bool> {
        self.sessions.has_live_session(&request.email).await
    }

    /// Issue an identity certificate.
    ///
    /// Session gating is left to the caller, which should check the session
    /// first.
    pub fn generate_certificate(&self, request: &CertificateRequest) -> Result<String> {
        self.issuer.issue(request)
    }

    /// Record a session after the user authenticated
    pub async fn create_session(&self, email: &str, duration: i64) -> Result<()> {
        self.sessions.create_session(email, duration).await
    }

    /// Close the session backing
    pub async fn close(&self) -> Result<()> {
        self.sessions.close().await
    }

    /// Configuration in effect
    pub fn config(&self) -> &IdpConfig {
        &self.config
    }

    /// Key holder, for re-assigning the signing key
    pub fn keys(&self) -> &Arc<KeyHolder> {
        &self.keys
    }

    /// Session store
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }
}
