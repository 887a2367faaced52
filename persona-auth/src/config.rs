//! Configuration for the identity provider
//!
//! Loaded from TOML, or JSON when the file ends in `.json`:
//!
//! ```toml
//! issuer = "example.org"
//! certificate-url = "/persona/certificate"
//!
//! [private-key]
//! type = "RSA"
//! file = "/etc/persona/key.pem"
//!
//! [authentication]
//! url = "/persona/sign_in"
//!
//! [provisioning]
//! url = "/persona/provision"
//!
//! [session]
//! url = "/persona/session"
//! store = "sqlite"
//! backing = "/var/lib/persona/sessions.db"
//! ```

use crate::error::{PersonaError, Result};
use crate::keys::{Algorithm, SignatureLayout};
use crate::session::StoreKind;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use validator::{Validate, ValidationError};

/// Identity provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "kebab-case")]
pub struct IdpConfig {
    /// Signing key
    #[serde(default)]
    #[validate(nested)]
    pub private_key: PrivateKeyConfig,

    /// Authentication page
    #[serde(default)]
    #[validate(nested)]
    pub authentication: PageConfig,

    /// Provisioning page
    #[serde(default)]
    #[validate(nested)]
    pub provisioning: PageConfig,

    /// Delegation to another identity provider
    #[serde(default)]
    pub delegation: DelegationConfig,

    /// Session endpoint and backing
    #[serde(default)]
    #[validate(nested)]
    pub session: SessionConfig,

    /// Certificate signing endpoint
    #[serde(default)]
    #[validate(length(min = 1, message = "certificate URL must not be empty"))]
    pub certificate_url: String,

    /// Domain published as the `iss` claim
    #[serde(default)]
    #[validate(length(min = 1, message = "issuer must not be empty"))]
    pub issuer: String,

    /// `(r, s)` layout for DSA and ECDSA signatures
    #[serde(default)]
    pub signature_layout: SignatureLayout,
}

/// `[private-key]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PrivateKeyConfig {
    /// `DSA`, `ECDSA` or `RSA`, any case
    #[serde(rename = "type", default)]
    #[validate(custom(function = "validate_key_type"))]
    pub key_type: String,

    /// PEM key file
    #[serde(default)]
    #[validate(length(min = 1, message = "private key file must not be empty"))]
    pub file: String,
}

impl PrivateKeyConfig {
    /// Configured algorithm family
    pub fn algorithm(&self) -> Option<Algorithm> {
        Algorithm::from_key_type(&self.key_type)
    }
}

/// `[authentication]` and `[provisioning]` sections
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PageConfig {
    /// Page URL published in the support document
    #[serde(default)]
    #[validate(length(min = 1, message = "URL must not be empty"))]
    pub url: String,

    /// Page template, rendered by the HTTP layer
    #[serde(default)]
    pub template: String,

    /// Whether the HTTP layer serves this page itself
    #[serde(default)]
    pub disabled: bool,
}

/// `[delegation]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DelegationConfig {
    /// Delegate authority to `host`
    #[serde(default)]
    pub delegate: bool,

    /// Authoritative host
    #[serde(default)]
    #[validate(length(min = 1, message = "delegation host must not be empty"))]
    pub host: String,
}

/// `[session]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SessionConfig {
    /// Session creation endpoint
    #[serde(default)]
    #[validate(length(min = 1, message = "session URL must not be empty"))]
    pub url: String,

    /// Backing kind
    #[serde(default)]
    pub store: StoreKind,

    /// Backing location, e.g. a database path
    #[serde(default)]
    #[validate(length(min = 1, message = "session backing must not be empty"))]
    pub backing: String,
}

fn validate_key_type(key_type: &str) -> std::result::Result<(), ValidationError> {
    if Algorithm::from_key_type(key_type).is_some() {
        return Ok(());
    }

    Err(ValidationError::new("key_type").with_message(Cow::Owned(format!(
        "'{key_type}' is not a supported private key type"
    ))))
}

impl IdpConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PersonaError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };

        config.check()?;
        Ok(config)
    }

    /// Parse TOML without validating
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| PersonaError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Parse JSON without validating
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| PersonaError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Validate the configuration.
    ///
    /// A delegating provider only needs a delegation host; nothing else is
    /// checked in that case.
    pub fn check(&self) -> Result<()> {
        if self.delegation.delegate {
            self.delegation.validate()?;
            return Ok(());
        }

        self.validate()?;
        Ok(())
    }

    /// Whether this provider delegates to another host
    pub fn is_delegated(&self) -> bool {
        self.delegation.delegate
    }
}
