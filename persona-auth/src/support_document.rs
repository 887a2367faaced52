//! BrowserID support document, served at [`SUPPORT_DOCUMENT_PATH`]
//!
//! [`SUPPORT_DOCUMENT_PATH`]: crate::SUPPORT_DOCUMENT_PATH

use crate::config::IdpConfig;
use crate::error::Result;
use crate::keys::{KeyHolder, PublicKeyDescriptor};
use serde::{Deserialize, Serialize};

/// The support document in one of its two mutually exclusive forms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SupportDocument {
    /// This provider signs certificates itself
    Published {
        /// Public half of the signing key
        #[serde(rename = "public-key")]
        public_key: PublicKeyDescriptor,
        /// Authentication page URL
        authentication: String,
        /// Provisioning page URL
        provisioning: String,
    },

    /// Another host is authoritative for this domain
    Delegated {
        /// Authoritative host
        authority: String,
    },
}

impl SupportDocument {
    /// Build the document for `config`.
    ///
    /// The published form needs an assigned key, otherwise this fails with
    /// `KeyNotSet`.
    pub fn generate(config: &IdpConfig, keys: &KeyHolder) -> Result<Self> {
        if config.delegation.delegate {
            return Ok(SupportDocument::Delegated {
                authority: config.delegation.host.clone(),
            });
        }

        Ok(SupportDocument::Published {
            public_key: keys.public_key_descriptor()?,
            authentication: config.authentication.url.clone(),
            provisioning: config.provisioning.url.clone(),
        })
    }

    /// Whether this document delegates to another host
    pub fn is_delegated(&self) -> bool {
        matches!(self, SupportDocument::Delegated { .. })
    }

    /// Compact JSON encoding, as served
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
