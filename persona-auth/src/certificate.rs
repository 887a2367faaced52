//! Identity Certificates
//!
//! An identity certificate binds an email address to a public key supplied
//! by the user agent, signed with the provider's key:
//!
//! ```text
//! base64url(header) "." base64url(claims) "." base64url(signature)
//! ```
//!
//! The signature covers the first two segments and the separating dot,
//! exactly as transmitted.

use crate::error::{PersonaError, Result};
use crate::keys::KeyHolder;
use crate::provider::CertificateRequest;
use crate::{clamp_duration, CERTIFICATE_MAX_DURATION, ISSUED_AT_FUZZ_SECONDS};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Certificate header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCertificateHeader {
    /// Signing algorithm, e.g. `RS256`
    pub alg: String,
}

/// Principal the certificate vouches for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCertificatePrincipal {
    /// Email address
    pub email: String,
}

/// Certificate claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCertificate {
    /// Issued-at, milliseconds since the epoch
    #[serde(with = "stringified_i64")]
    pub iat: i64,

    /// Expiry, milliseconds since the epoch
    #[serde(with = "stringified_i64")]
    pub exp: i64,

    /// Issuing domain
    pub iss: String,

    /// User agent public key, passed through verbatim
    #[serde(rename = "public-key")]
    pub public_key: BTreeMap<String, String>,

    /// Certified principal
    pub principal: IdentityCertificatePrincipal,
}

impl IdentityCertificate {
    /// Validity window, in milliseconds
    pub fn validity_millis(&self) -> i64 {
        self.exp - self.iat
    }

    /// Issued-at as a timestamp
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.iat)
    }

    /// Expiry as a timestamp
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.exp)
    }
}

/// A token split back into its parts
#[derive(Debug, Clone)]
pub struct DecodedCertificate {
    /// Decoded header
    pub header: IdentityCertificateHeader,
    /// Decoded claims
    pub claims: IdentityCertificate,
    /// `header.claims` segment bytes the signature covers
    pub signing_input: String,
    /// Raw signature bytes
    pub signature: Vec<u8>,
}

impl DecodedCertificate {
    /// Split and decode a token. The signature is not verified.
    pub fn decode(token: &str) -> Result<Self> {
        let mut segments = token.split('.');
        let (Some(header), Some(claims), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(PersonaError::EncodingFailed(
                "identity certificate must have three segments".to_string(),
            ));
        };

        let decode = |segment: &str| {
            URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
                PersonaError::EncodingFailed(format!("invalid base64url segment: {e}"))
            })
        };

        Ok(Self {
            header: serde_json::from_slice(&decode(header)?)?,
            claims: serde_json::from_slice(&decode(claims)?)?,
            signing_input: format!("{header}.{claims}"),
            signature: decode(signature)?,
        })
    }
}

/// Issues identity certificates signed with the holder's current key
#[derive(Debug, Clone)]
pub struct CertificateIssuer {
    keys: Arc<KeyHolder>,
    issuer: String,
}

impl CertificateIssuer {
    /// Create an issuer publishing `issuer` as the `iss` claim
    pub fn new(keys: Arc<KeyHolder>, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
        }
    }

    /// Configured issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a certificate valid from now
    pub fn issue(&self, request: &CertificateRequest) -> Result<String> {
        self.issue_at(request, Utc::now())
    }

    /// Issue a certificate as if the current time were `now`.
    ///
    /// `iat` is backdated by the issued-at fuzz, and `exp` always lies the full
    /// maximum duration after `iat`; the requested duration never shortens it.
    pub fn issue_at(&self, request: &CertificateRequest, now: DateTime<Utc>) -> Result<String> {
        let requested = request.duration;
        let duration = clamp_duration(requested, CERTIFICATE_MAX_DURATION);
        if duration != requested {
            debug!(requested, clamped = duration, "Clamped certificate duration");
        }

        let key = self.keys.snapshot()?;

        let issued_at = now - Duration::seconds(ISSUED_AT_FUZZ_SECONDS);
        let expires_at = issued_at + Duration::seconds(CERTIFICATE_MAX_DURATION);

        let header = IdentityCertificateHeader {
            alg: key.header_algorithm().to_string(),
        };
        let claims = IdentityCertificate {
            iat: issued_at.timestamp_millis(),
            exp: expires_at.timestamp_millis(),
            iss: self.issuer.clone(),
            public_key: request.public_key.clone(),
            principal: IdentityCertificatePrincipal {
                email: request.email.clone(),
            },
        };

        let mut token = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?));

        let signature = key.sign(token.as_bytes())?;
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(signature));

        debug!(
            email = %request.email,
            alg = %header.alg,
            iat = claims.iat,
            exp = claims.exp,
            "Issued identity certificate"
        );

        Ok(token)
    }
}

/// Serde module for integers carried as JSON strings (numbers also accepted)
pub(crate) mod stringified_i64 {
    use serde::de::{self, Deserializer};
    use serde::{Deserialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    pub fn serialize<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => s.trim().parse().map_err(de::Error::custom),
            StringOrNumber::Number(n) => Ok(n),
        }
    }
}
