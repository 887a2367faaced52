//! # persona-auth: Persona (BrowserID) Identity Provider Core
//!
//! This crate implements the credential side of a BrowserID identity provider.
//!
//! ## Features
//!
//! - **Signing Keys**: DSA, ECDSA (P-224/P-256/P-384/P-521) and RSA private keys
//!   with minimum-strength enforcement
//! - **Identity Certificates**: compact `header.claims.signature` tokens binding an
//!   email address to a user-supplied public key
//! - **Sessions**: time-boxed authorization grants with SQLite and in-memory backings
//! - **Support Document**: the `/.well-known/browserid` document, published or delegated
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │           USER AGENT (browser)                          │
//! │  Signs in on the provider's authentication page         │
//! └─────────────────────────────────────────────────────────┘
//!                       ↓
//!         ┌─────────────────────────────┐
//!         │   SESSION STORE             │
//!         │   create_session()          │
//!         │   has_live_session()        │
//!         └─────────────────────────────┘
//!                       ↓
//!         ┌─────────────────────────────┐
//!         │   CERTIFICATE ISSUER        │
//!         │   header + claims           │
//!         │   signed by KeyHolder       │
//!         └─────────────────────────────┘
//!                       ↓
//!         ┌─────────────────────────────┐
//!         │   RELYING PARTY             │
//!         │   Verifies against the      │
//!         │   support document key      │
//!         └─────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod certificate;
pub mod config;
pub mod error;
pub mod keys;
pub mod provider;
pub mod session;
pub mod support_document;

// Re-exports for convenience
pub use certificate::{
    CertificateIssuer, DecodedCertificate, IdentityCertificate, IdentityCertificateHeader,
    IdentityCertificatePrincipal,
};
pub use config::IdpConfig;
pub use error::{PersonaError, Result};
pub use keys::{
    Algorithm, EllipticCurve, KeyAlgorithm, KeyHolder, KeySnapshot, PrivateKeyMaterial,
    PublicKeyDescriptor, SignatureLayout, SigningKey,
};
pub use provider::{CertificateRequest, CheckSessionRequest, IdentityProvider};
pub use session::{
    canonicalize_email, MemorySessionStore, Session, SessionStore, SqliteSessionStore, StoreKind,
};
pub use support_document::SupportDocument;

/// Maximum duration, in seconds, that a session can be valid for
pub const SESSION_MAX_DURATION: i64 = 86_400;

/// Maximum duration, in seconds, of every issued identity certificate
pub const CERTIFICATE_MAX_DURATION: i64 = SESSION_MAX_DURATION;

/// Seconds subtracted from the issued-at time to tolerate verifier clock drift
pub const ISSUED_AT_FUZZ_SECONDS: i64 = 10;

/// Minimum DSA public modulus size, in bits
pub const MIN_KEY_SIZE_DSA: usize = 2048;

/// Minimum RSA modulus size, in bits
pub const MIN_KEY_SIZE_RSA: usize = 2048;

/// Path of the BrowserID support document
pub const SUPPORT_DOCUMENT_PATH: &str = "/.well-known/browserid";

/// Clamp an untrusted duration (seconds) into `[0, maximum]`.
pub fn clamp_duration(requested: i64, maximum: i64) -> i64 {
    requested.clamp(0, maximum)
}
