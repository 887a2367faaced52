//! Atomically replaceable signing key

use super::{
    Algorithm, KeyAlgorithm, PrivateKeyMaterial, PublicKeyDescriptor, SignatureLayout, SigningKey,
};
use crate::error::{PersonaError, Result};
use arc_swap::ArcSwapOption;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Immutable view of one assigned key
///
/// Descriptor and header algorithm are computed once at assignment, so every
/// certificate built from a snapshot is signed by the key its header names.
#[derive(Debug)]
pub struct KeySnapshot {
    key: SigningKey,
    descriptor: PublicKeyDescriptor,
    header_algorithm: String,
    layout: SignatureLayout,
}

impl KeySnapshot {
    fn new(key: SigningKey, layout: SignatureLayout) -> Self {
        Self {
            descriptor: key.descriptor(),
            header_algorithm: key.header_algorithm(),
            key,
            layout,
        }
    }

    /// Algorithm family of the key
    pub fn algorithm(&self) -> Algorithm {
        self.key.algorithm()
    }

    /// Public-key descriptor
    pub fn descriptor(&self) -> &PublicKeyDescriptor {
        &self.descriptor
    }

    /// Certificate header `alg` value
    pub fn header_algorithm(&self) -> &str {
        &self.header_algorithm
    }

    /// Sign the SHA-256 digest of `message`
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.key.sign(message, self.layout)
    }
}

/// Holds the provider's current signing key.
///
/// Reads are lock-free. [`KeyHolder::assign`] validates the new key first and
/// publishes it in a single swap; a rejected key leaves the previous one in
/// place.
#[derive(Debug, Default)]
pub struct KeyHolder {
    current: ArcSwapOption<KeySnapshot>,
    layout: SignatureLayout,
}

impl KeyHolder {
    /// Create an empty holder using the minimal signature layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty holder with the given `(r, s)` signature layout
    pub fn with_layout(layout: SignatureLayout) -> Self {
        Self {
            current: ArcSwapOption::empty(),
            layout,
        }
    }

    /// Validate and install `material` as the signing key
    pub fn assign(&self, material: PrivateKeyMaterial) -> Result<()> {
        let key = SigningKey::try_from(material).inspect_err(|e| {
            warn!(error = %e, "Rejected signing key");
        })?;
        let snapshot = KeySnapshot::new(key, self.layout);

        info!(
            algorithm = %snapshot.algorithm(),
            alg = %snapshot.header_algorithm(),
            "Assigned signing key"
        );

        self.current.store(Some(Arc::new(snapshot)));
        Ok(())
    }

    /// Decode a PEM document and install it as the signing key
    pub fn assign_pem(&self, pem: &str) -> Result<()> {
        self.assign(PrivateKeyMaterial::from_pem(pem)?)
    }

    /// Load a PEM key file and install it as the signing key.
    ///
    /// When `expected` is given the decoded key must be of that family.
    pub fn load_file(&self, path: impl AsRef<Path>, expected: Option<Algorithm>) -> Result<()> {
        let path = path.as_ref();
        let material = PrivateKeyMaterial::from_pem_file(path)?;

        if let Some(expected) = expected {
            if material.algorithm() != Some(expected) {
                return Err(PersonaError::UnsupportedKeyType(format!(
                    "{} does not hold a {expected} key",
                    path.display()
                )));
            }
        }

        self.assign(material)
    }

    /// Current key, or [`PersonaError::KeyNotSet`]
    pub fn snapshot(&self) -> Result<Arc<KeySnapshot>> {
        self.current.load_full().ok_or(PersonaError::KeyNotSet)
    }

    /// Whether a key has been assigned
    pub fn is_set(&self) -> bool {
        self.current.load().is_some()
    }

    /// Public-key descriptor of the current key
    pub fn public_key_descriptor(&self) -> Result<PublicKeyDescriptor> {
        Ok(self.snapshot()?.descriptor().clone())
    }

    /// Certificate header `alg` value of the current key
    pub fn certificate_header_algorithm(&self) -> Result<String> {
        Ok(self.snapshot()?.header_algorithm().to_string())
    }

    /// Sign with the current key
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.snapshot()?.sign(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RSA_2048: &str = include_str!("../../tests/fixtures/rsa2048.pem");
    const RSA_1024: &str = include_str!("../../tests/fixtures/rsa1024.pem");
    const EC_P256: &str = include_str!("../../tests/fixtures/ec_p256.pem");
    const EC_SECP256K1: &str = include_str!("../../tests/fixtures/ec_secp256k1.pem");
    const ED25519: &str = include_str!("../../tests/fixtures/ed25519.pem");

    #[test]
    fn test_unset_holder() {
        let holder = KeyHolder::new();
        assert!(!holder.is_set());
        assert!(matches!(holder.public_key_descriptor(), Err(PersonaError::KeyNotSet)));
        assert!(matches!(
            holder.certificate_header_algorithm(),
            Err(PersonaError::KeyNotSet)
        ));
        assert!(matches!(holder.sign(b"message"), Err(PersonaError::KeyNotSet)));
    }

    #[test]
    fn test_rejected_key_keeps_previous() {
        let holder = KeyHolder::new();
        holder.assign_pem(RSA_2048).unwrap();
        let before = holder.public_key_descriptor().unwrap();

        let err = holder.assign_pem(RSA_1024).unwrap_err();
        assert!(matches!(err, PersonaError::KeyTooWeak { bits: 1024, .. }));

        let err = holder.assign_pem(EC_SECP256K1).unwrap_err();
        assert!(matches!(err, PersonaError::UnsupportedCurve(_)));

        let err = holder.assign_pem(ED25519).unwrap_err();
        assert!(matches!(err, PersonaError::UnsupportedKeyType(_)));

        assert_eq!(holder.public_key_descriptor().unwrap(), before);
        assert_eq!(holder.certificate_header_algorithm().unwrap(), "RS256");
    }

    #[test]
    fn test_reassign_switches_algorithm() {
        let holder = KeyHolder::new();
        holder.assign_pem(RSA_2048).unwrap();
        let old = holder.snapshot().unwrap();

        holder.assign_pem(EC_P256).unwrap();
        assert_eq!(holder.certificate_header_algorithm().unwrap(), "EC256");
        assert_eq!(holder.public_key_descriptor().unwrap().algorithm(), Algorithm::Ecdsa);

        // Snapshots taken earlier stay consistent
        assert_eq!(old.header_algorithm(), "RS256");
        assert_eq!(old.sign(b"message").unwrap().len(), 256);
    }

    #[test]
    fn test_layout_applies_to_signatures() {
        let holder = KeyHolder::with_layout(SignatureLayout::FixedWidth);
        holder.assign_pem(EC_P256).unwrap();
        for _ in 0..8 {
            assert_eq!(holder.sign(b"message").unwrap().len(), 64);
        }
    }

    #[test]
    fn test_load_file_checks_type() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EC_P256.as_bytes()).unwrap();

        let holder = KeyHolder::new();
        let err = holder
            .load_file(file.path(), Some(Algorithm::Rsa))
            .unwrap_err();
        assert!(matches!(err, PersonaError::UnsupportedKeyType(_)));
        assert!(!holder.is_set());

        holder.load_file(file.path(), Some(Algorithm::Ecdsa)).unwrap();
        assert!(holder.is_set());
    }

    #[test]
    fn test_concurrent_reassignment_is_consistent() {
        let holder = Arc::new(KeyHolder::new());
        holder.assign_pem(RSA_2048).unwrap();

        let writer = {
            let holder = Arc::clone(&holder);
            std::thread::spawn(move || {
                for i in 0..100 {
                    let pem = if i % 2 == 0 { EC_P256 } else { RSA_2048 };
                    holder.assign_pem(pem).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let holder = Arc::clone(&holder);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = holder.snapshot().unwrap();
                        match snapshot.header_algorithm() {
                            "RS256" => assert!(matches!(
                                snapshot.descriptor(),
                                PublicKeyDescriptor::Rsa { .. }
                            )),
                            "EC256" => assert!(matches!(
                                snapshot.descriptor(),
                                PublicKeyDescriptor::Ecdsa { .. }
                            )),
                            other => panic!("unexpected header algorithm {other}"),
                        }
                        assert_eq!(snapshot.algorithm(), snapshot.descriptor().algorithm());
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_load_missing_file() {
        let holder = KeyHolder::new();
        let err = holder.load_file("/nonexistent/key.pem", None).unwrap_err();
        assert!(matches!(err, PersonaError::Io(_)));
    }
}
