//! Decoding of private-key files into unvalidated key material

use super::{Algorithm, EllipticCurve};
use crate::error::{PersonaError, Result};
use pkcs8::{DecodePrivateKey, ObjectIdentifier, PrivateKeyInfo};
use rsa::pkcs1::DecodeRsaPrivateKey;
use sec1::EcPrivateKey;
use std::fmt;
use zeroize::Zeroizing;

/// `rsaEncryption`
const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
/// `id-ecPublicKey`
const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
/// `id-dsa`
const ID_DSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.1");

/// Private key material as decoded, before strength and curve checks
///
/// Anything that decodes is representable here, including key types the
/// provider refuses to sign with, so the refusal can be reported precisely
/// when the material is handed to [`KeyHolder::assign`](super::KeyHolder::assign).
pub enum PrivateKeyMaterial {
    /// DSA private key
    Dsa(dsa::SigningKey),
    /// ECDSA private scalar on the named curve
    Ecdsa {
        /// Named-curve object identifier
        curve: ObjectIdentifier,
        /// Big-endian private scalar
        secret: Zeroizing<Vec<u8>>,
    },
    /// RSA private key
    Rsa(rsa::RsaPrivateKey),
    /// Any other PKCS#8 algorithm, e.g. Ed25519
    Other {
        /// Algorithm object identifier
        oid: ObjectIdentifier,
    },
}

impl PrivateKeyMaterial {
    /// Decode a PEM document.
    ///
    /// Accepted labels are `PRIVATE KEY` (PKCS#8), `RSA PRIVATE KEY` (PKCS#1)
    /// and `EC PRIVATE KEY` (SEC1). Encrypted keys are rejected.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let (label, der) = pem_rfc7468::decode_vec(pem.trim().as_bytes())
            .map_err(|e| PersonaError::KeyFormat(format!("invalid PEM: {e}")))?;
        let der = Zeroizing::new(der);

        match label {
            "PRIVATE KEY" => Self::from_pkcs8_der(&der),
            "RSA PRIVATE KEY" => rsa::RsaPrivateKey::from_pkcs1_der(&der)
                .map(PrivateKeyMaterial::Rsa)
                .map_err(|e| PersonaError::KeyFormat(format!("invalid PKCS#1 key: {e}"))),
            "EC PRIVATE KEY" => Self::from_sec1_der(&der),
            "ENCRYPTED PRIVATE KEY" => Err(PersonaError::KeyFormat(
                "encrypted private keys are not supported".to_string(),
            )),
            other => Err(PersonaError::KeyFormat(format!(
                "unexpected PEM label '{other}'"
            ))),
        }
    }

    /// Decode a DER-encoded PKCS#8 `PrivateKeyInfo`
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = PrivateKeyInfo::try_from(der)
            .map_err(|e| PersonaError::KeyFormat(format!("invalid PKCS#8 key: {e}")))?;
        let oid = info.algorithm.oid;

        if oid == RSA_ENCRYPTION {
            rsa::RsaPrivateKey::from_pkcs1_der(info.private_key)
                .map(PrivateKeyMaterial::Rsa)
                .map_err(|e| PersonaError::KeyFormat(format!("invalid RSA key: {e}")))
        } else if oid == ID_EC_PUBLIC_KEY {
            let curve = info
                .algorithm
                .parameters_oid()
                .map_err(|e| PersonaError::KeyFormat(format!("missing EC curve: {e}")))?;
            let key = EcPrivateKey::try_from(info.private_key)
                .map_err(|e| PersonaError::KeyFormat(format!("invalid EC key: {e}")))?;
            Ok(PrivateKeyMaterial::Ecdsa {
                curve,
                secret: Zeroizing::new(key.private_key.to_vec()),
            })
        } else if oid == ID_DSA {
            dsa::SigningKey::from_pkcs8_der(der)
                .map(PrivateKeyMaterial::Dsa)
                .map_err(|e| PersonaError::KeyFormat(format!("invalid DSA key: {e}")))
        } else {
            Ok(PrivateKeyMaterial::Other { oid })
        }
    }

    /// Decode a DER-encoded SEC1 `ECPrivateKey` carrying a named curve
    pub fn from_sec1_der(der: &[u8]) -> Result<Self> {
        let key = EcPrivateKey::try_from(der)
            .map_err(|e| PersonaError::KeyFormat(format!("invalid SEC1 key: {e}")))?;
        let curve = key
            .parameters
            .and_then(|params| params.named_curve())
            .ok_or_else(|| PersonaError::KeyFormat("SEC1 key has no named curve".to_string()))?;

        Ok(PrivateKeyMaterial::Ecdsa {
            curve,
            secret: Zeroizing::new(key.private_key.to_vec()),
        })
    }

    /// Read and decode a PEM file
    pub fn from_pem_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let pem = Zeroizing::new(std::fs::read_to_string(path)?);
        Self::from_pem(&pem)
    }

    /// Algorithm family, if it is one the provider knows
    pub fn algorithm(&self) -> Option<Algorithm> {
        match self {
            PrivateKeyMaterial::Dsa(_) => Some(Algorithm::Dsa),
            PrivateKeyMaterial::Ecdsa { .. } => Some(Algorithm::Ecdsa),
            PrivateKeyMaterial::Rsa(_) => Some(Algorithm::Rsa),
            PrivateKeyMaterial::Other { .. } => None,
        }
    }

    /// Wrap a raw ECDSA scalar for one of the supported curves
    pub fn ecdsa(curve: EllipticCurve, secret: &[u8]) -> Self {
        PrivateKeyMaterial::Ecdsa {
            curve: curve.oid(),
            secret: Zeroizing::new(secret.to_vec()),
        }
    }
}

impl From<rsa::RsaPrivateKey> for PrivateKeyMaterial {
    fn from(key: rsa::RsaPrivateKey) -> Self {
        PrivateKeyMaterial::Rsa(key)
    }
}

impl From<dsa::SigningKey> for PrivateKeyMaterial {
    fn from(key: dsa::SigningKey) -> Self {
        PrivateKeyMaterial::Dsa(key)
    }
}

macro_rules! impl_from_secret_key {
    ($($krate:ident => $curve:ident),+ $(,)?) => {
        $(
            impl From<$krate::SecretKey> for PrivateKeyMaterial {
                fn from(key: $krate::SecretKey) -> Self {
                    PrivateKeyMaterial::ecdsa(EllipticCurve::$curve, &key.to_bytes())
                }
            }
        )+
    };
}

impl_from_secret_key!(p224 => P224, p256 => P256, p384 => P384, p521 => P521);

impl fmt::Debug for PrivateKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivateKeyMaterial::Dsa(_) => f.write_str("PrivateKeyMaterial::Dsa(..)"),
            PrivateKeyMaterial::Ecdsa { curve, .. } => f
                .debug_struct("PrivateKeyMaterial::Ecdsa")
                .field("curve", curve)
                .finish_non_exhaustive(),
            PrivateKeyMaterial::Rsa(_) => f.write_str("PrivateKeyMaterial::Rsa(..)"),
            PrivateKeyMaterial::Other { oid } => f
                .debug_struct("PrivateKeyMaterial::Other")
                .field("oid", oid)
                .finish(),
        }
    }
}
