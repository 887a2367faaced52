//! Signing Keys
//!
//! The provider signs every identity certificate with exactly one private key.
//! Three algorithm families are supported:
//!
//! - **DSA**: public modulus of at least [`MIN_KEY_SIZE_DSA`] bits
//! - **ECDSA**: the NIST curves P-224, P-256, P-384 and P-521
//! - **RSA**: modulus of at least [`MIN_KEY_SIZE_RSA`] bits, PKCS#1 v1.5 / SHA-256
//!
//! Key material is decoded into a [`PrivateKeyMaterial`], validated into a
//! [`SigningKey`] and published through a [`KeyHolder`], which swaps immutable
//! [`KeySnapshot`]s so readers never see a half-assigned key.
//!
//! [`MIN_KEY_SIZE_DSA`]: crate::MIN_KEY_SIZE_DSA
//! [`MIN_KEY_SIZE_RSA`]: crate::MIN_KEY_SIZE_RSA

mod dsa_key;
mod ec_key;
mod holder;
mod material;
mod rsa_key;

pub use dsa_key::DsaKey;
pub use ec_key::EcdsaKey;
pub use holder::{KeyHolder, KeySnapshot};
pub use material::PrivateKeyMaterial;
pub use rsa_key::RsaKey;

use crate::error::{PersonaError, Result};
use pkcs8::ObjectIdentifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `secp224r1`
const SECP_224_R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.33");
/// `prime256v1` / `secp256r1`
const SECP_256_R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
/// `secp384r1`
const SECP_384_R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
/// `secp521r1`
const SECP_521_R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");

/// Algorithm family of a signing key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Algorithm {
    /// Digital Signature Algorithm
    Dsa,
    /// Elliptic Curve DSA
    Ecdsa,
    /// RSA
    Rsa,
}

impl Algorithm {
    /// BrowserID algorithm code used in descriptors and certificate headers
    pub fn code(&self) -> &'static str {
        match self {
            Algorithm::Dsa => "DS",
            Algorithm::Ecdsa => "EC",
            Algorithm::Rsa => "RS",
        }
    }

    /// Parse a configured key type (`"dsa"`, `"ECDSA"`, ...)
    pub fn from_key_type(key_type: &str) -> Option<Self> {
        match key_type.to_ascii_uppercase().as_str() {
            "DSA" => Some(Algorithm::Dsa),
            "ECDSA" => Some(Algorithm::Ecdsa),
            "RSA" => Some(Algorithm::Rsa),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::Dsa => "DSA",
            Algorithm::Ecdsa => "ECDSA",
            Algorithm::Rsa => "RSA",
        };
        f.write_str(name)
    }
}

/// Supported elliptic curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EllipticCurve {
    /// NIST P-224
    P224,
    /// NIST P-256
    P256,
    /// NIST P-384
    P384,
    /// NIST P-521
    P521,
}

impl EllipticCurve {
    /// Curve label published in the support document
    pub fn label(&self) -> &'static str {
        match self {
            EllipticCurve::P224 => "P-224",
            EllipticCurve::P256 => "P-256",
            EllipticCurve::P384 => "P-384",
            EllipticCurve::P521 => "P-521",
        }
    }

    /// Size of the curve, in bits
    pub fn bits(&self) -> usize {
        match self {
            EllipticCurve::P224 => 224,
            EllipticCurve::P256 => 256,
            EllipticCurve::P384 => 384,
            EllipticCurve::P521 => 521,
        }
    }

    /// Length of a serialized scalar or coordinate, in bytes
    pub fn field_bytes(&self) -> usize {
        self.bits().div_ceil(8)
    }

    /// Named-curve object identifier
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            EllipticCurve::P224 => SECP_224_R1,
            EllipticCurve::P256 => SECP_256_R1,
            EllipticCurve::P384 => SECP_384_R1,
            EllipticCurve::P521 => SECP_521_R1,
        }
    }

    /// Look up a curve by its named-curve object identifier
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [
            EllipticCurve::P224,
            EllipticCurve::P256,
            EllipticCurve::P384,
            EllipticCurve::P521,
        ]
        .into_iter()
        .find(|curve| curve.oid() == *oid)
    }
}

/// Byte layout of concatenated `(r, s)` signatures (DSA and ECDSA)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureLayout {
    /// Minimal big-endian encodings with leading zero bytes stripped
    #[default]
    Minimal,
    /// Both integers left-padded to the group order length
    FixedWidth,
}

impl SignatureLayout {
    /// Concatenate `r` and `s` according to this layout.
    ///
    /// `width` is the group order length in bytes; it is ignored by
    /// [`SignatureLayout::Minimal`].
    pub fn concat(&self, r: &[u8], s: &[u8], width: usize) -> Vec<u8> {
        let r = strip_leading_zeros(r);
        let s = strip_leading_zeros(s);

        match self {
            SignatureLayout::Minimal => [r, s].concat(),
            SignatureLayout::FixedWidth => {
                let mut out = Vec::with_capacity(width * 2);
                for part in [r, s] {
                    out.resize(out.len() + width.saturating_sub(part.len()), 0);
                    out.extend_from_slice(part);
                }
                out
            }
        }
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Public half of the signing key, as published in the support document
///
/// The `algorithm` field carries the variant tag, so every consumer can tell
/// the three field layouts apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm")]
pub enum PublicKeyDescriptor {
    /// DSA domain parameters and public value, lowercase hex
    #[serde(rename = "DS")]
    Dsa {
        /// Generator
        g: String,
        /// Prime modulus
        p: String,
        /// Subgroup order
        q: String,
        /// Public value
        y: String,
    },

    /// ECDSA public point, decimal coordinates
    #[serde(rename = "EC")]
    Ecdsa {
        /// Curve label, e.g. `P-256`
        #[serde(rename = "crv")]
        curve: String,
        /// Affine x coordinate
        x: String,
        /// Affine y coordinate
        y: String,
    },

    /// RSA public key, decimal
    #[serde(rename = "RS")]
    Rsa {
        /// Modulus
        n: String,
        /// Public exponent
        e: String,
    },
}

impl PublicKeyDescriptor {
    /// Algorithm family of the described key
    pub fn algorithm(&self) -> Algorithm {
        match self {
            PublicKeyDescriptor::Dsa { .. } => Algorithm::Dsa,
            PublicKeyDescriptor::Ecdsa { .. } => Algorithm::Ecdsa,
            PublicKeyDescriptor::Rsa { .. } => Algorithm::Rsa,
        }
    }
}

/// Capabilities shared by every supported key family
pub trait KeyAlgorithm {
    /// Algorithm family
    fn algorithm(&self) -> Algorithm;

    /// Public-key descriptor for the support document
    fn descriptor(&self) -> PublicKeyDescriptor;

    /// Certificate header `alg` value, e.g. `RS256`
    fn header_algorithm(&self) -> String;

    /// Sign the SHA-256 digest of `message`
    fn sign(&self, message: &[u8], layout: SignatureLayout) -> Result<Vec<u8>>;
}

/// A validated private key of one supported family
pub enum SigningKey {
    /// DSA key
    Dsa(DsaKey),
    /// ECDSA key
    Ecdsa(EcdsaKey),
    /// RSA key
    Rsa(RsaKey),
}

impl TryFrom<PrivateKeyMaterial> for SigningKey {
    type Error = PersonaError;

    fn try_from(material: PrivateKeyMaterial) -> Result<Self> {
        match material {
            PrivateKeyMaterial::Dsa(key) => Ok(SigningKey::Dsa(DsaKey::new(key)?)),
            PrivateKeyMaterial::Ecdsa { curve, secret } => {
                let curve = EllipticCurve::from_oid(&curve)
                    .ok_or_else(|| PersonaError::UnsupportedCurve(curve.to_string()))?;
                Ok(SigningKey::Ecdsa(EcdsaKey::from_scalar(curve, &secret)?))
            }
            PrivateKeyMaterial::Rsa(key) => Ok(SigningKey::Rsa(RsaKey::new(key)?)),
            PrivateKeyMaterial::Other { oid } => {
                Err(PersonaError::UnsupportedKeyType(oid.to_string()))
            }
        }
    }
}

impl KeyAlgorithm for SigningKey {
    fn algorithm(&self) -> Algorithm {
        match self {
            SigningKey::Dsa(key) => key.algorithm(),
            SigningKey::Ecdsa(key) => key.algorithm(),
            SigningKey::Rsa(key) => key.algorithm(),
        }
    }

    fn descriptor(&self) -> PublicKeyDescriptor {
        match self {
            SigningKey::Dsa(key) => key.descriptor(),
            SigningKey::Ecdsa(key) => key.descriptor(),
            SigningKey::Rsa(key) => key.descriptor(),
        }
    }

    fn header_algorithm(&self) -> String {
        match self {
            SigningKey::Dsa(key) => key.header_algorithm(),
            SigningKey::Ecdsa(key) => key.header_algorithm(),
            SigningKey::Rsa(key) => key.header_algorithm(),
        }
    }

    fn sign(&self, message: &[u8], layout: SignatureLayout) -> Result<Vec<u8>> {
        match self {
            SigningKey::Dsa(key) => key.sign(message, layout),
            SigningKey::Ecdsa(key) => key.sign(message, layout),
            SigningKey::Rsa(key) => key.sign(message, layout),
        }
    }
}

// Explicitly NO derived Debug: only the algorithm is printed
impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm())
            .field("alg", &self.header_algorithm())
            .finish_non_exhaustive()
    }
}
