use super::{Algorithm, EllipticCurve, KeyAlgorithm, PublicKeyDescriptor, SignatureLayout};
use crate::error::{PersonaError, Result};
use ecdsa::elliptic_curve::sec1::ToEncodedPoint;
use ecdsa::elliptic_curve::PublicKey;
use ecdsa::signature::hazmat::RandomizedPrehashSigner;
use rand::rngs::OsRng;
use rsa::BigUint;
use sha2::{Digest, Sha256};

enum CurveKey {
    P224(ecdsa::SigningKey<p224::NistP224>),
    P256(ecdsa::SigningKey<p256::NistP256>),
    P384(ecdsa::SigningKey<p384::NistP384>),
    P521(p521::ecdsa::SigningKey),
}

macro_rules! with_curve_key {
    ($key:expr, $signing_key:ident => $body:expr) => {
        match $key {
            CurveKey::P224($signing_key) => $body,
            CurveKey::P256($signing_key) => $body,
            CurveKey::P384($signing_key) => $body,
            CurveKey::P521($signing_key) => $body,
        }
    };
}

/// ECDSA key on one of the NIST curves, signing SHA-256 digests
pub struct EcdsaKey {
    curve: EllipticCurve,
    key: CurveKey,
}

impl EcdsaKey {
    /// Build a key from its big-endian private scalar
    pub fn from_scalar(curve: EllipticCurve, scalar: &[u8]) -> Result<Self> {
        let invalid = |e: ecdsa::Error| {
            PersonaError::KeyFormat(format!("invalid {} scalar: {e}", curve.label()))
        };

        let key = match curve {
            EllipticCurve::P224 => {
                CurveKey::P224(ecdsa::SigningKey::from_slice(scalar).map_err(invalid)?)
            }
            EllipticCurve::P256 => {
                CurveKey::P256(ecdsa::SigningKey::from_slice(scalar).map_err(invalid)?)
            }
            EllipticCurve::P384 => {
                CurveKey::P384(ecdsa::SigningKey::from_slice(scalar).map_err(invalid)?)
            }
            EllipticCurve::P521 => {
                CurveKey::P521(p521::ecdsa::SigningKey::from_slice(scalar).map_err(invalid)?)
            }
        };

        Ok(Self { curve, key })
    }

    /// Curve the key lives on
    pub fn curve(&self) -> EllipticCurve {
        self.curve
    }

    /// Big-endian affine coordinates of the public point
    fn coordinates(&self) -> (Vec<u8>, Vec<u8>) {
        with_curve_key!(&self.key, key => {
            let point =
                PublicKey::from_secret_scalar(key.as_nonzero_scalar()).to_encoded_point(false);
            (
                point.x().map(|x| x.to_vec()).unwrap_or_default(),
                point.y().map(|y| y.to_vec()).unwrap_or_default(),
            )
        })
    }

    /// SHA-256 digest, left-padded to the curve's field length.
    ///
    /// A 32-byte digest is shorter than the P-384 and P-521 fields; padding
    /// keeps its integer value while satisfying the prehash length checks.
    fn prehash(&self, message: &[u8]) -> Vec<u8> {
        let digest = Sha256::digest(message);
        let mut prehash = vec![0u8; self.curve.field_bytes().saturating_sub(digest.len())];
        prehash.extend_from_slice(&digest);
        prehash
    }
}

impl KeyAlgorithm for EcdsaKey {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Ecdsa
    }

    fn descriptor(&self) -> PublicKeyDescriptor {
        let (x, y) = self.coordinates();
        PublicKeyDescriptor::Ecdsa {
            curve: self.curve.label().to_string(),
            x: BigUint::from_bytes_be(&x).to_string(),
            y: BigUint::from_bytes_be(&y).to_string(),
        }
    }

    fn header_algorithm(&self) -> String {
        format!("{}{}", Algorithm::Ecdsa.code(), self.curve.bits())
    }

    fn sign(&self, message: &[u8], layout: SignatureLayout) -> Result<Vec<u8>> {
        let prehash = self.prehash(message);
        let width = self.curve.field_bytes();

        with_curve_key!(&self.key, key => {
            let signature: ecdsa::Signature<_> = key.sign_prehash_with_rng(&mut OsRng, &prehash)?;
            let (r, s) = signature.split_bytes();
            Ok(layout.concat(&r, &s, width))
        })
    }
}
