use super::{Algorithm, KeyAlgorithm, PublicKeyDescriptor, SignatureLayout};
use crate::error::{PersonaError, Result};
use crate::MIN_KEY_SIZE_DSA;
use dsa::BigUint;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use signature::RandomizedDigestSigner;

/// DSA key signing SHA-256 digests
pub struct DsaKey {
    key: dsa::SigningKey,
}

impl DsaKey {
    /// Validate the size of the public modulus `p`
    pub fn new(key: dsa::SigningKey) -> Result<Self> {
        let bits = key.verifying_key().components().p().bits();
        if bits < MIN_KEY_SIZE_DSA {
            return Err(PersonaError::KeyTooWeak {
                bits,
                minimum: MIN_KEY_SIZE_DSA,
            });
        }

        Ok(Self { key })
    }

    /// Size of the subgroup order `q`, in bits
    pub fn order_bits(&self) -> usize {
        self.key.verifying_key().components().q().bits()
    }
}

fn to_hex(value: &BigUint) -> String {
    format!("{:0>2}", value.to_str_radix(16))
}

impl KeyAlgorithm for DsaKey {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Dsa
    }

    fn descriptor(&self) -> PublicKeyDescriptor {
        let verifying_key = self.key.verifying_key();
        let components = verifying_key.components();

        PublicKeyDescriptor::Dsa {
            g: to_hex(components.g()),
            p: to_hex(components.p()),
            q: to_hex(components.q()),
            y: to_hex(verifying_key.y()),
        }
    }

    fn header_algorithm(&self) -> String {
        format!("{}{}", Algorithm::Dsa.code(), self.order_bits() / 8)
    }

    fn sign(&self, message: &[u8], layout: SignatureLayout) -> Result<Vec<u8>> {
        let signature: dsa::Signature = self
            .key
            .try_sign_digest_with_rng(&mut OsRng, Sha256::new_with_prefix(message))?;

        let width = self.order_bits().div_ceil(8);
        Ok(layout.concat(
            &signature.r().to_bytes_be(),
            &signature.s().to_bytes_be(),
            width,
        ))
    }
}
