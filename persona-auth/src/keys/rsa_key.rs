use super::{Algorithm, KeyAlgorithm, PublicKeyDescriptor, SignatureLayout};
use crate::error::{PersonaError, Result};
use crate::MIN_KEY_SIZE_RSA;
use rsa::pkcs1v15;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey};
use sha2::Sha256;
use rand::rngs::OsRng;
use signature::{RandomizedSigner, SignatureEncoding};

/// RSA key signing with PKCS#1 v1.5 over SHA-256
pub struct RsaKey {
    signer: pkcs1v15::SigningKey<Sha256>,
    n: BigUint,
    e: BigUint,
}

impl RsaKey {
    /// Validate the modulus size and prepare the key for signing
    pub fn new(mut key: RsaPrivateKey) -> Result<Self> {
        let bits = key.n().bits();
        if bits < MIN_KEY_SIZE_RSA {
            return Err(PersonaError::KeyTooWeak {
                bits,
                minimum: MIN_KEY_SIZE_RSA,
            });
        }

        key.precompute()
            .map_err(|e| PersonaError::KeyFormat(format!("invalid RSA key: {e}")))?;

        let n = key.n().clone();
        let e = key.e().clone();

        Ok(Self {
            signer: pkcs1v15::SigningKey::<Sha256>::new(key),
            n,
            e,
        })
    }

    /// Modulus size, in bits
    pub fn bits(&self) -> usize {
        self.n.bits()
    }
}

impl KeyAlgorithm for RsaKey {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Rsa
    }

    fn descriptor(&self) -> PublicKeyDescriptor {
        PublicKeyDescriptor::Rsa {
            n: self.n.to_string(),
            e: self.e.to_string(),
        }
    }

    fn header_algorithm(&self) -> String {
        format!("{}{}", Algorithm::Rsa.code(), self.bits() / 8)
    }

    // PKCS#1 v1.5 is deterministic, so the layout has nothing to choose.
    // The RNG only blinds the private-key operation.
    fn sign(&self, message: &[u8], _layout: SignatureLayout) -> Result<Vec<u8>> {
        let signature = self.signer.try_sign_with_rng(&mut OsRng, message)?;
        Ok(signature.to_vec())
    }
}
