//! End-to-end tests for the identity provider
//!
//! These tests verify that a configured provider can:
//! - Publish its support document
//! - Record and check sessions across email case
//! - Issue certificates a relying party can verify against the published key

mod common;

use common::{fixture, published_config, setup_test_logging};
use persona_auth::{
    CertificateRequest, CheckSessionRequest, DecodedCertificate, IdentityProvider, IdpConfig,
    PersonaError, PublicKeyDescriptor, SessionStore, SupportDocument, CERTIFICATE_MAX_DURATION,
    SESSION_MAX_DURATION,
};
use sha2::{Digest, Sha256};
use signature::{DigestVerifier, Verifier};
use std::collections::BTreeMap;
use std::io::Write;

async fn provider(
    key_type: &str,
    key: &str,
    layout: &str,
    dir: &std::path::Path,
) -> IdentityProvider {
    setup_test_logging();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile_in(dir)
        .unwrap();
    file.write_all(published_config(key_type, key, dir, layout).as_bytes())
        .unwrap();

    let config = IdpConfig::load(file.path()).unwrap();
    IdentityProvider::from_config(config).await.unwrap()
}

fn certificate_request(duration: i64) -> CertificateRequest {
    CertificateRequest {
        email: "User@Example.com".to_string(),
        public_key: BTreeMap::from([
            ("algorithm".to_string(), "EC".to_string()),
            ("crv".to_string(), "P-256".to_string()),
        ]),
        duration,
    }
}

fn published_key(provider: &IdentityProvider) -> PublicKeyDescriptor {
    let document: SupportDocument = serde_json::from_slice(provider.support_document()).unwrap();
    match document {
        SupportDocument::Published { public_key, .. } => public_key,
        other => panic!("expected published document, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rsa_provider_full_flow() {
    let dir = tempfile::tempdir().unwrap();
    let provider = provider("RSA", "rsa2048.pem", "minimal", dir.path()).await;

    assert_eq!(provider.config().issuer, "example.org");
    assert!(provider.keys().is_set());
    assert!(!provider.support_document_value().is_delegated());
    assert_eq!(
        provider.support_document_value().to_json().unwrap(),
        provider.support_document()
    );

    // Sessions are keyed case-insensitively and clamped
    let check = CheckSessionRequest {
        email: "user@example.com".to_string(),
    };
    assert!(!provider.check_session(&check).await.unwrap());

    provider
        .create_session("User@Example.com", 100_000)
        .await
        .unwrap();
    assert!(provider.check_session(&check).await.unwrap());

    let session = provider
        .sessions()
        .session("USER@EXAMPLE.COM")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.duration, SESSION_MAX_DURATION);

    // The certificate verifies against the published key
    let token = provider
        .generate_certificate(&certificate_request(3600))
        .unwrap();
    let decoded = DecodedCertificate::decode(&token).unwrap();
    assert_eq!(decoded.header.alg, "RS256");
    assert_eq!(decoded.claims.iss, "example.org");
    assert_eq!(decoded.claims.principal.email, "User@Example.com");
    assert_eq!(
        decoded.claims.validity_millis(),
        CERTIFICATE_MAX_DURATION * 1000
    );

    let PublicKeyDescriptor::Rsa { n, e } = published_key(&provider) else {
        panic!("expected an RSA key");
    };
    let public_key = rsa::RsaPublicKey::new(
        rsa::BigUint::parse_bytes(n.as_bytes(), 10).unwrap(),
        rsa::BigUint::parse_bytes(e.as_bytes(), 10).unwrap(),
    )
    .unwrap();
    let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public_key);
    let signature = rsa::pkcs1v15::Signature::try_from(decoded.signature.as_slice()).unwrap();
    verifying_key
        .verify(decoded.signing_input.as_bytes(), &signature)
        .unwrap();

    provider.close().await.unwrap();
    assert!(matches!(
        provider.check_session(&check).await,
        Err(PersonaError::StoreNotOpen)
    ));
}

#[tokio::test]
async fn test_ecdsa_provider_certificate_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let provider = provider("ECDSA", "ec_p256.pem", "fixed-width", dir.path()).await;

    let PublicKeyDescriptor::Ecdsa { curve, x, y } = published_key(&provider) else {
        panic!("expected an ECDSA key");
    };
    assert_eq!(curve, "P-256");

    let coordinate = |decimal: &str| {
        let bytes = rsa::BigUint::parse_bytes(decimal.as_bytes(), 10)
            .unwrap()
            .to_bytes_be();
        let mut padded = vec![0u8; 32 - bytes.len()];
        padded.extend_from_slice(&bytes);
        padded
    };
    let (x, y) = (coordinate(&x), coordinate(&y));
    let point = p256::EncodedPoint::from_affine_coordinates(
        p256::FieldBytes::from_slice(&x),
        p256::FieldBytes::from_slice(&y),
        false,
    );
    let verifying_key = p256::ecdsa::VerifyingKey::from_encoded_point(&point).unwrap();

    let first = provider.generate_certificate(&certificate_request(60)).unwrap();
    let second = provider.generate_certificate(&certificate_request(60)).unwrap();

    for token in [&first, &second] {
        let decoded = DecodedCertificate::decode(token).unwrap();
        assert_eq!(decoded.header.alg, "EC256");
        assert_eq!(decoded.signature.len(), 64);

        let signature = p256::ecdsa::Signature::from_slice(&decoded.signature).unwrap();
        verifying_key
            .verify(decoded.signing_input.as_bytes(), &signature)
            .unwrap();
    }

    // Randomized signing
    let first = DecodedCertificate::decode(&first).unwrap();
    let second = DecodedCertificate::decode(&second).unwrap();
    assert_ne!(first.signature, second.signature);
}

#[tokio::test]
async fn test_dsa_provider_certificate_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let provider = provider("dsa", "dsa2048.pem", "fixed-width", dir.path()).await;

    let PublicKeyDescriptor::Dsa { g, p, q, y } = published_key(&provider) else {
        panic!("expected a DSA key");
    };
    let hex = |value: &str| dsa::BigUint::parse_bytes(value.as_bytes(), 16).unwrap();
    let components = dsa::Components::from_components(hex(&p), hex(&q), hex(&g)).unwrap();
    let verifying_key = dsa::VerifyingKey::from_components(components, hex(&y)).unwrap();

    let token = provider.generate_certificate(&certificate_request(60)).unwrap();
    let decoded = DecodedCertificate::decode(&token).unwrap();
    assert_eq!(decoded.header.alg, "DS32");
    assert_eq!(decoded.signature.len(), 64);

    let signature = dsa::Signature::from_components(
        dsa::BigUint::from_bytes_be(&decoded.signature[..32]),
        dsa::BigUint::from_bytes_be(&decoded.signature[32..]),
    )
    .unwrap();
    verifying_key
        .verify_digest(
            Sha256::new_with_prefix(decoded.signing_input.as_bytes()),
            &signature,
        )
        .unwrap();
}

#[tokio::test]
async fn test_weak_key_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = IdpConfig::from_toml_str(&published_config(
        "RSA",
        "rsa1024.pem",
        dir.path(),
        "minimal",
    ))
    .unwrap();

    let err = IdentityProvider::from_config(config).await.err().unwrap();
    assert!(matches!(
        err,
        PersonaError::KeyTooWeak {
            bits: 1024,
            minimum: 2048
        }
    ));
}

#[tokio::test]
async fn test_key_type_must_match_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = IdpConfig::from_toml_str(&published_config(
        "RSA",
        "ec_p256.pem",
        dir.path(),
        "minimal",
    ))
    .unwrap();

    let err = IdentityProvider::from_config(config).await.err().unwrap();
    assert!(matches!(err, PersonaError::UnsupportedKeyType(_)));
    assert!(fixture("ec_p256.pem").exists());
}

#[tokio::test]
async fn test_sessions_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    let first = provider("RSA", "rsa2048_pkcs1.pem", "minimal", dir.path()).await;
    first.create_session("carol@example.com", 600).await.unwrap();
    first.close().await.unwrap();

    let second = provider("RSA", "rsa2048_pkcs1.pem", "minimal", dir.path()).await;
    let check = CheckSessionRequest {
        email: "Carol@Example.com".to_string(),
    };
    assert!(second.check_session(&check).await.unwrap());
}
