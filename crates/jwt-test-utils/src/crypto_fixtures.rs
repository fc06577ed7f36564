//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible Ed25519 keypairs and ready-made manager
//! configurations. All fixtures are deterministic based on seed values.

use crate::test_ids::{TEST_AUDIENCE, TEST_EXPIRY_SECS, TEST_HMAC_SECRET, TEST_ISSUER};
use base64::engine::general_purpose;
use base64::Engine;
use jsonwebtoken::Algorithm;
use jwt_manager::config::{KeyMaterial, ManagerConfig};
use ring::signature::{Ed25519KeyPair, KeyPair};
use std::time::Duration;
use thiserror::Error;

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    /// `ring` refused to derive or encode a key.
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

/// DER prefix of an Ed25519 `SubjectPublicKeyInfo` (RFC 8410).
const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Deterministic Ed25519 keypair in every encoding the manager accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestKeyPair {
    /// SPKI public key, PEM encoded.
    pub public_key_pem: String,
    /// PKCS#8 private key, PEM encoded.
    pub private_key_pem: String,
    /// Raw 32-byte public key.
    pub public_key_raw: Vec<u8>,
    /// PKCS#8 v1 private key, DER encoded.
    pub private_key_pkcs8: Vec<u8>,
}

impl TestKeyPair {
    /// PEM key material able to sign and verify.
    pub fn pem_material(&self) -> KeyMaterial {
        KeyMaterial::pem(self.private_key_pem.clone(), self.public_key_pem.clone())
    }

    /// DER key material able to sign and verify.
    pub fn der_material(&self) -> KeyMaterial {
        KeyMaterial::der(self.private_key_pkcs8.clone(), self.public_key_raw.clone())
    }

    /// PEM key material holding only the public key.
    pub fn verify_only_material(&self) -> KeyMaterial {
        KeyMaterial::public_pem(self.public_key_pem.clone())
    }
}

/// Generate a deterministic Ed25519 signing key for testing.
///
/// The same seed always produces the same keypair, ensuring test reproducibility.
///
/// # Example
/// ```rust,ignore
/// let keys = test_signing_key(1)?;
/// // Same seed always produces same key
/// assert_eq!(keys, test_signing_key(1)?);
/// ```
pub fn test_signing_key(seed: u8) -> Result<TestKeyPair, FixtureError> {
    // Create deterministic 32-byte seed from input
    let mut seed_bytes = [0u8; 32];
    seed_bytes[0] = seed;
    // Fill rest with deterministic pattern
    for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
        *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
    }

    // Deterministic, suitable for testing only
    let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
        .map_err(|e| FixtureError::Crypto(format!("Failed to generate test keypair: {:?}", e)))?;

    let public_key_raw = key_pair.public_key().as_ref().to_vec();

    let mut spki = ED25519_SPKI_PREFIX.to_vec();
    spki.extend_from_slice(&public_key_raw);

    let private_key_pkcs8 = build_pkcs8_from_seed(&seed_bytes);

    Ok(TestKeyPair {
        public_key_pem: to_pem("PUBLIC KEY", &spki),
        private_key_pem: to_pem("PRIVATE KEY", &private_key_pkcs8),
        public_key_raw,
        private_key_pkcs8,
    })
}

fn to_pem(label: &str, der: &[u8]) -> String {
    format!(
        "-----BEGIN {label}-----\n{}\n-----END {label}-----\n",
        general_purpose::STANDARD.encode(der)
    )
}

/// Build PKCS#8 v1 document from Ed25519 seed
///
/// This is a test-only utility. Production code must use ring::rand::SystemRandom.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    // PKCS#8 v1 format for Ed25519 (RFC 5208):
    // SEQUENCE {
    //   version         INTEGER (0),
    //   algorithm       AlgorithmIdentifier,
    //   privateKey      OCTET STRING
    // }
    // Where privateKey for Ed25519 is:
    // OCTET STRING containing OCTET STRING with 32-byte seed

    let mut pkcs8 = Vec::new();

    // Outer SEQUENCE tag
    pkcs8.push(0x30);
    pkcs8.push(0x2e); // Length: 46 bytes

    // Version: INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);

    // Algorithm Identifier: SEQUENCE
    pkcs8.push(0x30);
    pkcs8.push(0x05); // Length: 5 bytes
                      // OID for Ed25519: 1.3.101.112
    pkcs8.extend_from_slice(&[0x06, 0x03, 0x2b, 0x65, 0x70]);

    // Private Key: OCTET STRING
    pkcs8.push(0x04);
    pkcs8.push(0x22); // Length: 34 bytes
                      // Inner OCTET STRING with seed
    pkcs8.push(0x04);
    pkcs8.push(0x20); // Length: 32 bytes
    pkcs8.extend_from_slice(seed);

    pkcs8
}

/// HS256 configuration with the test issuer, audience and expiry.
pub fn test_hmac_config() -> ManagerConfig {
    ManagerConfig::hmac(TEST_HMAC_SECRET)
        .with_issuer(TEST_ISSUER)
        .with_audience([TEST_AUDIENCE])
        .with_expiry(Duration::from_secs(TEST_EXPIRY_SECS))
}

/// EdDSA configuration built from [`test_signing_key`].
pub fn test_eddsa_config(seed: u8) -> ManagerConfig {
    let keys = test_signing_key(seed).expect("deterministic test key");
    ManagerConfig::new(Algorithm::EdDSA, keys.pem_material())
        .with_issuer(TEST_ISSUER)
        .with_audience([TEST_AUDIENCE])
        .with_expiry(Duration::from_secs(TEST_EXPIRY_SECS))
}
