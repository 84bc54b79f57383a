//! Deterministic cryptographic fixtures.
//!
//! The same seed always yields the same Ed25519 keypair, so signed tokens
//! and published JWKs are reproducible across runs.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};

/// Ed25519 keypair that signs test tokens under a fixed `kid`.
pub struct TestKeypair {
    pub kid: String,
    pub public_key_bytes: Vec<u8>,
    private_key_pkcs8: Vec<u8>,
}

impl TestKeypair {
    pub fn new(seed: u8, kid: &str) -> Self {
        let mut seed_bytes = [0u8; 32];
        seed_bytes[0] = seed;
        for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
            *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .expect("Failed to create test keypair");

        Self {
            kid: kid.to_string(),
            public_key_bytes: key_pair.public_key().as_ref().to_vec(),
            private_key_pkcs8: build_pkcs8_from_seed(&seed_bytes),
        }
    }

    /// Sign `claims` with EdDSA, `kid` set to this key's id.
    pub fn sign(&self, claims: &serde_json::Value) -> String {
        self.sign_with_kid(claims, &self.kid)
    }

    /// Sign `claims` but advertise `kid` in the header.
    pub fn sign_with_kid(&self, claims: &serde_json::Value, kid: &str) -> String {
        let encoding_key = EncodingKey::from_ed_der(&self.private_key_pkcs8);
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = Some(kid.to_string());

        encode(&header, claims, &encoding_key).expect("Failed to sign token")
    }

    /// Public half of the key as a JWK.
    pub fn jwk_json(&self) -> serde_json::Value {
        serde_json::json!({
            "kty": "OKP",
            "kid": self.kid,
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(&self.public_key_bytes),
            "alg": "EdDSA",
            "use": "sig"
        })
    }
}

/// JWKS document publishing `keys`.
pub fn jwks_json(keys: &[&TestKeypair]) -> serde_json::Value {
    serde_json::json!({
        "keys": keys.iter().map(|k| k.jwk_json()).collect::<Vec<_>>()
    })
}

/// PKCS#8 v1 document (RFC 5208) wrapping an Ed25519 seed.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = Vec::with_capacity(48);

    // SEQUENCE, 46 bytes
    pkcs8.extend_from_slice(&[0x30, 0x2e]);
    // version INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);
    // AlgorithmIdentifier SEQUENCE { OID 1.3.101.112 }
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);
    // privateKey OCTET STRING { OCTET STRING seed }
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);

    pkcs8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_is_deterministic() {
        let a = TestKeypair::new(1, "k1");
        let b = TestKeypair::new(1, "k1");
        let c = TestKeypair::new(2, "k2");

        assert_eq!(a.public_key_bytes, b.public_key_bytes);
        assert_ne!(a.public_key_bytes, c.public_key_bytes);
        assert_eq!(a.public_key_bytes.len(), 32);
    }

    #[test]
    fn test_jwks_lists_every_key() {
        let a = TestKeypair::new(1, "k1");
        let b = TestKeypair::new(2, "k2");

        let jwks = jwks_json(&[&a, &b]);
        assert_eq!(jwks["keys"].as_array().unwrap().len(), 2);
        assert_eq!(jwks["keys"][1]["kid"], "k2");
    }
}
