//! Signing keys, compact JWS production and the reversible encryption used
//! for opaque bearer tokens.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rand::RngCore;

use crate::provider::error::Error;

const NONCE_SIZE: usize = 12;

/// The provider's active signing key.
///
/// Values are snapshots: a store hands out clones, so rotating the key in
/// the store never changes a key a request already holds.
#[derive(Clone)]
pub struct SigningKey {
    pub id: Option<String>,
    pub algorithm: Algorithm,
    pub key: EncodingKey,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey {{ id: {:?}, algorithm: {:?}, .. }}", self.id, self.algorithm)
    }
}

impl SigningKey {
    pub fn new(id: Option<String>, algorithm: Algorithm, key: EncodingKey) -> Self {
        Self { id, algorithm, key }
    }

    pub fn signature_algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

pub struct Signer {
    header: Header,
    key: EncodingKey,
}

impl From<&SigningKey> for Signer {
    fn from(signing_key: &SigningKey) -> Self {
        let mut header = Header::new(signing_key.algorithm);
        header.kid = signing_key.id.clone();
        Self {
            header,
            key: signing_key.key.clone(),
        }
    }
}

/// Serializes `claims` and signs them into a compact JWS.
pub fn sign(claims: &impl serde::Serialize, signer: &Signer) -> Result<String, Error> {
    jsonwebtoken::encode(&signer.header, claims, &signer.key).map_err(Error::Signing)
}

/// Reversible encryption for opaque tokens.
pub trait Crypto: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, Error>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, Error>;
}

/// AES-256-GCM with a random nonce prepended to the ciphertext, encoded as
/// unpadded base64url so the result is safe in headers and form bodies.
#[derive(Clone)]
pub struct AesCrypto {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for AesCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AesCrypto {{ ... }}")
    }
}

impl AesCrypto {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
        }
    }

    pub fn from_base64(key: &str) -> Result<Self, Error> {
        let bytes = STANDARD.decode(key.trim()).map_err(|_| Error::Encryption)?;
        let key: [u8; 32] = bytes.try_into().map_err(|_| Error::Encryption)?;
        Ok(Self::new(key))
    }

    pub fn generate_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        key
    }
}

impl Crypto for AesCrypto {
    fn encrypt(&self, plaintext: &str) -> Result<String, Error> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| Error::Encryption)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, Error> {
        let sealed = URL_SAFE_NO_PAD.decode(ciphertext).map_err(|_| Error::Encryption)?;
        if sealed.len() < NONCE_SIZE {
            return Err(Error::Encryption);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::Encryption)?;
        String::from_utf8(plaintext).map_err(|_| Error::Encryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};

    #[test]
    fn encrypt_is_reversible_and_randomized() {
        let crypto = AesCrypto::new(AesCrypto::generate_key());
        let first = crypto.encrypt("token-id:alice").unwrap();
        let second = crypto.encrypt("token-id:alice").unwrap();

        assert_ne!(first, second);
        assert_eq!(crypto.decrypt(&first).unwrap(), "token-id:alice");
    }

    #[test]
    fn decrypt_rejects_foreign_ciphertext() {
        let crypto = AesCrypto::new(AesCrypto::generate_key());
        let other = AesCrypto::new(AesCrypto::generate_key());
        let sealed = other.encrypt("token-id:alice").unwrap();

        assert!(crypto.decrypt(&sealed).is_err());
        assert!(crypto.decrypt("not base64 !").is_err());
        assert!(crypto.decrypt("AAAA").is_err());
    }

    #[test]
    fn from_base64_requires_32_bytes() {
        assert!(AesCrypto::from_base64(&STANDARD.encode([7u8; 32])).is_ok());
        assert!(AesCrypto::from_base64(&STANDARD.encode([7u8; 16])).is_err());
    }

    #[test]
    fn sign_sets_key_id_and_algorithm() {
        let key = SigningKey::new(
            Some("k1".to_string()),
            Algorithm::HS256,
            EncodingKey::from_secret(b"secret"),
        );
        let signer = Signer::from(&key);
        let token = sign(&serde_json::json!({ "sub": "alice", "exp": 4102444800u64 }), &signer).unwrap();

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("k1"));
        assert_eq!(header.alg, Algorithm::HS256);

        let data = jsonwebtoken::decode::<serde_json::Value>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(data.claims["sub"], "alice");
    }
}
