use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;

use crate::core::types::{AuthCode, ClientSecret, HashedAuthCode, HashedClientSecret};
use crate::provider::error::Error;

use super::random::FromRandom;

#[derive(Debug)]
pub struct Salt(pub String);

pub struct HashingService {
    secret_key: String,
}

impl std::fmt::Debug for HashingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HashingService {{ ... }}")
    }
}

pub trait HashTo: AsRef<str> {
    type HashedType;
}

impl HashTo for ClientSecret {
    type HashedType = HashedClientSecret;
}

impl HashTo for AuthCode {
    type HashedType = HashedAuthCode;
}

impl HashingService {
    pub fn with_secret_key(secret_key: String) -> Self {
        Self { secret_key }
    }

    fn get_config(&self) -> argon2::Config<'_> {
        argon2::Config {
            secret: self.secret_key.as_bytes(),
            ..argon2::Config::default()
        }
    }

    pub fn hash<T, H>(&self, to_hash: &T) -> Result<H, Error>
    where
        T: HashTo<HashedType = H>,
        H: From<String>,
    {
        let s = to_hash.as_ref();
        let salt = Salt::from_random();
        let hash = argon2::hash_encoded(s.as_bytes(), salt.0.as_bytes(), &self.get_config())
            .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(hash.into())
    }

    pub fn verify<T, H>(&self, secret: &T, hashed: &H) -> Result<bool, Error>
    where
        T: HashTo<HashedType = H>,
        H: AsRef<str>,
    {
        argon2::verify_encoded_ext(
            hashed.as_ref(),
            secret.as_ref().as_bytes(),
            self.secret_key.as_bytes(),
            &[],
        )
        .map_err(|e| Error::Storage(e.to_string()))
    }

    /// Deterministic digest for values that are looked up by their hash.
    pub fn hash_without_salt<T, H>(&self, to_hash: &T) -> H
    where
        T: HashTo<HashedType = H>,
        H: From<String>,
    {
        use sha2::Digest;

        let digest = sha2::Sha512::digest(to_hash.as_ref().as_bytes());
        URL_SAFE.encode(digest).into()
    }
}
