use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::Algorithm;
use sha2::{Digest, Sha256, Sha384, Sha512};

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Nonce(pub String);

/// Computes an `at_hash` / `c_hash` value: the left half of the digest
/// matching the signing algorithm, base64url encoded without padding.
pub fn claim_hash(value: &str, algorithm: Algorithm) -> String {
    use Algorithm::*;

    let digest = match algorithm {
        HS256 | RS256 | ES256 | PS256 => Sha256::digest(value.as_bytes()).to_vec(),
        HS384 | RS384 | ES384 | PS384 => Sha384::digest(value.as_bytes()).to_vec(),
        HS512 | RS512 | PS512 | EdDSA => Sha512::digest(value.as_bytes()).to_vec(),
    };
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}
