use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::core::types::{AuthCode, AuthRequestId, RefreshTokenId, TokenId};

use super::hash::Salt;

pub trait FromRandom {
    fn from_random() -> Self;
}

impl FromRandom for AuthCode {
    fn from_random() -> Self {
        AuthCode(random_string(64))
    }
}

impl FromRandom for AuthRequestId {
    fn from_random() -> Self {
        AuthRequestId(random_string(32))
    }
}

impl FromRandom for TokenId {
    fn from_random() -> Self {
        TokenId(random_string(48))
    }
}

impl FromRandom for RefreshTokenId {
    fn from_random() -> Self {
        RefreshTokenId(random_string(96))
    }
}

impl FromRandom for Salt {
    fn from_random() -> Self {
        Salt(random_string(16))
    }
}

fn random_string(size: usize) -> String {
    use rand::Rng;

    let s: String = rand::thread_rng()
        .sample_iter(rand::distributions::Alphanumeric)
        .take(size)
        .map(char::from)
        .collect();
    URL_SAFE_NO_PAD.encode(s)
}
