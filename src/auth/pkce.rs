use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub enum Transformation {
    #[serde(rename = "plain")]
    #[default]
    Plain,
    S256
}

#[derive(Debug, Clone)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct Challenge {
    #[serde(rename = "code_challenge")]
    pub code: String,
    #[serde(rename = "code_challenge_method")]
    #[serde(default)]
    pub method: Transformation
}

#[derive(Debug)]
#[derive(serde::Deserialize)]
pub struct Verifier {
    #[serde(rename = "code_verifier")]
    pub value: String
}

/// Checks a presented verifier against the challenge stored with the
/// pending authorization (RFC 7636).
pub fn verify(challenge: &Challenge, verifier: Option<&Verifier>) -> bool {
    let verifier = match verifier {
        Some(v) => v,
        None => return false,
    };
    match challenge.method {
        Transformation::Plain => challenge.code == verifier.value,
        Transformation::S256 => {
            let digest = Sha256::digest(verifier.value.as_bytes());
            URL_SAFE_NO_PAD.encode(digest) == challenge.code
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s256_matches_rfc_example() {
        // RFC 7636, appendix B.
        let challenge = Challenge {
            code: "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_string(),
            method: Transformation::S256,
        };
        let verifier = Verifier {
            value: "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string(),
        };
        assert!(verify(&challenge, Some(&verifier)));
        assert!(!verify(&challenge, None));
    }

    #[test]
    fn plain_compares_verbatim() {
        let challenge = Challenge {
            code: "abc".to_string(),
            method: Transformation::Plain,
        };
        assert!(verify(&challenge, Some(&Verifier { value: "abc".to_string() })));
        assert!(!verify(&challenge, Some(&Verifier { value: "abd".to_string() })));
    }
}
