use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use tracing::{event, Level};

use crate::oidc::AccessTokenClaims;
use crate::provider::error::Error;

/// Turns a presented JWT access token back into its claims.
pub trait AccessTokenVerifier: Send + Sync {
    fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, Error>;
}

/// Public half of a key the provider has signed access tokens with.
#[derive(Clone)]
pub struct VerificationKey {
    pub id: Option<String>,
    pub algorithm: Algorithm,
    pub key: DecodingKey,
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerificationKey {{ id: {:?}, algorithm: {:?}, .. }}", self.id, self.algorithm)
    }
}

/// Checks signature, issuer and expiry of the provider's own JWT access
/// tokens. Keys are matched on `kid`; a token without one is tried against
/// every key of its algorithm.
#[derive(Debug, Clone)]
pub struct JwtAccessTokenVerifier {
    issuer: String,
    keys: Vec<VerificationKey>,
}

impl JwtAccessTokenVerifier {
    pub fn new(issuer: impl Into<String>, keys: Vec<VerificationKey>) -> Self {
        Self {
            issuer: issuer.into(),
            keys,
        }
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&self.issuer]);
        // The audience is the relying party, not the provider.
        validation.validate_aud = false;
        validation
    }
}

impl AccessTokenVerifier for JwtAccessTokenVerifier {
    fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, Error> {
        let header = jsonwebtoken::decode_header(token).map_err(|_| Error::MalformedRequest)?;

        let candidates = self.keys.iter().filter(|k| {
            k.algorithm == header.alg
                && match (&header.kid, &k.id) {
                    (Some(kid), Some(id)) => kid == id,
                    (Some(_), None) => false,
                    (None, _) => true,
                }
        });

        let mut last_error = Error::NotFound;
        for key in candidates {
            match jsonwebtoken::decode::<AccessTokenClaims>(token, &key.key, &self.validation(key.algorithm)) {
                Ok(data) => return Ok(data.claims),
                Err(e) => {
                    event!(Level::DEBUG, "Access token rejected: {}", e);
                    last_error = if matches!(e.kind(), ErrorKind::ExpiredSignature) {
                        Error::Expired
                    } else {
                        Error::Signing(e)
                    };
                }
            }
        }

        Err(last_error)
    }
}
