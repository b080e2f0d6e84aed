#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to parse request")]
    MalformedRequest,
    #[error("invalid basic auth header")]
    InvalidBasicAuth,
    #[error("invalid authorization")]
    InvalidAuthorization,
    #[error("invalid client credentials")]
    Unauthorized,
    #[error("invalid client assertion: {0}")]
    InvalidAssertion(String),
    #[error("invalid grant")]
    InvalidGrant,
    #[error("invalid scope")]
    InvalidScope,
    #[error("client is not allowed to use this grant type")]
    UnauthorizedClient,
    #[error("not found")]
    NotFound,
    #[error("token expired")]
    Expired,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),
    #[error("encryption failed")]
    Encryption,
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
