use crate::auth::pkce;
use crate::core::types::{AuthCode, RedirectUri, Scope};

use super::error::ErrorResponse;

pub type AccessTokenError = ErrorResponse<AccessTokenErrorKind>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum TokenType {
    #[default]
    Bearer,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "grant_type")]
pub enum AccessTokenRequest {
    #[serde(rename = "authorization_code")]
    AuthenticationCode(AuthenticationCodeTokenRequest),
    #[serde(rename = "refresh_token")]
    RefreshToken(RefreshTokenGrantRequest),
}

#[derive(Debug, serde::Deserialize)]
pub struct AuthenticationCodeTokenRequest {
    pub redirect_uri: RedirectUri,
    pub code: AuthCode,
    #[serde(flatten)]
    pub pkce_verifier: Option<pkce::Verifier>,
}

#[derive(Debug, serde::Deserialize)]
pub struct RefreshTokenGrantRequest {
    pub refresh_token: String,
    pub scope: Option<Scope>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AccessTokenResponse {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_token: String,
    pub token_type: TokenType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessTokenErrorKind {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    InvalidScope,
    ServerError,
}

impl From<AccessTokenErrorKind> for AccessTokenError {
    fn from(kind: AccessTokenErrorKind) -> Self {
        Self {
            kind,
            description: None,
            uri: None,
        }
    }
}
