use crate::core::types::{ClientId, Scope, TokenId};

use super::TokenType;

#[derive(Debug, PartialEq, Eq)]
#[derive(serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTypeHint {
    AccessToken,
    RefreshToken,
    /// Hints the server does not know are ignored.
    #[serde(other)]
    Unknown,
}

/// Form body of an introspection call, including the optional RFC 7523
/// client assertion.
#[derive(Debug)]
#[derive(serde::Deserialize)]
pub struct IntrospectionRequest {
    /// Missing tokens resolve to an inactive response.
    #[serde(default)]
    pub token: String,
    pub token_type_hint: Option<TokenTypeHint>,
    #[serde(default)]
    pub client_assertion: Option<String>,
    #[serde(default)]
    pub client_assertion_type: Option<String>,
}

/// RFC 7662 introspection response. Every field but `active` stays unset
/// unless the token was found active for the authenticated caller.
#[derive(Debug, Default, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aud: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<TokenId>,
}

impl IntrospectionResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}
