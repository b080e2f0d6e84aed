use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::core::models::Client;
use crate::core::types::{AuthCode, AuthRequestId, ClientId, ClientSecret, Scope, TokenId};
use crate::crypto::SigningKey;
use crate::oidc::UserInfo;
use crate::provider::error::Error;

pub mod access_token;
pub mod authorization;
pub mod error;
pub mod introspection;
pub mod pkce;

pub use access_token::*;
pub use authorization::*;
use introspection::IntrospectionResponse;

#[derive(Debug)]
#[derive(serde::Deserialize)]
pub struct ClientCredentials {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
}

/// Public key a client signs its JWT-profile assertions with.
#[derive(Clone)]
pub struct ClientKey {
    pub algorithm: Algorithm,
    pub key: DecodingKey,
}

impl std::fmt::Debug for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClientKey {{ algorithm: {:?}, .. }}", self.algorithm)
    }
}

/// Persistence the provider core orchestrates. Implementations must be safe
/// for concurrent use and must report every failure.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    async fn get_client_by_client_id(&self, client_id: &ClientId) -> Result<Arc<dyn Client>, Error>;

    async fn authorize_client_id_secret(
        &self,
        client_id: &ClientId,
        secret: &ClientSecret,
    ) -> Result<(), Error>;

    /// Public key for a JWT-profile assertion issued by `client_id`.
    async fn get_key_by_id_and_client_id(
        &self,
        key_id: Option<&str>,
        client_id: &ClientId,
    ) -> Result<ClientKey, Error>;

    async fn auth_request_by_code(
        &self,
        client_id: &ClientId,
        code: &AuthCode,
    ) -> Result<AuthRequest, Error>;

    async fn token_request_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshTokenRequest, Error>;

    async fn delete_auth_request(&self, id: &AuthRequestId) -> Result<(), Error>;

    async fn create_access_token(
        &self,
        request: &TokenRequest,
    ) -> Result<(TokenId, OffsetDateTime), Error>;

    /// Mints an access token id and a refresh token in one step. When
    /// `current_refresh_token` is given it is consumed.
    async fn create_access_and_refresh_tokens(
        &self,
        request: &TokenRequest,
        current_refresh_token: Option<&str>,
    ) -> Result<(TokenId, String, OffsetDateTime), Error>;

    async fn signing_key(&self) -> Result<SigningKey, Error>;

    async fn get_private_claims_from_scopes(
        &self,
        subject: &str,
        client_id: &ClientId,
        scope: &Scope,
    ) -> Result<Map<String, Value>, Error>;

    async fn set_userinfo_from_scopes(
        &self,
        userinfo: &mut UserInfo,
        subject: &str,
        client_id: &ClientId,
        scope: &Scope,
    ) -> Result<(), Error>;

    async fn set_introspection_from_token(
        &self,
        response: &mut IntrospectionResponse,
        token_id: &TokenId,
        subject: &str,
        client_id: &ClientId,
    ) -> Result<(), Error>;
}
