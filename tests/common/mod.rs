#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Validation};
use serde_json::{json, Map, Value};
use time::OffsetDateTime;

use kagami::auth::introspection::IntrospectionResponse;
use kagami::auth::{AuthRequest, ClientKey, RefreshTokenRequest, Storage, TokenRequest};
use kagami::core::models::{Client, ClientConfig};
use kagami::core::types::*;
use kagami::crypto::{AesCrypto, SigningKey};
use kagami::db::{MemoryStore, UserProfile};
use kagami::oidc::{Nonce, UserInfo};
use kagami::provider::verifier::{JwtAccessTokenVerifier, VerificationKey};
use kagami::provider::{Error, OpenIdProvider};

pub const ISSUER: &str = "https://op.example";
pub const SIGNING_SECRET: &[u8] = b"provider-signing-secret";
pub const CLIENT_ID: &str = "web";
pub const CLIENT_SECRET: &str = "s3cret";
pub const REDIRECT_URI: &str = "https://rp.example/cb";

pub fn signing_key() -> SigningKey {
    SigningKey::new(
        Some("k1".to_string()),
        Algorithm::HS256,
        EncodingKey::from_secret(SIGNING_SECRET),
    )
}

pub fn web_client() -> ClientConfig {
    let mut client = ClientConfig::new(CLIENT_ID);
    client.redirect_uris = vec![RedirectUri(REDIRECT_URI.to_string())];
    client.grant_types = vec![GrantType::AuthorizationCode, GrantType::RefreshToken];
    client
}

pub fn alice() -> UserProfile {
    let mut userinfo = UserInfo::new();
    userinfo.name = Some("Alice Liddell".to_string());
    userinfo.preferred_username = Some("alice".to_string());
    userinfo.email = Some("alice@example.com".to_string());
    userinfo.email_verified = Some(true);

    let mut scope_claims = HashMap::new();
    let mut custom = Map::new();
    custom.insert("department".to_string(), json!("wonderland"));
    scope_claims.insert("custom".to_string(), custom);

    UserProfile {
        userinfo,
        scope_claims,
    }
}

pub fn auth_request(scope: &str) -> AuthRequest {
    AuthRequest {
        id: AuthRequestId("req-1".to_string()),
        client_id: ClientId(CLIENT_ID.to_string()),
        subject: "alice".to_string(),
        audience: vec![CLIENT_ID.to_string()],
        scope: Scope::from_delimited_parts(scope),
        redirect_uri: RedirectUri(REDIRECT_URI.to_string()),
        response_type: ResponseType::Code,
        state: Some("xyz".to_string()),
        nonce: Some(Nonce("n-0S6_WzA2Mj".to_string())),
        acr: Some("urn:mace:incommon:iap:silver".to_string()),
        amr: vec!["pwd".to_string()],
        auth_time: OffsetDateTime::now_utc(),
        pkce_challenge: None,
    }
}

pub fn refresh_request(scope: &str) -> RefreshTokenRequest {
    RefreshTokenRequest {
        client_id: ClientId(CLIENT_ID.to_string()),
        subject: "alice".to_string(),
        audience: vec![CLIENT_ID.to_string()],
        scope: Scope::from_delimited_parts(scope),
        amr: vec!["pwd".to_string()],
        auth_time: OffsetDateTime::now_utc(),
    }
}

pub fn access_token_verifier() -> JwtAccessTokenVerifier {
    JwtAccessTokenVerifier::new(
        ISSUER,
        vec![VerificationKey {
            id: Some("k1".to_string()),
            algorithm: Algorithm::HS256,
            key: DecodingKey::from_secret(SIGNING_SECRET),
        }],
    )
}

pub async fn memory_store(client: ClientConfig) -> MemoryStore {
    let store = MemoryStore::new("pepper".to_string(), signing_key());
    store
        .add_client(client, Some(&ClientSecret(CLIENT_SECRET.to_string())))
        .await
        .unwrap();
    store.add_user("alice", alice()).await;
    store
}

pub fn provider<S: Storage>(store: S) -> OpenIdProvider<S> {
    OpenIdProvider::new(
        ISSUER,
        Arc::new(store),
        AesCrypto::new(AesCrypto::generate_key()),
        access_token_verifier(),
    )
}

/// Payload of a token signed with the provider key.
pub fn decode_claims(token: &str) -> Value {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;
    validation.set_issuer(&[ISSUER]);
    jsonwebtoken::decode::<Value>(token, &DecodingKey::from_secret(SIGNING_SECRET), &validation)
        .unwrap()
        .claims
}

/// Delegates to a [`MemoryStore`] while counting the calls the token
/// response assembly is expected to make.
pub struct CountingStore {
    pub inner: MemoryStore,
    pub deletions: AtomicUsize,
    pub signing_key_fetches: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            deletions: AtomicUsize::new(0),
            signing_key_fetches: AtomicUsize::new(0),
        }
    }

    pub fn deletions(&self) -> usize {
        self.deletions.load(Ordering::SeqCst)
    }

    pub fn signing_key_fetches(&self) -> usize {
        self.signing_key_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Storage for CountingStore {
    async fn get_client_by_client_id(&self, client_id: &ClientId) -> Result<Arc<dyn Client>, Error> {
        self.inner.get_client_by_client_id(client_id).await
    }

    async fn authorize_client_id_secret(
        &self,
        client_id: &ClientId,
        secret: &ClientSecret,
    ) -> Result<(), Error> {
        self.inner.authorize_client_id_secret(client_id, secret).await
    }

    async fn get_key_by_id_and_client_id(
        &self,
        key_id: Option<&str>,
        client_id: &ClientId,
    ) -> Result<ClientKey, Error> {
        self.inner.get_key_by_id_and_client_id(key_id, client_id).await
    }

    async fn auth_request_by_code(
        &self,
        client_id: &ClientId,
        code: &AuthCode,
    ) -> Result<AuthRequest, Error> {
        self.inner.auth_request_by_code(client_id, code).await
    }

    async fn token_request_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshTokenRequest, Error> {
        self.inner.token_request_by_refresh_token(refresh_token).await
    }

    async fn delete_auth_request(&self, id: &AuthRequestId) -> Result<(), Error> {
        self.deletions.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_auth_request(id).await
    }

    async fn create_access_token(
        &self,
        request: &TokenRequest,
    ) -> Result<(TokenId, OffsetDateTime), Error> {
        self.inner.create_access_token(request).await
    }

    async fn create_access_and_refresh_tokens(
        &self,
        request: &TokenRequest,
        current_refresh_token: Option<&str>,
    ) -> Result<(TokenId, String, OffsetDateTime), Error> {
        self.inner
            .create_access_and_refresh_tokens(request, current_refresh_token)
            .await
    }

    async fn signing_key(&self) -> Result<SigningKey, Error> {
        self.signing_key_fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.signing_key().await
    }

    async fn get_private_claims_from_scopes(
        &self,
        subject: &str,
        client_id: &ClientId,
        scope: &Scope,
    ) -> Result<Map<String, Value>, Error> {
        self.inner
            .get_private_claims_from_scopes(subject, client_id, scope)
            .await
    }

    async fn set_userinfo_from_scopes(
        &self,
        userinfo: &mut UserInfo,
        subject: &str,
        client_id: &ClientId,
        scope: &Scope,
    ) -> Result<(), Error> {
        self.inner
            .set_userinfo_from_scopes(userinfo, subject, client_id, scope)
            .await
    }

    async fn set_introspection_from_token(
        &self,
        response: &mut IntrospectionResponse,
        token_id: &TokenId,
        subject: &str,
        client_id: &ClientId,
    ) -> Result<(), Error> {
        self.inner
            .set_introspection_from_token(response, token_id, subject, client_id)
            .await
    }
}

/// Saves `request` as a pending authorization redeemable with `code`.
pub async fn saved(store: &MemoryStore, request: AuthRequest, code: &str) -> TokenRequest {
    store
        .save_auth_request(request.clone(), &AuthCode(code.to_string()))
        .await;
    TokenRequest::from(request)
}
