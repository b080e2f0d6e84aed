use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::{event, Level};

use crate::auth::introspection::IntrospectionResponse;
use crate::auth::{AuthRequest, ClientKey, RefreshTokenRequest, Storage, TokenRequest, TokenType};
use crate::core::models::{Client, ClientConfig};
use crate::core::types::*;
use crate::crypto::SigningKey;
use crate::oidc::UserInfo;
use crate::provider::error::Error;
use crate::util::hash::HashingService;
use crate::util::random::FromRandom;

/// A client as listed in the daemon's clients file.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ClientRegistration {
    #[serde(flatten)]
    pub client: ClientConfig,
    /// Output of `kagami-util hash-secret`. Clients without one can only
    /// authenticate with assertions.
    #[serde(default)]
    pub secret_hash: Option<HashedClientSecret>,
}

/// Claims of an end user, split by the scope that discloses them.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub userinfo: UserInfo,
    /// Custom claims keyed by the non-standard scope that releases them.
    pub scope_claims: HashMap<String, Map<String, Value>>,
}

#[derive(Debug)]
struct StoredClient {
    client: Arc<ClientConfig>,
    secret_hash: Option<HashedClientSecret>,
}

#[derive(Debug)]
struct PendingAuthorization {
    request: AuthRequest,
    code: HashedAuthCode,
    invalid_after: OffsetDateTime,
}

#[derive(Debug, Clone)]
struct AccessTokenRecord {
    client_id: ClientId,
    subject: String,
    audience: Vec<String>,
    scope: Scope,
    issued_at: OffsetDateTime,
    expiration: OffsetDateTime,
}

#[derive(Debug)]
struct RefreshTokenRecord {
    request: RefreshTokenRequest,
    access_token: TokenId,
    expiration: OffsetDateTime,
}

#[derive(Debug, Default)]
struct State {
    clients: HashMap<ClientId, StoredClient>,
    client_keys: HashMap<ClientId, Vec<(Option<String>, ClientKey)>>,
    auth_requests: HashMap<AuthRequestId, PendingAuthorization>,
    codes: HashMap<HashedAuthCode, AuthRequestId>,
    access_tokens: HashMap<TokenId, AccessTokenRecord>,
    refresh_tokens: HashMap<RefreshTokenId, RefreshTokenRecord>,
    users: HashMap<String, UserProfile>,
}

/// Volatile [`Storage`] implementation backed by hash maps.
#[derive(Debug)]
pub struct MemoryStore {
    hasher: HashingService,
    state: RwLock<State>,
    signing_key: RwLock<SigningKey>,
    access_token_lifetime: Duration,
    refresh_token_lifetime: Duration,
    code_lifetime: Duration,
}

fn refresh_request_from(request: &TokenRequest) -> RefreshTokenRequest {
    match request {
        TokenRequest::Refresh(r) => r.clone(),
        TokenRequest::Authorization(r) => RefreshTokenRequest {
            client_id: r.client_id.clone(),
            subject: r.subject.clone(),
            audience: r.audience.clone(),
            scope: r.scope.clone(),
            amr: r.amr.clone(),
            auth_time: r.auth_time,
        },
    }
}

impl MemoryStore {
    pub fn new(hash_secret: String, signing_key: SigningKey) -> Self {
        Self {
            hasher: HashingService::with_secret_key(hash_secret),
            state: RwLock::new(State::default()),
            signing_key: RwLock::new(signing_key),
            access_token_lifetime: Duration::minutes(5),
            refresh_token_lifetime: Duration::days(30),
            code_lifetime: Duration::minutes(10),
        }
    }

    pub fn with_access_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.access_token_lifetime = lifetime;
        self
    }

    pub fn with_refresh_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.refresh_token_lifetime = lifetime;
        self
    }

    pub fn hasher(&self) -> &HashingService {
        &self.hasher
    }

    /// Registers a client with a plain secret, hashing it on the way in.
    pub async fn add_client(&self, client: ClientConfig, secret: Option<&ClientSecret>) -> Result<(), Error> {
        let secret_hash = secret.map(|s| self.hasher.hash(s)).transpose()?;
        self.register_client(ClientRegistration { client, secret_hash }).await;
        Ok(())
    }

    pub async fn register_client(&self, registration: ClientRegistration) {
        let mut state = self.state.write().await;
        state.clients.insert(
            registration.client.client_id.clone(),
            StoredClient {
                client: Arc::new(registration.client),
                secret_hash: registration.secret_hash,
            },
        );
    }

    /// Adds a public key the client signs assertions with.
    pub async fn add_client_key(&self, client_id: &ClientId, key_id: Option<String>, key: ClientKey) {
        let mut state = self.state.write().await;
        state.client_keys.entry(client_id.clone()).or_default().push((key_id, key));
    }

    pub async fn add_user(&self, subject: impl Into<String>, profile: UserProfile) {
        self.state.write().await.users.insert(subject.into(), profile);
    }

    /// Stores an approved authorization, redeemable with `code`.
    pub async fn save_auth_request(&self, request: AuthRequest, code: &AuthCode) {
        let hashed: HashedAuthCode = self.hasher.hash_without_salt(code);
        let mut state = self.state.write().await;
        state.codes.insert(hashed.clone(), request.id.clone());
        state.auth_requests.insert(
            request.id.clone(),
            PendingAuthorization {
                request,
                code: hashed,
                invalid_after: OffsetDateTime::now_utc() + self.code_lifetime,
            },
        );
    }

    /// Replaces the signing key. Keys already handed out stay valid for the
    /// tokens being signed with them.
    pub async fn rotate_signing_key(&self, key: SigningKey) {
        *self.signing_key.write().await = key;
    }

    pub async fn revoke_access_token(&self, id: &TokenId) -> bool {
        self.state.write().await.access_tokens.remove(id).is_some()
    }

    pub async fn pending_authorizations(&self) -> usize {
        self.state.read().await.auth_requests.len()
    }

    /// Drops expired codes and tokens.
    pub async fn clean_up(&self) {
        let now = OffsetDateTime::now_utc();
        let mut state = self.state.write().await;

        let expired: Vec<AuthRequestId> = state
            .auth_requests
            .iter()
            .filter(|(_, p)| p.invalid_after <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            if let Some(pending) = state.auth_requests.remove(id) {
                state.codes.remove(&pending.code);
            }
        }

        state.access_tokens.retain(|_, t| t.expiration > now);
        state.refresh_tokens.retain(|_, t| t.expiration > now);
        event!(Level::TRACE, expired_codes = expired.len(), "Cleaned up store");
    }
}

fn set_profile_claims(userinfo: &mut UserInfo, profile: &UserInfo) {
    userinfo.name = profile.name.clone();
    userinfo.given_name = profile.given_name.clone();
    userinfo.family_name = profile.family_name.clone();
    userinfo.nickname = profile.nickname.clone();
    userinfo.preferred_username = profile.preferred_username.clone();
    userinfo.picture = profile.picture.clone();
    userinfo.locale = profile.locale.clone();
    userinfo.updated_at = profile.updated_at;
}

#[async_trait::async_trait]
impl Storage for MemoryStore {
    async fn get_client_by_client_id(&self, client_id: &ClientId) -> Result<Arc<dyn Client>, Error> {
        let state = self.state.read().await;
        let stored = state.clients.get(client_id).ok_or(Error::NotFound)?;
        let client: Arc<dyn Client> = stored.client.clone();
        Ok(client)
    }

    async fn authorize_client_id_secret(
        &self,
        client_id: &ClientId,
        secret: &ClientSecret,
    ) -> Result<(), Error> {
        let secret_hash = {
            let state = self.state.read().await;
            state
                .clients
                .get(client_id)
                .and_then(|c| c.secret_hash.clone())
                .ok_or(Error::Unauthorized)?
        };

        if self.hasher.verify(secret, &secret_hash)? {
            Ok(())
        } else {
            Err(Error::Unauthorized)
        }
    }

    async fn get_key_by_id_and_client_id(
        &self,
        key_id: Option<&str>,
        client_id: &ClientId,
    ) -> Result<ClientKey, Error> {
        let state = self.state.read().await;
        let keys = state.client_keys.get(client_id).ok_or(Error::NotFound)?;
        keys.iter()
            .find(|(id, _)| key_id.is_none() || id.as_deref() == key_id)
            .map(|(_, key)| key.clone())
            .ok_or(Error::NotFound)
    }

    async fn auth_request_by_code(
        &self,
        client_id: &ClientId,
        code: &AuthCode,
    ) -> Result<AuthRequest, Error> {
        let hashed: HashedAuthCode = self.hasher.hash_without_salt(code);
        let state = self.state.read().await;
        let id = state.codes.get(&hashed).ok_or(Error::NotFound)?;
        let pending = state.auth_requests.get(id).ok_or(Error::NotFound)?;

        if &pending.request.client_id != client_id {
            return Err(Error::NotFound);
        }
        if pending.invalid_after <= OffsetDateTime::now_utc() {
            return Err(Error::Expired);
        }
        Ok(pending.request.clone())
    }

    async fn token_request_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshTokenRequest, Error> {
        let state = self.state.read().await;
        let record = state
            .refresh_tokens
            .get(&RefreshTokenId(refresh_token.to_string()))
            .ok_or(Error::NotFound)?;
        if record.expiration <= OffsetDateTime::now_utc() {
            return Err(Error::Expired);
        }
        Ok(record.request.clone())
    }

    async fn delete_auth_request(&self, id: &AuthRequestId) -> Result<(), Error> {
        let mut state = self.state.write().await;
        let pending = state.auth_requests.remove(id).ok_or(Error::NotFound)?;
        state.codes.remove(&pending.code);
        Ok(())
    }

    async fn create_access_token(
        &self,
        request: &TokenRequest,
    ) -> Result<(TokenId, OffsetDateTime), Error> {
        let id = TokenId::from_random();
        let now = OffsetDateTime::now_utc();
        let expiration = now + self.access_token_lifetime;

        self.state.write().await.access_tokens.insert(
            id.clone(),
            AccessTokenRecord {
                client_id: request.client_id().clone(),
                subject: request.subject().to_string(),
                audience: request.audience().to_vec(),
                scope: request.scope().clone(),
                issued_at: now,
                expiration,
            },
        );
        Ok((id, expiration))
    }

    async fn create_access_and_refresh_tokens(
        &self,
        request: &TokenRequest,
        current_refresh_token: Option<&str>,
    ) -> Result<(TokenId, String, OffsetDateTime), Error> {
        let now = OffsetDateTime::now_utc();
        let mut state = self.state.write().await;

        let mut refresh_request = refresh_request_from(request);
        if let Some(current) = current_refresh_token {
            let old = state
                .refresh_tokens
                .remove(&RefreshTokenId(current.to_string()))
                .ok_or(Error::NotFound)?;
            state.access_tokens.remove(&old.access_token);
            // A narrowed refresh keeps the scope of the original grant.
            refresh_request.scope = old.request.scope;
        }

        let access_token = TokenId::from_random();
        let expiration = now + self.access_token_lifetime;
        state.access_tokens.insert(
            access_token.clone(),
            AccessTokenRecord {
                client_id: request.client_id().clone(),
                subject: request.subject().to_string(),
                audience: request.audience().to_vec(),
                scope: request.scope().clone(),
                issued_at: now,
                expiration,
            },
        );

        let refresh_token = RefreshTokenId::from_random();
        state.refresh_tokens.insert(
            refresh_token.clone(),
            RefreshTokenRecord {
                request: refresh_request,
                access_token: access_token.clone(),
                expiration: now + self.refresh_token_lifetime,
            },
        );

        Ok((access_token, refresh_token.0, expiration))
    }

    async fn signing_key(&self) -> Result<SigningKey, Error> {
        Ok(self.signing_key.read().await.clone())
    }

    async fn get_private_claims_from_scopes(
        &self,
        subject: &str,
        _client_id: &ClientId,
        scope: &Scope,
    ) -> Result<Map<String, Value>, Error> {
        let state = self.state.read().await;
        let user = state.users.get(subject).ok_or(Error::NotFound)?;

        let mut claims = Map::new();
        for s in scope.iter() {
            if let Some(scope_claims) = user.scope_claims.get(s) {
                claims.extend(scope_claims.clone());
            }
        }
        Ok(claims)
    }

    async fn set_userinfo_from_scopes(
        &self,
        userinfo: &mut UserInfo,
        subject: &str,
        _client_id: &ClientId,
        scope: &Scope,
    ) -> Result<(), Error> {
        let state = self.state.read().await;
        let user = state.users.get(subject).ok_or(Error::NotFound)?;
        let profile = &user.userinfo;

        for s in scope.iter() {
            match s {
                SCOPE_PROFILE => set_profile_claims(userinfo, profile),
                SCOPE_EMAIL => {
                    userinfo.email = profile.email.clone();
                    userinfo.email_verified = profile.email_verified;
                }
                SCOPE_PHONE => {
                    userinfo.phone_number = profile.phone_number.clone();
                    userinfo.phone_number_verified = profile.phone_number_verified;
                }
                SCOPE_ADDRESS => userinfo.address = profile.address.clone(),
                other => {
                    if let Some(claims) = user.scope_claims.get(other) {
                        for (key, value) in claims {
                            userinfo.append_claims(key.clone(), value.clone());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn set_introspection_from_token(
        &self,
        response: &mut IntrospectionResponse,
        token_id: &TokenId,
        subject: &str,
        client_id: &ClientId,
    ) -> Result<(), Error> {
        let state = self.state.read().await;
        let token = state.access_tokens.get(token_id).ok_or(Error::NotFound)?;

        if token.subject != subject {
            return Err(Error::NotFound);
        }
        if token.expiration <= OffsetDateTime::now_utc() {
            return Err(Error::Expired);
        }
        if &token.client_id != client_id && !token.audience.iter().any(|a| a == &client_id.0) {
            return Err(Error::Unauthorized);
        }

        response.scope = Some(token.scope.clone());
        response.client_id = Some(token.client_id.clone());
        response.username = state
            .users
            .get(subject)
            .and_then(|u| u.userinfo.preferred_username.clone());
        response.token_type = Some(TokenType::Bearer);
        response.exp = Some(token.expiration.unix_timestamp());
        response.iat = Some(token.issued_at.unix_timestamp());
        response.nbf = Some(token.issued_at.unix_timestamp());
        response.sub = Some(token.subject.clone());
        response.aud = token.audience.clone();
        response.jti = Some(token_id.clone());
        Ok(())
    }
}
