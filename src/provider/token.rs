use time::OffsetDateTime;
use tracing::{event, Level};

use crate::auth::{AccessTokenResponse, Storage, TokenRequest, TokenType};
use crate::core::models::Client;
use crate::core::types::{AccessTokenType, GrantType, ResponseType, TokenId};
use crate::crypto::{self, Crypto, Signer};
use crate::oidc::{claim_hash, AccessTokenClaims, IdTokenClaims, UserInfo};
use crate::provider::error::Error;
use crate::provider::scope::remove_userinfo_scopes;

/// Collaborators needed to mint tokens.
pub trait TokenCreator: Send + Sync {
    fn storage(&self) -> &dyn Storage;
    fn crypto(&self) -> &dyn Crypto;
}

/// A freshly minted access token.
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub refresh_token: Option<String>,
    /// Time until expiry including the client's clock skew. Negative when the
    /// store hands out an expiry in the past.
    pub validity: time::Duration,
}

/// Assembles the token endpoint response for `request`.
///
/// The pending authorization behind an [`TokenRequest::Authorization`] is
/// deleted once every token was minted; a failing deletion fails the call.
#[tracing::instrument(skip_all, fields(client_id = %client.id(), subject = request.subject()))]
pub async fn create_token_response(
    issuer: &str,
    request: &TokenRequest,
    client: &dyn Client,
    creator: &dyn TokenCreator,
    issue_access_token: bool,
    code: Option<&str>,
    refresh_token: Option<&str>,
) -> Result<AccessTokenResponse, Error> {
    let issued = if issue_access_token {
        Some(
            create_access_token(
                issuer,
                request,
                client.access_token_type(),
                creator,
                client,
                refresh_token,
            )
            .await?,
        )
    } else {
        None
    };

    let access_token = issued.as_ref().map(|i| i.token.as_str());
    let id_token = create_id_token(
        issuer,
        request,
        client.id_token_lifetime(),
        access_token,
        code,
        creator.storage(),
        client,
    )
    .await?;

    let state = match request {
        TokenRequest::Authorization(auth_request) => {
            event!(Level::DEBUG, "Deleting pending authorization");
            creator.storage().delete_auth_request(&auth_request.id).await?;
            auth_request.state.clone()
        }
        TokenRequest::Refresh(_) => None,
    };

    let (access_token, refresh_token, expires_in) = match issued {
        Some(issued) => (
            issued.token,
            issued.refresh_token,
            issued.validity.whole_seconds().max(0) as u64,
        ),
        None => (String::new(), None, 0),
    };

    Ok(AccessTokenResponse {
        access_token,
        token_type: TokenType::Bearer,
        refresh_token,
        expires_in,
        id_token,
        state,
    })
}

/// Whether a refresh token is minted alongside the access token.
pub fn needs_refresh_token(request: &TokenRequest, client: &dyn Client) -> bool {
    match request {
        TokenRequest::Authorization(auth_request) => {
            auth_request.scope.has_offline_access()
                && auth_request.response_type == ResponseType::Code
                && client.allows_grant_type(GrantType::RefreshToken)
        }
        TokenRequest::Refresh(_) => true,
    }
}

async fn create_tokens(
    request: &TokenRequest,
    storage: &dyn Storage,
    refresh_token: Option<&str>,
    client: &dyn Client,
) -> Result<(TokenId, Option<String>, OffsetDateTime), Error> {
    if needs_refresh_token(request, client) {
        event!(Level::DEBUG, "Minting access and refresh tokens");
        let (id, refresh_token, expiration) = storage
            .create_access_and_refresh_tokens(request, refresh_token)
            .await?;
        return Ok((id, Some(refresh_token), expiration));
    }

    let (id, expiration) = storage.create_access_token(request).await?;
    Ok((id, None, expiration))
}

pub async fn create_access_token(
    issuer: &str,
    request: &TokenRequest,
    access_token_type: AccessTokenType,
    creator: &dyn TokenCreator,
    client: &dyn Client,
    refresh_token: Option<&str>,
) -> Result<IssuedAccessToken, Error> {
    let (id, refresh_token, expiration) =
        create_tokens(request, creator.storage(), refresh_token, client).await?;

    let validity = (expiration + client.clock_skew()) - OffsetDateTime::now_utc();

    let token = match access_token_type {
        AccessTokenType::Jwt => {
            create_jwt(issuer, request, expiration, &id, client, creator.storage()).await?
        }
        AccessTokenType::Bearer => create_bearer_token(&id, request.subject(), creator.crypto())?,
    };

    Ok(IssuedAccessToken {
        token,
        refresh_token,
        validity,
    })
}

/// Opaque token the provider can later decrypt back into id and subject.
pub fn create_bearer_token(
    token_id: &TokenId,
    subject: &str,
    crypto: &dyn Crypto,
) -> Result<String, Error> {
    crypto.encrypt(&format!("{}:{}", token_id, subject))
}

pub async fn create_jwt(
    issuer: &str,
    request: &TokenRequest,
    expiration: OffsetDateTime,
    id: &TokenId,
    client: &dyn Client,
    storage: &dyn Storage,
) -> Result<String, Error> {
    let mut claims = AccessTokenClaims::new(
        issuer,
        request.subject(),
        request.audience(),
        expiration,
        id,
        client.id(),
    );

    let scope = client.restrict_additional_access_token_scopes(request.scope().clone());
    let private_claims = storage
        .get_private_claims_from_scopes(
            request.subject(),
            client.id(),
            &remove_userinfo_scopes(&scope),
        )
        .await?;
    claims.set_private_claims(private_claims);

    let signing_key = storage.signing_key().await?;
    crypto::sign(&claims, &Signer::from(&signing_key))
}

#[tracing::instrument(skip_all, fields(client_id = %client.id()))]
pub async fn create_id_token(
    issuer: &str,
    request: &TokenRequest,
    validity: std::time::Duration,
    access_token: Option<&str>,
    code: Option<&str>,
    storage: &dyn Storage,
    client: &dyn Client,
) -> Result<String, Error> {
    let expiration = OffsetDateTime::now_utc() + client.clock_skew() + validity;

    let (acr, nonce) = match request.as_auth_request() {
        Some(auth_request) => (
            auth_request.acr.as_deref().unwrap_or_default(),
            auth_request.nonce.as_ref().map(|n| n.0.as_str()).unwrap_or_default(),
        ),
        None => ("", ""),
    };

    let mut claims = IdTokenClaims::new(
        issuer,
        request.subject(),
        request.audience(),
        expiration,
        Some(request.auth_time()),
        nonce,
        acr,
        request.amr(),
        request.client_id(),
    );

    let mut scope = client.restrict_additional_id_token_scopes(request.scope().clone());
    let signing_key = storage.signing_key().await?;
    let algorithm = signing_key.signature_algorithm();

    if let Some(access_token) = access_token.filter(|t| !t.is_empty()) {
        claims.set_access_token_hash(claim_hash(access_token, algorithm));
        if !client.id_token_userinfo_claims_assertion() {
            scope = remove_userinfo_scopes(&scope);
        }
    }

    if !scope.is_empty() {
        let mut userinfo = UserInfo::new();
        storage
            .set_userinfo_from_scopes(&mut userinfo, request.subject(), request.client_id(), &scope)
            .await?;
        claims.set_userinfo(userinfo);
    }

    if let Some(code) = code.filter(|c| !c.is_empty()) {
        claims.set_code_hash(claim_hash(code, algorithm));
    }

    crypto::sign(&claims, &Signer::from(&signing_key))
}
