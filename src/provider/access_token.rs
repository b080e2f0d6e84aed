use std::sync::Arc;

use tracing::{event, Level};

use crate::auth::{
    pkce, AccessTokenError, AccessTokenErrorKind, AccessTokenRequest, AccessTokenResponse,
    AuthenticationCodeTokenRequest, ClientCredentials, RefreshTokenGrantRequest, Storage,
    TokenRequest,
};
use crate::core::models::Client;
use crate::core::types::GrantType;
use crate::provider::error::Error;
use crate::provider::token::create_token_response;

use super::OpenIdProvider;

fn server_error(error: Error) -> AccessTokenError {
    event!(Level::ERROR, "Token issuance failed: {}", error);
    AccessTokenErrorKind::ServerError.into()
}

impl<S: Storage> OpenIdProvider<S> {
    async fn check_client_authentication(
        &self,
        credentials: &ClientCredentials,
    ) -> Result<Arc<dyn Client>, AccessTokenError> {
        let bad_authentication = |e: Error| {
            event!(Level::DEBUG, "Client authentication failed: {}", e);
            AccessTokenError::with_description(AccessTokenErrorKind::InvalidClient, "Bad authentication")
        };

        self.store
            .authorize_client_id_secret(&credentials.client_id, &credentials.client_secret)
            .await
            .map_err(bad_authentication)?;
        self.store
            .get_client_by_client_id(&credentials.client_id)
            .await
            .map_err(bad_authentication)
    }

    #[tracing::instrument(skip_all, fields(client_id = %credentials.client_id))]
    pub async fn access_token_request(
        &self,
        credentials: ClientCredentials,
        req: AccessTokenRequest,
    ) -> Result<AccessTokenResponse, AccessTokenError> {
        event!(Level::TRACE, "Handling access token request");
        let client = self.check_client_authentication(&credentials).await?;

        match req {
            AccessTokenRequest::AuthenticationCode(req) => {
                self.authorization_code_grant(client.as_ref(), req).await
            }
            AccessTokenRequest::RefreshToken(req) => {
                self.refresh_token_grant(client.as_ref(), req).await
            }
        }
    }

    async fn authorization_code_grant(
        &self,
        client: &dyn Client,
        req: AuthenticationCodeTokenRequest,
    ) -> Result<AccessTokenResponse, AccessTokenError> {
        event!(Level::TRACE, "Handling authorization_code grant");
        if !client.allows_grant_type(GrantType::AuthorizationCode) {
            return Err(AccessTokenErrorKind::UnauthorizedClient.into());
        }

        let auth_request = self
            .store
            .auth_request_by_code(client.id(), &req.code)
            .await
            .map_err(|_| AccessTokenErrorKind::InvalidGrant)?;

        if &auth_request.client_id != client.id() || auth_request.redirect_uri != req.redirect_uri {
            return Err(AccessTokenErrorKind::InvalidGrant.into());
        }

        if let Some(challenge) = &auth_request.pkce_challenge {
            event!(Level::DEBUG, "Verifying PKCE challenge");
            if !pkce::verify(challenge, req.pkce_verifier.as_ref()) {
                return Err(AccessTokenError::with_description(
                    AccessTokenErrorKind::InvalidGrant,
                    "PKCE verification failed",
                ));
            }
        }

        let request = TokenRequest::from(auth_request);
        create_token_response(&self.issuer, &request, client, self, true, Some(&req.code.0), None)
            .await
            .map_err(server_error)
    }

    async fn refresh_token_grant(
        &self,
        client: &dyn Client,
        req: RefreshTokenGrantRequest,
    ) -> Result<AccessTokenResponse, AccessTokenError> {
        event!(Level::TRACE, "Handling refresh_token grant");
        if !client.allows_grant_type(GrantType::RefreshToken) {
            return Err(AccessTokenErrorKind::UnauthorizedClient.into());
        }

        let mut refresh_request = self
            .store
            .token_request_by_refresh_token(&req.refresh_token)
            .await
            .map_err(|_| AccessTokenErrorKind::InvalidGrant)?;

        if &refresh_request.client_id != client.id() {
            return Err(AccessTokenErrorKind::InvalidGrant.into());
        }

        if let Some(scope) = req.scope {
            if !refresh_request.restrict_scope(scope) {
                return Err(AccessTokenErrorKind::InvalidScope.into());
            }
        }

        let request = TokenRequest::from(refresh_request);
        create_token_response(
            &self.issuer,
            &request,
            client,
            self,
            true,
            None,
            Some(&req.refresh_token),
        )
        .await
        .map_err(server_error)
    }
}
