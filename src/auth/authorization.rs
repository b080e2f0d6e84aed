use time::OffsetDateTime;

use crate::auth::pkce;
use crate::core::types::{AuthRequestId, ClientId, RedirectUri, ResponseType, Scope};
use crate::oidc::Nonce;

/// A pending authorization, created when the end user approved a request
/// at the authorization endpoint and consumed by the token endpoint.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub id: AuthRequestId,
    pub client_id: ClientId,
    pub subject: String,
    pub audience: Vec<String>,
    pub scope: Scope,
    pub redirect_uri: RedirectUri,
    pub response_type: ResponseType,
    pub state: Option<String>,
    pub nonce: Option<Nonce>,
    pub acr: Option<String>,
    pub amr: Vec<String>,
    pub auth_time: OffsetDateTime,
    pub pkce_challenge: Option<pkce::Challenge>,
}

/// The grant recorded behind a refresh token. No nonce, ACR or state:
/// those belong to the original interactive authorization only.
#[derive(Debug, Clone)]
pub struct RefreshTokenRequest {
    pub client_id: ClientId,
    pub subject: String,
    pub audience: Vec<String>,
    pub scope: Scope,
    pub amr: Vec<String>,
    pub auth_time: OffsetDateTime,
}

impl RefreshTokenRequest {
    /// Narrows the granted scopes to `requested`, which must be a subset of
    /// the original grant.
    pub fn restrict_scope(&mut self, requested: Scope) -> bool {
        if !self.scope.contains_all(&requested) {
            return false;
        }
        self.scope = requested;
        true
    }
}

/// Request behind a token or ID token issuance.
#[derive(Debug, Clone)]
pub enum TokenRequest {
    Authorization(AuthRequest),
    Refresh(RefreshTokenRequest),
}

impl TokenRequest {
    pub fn subject(&self) -> &str {
        match self {
            Self::Authorization(r) => &r.subject,
            Self::Refresh(r) => &r.subject,
        }
    }

    pub fn audience(&self) -> &[String] {
        match self {
            Self::Authorization(r) => &r.audience,
            Self::Refresh(r) => &r.audience,
        }
    }

    pub fn scope(&self) -> &Scope {
        match self {
            Self::Authorization(r) => &r.scope,
            Self::Refresh(r) => &r.scope,
        }
    }

    pub fn amr(&self) -> &[String] {
        match self {
            Self::Authorization(r) => &r.amr,
            Self::Refresh(r) => &r.amr,
        }
    }

    pub fn auth_time(&self) -> OffsetDateTime {
        match self {
            Self::Authorization(r) => r.auth_time,
            Self::Refresh(r) => r.auth_time,
        }
    }

    pub fn client_id(&self) -> &ClientId {
        match self {
            Self::Authorization(r) => &r.client_id,
            Self::Refresh(r) => &r.client_id,
        }
    }

    pub fn as_auth_request(&self) -> Option<&AuthRequest> {
        match self {
            Self::Authorization(r) => Some(r),
            Self::Refresh(_) => None,
        }
    }
}

impl From<AuthRequest> for TokenRequest {
    fn from(request: AuthRequest) -> Self {
        Self::Authorization(request)
    }
}

impl From<RefreshTokenRequest> for TokenRequest {
    fn from(request: RefreshTokenRequest) -> Self {
        Self::Refresh(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refresh_request(scope: &str) -> RefreshTokenRequest {
        RefreshTokenRequest {
            client_id: ClientId("web".to_string()),
            subject: "alice".to_string(),
            audience: vec!["web".to_string()],
            scope: Scope::from_delimited_parts(scope),
            amr: vec!["pwd".to_string()],
            auth_time: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn refresh_scope_can_only_narrow() {
        let mut request = refresh_request("openid email offline_access");
        assert!(!request.restrict_scope(Scope::from_delimited_parts("openid phone")));
        assert_eq!(request.scope.as_joined(), "openid email offline_access");

        assert!(request.restrict_scope(Scope::from_delimited_parts("openid")));
        assert_eq!(request.scope.as_joined(), "openid");
    }

    #[test]
    fn refresh_variant_is_not_an_auth_request() {
        let request = TokenRequest::from(refresh_request("openid"));
        assert!(request.as_auth_request().is_none());
        assert_eq!(request.subject(), "alice");
        assert_eq!(request.amr(), ["pwd"]);
    }
}
