use std::time::Duration;

use super::types::*;

const STANDARD_SCOPES: [&str; 6] = [
    SCOPE_OPENID,
    SCOPE_PROFILE,
    SCOPE_EMAIL,
    SCOPE_ADDRESS,
    SCOPE_PHONE,
    SCOPE_OFFLINE_ACCESS,
];

/// Token policy of a registered relying party.
pub trait Client: Send + Sync {
    fn id(&self) -> &ClientId;
    fn access_token_type(&self) -> AccessTokenType;
    fn id_token_lifetime(&self) -> Duration;
    fn clock_skew(&self) -> Duration;
    fn grant_types(&self) -> &[GrantType];
    fn redirect_uris(&self) -> &[RedirectUri];

    /// Scopes beyond the standard OpenID ones that may shape an ID token.
    fn restrict_additional_id_token_scopes(&self, scope: Scope) -> Scope {
        scope
    }

    /// Scopes beyond the standard OpenID ones that may shape an access token.
    fn restrict_additional_access_token_scopes(&self, scope: Scope) -> Scope {
        scope
    }

    /// Whether userinfo claims go into the ID token even when an access token
    /// is issued with it.
    fn id_token_userinfo_claims_assertion(&self) -> bool;

    fn allows_grant_type(&self, grant_type: GrantType) -> bool {
        self.grant_types().contains(&grant_type)
    }
}

/// File-loadable client definition.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct ClientConfig {
    pub client_id: ClientId,
    #[serde(default)]
    pub redirect_uris: Vec<RedirectUri>,
    #[serde(default)]
    pub access_token_type: AccessTokenType,
    #[serde(with = "humantime_serde", default = "default_id_token_lifetime")]
    pub id_token_lifetime: Duration,
    #[serde(with = "humantime_serde", default)]
    pub clock_skew: Duration,
    #[serde(default = "default_grant_types")]
    pub grant_types: Vec<GrantType>,
    #[serde(default)]
    pub id_token_userinfo_assertion: bool,
    /// `None` lets every additional scope through.
    #[serde(default)]
    pub id_token_scopes: Option<Vec<String>>,
    #[serde(default)]
    pub access_token_scopes: Option<Vec<String>>,
}

fn default_id_token_lifetime() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_grant_types() -> Vec<GrantType> {
    vec![GrantType::AuthorizationCode]
}

fn restrict_to(scope: Scope, allowed: &Option<Vec<String>>) -> Scope {
    match allowed {
        None => scope,
        Some(allowed) => scope
            .into_parts()
            .into_iter()
            .filter(|s| STANDARD_SCOPES.contains(&s.as_str()) || allowed.contains(s))
            .collect(),
    }
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: ClientId(client_id.into()),
            redirect_uris: Vec::new(),
            access_token_type: AccessTokenType::Bearer,
            id_token_lifetime: default_id_token_lifetime(),
            clock_skew: Duration::ZERO,
            grant_types: default_grant_types(),
            id_token_userinfo_assertion: false,
            id_token_scopes: None,
            access_token_scopes: None,
        }
    }
}

impl Client for ClientConfig {
    fn id(&self) -> &ClientId {
        &self.client_id
    }

    fn access_token_type(&self) -> AccessTokenType {
        self.access_token_type
    }

    fn id_token_lifetime(&self) -> Duration {
        self.id_token_lifetime
    }

    fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    fn grant_types(&self) -> &[GrantType] {
        &self.grant_types
    }

    fn redirect_uris(&self) -> &[RedirectUri] {
        &self.redirect_uris
    }

    fn restrict_additional_id_token_scopes(&self, scope: Scope) -> Scope {
        restrict_to(scope, &self.id_token_scopes)
    }

    fn restrict_additional_access_token_scopes(&self, scope: Scope) -> Scope {
        restrict_to(scope, &self.access_token_scopes)
    }

    fn id_token_userinfo_claims_assertion(&self) -> bool {
        self.id_token_userinfo_assertion
    }
}
