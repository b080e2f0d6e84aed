use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::core::types::{ClientId, TokenId};

use super::{Nonce, UserInfo};

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    pub exp: i64,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Nonce>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub amr: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azp: Option<ClientId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_hash: Option<String>,
    #[serde(flatten)]
    pub userinfo: Option<UserInfo>,
}

impl IdTokenClaims {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        issuer: &str,
        subject: &str,
        audience: &[String],
        expiration: OffsetDateTime,
        auth_time: Option<OffsetDateTime>,
        nonce: &str,
        acr: &str,
        amr: &[String],
        client_id: &ClientId,
    ) -> Self {
        Self {
            iss: issuer.to_string(),
            sub: subject.to_string(),
            aud: audience.to_vec(),
            exp: expiration.unix_timestamp(),
            iat: OffsetDateTime::now_utc().unix_timestamp(),
            auth_time: auth_time.map(OffsetDateTime::unix_timestamp),
            nonce: non_empty(nonce).map(Nonce),
            acr: non_empty(acr),
            amr: amr.to_vec(),
            azp: non_empty(&client_id.0).map(ClientId),
            at_hash: None,
            c_hash: None,
            userinfo: None,
        }
    }

    pub fn set_access_token_hash(&mut self, hash: String) {
        self.at_hash = Some(hash);
    }

    pub fn set_code_hash(&mut self, hash: String) {
        self.c_hash = Some(hash);
    }

    /// Attaches disclosed claims. Custom claims named like a registered ID
    /// token claim are dropped.
    pub fn set_userinfo(&mut self, mut userinfo: UserInfo) {
        const RESERVED: [&str; 12] = [
            "iss", "sub", "aud", "exp", "iat", "auth_time", "nonce", "acr", "amr", "azp", "at_hash",
            "c_hash",
        ];

        userinfo.claims.retain(|k, _| !RESERVED.contains(&k.as_str()));
        self.userinfo = Some(userinfo);
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AccessTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub jti: TokenId,
    pub client_id: ClientId,
    #[serde(flatten)]
    pub private_claims: Map<String, Value>,
}

impl AccessTokenClaims {
    pub fn new(
        issuer: &str,
        subject: &str,
        audience: &[String],
        expiration: OffsetDateTime,
        id: &TokenId,
        client_id: &ClientId,
    ) -> Self {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        Self {
            iss: issuer.to_string(),
            sub: subject.to_string(),
            aud: audience.to_vec(),
            exp: expiration.unix_timestamp(),
            iat: now,
            nbf: now,
            jti: id.clone(),
            client_id: client_id.clone(),
            private_claims: Map::new(),
        }
    }

    /// Merges store-provided claims; registered claim names are never
    /// overwritten.
    pub fn set_private_claims(&mut self, claims: Map<String, Value>) {
        const RESERVED: [&str; 8] = ["iss", "sub", "aud", "exp", "iat", "nbf", "jti", "client_id"];

        self.private_claims = claims
            .into_iter()
            .filter(|(k, _)| !RESERVED.contains(&k.as_str()))
            .collect();
    }
}
