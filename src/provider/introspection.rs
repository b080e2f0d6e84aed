use tracing::{event, Level};

use crate::auth::introspection::{IntrospectionRequest, IntrospectionResponse};
use crate::auth::Storage;
use crate::core::types::{ClientId, ClientSecret, TokenId};
use crate::crypto::Crypto;
use crate::provider::error::Error;
use crate::provider::jwt_profile::{verify_jwt_assertion, JwtProfileVerifier};
use crate::provider::verifier::AccessTokenVerifier;

/// Collaborators of the introspection endpoint.
pub trait Introspector: Send + Sync {
    fn storage(&self) -> &dyn Storage;
    fn crypto(&self) -> &dyn Crypto;
    fn access_token_verifier(&self) -> &dyn AccessTokenVerifier;

    /// Present when callers may authenticate with RFC 7523 assertions.
    fn jwt_profile_verifier(&self) -> Option<&JwtProfileVerifier> {
        None
    }
}

/// Decodes a Basic auth component the way form values are decoded: `+` is
/// a space and every `%` must start a two digit hex escape.
pub fn query_unescape(value: &str) -> Result<String, Error> {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(Error::InvalidBasicAuth);
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    urlencoding::decode(&value.replace('+', " "))
        .map(|decoded| decoded.into_owned())
        .map_err(|_| Error::InvalidBasicAuth)
}

/// Parses the form body and authenticates the caller. Returns the token to
/// introspect together with the authenticated client.
pub async fn parse_token_introspection_request(
    introspector: &dyn Introspector,
    body: &[u8],
    basic: Option<(&str, &str)>,
) -> Result<(String, ClientId), Error> {
    let request: IntrospectionRequest =
        serde_urlencoded::from_bytes(body).map_err(|_| Error::MalformedRequest)?;

    if let (Some(verifier), Some(assertion)) = (
        introspector.jwt_profile_verifier(),
        request.client_assertion.as_deref().filter(|a| !a.is_empty()),
    ) {
        match verify_jwt_assertion(assertion, verifier, introspector.storage()).await {
            Ok(profile) => return Ok((request.token, profile.client_id())),
            Err(e) => event!(Level::DEBUG, "Client assertion rejected: {}", e),
        }
    }

    if let Some((client_id, client_secret)) = basic {
        let client_id = ClientId(query_unescape(client_id)?);
        let client_secret = ClientSecret(query_unescape(client_secret)?);
        introspector
            .storage()
            .authorize_client_id_secret(&client_id, &client_secret)
            .await?;
        return Ok((request.token, client_id));
    }

    Err(Error::InvalidAuthorization)
}

/// Resolves the token id and subject behind a presented token: bearer tokens
/// decrypt to `id:subject`, anything else must be one of our JWTs.
pub fn get_token_id_and_subject(introspector: &dyn Introspector, token: &str) -> Option<(TokenId, String)> {
    if let Ok(plaintext) = introspector.crypto().decrypt(token) {
        if let Some((id, subject)) = plaintext.split_once(':') {
            return Some((TokenId(id.to_string()), subject.to_string()));
        }
    }

    match introspector.access_token_verifier().verify_access_token(token) {
        Ok(claims) => Some((claims.jti, claims.sub)),
        Err(e) => {
            event!(Level::DEBUG, "Token could not be resolved: {}", e);
            None
        }
    }
}

/// RFC 7662 token introspection.
///
/// An error means the caller could not be authenticated. Unknown, expired
/// or foreign tokens yield an inactive response instead.
#[tracing::instrument(skip_all)]
pub async fn introspect(
    introspector: &dyn Introspector,
    body: &[u8],
    basic: Option<(&str, &str)>,
) -> Result<IntrospectionResponse, Error> {
    let mut response = IntrospectionResponse::new();

    let (token, client_id) = parse_token_introspection_request(introspector, body, basic)
        .await
        .map_err(|e| {
            event!(Level::DEBUG, "Introspection request rejected: {}", e);
            e
        })?;

    let (token_id, subject) = match get_token_id_and_subject(introspector, &token) {
        Some(resolved) => resolved,
        None => return Ok(response),
    };

    if let Err(e) = introspector
        .storage()
        .set_introspection_from_token(&mut response, &token_id, &subject, &client_id)
        .await
    {
        event!(Level::DEBUG, client_id = %client_id, "Introspection failed: {}", e);
        return Ok(IntrospectionResponse::new());
    }

    response.set_active(true);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_unescape_follows_form_rules() {
        assert_eq!(query_unescape("my+client%21").unwrap(), "my client!");
        assert_eq!(query_unescape("a%2Bb").unwrap(), "a+b");
        assert_eq!(query_unescape("plain").unwrap(), "plain");
        assert!(matches!(query_unescape("bad%zz"), Err(Error::InvalidBasicAuth)));
        assert!(matches!(query_unescape("trailing%2"), Err(Error::InvalidBasicAuth)));
    }
}
