pub mod error;
pub mod reply;

use http_basic_auth::Credential as BasicCredentials;
use warp::hyper::body::Bytes;
use warp::{Filter, Rejection};

use crate::auth::{AccessTokenError, AccessTokenErrorKind, AccessTokenRequest, ClientCredentials};
use crate::core::types::{ClientId, ClientSecret};
use crate::provider::introspection::query_unescape;

use self::error::AuthRejection;

pub const MAX_BODY_SIZE: u64 = 16 * 1024;

const SUPPORTED_GRANT_TYPES: [&str; 2] = ["authorization_code", "refresh_token"];

#[derive(serde::Deserialize)]
struct GrantTypeParam {
    grant_type: Option<String>,
}

/// Basic auth components are form encoded (RFC 6749, section 2.3.1).
fn basic_credentials(credentials: &BasicCredentials) -> Result<ClientCredentials, AuthRejection> {
    let client_id = query_unescape(&credentials.user_id).map_err(|_| AuthRejection::Unauthorized)?;
    let client_secret = query_unescape(&credentials.password).map_err(|_| AuthRejection::Unauthorized)?;
    Ok(ClientCredentials {
        client_id: ClientId(client_id),
        client_secret: ClientSecret(client_secret),
    })
}

fn token_request_error(body: &[u8]) -> AccessTokenError {
    let grant_type = serde_urlencoded::from_bytes::<GrantTypeParam>(body)
        .ok()
        .and_then(|p| p.grant_type);

    match grant_type {
        Some(grant_type) if !SUPPORTED_GRANT_TYPES.contains(&grant_type.as_str()) => {
            AccessTokenError::with_description(
                AccessTokenErrorKind::UnsupportedGrantType,
                format!("Grant type {} is not supported", grant_type),
            )
        }
        Some(_) => AccessTokenError::with_description(
            AccessTokenErrorKind::InvalidRequest,
            "Missing or malformed token request parameters",
        ),
        None => AccessTokenError::with_description(AccessTokenErrorKind::InvalidRequest, "Missing grant_type"),
    }
}

/// Client credentials from the Basic auth header, or from the form body
/// when there is none, followed by the token request itself.
pub fn parse_token_request(
    basic: Option<BasicCredentials>,
    body: &[u8],
) -> Result<(ClientCredentials, AccessTokenRequest), AuthRejection> {
    let credentials = match basic {
        Some(basic) => basic_credentials(&basic)?,
        None => serde_urlencoded::from_bytes::<ClientCredentials>(body)
            .map_err(|_| AuthRejection::Unauthorized)?,
    };

    let request = serde_urlencoded::from_bytes::<AccessTokenRequest>(body)
        .map_err(|_| AuthRejection::from(token_request_error(body)))?;
    Ok((credentials, request))
}

pub fn token_request_with_credentials(
) -> impl Filter<Extract = ((ClientCredentials, AccessTokenRequest),), Error = Rejection> + Clone {
    optional_basic()
        .and(warp::body::content_length_limit(MAX_BODY_SIZE))
        .and(warp::body::bytes())
        .and_then(|basic: Option<BasicCredentials>, body: Bytes| async move {
            parse_token_request(basic, &body).map_err(warp::reject::custom)
        })
}

/// Basic credentials if the request carries a well-formed Basic auth header.
pub fn optional_basic() -> impl Filter<Extract = (Option<BasicCredentials>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("Authorization")
        .map(|header: Option<String>| header.and_then(|h| h.parse::<BasicCredentials>().ok()))
}
