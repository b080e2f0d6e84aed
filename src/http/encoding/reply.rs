use super::error::AuthRejection;
use crate::auth::introspection::IntrospectionResponse;
use crate::provider::Error;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::Rejection;

/// Token material must never be cached (RFC 6749, section 5.1).
pub fn no_store(reply: impl Reply) -> impl Reply {
    let reply = warp::reply::with_header(reply, "cache-control", "no-store");
    warp::reply::with_header(reply, "pragma", "no-cache")
}

pub fn json_encode(
    value: Result<impl serde::Serialize, impl Into<AuthRejection>>,
) -> Result<impl Reply, Rejection> {
    value
        .map(|v| no_store(warp::reply::json(&v)))
        .map_err(|e| warp::reject::custom::<AuthRejection>(e.into()))
}

/// Unauthenticated callers get a plain text 401, everything else a JSON
/// introspection response.
pub fn introspection(result: Result<IntrospectionResponse, Error>) -> Response {
    match result {
        Ok(response) => no_store(warp::reply::json(&response)).into_response(),
        Err(e) => warp::reply::with_status(e.to_string(), StatusCode::UNAUTHORIZED).into_response(),
    }
}
