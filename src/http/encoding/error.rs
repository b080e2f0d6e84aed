use crate::auth::{AccessTokenError, AccessTokenErrorKind};
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use super::reply::no_store;

#[derive(Debug, Clone)]
pub enum AuthRejection {
    AccessToken(AccessTokenError),
    Unauthorized,
}

impl warp::reject::Reject for AuthRejection {}

impl From<AccessTokenError> for AuthRejection {
    fn from(error: AccessTokenError) -> Self {
        Self::AccessToken(error)
    }
}

fn status_for(kind: AccessTokenErrorKind) -> StatusCode {
    match kind {
        AccessTokenErrorKind::InvalidClient => StatusCode::UNAUTHORIZED,
        AccessTokenErrorKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

pub async fn handle_reject(err: Rejection) -> Result<impl Reply, Rejection> {
    match err.find::<AuthRejection>() {
        Some(AuthRejection::AccessToken(e)) => {
            let resp = no_store(warp::reply::json(e));
            Ok(warp::reply::with_status(resp, status_for(e.kind)).into_response())
        }
        Some(AuthRejection::Unauthorized) => {
            let e = AccessTokenError::with_description(
                AccessTokenErrorKind::InvalidClient,
                "Missing or malformed client credentials",
            );
            let resp = no_store(warp::reply::json(&e));
            Ok(warp::reply::with_status(resp, StatusCode::UNAUTHORIZED).into_response())
        }
        None => Err(err),
    }
}
