use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use http_basic_auth::Credential as BasicCredentials;
use tracing::{event, Level};
use warp::hyper::body::Bytes;
use warp::{Filter, Rejection, Reply};

use crate::auth::{AccessTokenRequest, ClientCredentials};
use crate::provider::Provider;

use super::encoding::{self, error::handle_reject, reply, MAX_BODY_SIZE};

#[derive(Debug)]
pub struct Server<P> {
    provider: Arc<P>,
}

impl<P: Provider + 'static> Server<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// The OAuth route table, mounted under `/oauth/v1`.
    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        let provider = Arc::clone(&self.provider);
        let with_provider = warp::any().map(move || Arc::clone(&provider));

        let token = warp::path("token")
            .and(warp::path::end())
            .and(warp::post())
            .and(with_provider.clone())
            .and(encoding::token_request_with_credentials())
            .and_then(|provider: Arc<P>, (credentials, req): (ClientCredentials, AccessTokenRequest)| async move {
                let result = provider.access_token_request(credentials, req).await;
                reply::json_encode(result)
            });

        let introspect = warp::path("introspect")
            .and(warp::path::end())
            .and(warp::post())
            .and(with_provider)
            .and(encoding::optional_basic())
            .and(warp::body::content_length_limit(MAX_BODY_SIZE))
            .and(warp::body::bytes())
            .and_then(
                |provider: Arc<P>, basic: Option<BasicCredentials>, body: Bytes| async move {
                    let basic = basic
                        .as_ref()
                        .map(|c| (c.user_id.as_str(), c.password.as_str()));
                    let result = provider.introspection_request(&body, basic).await;
                    Ok::<_, Rejection>(reply::introspection(result))
                },
            );

        warp::path("oauth")
            .and(warp::path("v1"))
            .and(token.or(introspect))
            .recover(handle_reject)
            .with(warp::log("http-api"))
    }

    /// Serves until `shutdown` resolves.
    pub async fn serve(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), warp::Error> {
        let (bound, server) =
            warp::serve(self.routes()).try_bind_with_graceful_shutdown(addr, shutdown)?;
        event!(Level::INFO, address = %bound, "Listening");
        server.await;
        Ok(())
    }
}
