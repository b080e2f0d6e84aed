pub mod access_token;
pub mod error;
pub mod introspection;
pub mod jwt_profile;
pub mod scope;
pub mod token;
pub mod verifier;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use tracing::{event, Level};

use crate::auth::introspection::IntrospectionResponse;
use crate::auth::{AccessTokenError, AccessTokenRequest, AccessTokenResponse, ClientCredentials, Storage};
use crate::crypto::{AesCrypto, Crypto, SigningKey};
use crate::db::{ClientRegistration, MemoryStore};
use crate::http::server::Server;

pub use error::Error;
use introspection::Introspector;
use jwt_profile::JwtProfileVerifier;
use token::TokenCreator;
use verifier::{AccessTokenVerifier, JwtAccessTokenVerifier, VerificationKey};

/// Operations the HTTP layer serves.
#[async_trait::async_trait]
pub trait Provider: Introspector {
    async fn access_token_request(
        &self,
        credentials: ClientCredentials,
        req: AccessTokenRequest,
    ) -> Result<AccessTokenResponse, AccessTokenError>;

    async fn introspection_request(
        &self,
        body: &[u8],
        basic: Option<(&str, &str)>,
    ) -> Result<IntrospectionResponse, Error>;
}

/// OpenID Connect provider over a [`Storage`] implementation.
pub struct OpenIdProvider<S> {
    issuer: String,
    store: Arc<S>,
    crypto: AesCrypto,
    access_token_verifier: JwtAccessTokenVerifier,
    jwt_profile: Option<JwtProfileVerifier>,
}

impl<S> std::fmt::Debug for OpenIdProvider<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpenIdProvider {{ issuer: {:?}, .. }}", self.issuer)
    }
}

impl<S: Storage> OpenIdProvider<S> {
    pub fn new(
        issuer: impl Into<String>,
        store: Arc<S>,
        crypto: AesCrypto,
        access_token_verifier: JwtAccessTokenVerifier,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            store,
            crypto,
            access_token_verifier,
            jwt_profile: None,
        }
    }

    /// Accepts RFC 7523 client assertions at the introspection endpoint.
    pub fn with_jwt_profile(mut self, verifier: JwtProfileVerifier) -> Self {
        self.jwt_profile = Some(verifier);
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl<S: Storage> TokenCreator for OpenIdProvider<S> {
    fn storage(&self) -> &dyn Storage {
        self.store.as_ref()
    }

    fn crypto(&self) -> &dyn Crypto {
        &self.crypto
    }
}

impl<S: Storage> Introspector for OpenIdProvider<S> {
    fn storage(&self) -> &dyn Storage {
        self.store.as_ref()
    }

    fn crypto(&self) -> &dyn Crypto {
        &self.crypto
    }

    fn access_token_verifier(&self) -> &dyn AccessTokenVerifier {
        &self.access_token_verifier
    }

    fn jwt_profile_verifier(&self) -> Option<&JwtProfileVerifier> {
        self.jwt_profile.as_ref()
    }
}

#[async_trait::async_trait]
impl<S: Storage> Provider for OpenIdProvider<S> {
    async fn access_token_request(
        &self,
        credentials: ClientCredentials,
        req: AccessTokenRequest,
    ) -> Result<AccessTokenResponse, AccessTokenError> {
        OpenIdProvider::access_token_request(self, credentials, req).await
    }

    async fn introspection_request(
        &self,
        body: &[u8],
        basic: Option<(&str, &str)>,
    ) -> Result<IntrospectionResponse, Error> {
        introspection::introspect(self, body, basic).await
    }
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "kagamid",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS")
)]
pub struct Config {
    #[clap(long, env = "ISSUER")]
    pub issuer: String,
    #[clap(long, env = "BIND_ADDRESS", default_value = "127.0.0.1:8001")]
    pub bind_address: SocketAddr,
    #[clap(long, env = "JWT_PRIVATE_KEY_FILE")]
    pub jwt_private_key_file: PathBuf,
    #[clap(long, env = "JWT_PUBLIC_KEY_FILE")]
    pub jwt_public_key_file: PathBuf,
    #[clap(long, env = "SIGNING_ALGORITHM", default_value = "ES256")]
    pub signing_algorithm: String,
    #[clap(long, env = "KEY_ID")]
    pub key_id: Option<String>,
    /// Base64 encoded 32 byte key for opaque bearer tokens.
    #[clap(long, env = "ENCRYPTION_KEY")]
    pub encryption_key: String,
    #[clap(long, env = "HASH_SECRET")]
    pub hash_secret: String,
    /// JSON list of client registrations.
    #[clap(long, env = "CLIENTS_FILE")]
    pub clients_file: PathBuf,
}

/// Errors that stop the daemon from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid key: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),
    #[error("invalid clients file: {0}")]
    Clients(#[from] serde_json::Error),
    #[error(transparent)]
    Provider(#[from] Error),
    #[error("failed to bind: {0}")]
    Bind(#[from] warp::Error),
}

fn read_file(path: &PathBuf) -> Result<Vec<u8>, StartupError> {
    std::fs::read(path).map_err(|source| StartupError::Io {
        path: path.clone(),
        source,
    })
}

fn load_keys(config: &Config) -> Result<(Algorithm, EncodingKey, DecodingKey), StartupError> {
    use Algorithm::*;

    let algorithm: Algorithm = config.signing_algorithm.parse()?;
    let private = read_file(&config.jwt_private_key_file)?;
    let public = read_file(&config.jwt_public_key_file)?;

    let (encoding, decoding) = match algorithm {
        ES256 | ES384 => (EncodingKey::from_ec_pem(&private)?, DecodingKey::from_ec_pem(&public)?),
        RS256 | RS384 | RS512 | PS256 | PS384 | PS512 => {
            (EncodingKey::from_rsa_pem(&private)?, DecodingKey::from_rsa_pem(&public)?)
        }
        EdDSA => (EncodingKey::from_ed_pem(&private)?, DecodingKey::from_ed_pem(&public)?),
        HS256 | HS384 | HS512 => (EncodingKey::from_secret(&private), DecodingKey::from_secret(&private)),
    };
    Ok((algorithm, encoding, decoding))
}

async fn start_clean_up_worker(store: Arc<MemoryStore>) {
    let mut interval = tokio::time::interval(Duration::from_secs(15));

    loop {
        interval.tick().await;
        store.clean_up().await;
    }
}

pub async fn kagamid(config: Config) -> Result<(), StartupError> {
    let (algorithm, encoding_key, decoding_key) = load_keys(&config)?;
    let signing_key = SigningKey::new(config.key_id.clone(), algorithm, encoding_key);

    let clients: Vec<ClientRegistration> = serde_json::from_slice(&read_file(&config.clients_file)?)?;
    let store = Arc::new(MemoryStore::new(config.hash_secret.clone(), signing_key));
    for registration in clients {
        event!(Level::INFO, client_id = %registration.client.client_id, "Registering client");
        store.register_client(registration).await;
    }

    let verifier = JwtAccessTokenVerifier::new(
        config.issuer.clone(),
        vec![VerificationKey {
            id: config.key_id.clone(),
            algorithm,
            key: decoding_key,
        }],
    );
    let crypto = AesCrypto::from_base64(&config.encryption_key)?;
    let provider = OpenIdProvider::new(config.issuer.clone(), Arc::clone(&store), crypto, verifier)
        .with_jwt_profile(JwtProfileVerifier::new(
            config.issuer.clone(),
            Duration::from_secs(60 * 60),
            Duration::from_secs(5),
        ));

    let _clean_up = tokio::spawn(start_clean_up_worker(Arc::clone(&store)));

    let server = Server::new(Arc::new(provider));
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            event!(Level::WARN, "Unable to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    event!(Level::INFO, address = %config.bind_address, "Starting kagamid");
    server.serve(config.bind_address, shutdown).await?;
    event!(Level::INFO, "kagamid stopped");
    Ok(())
}

pub async fn main() -> Result<(), StartupError> {
    use clap::Parser;
    use tracing_subscriber::EnvFilter;

    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    kagamid(config).await
}
