pub mod auth;
pub mod core;
pub mod crypto;
pub mod db;
pub mod http;
pub mod oidc;
pub mod provider;
pub mod util;
