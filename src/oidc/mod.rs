pub mod claims;
pub mod types;
pub mod userinfo;

pub use claims::{AccessTokenClaims, IdTokenClaims};
pub use types::{claim_hash, Nonce};
pub use userinfo::{UserInfo, UserInfoAddress};
