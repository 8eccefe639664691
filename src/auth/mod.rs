pub mod cookies;
pub mod handlers;
pub mod password;
pub mod tokens;

pub use tokens::{IdentityClaims, TokenError, TokenPair, TokenService, TokenSettings};
