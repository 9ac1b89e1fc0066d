//! TTL key-value and opaque token storage for keyline.

mod error;
mod kv;
mod token;

pub use error::StoreError;
pub use kv::{KvStore, MemoryKvStore};
pub use token::{
    generate_token, TokenKind, TokenStore, EMAIL_VERIFICATION_TTL, LOGIN_SESSION_TTL,
    OIDC_CODE_TTL, OIDC_REFRESH_TOKEN_TTL,
};
