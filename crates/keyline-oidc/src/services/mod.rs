mod claims;
mod login_flow;
mod session;
mod token_issuer;

pub use claims::{ClaimsMapper, DefaultClaimsMapper};
pub use login_flow::{next_step, LoginSession, LoginStep};
pub use session::{cookie_value, session_cookie_name, SessionService, SESSION_TTL};
pub use token_issuer::{
    AccessTokenClaims, IdTokenClaims, TokenIssuer, EXCHANGE_TOKEN_TTL, TOKEN_TTL,
};
