//! Request/response models for the OIDC endpoints.

mod authorize;
mod discovery;
mod jwks;
mod login;
mod token;
mod userinfo;

pub use authorize::AuthorizeParams;
pub use discovery::OpenIdConfiguration;
pub use jwks::JwkSet;
pub use login::{
    LoginStateResponse, OnboardTotpRequest, ResetPasswordRequest,
    VerifyEmailRequest, VerifyPasswordRequest, VerifyTotpRequest,
};
pub use token::{
    CodeFlowResponse, CodeInfo, EmailVerificationInfo, RefreshTokenInfo, TokenExchangeResponse,
    TokenRequest, GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN, GRANT_TOKEN_EXCHANGE,
    TOKEN_TYPE_ACCESS_TOKEN,
};
pub use userinfo::{UserInfoForm, UserInfoResponse};
