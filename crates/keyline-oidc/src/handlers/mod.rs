//! HTTP handlers for the protocol and login ceremony endpoints.

mod authorize;
mod discovery;
mod end_session;
mod login;
mod token;
mod userinfo;

pub use authorize::{authorize_form_handler, authorize_handler};
pub use discovery::{discovery_handler, jwks_handler};
pub use end_session::end_session_handler;
pub use login::{
    finish_handler, login_state_handler, onboard_totp_handler, resend_email_verification_handler,
    reset_temporary_password_handler, verify_email_handler, verify_password_handler,
    verify_totp_handler,
};
pub use token::token_handler;
pub use userinfo::{userinfo_get_handler, userinfo_post_handler};

use keyline_db::VirtualServer;

use crate::error::OidcError;
use crate::state::OidcState;

/// Resolve a virtual server by name or answer 404.
pub(crate) async fn require_virtual_server(
    state: &OidcState,
    name: &str,
) -> Result<VirtualServer, OidcError> {
    state
        .virtual_servers
        .get_by_name(name)
        .await?
        .ok_or(OidcError::NotFound("virtual server"))
}
