//! Durable browser sessions.
//!
//! Sessions live in the session repository for 30 days and are mirrored in
//! the TTL store for 15 minutes so repeat authorize calls skip the
//! repository. The browser cookie carries a split token; see
//! [`keyline_auth::SplitToken`].

use chrono::Duration;
use keyline_auth::{verify_secret, SplitToken};
use keyline_core::{Clock, SessionId, UserId};
use keyline_db::{Session, SessionRepository, VirtualServer};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::OidcError;

/// How long a session stays valid.
pub const SESSION_TTL: Duration = Duration::days(30);

/// How long a resolved session is served from the TTL store.
const SESSION_CACHE_TTL: Duration = Duration::minutes(15);

/// Name of the session cookie for a virtual server.
#[must_use]
pub fn session_cookie_name(virtual_server: &str) -> String {
    format!("keylineSession_{virtual_server}")
}

/// The value of `name` in a `Cookie` request header, if present.
#[must_use]
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Creates, resolves and revokes browser sessions.
#[derive(Clone)]
pub struct SessionService {
    sessions: Arc<dyn SessionRepository>,
    kv: Arc<dyn keyline_store::KvStore>,
    clock: Arc<dyn Clock>,
}

impl SessionService {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        kv: Arc<dyn keyline_store::KvStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            kv,
            clock,
        }
    }

    /// Create a session for `user_id` and return the cookie value.
    pub async fn create(
        &self,
        virtual_server: &VirtualServer,
        user_id: UserId,
    ) -> Result<String, OidcError> {
        let id = SessionId::new();
        let token = SplitToken::generate(id.to_string());
        let now = self.clock.now();
        let session = Session {
            id,
            virtual_server_id: virtual_server.id,
            user_id,
            hashed_secret: token.hashed_secret(),
            created_at: now,
            expires_at: now + SESSION_TTL,
        };
        self.sessions.create(session.clone()).await?;
        self.cache_put(&virtual_server.name, &session).await?;
        tracing::debug!(
            session_id = %id,
            virtual_server = %virtual_server.name,
            "created browser session"
        );
        Ok(token.encode())
    }

    /// Resolve a cookie value to the session it names, if it is still valid.
    ///
    /// Malformed tokens, unknown ids, wrong secrets, expired sessions and
    /// sessions belonging to another virtual server all resolve to `None`.
    pub async fn resolve(
        &self,
        virtual_server: &VirtualServer,
        cookie: &str,
    ) -> Result<Option<Session>, OidcError> {
        let Ok(token) = SplitToken::parse(cookie) else {
            return Ok(None);
        };
        let Ok(id) = SessionId::from_str(&token.id) else {
            return Ok(None);
        };

        let session = match self.cache_get(&virtual_server.name, id).await? {
            Some(session) => session,
            None => match self.sessions.get(id).await? {
                Some(session) => {
                    self.cache_put(&virtual_server.name, &session).await?;
                    session
                }
                None => return Ok(None),
            },
        };

        if session.virtual_server_id != virtual_server.id
            || session.expires_at <= self.clock.now()
            || !verify_secret(&token.secret, &session.hashed_secret)
        {
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Delete the session a cookie value names, if it resolves.
    pub async fn delete(
        &self,
        virtual_server: &VirtualServer,
        cookie: &str,
    ) -> Result<(), OidcError> {
        if let Some(session) = self.resolve(virtual_server, cookie).await? {
            self.sessions.delete(session.id).await?;
            self.kv
                .delete(&cache_key(&virtual_server.name, session.id))
                .await?;
            tracing::debug!(session_id = %session.id, "deleted browser session");
        }
        Ok(())
    }

    async fn cache_get(
        &self,
        virtual_server: &str,
        id: SessionId,
    ) -> Result<Option<Session>, OidcError> {
        let Some(bytes) = self.kv.get(&cache_key(virtual_server, id)).await? else {
            return Ok(None);
        };
        Ok(serde_json::from_slice(&bytes).ok())
    }

    async fn cache_put(&self, virtual_server: &str, session: &Session) -> Result<(), OidcError> {
        let bytes = serde_json::to_vec(session)
            .map_err(|e| OidcError::Internal(format!("session encode: {e}")))?;
        self.kv
            .set(&cache_key(virtual_server, session.id), bytes, SESSION_CACHE_TTL)
            .await?;
        Ok(())
    }
}

fn cache_key(virtual_server: &str, id: SessionId) -> String {
    format!("session:{virtual_server}:{id}")
}
