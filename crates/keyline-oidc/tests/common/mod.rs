//! Shared test harness: a fully in-memory identity provider with one
//! seeded tenant, one confidential client and one user.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use chrono::Utc;
use keyline_auth::PasswordHasher;
use keyline_core::{ApplicationId, CredentialId, ManualClock, UserId, VirtualServerId};
use keyline_db::{
    Application, ApplicationRepository, Credential, CredentialDetails, CredentialRepository,
    MemoryApplicationRepository, MemoryCredentialRepository, MemoryRoleAssignmentRepository,
    MemorySessionRepository, MemoryUserRepository, MemoryVirtualServerRepository, User,
    UserRepository, VirtualServer, VirtualServerRepository,
};
use keyline_keys::{KeyAlgorithm, KeyService, MemoryKeyStore};
use keyline_oidc::{login_router, oidc_router, OidcState, OidcStateConfig};
use keyline_store::MemoryKvStore;
use std::sync::Arc;
use tower::ServiceExt;

pub const EXTERNAL_URL: &str = "https://idp.example.com";
pub const FRONTEND_URL: &str = "https://login.example.com";
pub const REDIRECT_URI: &str = "https://app.example.com/callback";
pub const POST_LOGOUT_URI: &str = "https://app.example.com/";
pub const CLIENT_SECRET: &str = "s3cret";
pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestEnv {
    pub state: OidcState,
    pub oidc: Router,
    pub login: Router,
    pub clock: Arc<ManualClock>,
    pub vs: VirtualServer,
    pub app: Application,
    pub user: User,
}

impl TestEnv {
    /// Tenant `acme` with confidential client `webapp` and user `alice`,
    /// no extra login requirements.
    pub async fn new() -> Self {
        Self::with_virtual_server(|_| {}).await
    }

    /// Like [`TestEnv::new`] but lets the caller flip tenant flags.
    pub async fn with_virtual_server(configure: impl FnOnce(&mut VirtualServer)) -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        // Cheap hash parameters keep seeding fast; verification reads the
        // parameters back out of the hash string.
        let hasher = PasswordHasher::with_params(8, 1, 1).unwrap();

        let mut vs = VirtualServer {
            id: VirtualServerId::new(),
            name: "acme".to_string(),
            display_name: "Acme Corp".to_string(),
            signing_algorithm: KeyAlgorithm::EdDsa,
            enable_registration: false,
            require_email_verification: false,
            require_totp: false,
        };
        configure(&mut vs);

        let virtual_servers = Arc::new(MemoryVirtualServerRepository::new());
        let users = Arc::new(MemoryUserRepository::new());
        let applications = Arc::new(MemoryApplicationRepository::new());
        let credentials = Arc::new(MemoryCredentialRepository::new());
        let role_assignments = Arc::new(MemoryRoleAssignmentRepository::new());
        let sessions = Arc::new(MemorySessionRepository::new());

        let vs = virtual_servers.create(vs).await.unwrap();

        let app = applications
            .create(Application {
                id: ApplicationId::new(),
                virtual_server_id: vs.id,
                name: "webapp".to_string(),
                display_name: "Web App".to_string(),
                hashed_secret: Some(hasher.hash(CLIENT_SECRET).unwrap()),
                redirect_uris: vec![REDIRECT_URI.to_string()],
                post_logout_redirect_uris: vec![POST_LOGOUT_URI.to_string()],
            })
            .await
            .unwrap();

        let user = users
            .create(User {
                id: UserId::new(),
                virtual_server_id: vs.id,
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                email_verified: true,
                display_name: "Alice".to_string(),
                service_user: false,
            })
            .await
            .unwrap();
        credentials
            .create(Credential {
                id: CredentialId::new(),
                user_id: user.id,
                details: CredentialDetails::Password {
                    hash: hasher.hash(PASSWORD).unwrap(),
                    temporary: false,
                },
            })
            .await
            .unwrap();

        let key_service = Arc::new(KeyService::new(
            Arc::new(MemoryKeyStore::new()),
            clock.clone(),
        ));
        key_service
            .generate(vs.id, vs.signing_algorithm)
            .await
            .unwrap();

        let kv = Arc::new(MemoryKvStore::new(clock.clone()));
        let state = OidcState::new(OidcStateConfig {
            virtual_servers: virtual_servers.clone(),
            users: users.clone(),
            applications: applications.clone(),
            credentials: credentials.clone(),
            role_assignments,
            session_repository: sessions,
            key_service,
            kv,
            clock: clock.clone(),
            external_url: EXTERNAL_URL.to_string(),
            frontend_url: FRONTEND_URL.to_string(),
        });

        Self {
            oidc: oidc_router(state.clone()),
            login: login_router(state.clone()),
            state,
            clock,
            vs,
            app,
            user,
        }
    }

    /// Run the whole password ceremony and return the session cookie value.
    pub async fn establish_session(&self) -> String {
        let token = self.start_ceremony().await;

        let response = post_json(
            &self.login,
            &format!("/{token}/verify-password"),
            serde_json::json!({"username": "alice", "password": PASSWORD}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = post_json(&self.login, &format!("/{token}/finish"), serde_json::json!({}))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response)
    }

    /// Redeem a code flow on top of an established session and return the
    /// token response.
    pub async fn obtain_tokens(&self, cookie: &str) -> serde_json::Value {
        let response = get_with_cookie(&self.oidc, &self.authorize_uri(&[]), cookie).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let code = query_pairs(&location(&response))
            .into_iter()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v)
            .unwrap();

        use base64::Engine as _;
        let auth = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(format!("webapp:{CLIENT_SECRET}"))
        );
        let response = post_form_with_auth(
            &self.oidc,
            "/acme/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("redirect_uri", REDIRECT_URI),
            ],
            Some(&auth),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }

    /// Start an authorize flow without a session; returns the ceremony token.
    pub async fn start_ceremony(&self) -> String {
        let response = get(&self.oidc, &self.authorize_uri(&[])).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = location(&response);
        assert!(location.starts_with(&format!("{FRONTEND_URL}/login?token=")));
        location.split("token=").nth(1).unwrap().to_string()
    }

    /// A valid authorize URI for the seeded client, plus extra query pairs.
    pub fn authorize_uri(&self, extra: &[(&str, &str)]) -> String {
        let mut pairs = vec![
            ("client_id".to_string(), "webapp".to_string()),
            ("redirect_uri".to_string(), REDIRECT_URI.to_string()),
            ("response_type".to_string(), "code".to_string()),
            ("scope".to_string(), "openid profile email".to_string()),
        ];
        for (k, v) in extra {
            pairs.retain(|(key, _)| key != k);
            pairs.push(((*k).to_string(), (*v).to_string()));
        }
        let query = serde_urlencoded::to_string(&pairs).unwrap();
        format!("/acme/authorize?{query}")
    }
}

pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn get_with_cookie(router: &Router, uri: &str, cookie: &str) -> Response<Body> {
    router
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn post_json(
    router: &Router,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn post_form(
    router: &Router,
    uri: &str,
    pairs: &[(&str, &str)],
) -> Response<Body> {
    post_form_with_auth(router, uri, pairs, None).await
}

pub async fn post_form_with_auth(
    router: &Router,
    uri: &str,
    pairs: &[(&str, &str)],
    authorization: Option<&str>,
) -> Response<Body> {
    let body = serde_urlencoded::to_string(pairs).unwrap();
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(authorization) = authorization {
        builder = builder.header(header::AUTHORIZATION, authorization);
    }
    router
        .clone()
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// The `Location` header of a redirect response.
pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

/// Query pairs of a URL.
pub fn query_pairs(uri: &str) -> Vec<(String, String)> {
    let url = url::Url::parse(uri).unwrap();
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// The session cookie value from a `Set-Cookie` header.
pub fn session_cookie(response: &Response<Body>) -> String {
    let header = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("missing Set-Cookie")
        .to_str()
        .unwrap();
    let pair = header.split(';').next().unwrap();
    pair.to_string()
}
