mod common;

use axum::http::StatusCode;
use common::{
    get, get_with_cookie, location, post_form, query_pairs, TestEnv, FRONTEND_URL, REDIRECT_URI,
};

fn query_value(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}

#[tokio::test]
async fn unknown_client_fails_hard_without_redirecting() {
    let env = TestEnv::new().await;
    let response = get(&env.oidc, &env.authorize_uri(&[("client_id", "ghost")])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unregistered_redirect_uri_fails_hard() {
    let env = TestEnv::new().await;
    let response = get(
        &env.oidc,
        &env.authorize_uri(&[("redirect_uri", "https://evil.example.com/cb")]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_response_type_redirects_the_error_back() {
    let env = TestEnv::new().await;
    let response = get(
        &env.oidc,
        &env.authorize_uri(&[("response_type", "token"), ("state", "abc")]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let target = location(&response);
    assert!(target.starts_with(REDIRECT_URI));
    let pairs = query_pairs(&target);
    assert_eq!(
        query_value(&pairs, "error").as_deref(),
        Some("unsupported_response_type")
    );
    assert_eq!(query_value(&pairs, "state").as_deref(), Some("abc"));
}

#[tokio::test]
async fn scope_without_openid_is_rejected() {
    let env = TestEnv::new().await;
    let response = get(&env.oidc, &env.authorize_uri(&[("scope", "profile email")])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn plain_code_challenge_method_redirects_the_error_back() {
    let env = TestEnv::new().await;
    let response = get(
        &env.oidc,
        &env.authorize_uri(&[
            ("code_challenge", "abc"),
            ("code_challenge_method", "plain"),
        ]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let pairs = query_pairs(&location(&response));
    assert_eq!(
        query_value(&pairs, "error").as_deref(),
        Some("invalid_request")
    );
}

#[tokio::test]
async fn without_a_session_the_browser_goes_to_the_login_frontend() {
    let env = TestEnv::new().await;
    let response = get(&env.oidc, &env.authorize_uri(&[])).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with(&format!("{FRONTEND_URL}/login?token=")));
}

#[tokio::test]
async fn a_form_encoded_post_is_treated_like_a_get() {
    let env = TestEnv::new().await;
    let response = post_form(
        &env.oidc,
        "/acme/authorize",
        &[
            ("client_id", "webapp"),
            ("redirect_uri", REDIRECT_URI),
            ("response_type", "code"),
            ("scope", "openid"),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with(&format!("{FRONTEND_URL}/login?token=")));
}

#[tokio::test]
async fn a_form_encoded_post_with_a_bad_redirect_uri_fails_hard() {
    let env = TestEnv::new().await;
    let response = post_form(
        &env.oidc,
        "/acme/authorize",
        &[
            ("client_id", "webapp"),
            ("redirect_uri", "https://evil.example.com/cb"),
            ("response_type", "code"),
            ("scope", "openid"),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn prompt_none_without_a_session_is_login_required() {
    let env = TestEnv::new().await;
    let response = get(&env.oidc, &env.authorize_uri(&[("prompt", "none")])).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let target = location(&response);
    assert!(target.starts_with(REDIRECT_URI));
    let pairs = query_pairs(&target);
    assert_eq!(
        query_value(&pairs, "error").as_deref(),
        Some("login_required")
    );
}

#[tokio::test]
async fn a_session_cookie_short_circuits_to_a_code() {
    let env = TestEnv::new().await;
    let cookie = env.establish_session().await;

    let response = get_with_cookie(
        &env.oidc,
        &env.authorize_uri(&[("state", "xyz"), ("nonce", "n-123")]),
        &cookie,
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let target = location(&response);
    assert!(target.starts_with(REDIRECT_URI));
    let pairs = query_pairs(&target);
    assert!(query_value(&pairs, "code").is_some());
    assert_eq!(query_value(&pairs, "state").as_deref(), Some("xyz"));
}

#[tokio::test]
async fn sessions_do_not_cross_virtual_servers() {
    let env = TestEnv::new().await;
    let cookie = env.establish_session().await;

    // A cookie under another tenant's name is ignored.
    let foreign = cookie.replace("keylineSession_acme", "keylineSession_other");
    let response = get_with_cookie(&env.oidc, &env.authorize_uri(&[]), &foreign).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with(FRONTEND_URL));
}

#[tokio::test]
async fn request_object_claims_override_query_parameters() {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let env = TestEnv::new().await;

    // Signed with a key the server never checks; only the payload matters.
    let claims = serde_json::json!({"state": "from-jwt", "response_type": "token"});
    let jwt = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"anything"),
    )
    .unwrap();

    let response = get(&env.oidc, &env.authorize_uri(&[("request", &jwt)])).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // response_type=token from the JWT overrides the valid query value,
    // and the error echoes the JWT's state.
    let pairs = query_pairs(&location(&response));
    assert_eq!(
        query_value(&pairs, "error").as_deref(),
        Some("unsupported_response_type")
    );
    assert_eq!(query_value(&pairs, "state").as_deref(), Some("from-jwt"));
}
