mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{location, TestEnv, POST_LOGOUT_URI, REDIRECT_URI};
use tower::ServiceExt;

async fn end_session(
    env: &TestEnv,
    cookie: Option<&str>,
    query: &str,
) -> axum::http::Response<Body> {
    let uri = if query.is_empty() {
        "/acme/end_session".to_string()
    } else {
        format!("/acme/end_session?{query}")
    };
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    env.oidc
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn logout_revokes_the_session_and_clears_the_cookie() {
    let env = TestEnv::new().await;
    let cookie = env.establish_session().await;
    let id_token = env.obtain_tokens(&cookie).await["id_token"]
        .as_str()
        .unwrap()
        .to_string();

    let query = serde_urlencoded::to_string([("id_token_hint", id_token.as_str())]).unwrap();
    let response = end_session(&env, Some(&cookie), &query).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    // No post-logout URI requested: the client's first redirect URI wins.
    assert_eq!(location(&response), REDIRECT_URI);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with("keylineSession_acme=;"));
    assert!(set_cookie.contains("Max-Age=0"));

    // The revoked session no longer authorizes silently.
    let response = common::get_with_cookie(
        &env.oidc,
        &env.authorize_uri(&[("prompt", "none")]),
        &cookie,
    )
    .await;
    let target = location(&response);
    assert!(target.contains("error=login_required"));
}

#[tokio::test]
async fn registered_post_logout_uri_is_honored_with_state() {
    let env = TestEnv::new().await;
    let cookie = env.establish_session().await;
    let id_token = env.obtain_tokens(&cookie).await["id_token"]
        .as_str()
        .unwrap()
        .to_string();

    let query = serde_urlencoded::to_string([
        ("id_token_hint", id_token.as_str()),
        ("post_logout_redirect_uri", POST_LOGOUT_URI),
        ("state", "bye"),
    ])
    .unwrap();
    let response = end_session(&env, Some(&cookie), &query).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let target = location(&response);
    assert!(target.starts_with(POST_LOGOUT_URI));
    assert!(target.contains("state=bye"));
}

#[tokio::test]
async fn unregistered_post_logout_uri_is_rejected() {
    let env = TestEnv::new().await;
    let cookie = env.establish_session().await;
    let id_token = env.obtain_tokens(&cookie).await["id_token"]
        .as_str()
        .unwrap()
        .to_string();

    let query = serde_urlencoded::to_string([
        ("id_token_hint", id_token.as_str()),
        ("post_logout_redirect_uri", "https://evil.example.com/"),
    ])
    .unwrap();

    let response = end_session(&env, Some(&cookie), &query).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_id_token_hint_is_rejected() {
    let env = TestEnv::new().await;
    let response = end_session(&env, None, "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn id_token_hint_with_a_bad_signature_is_rejected() {
    let env = TestEnv::new().await;
    let cookie = env.establish_session().await;
    let id_token = env.obtain_tokens(&cookie).await["id_token"]
        .as_str()
        .unwrap()
        .to_string();

    // Same header and payload, signature swapped out.
    let mut parts: Vec<&str> = id_token.split('.').collect();
    assert_eq!(parts.len(), 3);
    let forged_signature = "A".repeat(parts[2].len());
    parts[2] = &forged_signature;
    let forged = parts.join(".");

    let query = serde_urlencoded::to_string([("id_token_hint", forged.as_str())]).unwrap();
    let response = end_session(&env, Some(&cookie), &query).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The session survives a rejected logout.
    let response =
        common::get_with_cookie(&env.oidc, &env.authorize_uri(&[]), &cookie).await;
    assert!(location(&response).starts_with(REDIRECT_URI));
}

#[tokio::test]
async fn logout_without_a_session_still_redirects() {
    let env = TestEnv::new().await;
    let cookie = env.establish_session().await;
    let id_token = env.obtain_tokens(&cookie).await["id_token"]
        .as_str()
        .unwrap()
        .to_string();

    let query = serde_urlencoded::to_string([("id_token_hint", id_token.as_str())]).unwrap();
    let response = end_session(&env, None, &query).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), REDIRECT_URI);
}
