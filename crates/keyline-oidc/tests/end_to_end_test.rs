//! The full happy path, as a browser and client would drive it: authorize,
//! login ceremony, code redemption, userinfo, refresh, logout.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::{
    body_json, get, get_with_cookie, location, post_form_with_auth, post_json, query_pairs,
    session_cookie, TestEnv, CLIENT_SECRET, PASSWORD, REDIRECT_URI,
};
use tower::ServiceExt;

#[tokio::test]
async fn full_code_flow_from_cold_browser_to_logout() {
    let env = TestEnv::new().await;
    let auth = format!("Basic {}", STANDARD.encode(format!("webapp:{CLIENT_SECRET}")));

    // 1. Cold browser hits authorize and is sent to the login frontend.
    let response = get(
        &env.oidc,
        &env.authorize_uri(&[("state", "s-1"), ("nonce", "n-1")]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let ceremony_token = location(&response)
        .split("token=")
        .nth(1)
        .unwrap()
        .to_string();

    // 2. The login frontend walks the ceremony.
    let response = get(&env.login, &format!("/{ceremony_token}")).await;
    assert_eq!(body_json(response).await["step"], "password_verification");

    let response = post_json(
        &env.login,
        &format!("/{ceremony_token}/verify-password"),
        serde_json::json!({"username": "alice", "password": PASSWORD}),
    )
    .await;
    assert_eq!(body_json(response).await["step"], "finish");

    let response = post_json(
        &env.login,
        &format!("/{ceremony_token}/finish"),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&response);
    let redirect_url = location(&response);

    // 3. The browser replays the original authorize URL with the cookie.
    let path = redirect_url.strip_prefix(&format!("{}/oidc", common::EXTERNAL_URL)).unwrap();
    let response = get_with_cookie(&env.oidc, path, &cookie).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response);
    assert!(target.starts_with(REDIRECT_URI));
    let pairs = query_pairs(&target);
    let code = pairs
        .iter()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.clone())
        .unwrap();
    assert!(pairs.iter().any(|(k, v)| k == "state" && v == "s-1"));

    // 4. The client redeems the code.
    let response = post_form_with_auth(
        &env.oidc,
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
    let tokens = body_json(response).await;
    let access_token = tokens["access_token"].as_str().unwrap().to_string();
    let refresh_token = tokens["refresh_token"].as_str().unwrap().to_string();

    // 5. The access token works against userinfo.
    let response = env
        .oidc
        .clone()
        .oneshot(
            Request::builder()
                .uri("/acme/userinfo")
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], "alice@example.com");

    // 6. Refresh rotates and keeps working.
    let response = post_form_with_auth(
        &env.oidc,
        "/acme/token",
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", &refresh_token),
        ],
        Some(&auth),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed = body_json(response).await;
    assert_ne!(refreshed["refresh_token"], tokens["refresh_token"]);

    // 7. Logout kills the session.
    let id_token = tokens["id_token"].as_str().unwrap();
    let logout_query =
        serde_urlencoded::to_string([("id_token_hint", id_token)]).unwrap();
    let response = env
        .oidc
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/acme/end_session?{logout_query}"))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = get_with_cookie(&env.oidc, &env.authorize_uri(&[]), &cookie).await;
    assert!(location(&response).starts_with(common::FRONTEND_URL));
}
