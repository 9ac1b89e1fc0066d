mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{body_json, post_form, TestEnv};
use jsonwebtoken::EncodingKey;
use keyline_auth::encode_token_with_kid;
use keyline_core::{CredentialId, UserId};
use keyline_db::{Credential, CredentialDetails, User};
use keyline_keys::{strategy_for, KeyAlgorithm, KeyPair};
use serde_json::json;

const GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const ACCESS_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";

/// Register a service user `svc-robot` with a fresh Ed25519 key.
async fn seed_service_user(env: &TestEnv) -> KeyPair {
    let pair = strategy_for(KeyAlgorithm::EdDsa)
        .generate(Utc::now())
        .unwrap();
    let user = env
        .state
        .users
        .create(User {
            id: UserId::new(),
            virtual_server_id: env.vs.id,
            username: "svc-robot".to_string(),
            email: "robot@example.com".to_string(),
            email_verified: true,
            display_name: "Robot".to_string(),
            service_user: true,
        })
        .await
        .unwrap();
    env.state
        .credentials
        .create(Credential {
            id: CredentialId::new(),
            user_id: user.id,
            details: CredentialDetails::ServiceUserKey {
                public_key_pem: pair.public_key_pem.clone(),
                kid: pair.kid.clone(),
                algorithm: KeyAlgorithm::EdDsa,
            },
        })
        .await
        .unwrap();
    pair
}

fn subject_token(pair: &KeyPair, claims: serde_json::Value) -> String {
    encode_token_with_kid(
        &claims,
        &EncodingKey::from_ed_pem(pair.private_key_pem.as_bytes()).unwrap(),
        jsonwebtoken::Algorithm::EdDSA,
        &pair.kid,
    )
    .unwrap()
}

fn self_issued_claims(scope: &str) -> serde_json::Value {
    let now = Utc::now();
    json!({
        "iss": "svc-robot",
        "sub": "svc-robot",
        "scope": scope,
        "iat": now.timestamp(),
        "exp": (now + Duration::minutes(5)).timestamp(),
    })
}

async fn exchange(env: &TestEnv, token: &str, audience: &str) -> axum::http::Response<axum::body::Body> {
    post_form(
        &env.oidc,
        "/acme/token",
        &[
            ("grant_type", GRANT),
            ("subject_token", token),
            ("subject_token_type", ACCESS_TOKEN_TYPE),
            ("audience", audience),
        ],
    )
    .await
}

#[tokio::test]
async fn a_signed_assertion_exchanges_into_a_short_lived_token() {
    let env = TestEnv::new().await;
    let pair = seed_service_user(&env).await;

    let token = subject_token(&pair, self_issued_claims("openid api"));
    let response = exchange(&env, &token, "webapp").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["issued_token_type"], ACCESS_TOKEN_TYPE);
    assert_eq!(body["expires_in"], 300);
    assert!(body["access_token"].is_string());
}

#[tokio::test]
async fn wrong_subject_token_type_is_rejected() {
    let env = TestEnv::new().await;
    let pair = seed_service_user(&env).await;
    let token = subject_token(&pair, self_issued_claims("openid"));

    let response = post_form(
        &env.oidc,
        "/acme/token",
        &[
            ("grant_type", GRANT),
            ("subject_token", &token),
            ("subject_token_type", "urn:ietf:params:oauth:token-type:id_token"),
            ("audience", "webapp"),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn assertion_must_be_self_issued() {
    let env = TestEnv::new().await;
    let pair = seed_service_user(&env).await;

    let mut claims = self_issued_claims("openid");
    claims["iss"] = json!("someone-else");
    let token = subject_token(&pair, claims);

    let response = exchange(&env, &token, "webapp").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn signature_must_match_the_registered_key() {
    let env = TestEnv::new().await;
    seed_service_user(&env).await;

    // Signed with a different key but claiming the registered kid.
    let registered = env
        .state
        .credentials
        .get_for_user(
            env.state
                .users
                .get_by_username(env.vs.id, "svc-robot")
                .await
                .unwrap()
                .unwrap()
                .id,
        )
        .await
        .unwrap();
    let kid = registered
        .iter()
        .find_map(|c| match &c.details {
            CredentialDetails::ServiceUserKey { kid, .. } => Some(kid.clone()),
            _ => None,
        })
        .unwrap();

    let imposter = strategy_for(KeyAlgorithm::EdDsa)
        .generate(Utc::now())
        .unwrap();
    let token = encode_token_with_kid(
        &self_issued_claims("openid"),
        &EncodingKey::from_ed_pem(imposter.private_key_pem.as_bytes()).unwrap(),
        jsonwebtoken::Algorithm::EdDSA,
        &kid,
    )
    .unwrap();

    let response = exchange(&env, &token, "webapp").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn scope_must_include_openid() {
    let env = TestEnv::new().await;
    let pair = seed_service_user(&env).await;
    let token = subject_token(&pair, self_issued_claims("api"));

    let response = exchange(&env, &token, "webapp").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_scope");
}

#[tokio::test]
async fn regular_users_cannot_exchange() {
    let env = TestEnv::new().await;
    let pair = seed_service_user(&env).await;

    let mut claims = self_issued_claims("openid");
    claims["iss"] = json!("alice");
    claims["sub"] = json!("alice");
    let token = subject_token(&pair, claims);

    let response = exchange(&env, &token, "webapp").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn unknown_audience_is_rejected() {
    let env = TestEnv::new().await;
    let pair = seed_service_user(&env).await;
    let token = subject_token(&pair, self_issued_claims("openid"));

    let response = exchange(&env, &token, "no-such-app").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_request");
}
