mod common;

use axum::http::StatusCode;
use common::{body_json, get, TestEnv, EXTERNAL_URL};

#[tokio::test]
async fn discovery_document_points_at_the_tenant_issuer() {
    let env = TestEnv::new().await;

    let response = get(&env.oidc, "/acme/.well-known/openid-configuration").await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;

    let issuer = format!("{EXTERNAL_URL}/oidc/acme");
    assert_eq!(doc["issuer"], issuer);
    assert_eq!(doc["authorization_endpoint"], format!("{issuer}/authorize"));
    assert_eq!(doc["token_endpoint"], format!("{issuer}/token"));
    assert_eq!(doc["userinfo_endpoint"], format!("{issuer}/userinfo"));
    assert_eq!(doc["jwks_uri"], format!("{issuer}/.well-known/jwks.json"));
    assert_eq!(doc["end_session_endpoint"], format!("{issuer}/end_session"));
    assert_eq!(doc["response_types_supported"], serde_json::json!(["code"]));
    assert_eq!(
        doc["code_challenge_methods_supported"],
        serde_json::json!(["S256"])
    );
    assert_eq!(
        doc["id_token_signing_alg_values_supported"],
        serde_json::json!(["EdDSA"])
    );
}

#[tokio::test]
async fn jwks_serves_the_tenant_public_keys() {
    let env = TestEnv::new().await;

    let response = get(&env.oidc, "/acme/.well-known/jwks.json").await;
    assert_eq!(response.status(), StatusCode::OK);
    let jwks = body_json(response).await;

    let keys = jwks["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["kty"], "OKP");
    assert_eq!(keys[0]["alg"], "EdDSA");
    assert_eq!(keys[0]["use"], "sig");
    assert!(keys[0]["kid"].as_str().unwrap().len() > 10);
    assert!(keys[0]["x"].is_string());
}

#[tokio::test]
async fn unknown_virtual_server_is_a_404() {
    let env = TestEnv::new().await;

    for uri in [
        "/ghost/.well-known/openid-configuration",
        "/ghost/.well-known/jwks.json",
    ] {
        let response = get(&env.oidc, uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
