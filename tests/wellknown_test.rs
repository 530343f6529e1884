// ABOUTME: Discovery document tests: RFC 8414 metadata, the OIDC alias and the JWKS
// ABOUTME: Verifies the JWKS x value round-trips to the derived Ed25519 public key
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

mod common;

use base64::{engine::general_purpose, Engine as _};
use common::setup;
use latchkey::routes::routes;

#[tokio::test]
async fn metadata_document_lists_capabilities() {
    let ts = setup();
    ts.store
        .seed_scopes(vec!["api:read".into(), "api:write".into()])
        .await;
    let filter = routes(&ts.services);

    let res = warp::test::request()
        .method("GET")
        .path("/.well-known/oauth-authorization-server")
        .reply(&filter)
        .await;

    assert_eq!(res.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body["issuer"], "http://localhost:8080");
    assert_eq!(
        body["authorization_endpoint"],
        "http://localhost:8080/oauth/authorize"
    );
    assert_eq!(body["token_endpoint"], "http://localhost:8080/oauth/token");
    assert_eq!(
        body["jwks_uri"],
        "http://localhost:8080/.well-known/jwks.json"
    );
    assert_eq!(body["response_types_supported"], serde_json::json!(["code"]));
    assert_eq!(
        body["grant_types_supported"],
        serde_json::json!(["authorization_code", "client_credentials", "refresh_token"])
    );
    assert_eq!(body["subject_types_supported"], serde_json::json!(["public"]));
    assert_eq!(
        body["scopes_supported"],
        serde_json::json!(["api:read", "api:write"])
    );
    assert_eq!(
        body["token_endpoint_auth_methods_supported"],
        serde_json::json!(["client_secret_basic", "client_secret_post", "none"])
    );
    assert_eq!(
        body["code_challenge_methods_supported"],
        serde_json::json!(["S256"])
    );
    assert_eq!(
        body["response_modes_supported"],
        serde_json::json!(["query", "fragment"])
    );
    assert_eq!(
        body["token_endpoint_auth_signing_alg_values_supported"],
        serde_json::json!(["EdDSA"])
    );
}

#[tokio::test]
async fn openid_configuration_is_an_alias() {
    let ts = setup();
    let filter = routes(&ts.services);

    let oauth = warp::test::request()
        .method("GET")
        .path("/.well-known/oauth-authorization-server")
        .reply(&filter)
        .await;
    let openid = warp::test::request()
        .method("GET")
        .path("/.well-known/openid-configuration")
        .reply(&filter)
        .await;

    assert_eq!(oauth.status(), 200);
    assert_eq!(openid.status(), 200);
    assert_eq!(oauth.body(), openid.body());
}

#[tokio::test]
async fn metadata_tolerates_an_empty_scope_list() {
    let ts = setup();
    let filter = routes(&ts.services);

    let res = warp::test::request()
        .method("GET")
        .path("/.well-known/oauth-authorization-server")
        .reply(&filter)
        .await;

    assert_eq!(res.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
    assert!(body.get("scopes_supported").is_none());
}

#[tokio::test]
async fn jwks_publishes_the_raw_ed25519_public_key() {
    let ts = setup();
    let filter = routes(&ts.services);

    let res = warp::test::request()
        .method("GET")
        .path("/.well-known/jwks.json")
        .reply(&filter)
        .await;

    assert_eq!(res.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
    let keys = body["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);

    let jwk = &keys[0];
    assert_eq!(jwk["kty"], "OKP");
    assert_eq!(jwk["use"], "sig");
    assert_eq!(jwk["alg"], "EdDSA");
    assert_eq!(jwk["crv"], "Ed25519");

    let x = general_purpose::URL_SAFE_NO_PAD
        .decode(jwk["x"].as_str().unwrap())
        .unwrap();
    assert_eq!(x.as_slice(), ts.keys.public_key_bytes());
}
