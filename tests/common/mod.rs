// ABOUTME: Shared test harness: in-memory backends, seeded clients and users
// ABOUTME: Builds the full service graph the way the server bootstrap does
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use latchkey::cache::memory::InMemoryCache;
use latchkey::cache::{Cache, CacheConfig};
use latchkey::config::{Environment, LogLevel, ServerConfig};
use latchkey::database::memory::MemoryStore;
use latchkey::database::{Database, GrantType, OAuthClient, User};
use latchkey::keys::SigningKeys;
use latchkey::services::Services;
use latchkey::tokens::generate_session_token;

pub const JWT_SEED: &[u8] = b"0123456789abcdef0123456789abcdef";
pub const USER_PASSWORD: &str = "correct-horse-battery";

/// PKCE pair from RFC 7636 Appendix B
pub const PKCE_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
pub const PKCE_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

pub struct TestServer {
    pub services: Services,
    pub store: MemoryStore,
    pub cache: Cache,
    pub keys: Arc<SigningKeys>,
    pub config: Arc<ServerConfig>,
}

pub fn test_server_config() -> ServerConfig {
    ServerConfig {
        port: 8080,
        trusted_proxies: Vec::new(),
        frontend_url: "http://localhost:3000".into(),
        salt_rounds: 4,
        domain: "localhost".into(),
        environment: Environment::Development,
        session_cookie_name: "session_token".into(),
        database_url: "memory:".into(),
        migrations_path: "migrations".into(),
        valkey_url: "memory:".into(),
        valkey_username: None,
        valkey_password: None,
        valkey_client_name: None,
        base_url: String::new(),
        session_token_expiry_hours: 24,
        jwt_secret: JWT_SEED.to_vec(),
        log_level: LogLevel::Info,
        delete_code_on_pkce_failure: false,
    }
}

pub fn setup() -> TestServer {
    setup_with_config(test_server_config())
}

pub fn setup_with_config(config: ServerConfig) -> TestServer {
    let config = Arc::new(config);
    let store = MemoryStore::new();
    let database = Arc::new(Database::Memory(store.clone()));

    let cache_config = CacheConfig {
        enable_background_cleanup: false,
        ..CacheConfig::default()
    };
    let cache = Cache::Memory(InMemoryCache::new(&cache_config));

    let keys = Arc::new(SigningKeys::from_seed(&config.jwt_secret).unwrap());
    let services = Services::new(config.clone(), database, Arc::new(cache.clone()), keys.clone());

    TestServer {
        services,
        store,
        cache,
        keys,
        config,
    }
}

/// Public PKCE client registered for the code and refresh grants
pub fn public_client() -> OAuthClient {
    OAuthClient {
        client_id: "c1".into(),
        client_secret_hash: None,
        is_public: true,
        name: "Test App".into(),
        redirect_uris: vec!["https://app/cb".into()],
        scopes: vec!["api:read".into()],
        grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
        access_token_valid_duration: 3600,
        refresh_token_valid_duration: 86400,
        authorization_code_valid_duration: 600,
    }
}

/// Confidential client registered for client_credentials only
pub fn confidential_client(secret: &str) -> OAuthClient {
    OAuthClient {
        client_id: "c2".into(),
        client_secret_hash: Some(hex::encode(Sha256::digest(secret.as_bytes()))),
        is_public: false,
        name: "Service Client".into(),
        redirect_uris: vec!["https://svc/cb".into()],
        scopes: vec!["svc:ping".into()],
        grant_types: vec![GrantType::ClientCredentials],
        access_token_valid_duration: 3600,
        refresh_token_valid_duration: 86400,
        authorization_code_valid_duration: 600,
    }
}

/// Seed a user with the given derived scopes; the password is
/// [`USER_PASSWORD`]
pub async fn seed_user(store: &MemoryStore, email: &str, scopes: &[&str]) -> User {
    let user = User {
        id: Uuid::new_v4(),
        email: email.into(),
        password_hash: bcrypt::hash(USER_PASSWORD, 4).unwrap(),
        first_name: None,
        last_name: None,
        created_at: Utc::now(),
    };
    store
        .seed_user(user.clone(), scopes.iter().map(|s| (*s).to_owned()).collect())
        .await;
    user
}

/// A valid session cookie for the given user
pub fn session_cookie(ts: &TestServer, user_id: &str) -> String {
    let token = generate_session_token(
        &ts.config.issuer(),
        &ts.keys,
        user_id,
        ts.config.session_token_expiry_hours,
        &Uuid::new_v4().to_string(),
    )
    .unwrap();
    format!("session_token={token}")
}

/// Extract a query parameter from a Location header value
pub fn location_param(location: &str, name: &str) -> Option<String> {
    let url = url::Url::parse(location).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
