// ABOUTME: Authorization-server metadata (RFC 8414) and JWKS (RFC 7517) documents
// ABOUTME: Metadata endpoint URLs derive from the issuer; the JWK is the raw Ed25519 public key
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ServerConfig;
use crate::database::{Database, GrantType, StoreProvider};
use crate::keys::SigningKeys;

/// OAuth 2.0 Authorization Server Metadata (RFC 8414)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Metadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub subject_types_supported: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub scopes_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub code_challenge_methods_supported: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub response_modes_supported: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub token_endpoint_auth_signing_alg_values_supported: Vec<String>,
}

/// JSON Web Key Set (RFC 7517)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// A single JSON Web Key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use")]
    pub public_key_use: String,
    pub alg: String,
    pub crv: String,
    /// base64url-no-pad of the raw public key bytes
    pub x: String,
}

/// Discovery document service
pub struct WellKnownService {
    config: Arc<ServerConfig>,
    database: Arc<Database>,
    keys: Arc<SigningKeys>,
}

impl WellKnownService {
    /// Create a new service instance
    #[must_use]
    pub fn new(config: Arc<ServerConfig>, database: Arc<Database>, keys: Arc<SigningKeys>) -> Self {
        Self {
            config,
            database,
            keys,
        }
    }

    /// Build the RFC 8414 metadata document. The supported scope list comes
    /// from the store and degrades to empty when the lookup fails.
    pub async fn oauth2_metadata(&self) -> OAuth2Metadata {
        let issuer = self.config.issuer();

        let scopes_supported = match self.database.list_scopes().await {
            Ok(scopes) => scopes,
            Err(e) => {
                warn!("failed to retrieve scopes from the store: {e}");
                Vec::new()
            }
        };

        OAuth2Metadata {
            authorization_endpoint: format!("{issuer}/oauth/authorize"),
            token_endpoint: format!("{issuer}/oauth/token"),
            jwks_uri: format!("{issuer}/.well-known/jwks.json"),
            issuer,
            response_types_supported: vec!["code".to_owned()],
            grant_types_supported: vec![
                GrantType::AuthorizationCode.as_str().to_owned(),
                GrantType::ClientCredentials.as_str().to_owned(),
                GrantType::RefreshToken.as_str().to_owned(),
            ],
            subject_types_supported: vec!["public".to_owned()],
            scopes_supported,
            token_endpoint_auth_methods_supported: vec![
                "client_secret_basic".to_owned(),
                "client_secret_post".to_owned(),
                // public clients
                "none".to_owned(),
            ],
            code_challenge_methods_supported: vec!["S256".to_owned()],
            response_modes_supported: vec!["query".to_owned(), "fragment".to_owned()],
            token_endpoint_auth_signing_alg_values_supported: vec!["EdDSA".to_owned()],
        }
    }

    /// Build the JWKS containing the single Ed25519 verification key
    #[must_use]
    pub fn jwks(&self) -> JwkSet {
        let x = general_purpose::URL_SAFE_NO_PAD.encode(self.keys.public_key_bytes());

        JwkSet {
            keys: vec![Jwk {
                kty: "OKP".to_owned(),
                public_key_use: "sig".to_owned(),
                alg: "EdDSA".to_owned(),
                crv: "Ed25519".to_owned(),
                x,
            }],
        }
    }
}
