// ABOUTME: Relational store abstraction for users, scopes and registered OAuth clients
// ABOUTME: Read-only query interface plus user creation, with pluggable backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use self::memory::MemoryStore;
use self::postgres::PostgresStore;

/// Store failures. A unique-constraint violation on user email is the one
/// case callers must be able to distinguish from generic failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violation")]
    UniqueViolation,
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::UniqueViolation;
            }
        }
        Self::Database(err.to_string())
    }
}

/// A registered end user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// OAuth2 grant types a client may be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    ClientCredentials,
    RefreshToken,
}

impl GrantType {
    /// Wire representation of the grant type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
        }
    }

    /// Parse a wire grant type; unknown values are None
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "authorization_code" => Some(Self::AuthorizationCode),
            "client_credentials" => Some(Self::ClientCredentials),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }
}

/// A registered OAuth client application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClient {
    /// Opaque unique client identifier
    pub client_id: String,
    /// SHA-256 hex of the client secret; absent for public clients
    pub client_secret_hash: Option<String>,
    /// Public clients cannot keep a secret and must use PKCE
    pub is_public: bool,
    /// Display name, used as the token audience
    pub name: String,
    /// Registered redirect URIs, ordered, non-empty
    pub redirect_uris: Vec<String>,
    /// Scopes the client may request
    pub scopes: Vec<String>,
    /// Grant types the client is registered for
    pub grant_types: Vec<GrantType>,
    /// Access-token lifetime in seconds (300..=86400)
    pub access_token_valid_duration: i64,
    /// Refresh-token lifetime in seconds (3600..=604800)
    pub refresh_token_valid_duration: i64,
    /// Authorization-code lifetime in seconds (60..=1800, default 600)
    pub authorization_code_valid_duration: i64,
}

impl OAuthClient {
    /// Whether the client is registered for the given grant type
    #[must_use]
    pub fn allows_grant(&self, grant: GrantType) -> bool {
        self.grant_types.contains(&grant)
    }
}

/// Query interface over the relational store. The core treats the store as an
/// external collaborator: reads everywhere, a single insert for registration.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    /// Insert a new user
    async fn create_user(&self, new_user: &NewUser) -> Result<User, StoreError>;

    /// Look up a user by email
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Look up a user together with the scope set derived from their roles
    async fn get_user_with_scopes(&self, id: Uuid)
        -> Result<Option<(User, Vec<String>)>, StoreError>;

    /// Look up a registered OAuth client
    async fn get_oauth_client(&self, client_id: &str) -> Result<Option<OAuthClient>, StoreError>;

    /// All scope names known to the server, for the metadata document
    async fn list_scopes(&self) -> Result<Vec<String>, StoreError>;
}

/// Unified store handle dispatching to the configured backend
#[derive(Clone)]
pub enum Database {
    Postgres(PostgresStore),
    Memory(MemoryStore),
}

impl Database {
    /// Connect to the store named by the URL and run pending migrations.
    /// `memory:` selects the in-memory backend used by tests.
    ///
    /// # Errors
    /// Returns an error if the connection or a migration fails
    pub async fn connect(database_url: &str, migrations_path: &str) -> Result<Self, StoreError> {
        if database_url.starts_with("memory") {
            tracing::info!("initializing in-memory store");
            Ok(Self::Memory(MemoryStore::new()))
        } else {
            Ok(Self::Postgres(
                PostgresStore::connect(database_url, migrations_path).await?,
            ))
        }
    }
}

#[async_trait]
impl StoreProvider for Database {
    async fn create_user(&self, new_user: &NewUser) -> Result<User, StoreError> {
        match self {
            Self::Postgres(store) => store.create_user(new_user).await,
            Self::Memory(store) => store.create_user(new_user).await,
        }
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        match self {
            Self::Postgres(store) => store.get_user_by_email(email).await,
            Self::Memory(store) => store.get_user_by_email(email).await,
        }
    }

    async fn get_user_with_scopes(
        &self,
        id: Uuid,
    ) -> Result<Option<(User, Vec<String>)>, StoreError> {
        match self {
            Self::Postgres(store) => store.get_user_with_scopes(id).await,
            Self::Memory(store) => store.get_user_with_scopes(id).await,
        }
    }

    async fn get_oauth_client(&self, client_id: &str) -> Result<Option<OAuthClient>, StoreError> {
        match self {
            Self::Postgres(store) => store.get_oauth_client(client_id).await,
            Self::Memory(store) => store.get_oauth_client(client_id).await,
        }
    }

    async fn list_scopes(&self) -> Result<Vec<String>, StoreError> {
        match self {
            Self::Postgres(store) => store.list_scopes().await,
            Self::Memory(store) => store.list_scopes().await,
        }
    }
}
