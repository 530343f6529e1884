// ABOUTME: User registration, login and logout behind the browser-facing auth endpoints
// ABOUTME: bcrypt password handling on the blocking pool, session JWT minting, revocation on logout
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::cache::Cache;
use crate::config::ServerConfig;
use crate::database::{Database, NewUser, StoreError, StoreProvider};
use crate::errors::ApiError;
use crate::keys::SigningKeys;
use crate::middleware::session::{extract_cookie, revoke_session};
use crate::tokens::{generate_session_token, validate_jwt, TokenType};

/// Registration request payload
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    /// Minimum 8 characters
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Registration response
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Login request payload
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response; the same token is also set as the session cookie
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub session_token: String,
    #[serde(rename = "expiresIn")]
    pub expires_in: i64,
}

/// Authentication service
pub struct AuthService {
    config: Arc<ServerConfig>,
    database: Arc<Database>,
    cache: Arc<Cache>,
    keys: Arc<SigningKeys>,
}

impl AuthService {
    /// Create a new service instance
    #[must_use]
    pub fn new(
        config: Arc<ServerConfig>,
        database: Arc<Database>,
        cache: Arc<Cache>,
        keys: Arc<SigningKeys>,
    ) -> Self {
        Self {
            config,
            database,
            cache,
            keys,
        }
    }

    /// Create a new user account.
    ///
    /// # Errors
    /// 400 with per-field messages on validation failure, 409
    /// `ALREADY_EXISTS` when the email is taken, 500 otherwise
    pub async fn register(&self, payload: RegisterRequest) -> Result<RegisterResponse, ApiError> {
        let mut violations = Vec::new();
        if !is_valid_email(&payload.email) {
            violations.push("email must be a valid email address".to_owned());
        }
        if payload.password.len() < 8 {
            violations.push("password must be at least 8 characters".to_owned());
        }
        if !violations.is_empty() {
            return Err(ApiError::validation(violations));
        }

        let password_hash = hash_password(payload.password, self.config.salt_rounds).await?;
        debug!("successfully hashed password");

        let new_user = NewUser {
            email: payload.email,
            password_hash,
            first_name: payload.first_name,
            last_name: payload.last_name,
        };

        let user = match self.database.create_user(&new_user).await {
            Ok(user) => user,
            Err(StoreError::UniqueViolation) => {
                warn!("attempted to create user with existing email");
                return Err(ApiError::conflict("Email already in use"));
            }
            Err(e) => {
                error!("failed to create user: {e}");
                return Err(ApiError::internal("Failed to create user"));
            }
        };
        tracing::info!("user with id {} created", user.id);

        Ok(RegisterResponse {
            id: user.id.to_string(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        })
    }

    /// Authenticate a user and mint a session token.
    ///
    /// Unknown email and wrong password answer identically so the response
    /// does not reveal whether an account exists.
    ///
    /// # Errors
    /// 401 `UNAUTHORIZED` on bad credentials, 500 on storage or signing
    /// failures
    pub async fn login(&self, payload: LoginRequest) -> Result<LoginResponse, ApiError> {
        let user = match self.database.get_user_by_email(&payload.email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!("attempted login with nonexistent user");
                return Err(ApiError::unauthorized("Invalid email or password"));
            }
            Err(e) => {
                error!("failed to get user by email: {e}");
                return Err(ApiError::internal("Failed to get user by email"));
            }
        };

        if !verify_password(payload.password, user.password_hash.clone()).await {
            warn!("invalid password for user {}", user.id);
            return Err(ApiError::unauthorized("Invalid email or password"));
        }
        debug!("password for user {} is valid", user.id);

        let jti = Uuid::new_v4().to_string();
        let session_token = generate_session_token(
            &self.config.issuer(),
            &self.keys,
            &user.id.to_string(),
            self.config.session_token_expiry_hours,
            &jti,
        )
        .map_err(|e| {
            error!("failed to generate session token: {e}");
            ApiError::internal("Failed to generate session token")
        })?;
        debug!("generated session token for user {}", user.id);

        Ok(LoginResponse {
            session_token,
            expires_in: self.config.session_token_expiry_secs(),
        })
    }

    /// Invalidate the presented session token, when there is one.
    ///
    /// Logout never fails toward the client: the cookie is cleared by the
    /// route layer regardless, and a missing or invalid token simply means
    /// there is nothing to revoke.
    pub async fn logout(&self, cookie_header: Option<&str>) {
        let Some(token) =
            cookie_header.and_then(|h| extract_cookie(h, &self.config.session_cookie_name))
        else {
            return;
        };

        let Ok(claims) = validate_jwt(&self.keys, &token) else {
            return;
        };
        if claims.token_type != Some(TokenType::Session) {
            return;
        }

        if let Some(jti) = &claims.jti {
            let remaining = claims.exp - chrono::Utc::now().timestamp();
            if remaining > 0 {
                let ttl = Duration::from_secs(u64::try_from(remaining).unwrap_or(0));
                if let Err(e) = revoke_session(&self.cache, jti, ttl).await {
                    error!("failed to record session revocation: {e}");
                } else {
                    debug!("revoked session {jti}");
                }
            }
        }
    }
}

/// bcrypt-hash a password on the blocking pool
async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| {
            error!("password hashing task failed: {e}");
            ApiError::internal("Failed to hash password")
        })?
        .map_err(|e| {
            error!("failed to hash password: {e}");
            ApiError::internal("Failed to hash password")
        })
}

/// bcrypt-verify a password on the blocking pool
async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

/// Pragmatic email format check: one `@`, non-empty local part, dotted domain
fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !tld.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_addresses() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.example.co"));
        assert!(is_valid_email("user+tag@example.io"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("userexample.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("user@@example.com"));
        assert!(!is_valid_email("us er@example.com"));
    }
}
