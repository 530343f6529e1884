// ABOUTME: Session-token guard for browser-facing routes
// ABOUTME: Validates the session cookie and builds the frontend login redirect on failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{Cache, CacheProvider, ReadOptions};
use crate::config::ServerConfig;
use crate::keys::SigningKeys;
use crate::tokens::{validate_jwt, TokenClaims, TokenType};

/// Cache key prefix for revoked session ids
pub const REVOKED_SESSION_PREFIX: &str = "revoked-session:";

/// Why a request failed the session guard. The response is always the same
/// login redirect; the variants exist for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardError {
    MissingToken,
    InvalidToken,
}

/// Guard protecting browser-facing routes with the session-token cookie.
///
/// Failures never leak detail: the caller answers every guard error with a
/// 302 to the frontend login page carrying the original URL in `next`.
pub struct SessionGuard {
    config: Arc<ServerConfig>,
    keys: Arc<SigningKeys>,
    cache: Arc<Cache>,
}

impl SessionGuard {
    /// Create a new guard
    #[must_use]
    pub fn new(config: Arc<ServerConfig>, keys: Arc<SigningKeys>, cache: Arc<Cache>) -> Self {
        Self {
            config,
            keys,
            cache,
        }
    }

    /// Validate the session cookie on a request.
    ///
    /// # Errors
    /// Returns a [`GuardError`] when the cookie is missing, the JWT does not
    /// verify, the token is not a session token, or the session was revoked
    pub async fn authenticate(
        &self,
        cookie_header: Option<&str>,
    ) -> Result<TokenClaims, GuardError> {
        let token = cookie_header
            .and_then(|header| extract_cookie(header, &self.config.session_cookie_name))
            .ok_or(GuardError::MissingToken)?;

        if token.is_empty() {
            debug!("no session token provided");
            return Err(GuardError::MissingToken);
        }

        let claims = validate_jwt(&self.keys, &token).map_err(|e| {
            debug!("session token validation failed: {e}");
            GuardError::InvalidToken
        })?;

        if claims.token_type != Some(TokenType::Session) {
            debug!("token is not a session token");
            return Err(GuardError::InvalidToken);
        }

        if let Some(jti) = &claims.jti {
            if self.is_revoked(jti).await {
                debug!("session token {jti} has been revoked");
                return Err(GuardError::InvalidToken);
            }
        }

        Ok(claims)
    }

    /// Build the frontend login URL carrying the original request URL
    #[must_use]
    pub fn login_redirect_url(&self, next: &str) -> String {
        format!(
            "{}/login?next={}",
            self.config.frontend_url.trim_end_matches('/'),
            urlencoding::encode(next)
        )
    }

    async fn is_revoked(&self, jti: &str) -> bool {
        let key = format!("{REVOKED_SESSION_PREFIX}{jti}");
        match self.cache.hgetall(&key, ReadOptions::uncached()).await {
            Ok(marker) => !marker.is_empty(),
            // Fail closed: an unreachable cache means we cannot prove the
            // session is still live.
            Err(e) => {
                tracing::error!("failed to check session revocation: {e}");
                true
            }
        }
    }
}

/// Extract a cookie value from a `Cookie` request header
#[must_use]
pub fn extract_cookie(cookie_header: &str, name: &str) -> Option<String> {
    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if let Some((cookie_name, value)) = cookie.split_once('=') {
            if cookie_name == name {
                return Some(value.to_owned());
            }
        }
    }
    None
}

/// Write a revocation marker for a session id, kept until the token would
/// have expired anyway
pub async fn revoke_session(
    cache: &Cache,
    jti: &str,
    ttl: std::time::Duration,
) -> Result<(), crate::cache::CacheError> {
    let key = format!("{REVOKED_SESSION_PREFIX}{jti}");
    let marker: HashMap<String, String> = [("revoked".to_owned(), "1".to_owned())].into();
    cache.hset(&key, marker, Some(ttl)).await
}
