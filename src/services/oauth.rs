// ABOUTME: OAuth2 grant flows: code issuance, code redemption with PKCE, client credentials, refresh rotation
// ABOUTME: Codes and sessions live in the cache under TTLs taken from the client registration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use subtle::ConstantTimeEq;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::cache::{Cache, CacheProvider, ReadOptions};
use crate::config::ServerConfig;
use crate::database::{Database, OAuthClient, StoreProvider};
use crate::errors::{ApiError, ErrorCode};
use crate::keys::SigningKeys;
use crate::scopes::filter_scopes;
use crate::tokens::{
    compute_code_challenge, generate_access_token, generate_authorization_code,
    generate_refresh_token, AccessTokenParams,
};

/// Cache key prefix for single-use authorization codes
const AUTHORIZATION_CODE_PREFIX: &str = "authorization-code:";
/// Cache key prefix for refresh-token-keyed session records
const SESSION_PREFIX: &str = "session:";

// Field names are part of the on-the-wire cache contract, including the
// historical "codeChallange" spelling.
const FIELD_CODE_CHALLENGE: &str = "codeChallange";
const FIELD_CLIENT_ID: &str = "clientId";
const FIELD_USER_ID: &str = "userId";
const FIELD_SCOPES: &str = "scopes";
const FIELD_SESSION_ID: &str = "sessionID";
const FIELD_SUBJECT: &str = "subject";

/// How long a fetched code record may be served from the local read-through
/// cache
const CODE_READ_CACHE_TTL: Duration = Duration::from_secs(60);

/// Tokens issued by the authorization-code and refresh flows
#[derive(Debug)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub scopes: Vec<String>,
}

/// OAuth2 grant-flow service
pub struct OAuthService {
    config: Arc<ServerConfig>,
    database: Arc<Database>,
    cache: Arc<Cache>,
    keys: Arc<SigningKeys>,
}

impl OAuthService {
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

    /// Look up a registered client.
    ///
    /// # Errors
    /// 404 `INVALID_CLIENT_ID` when the client does not exist; storage
    /// failures surface as a scrubbed 500
    pub async fn get_client(&self, client_id: &str) -> Result<OAuthClient, ApiError> {
        match self.database.get_oauth_client(client_id).await {
            Ok(Some(client)) => Ok(client),
            Ok(None) => {
                debug!("failed to retrieve client with client id: {client_id}");
                Err(ApiError::not_found(
                    ErrorCode::InvalidClientId,
                    "Client not found",
                ))
            }
            Err(e) => {
                error!("failed to get client {client_id}: {e}");
                Err(ApiError::internal("Failed to get client"))
            }
        }
    }

    /// Issue an authorization code bound to the PKCE challenge, the client and
    /// the authenticated user. The code record expires with the client's
    /// configured code lifetime.
    ///
    /// # Errors
    /// Returns a 500 when the code cannot be generated or stored
    pub async fn authorize(
        &self,
        client: &OAuthClient,
        code_challenge: &str,
        user_id: &str,
    ) -> Result<String, ApiError> {
        let code = generate_authorization_code().map_err(|e| {
            error!("failed to generate authorization code: {e}");
            ApiError::internal("Failed to generate authorization code")
        })?;

        let key = format!("{AUTHORIZATION_CODE_PREFIX}{code}");
        let record: HashMap<String, String> = [
            (FIELD_CODE_CHALLENGE.to_owned(), code_challenge.to_owned()),
            (FIELD_CLIENT_ID.to_owned(), client.client_id.clone()),
            (FIELD_USER_ID.to_owned(), user_id.to_owned()),
            (FIELD_SCOPES.to_owned(), client.scopes.join(" ")),
        ]
        .into();

        let ttl = duration_secs(client.authorization_code_valid_duration);
        if let Err(e) = self.cache.hset(&key, record, Some(ttl)).await {
            error!("failed to store authorization code: {e}");
            return Err(ApiError::internal("Failed to store authorization code"));
        }

        Ok(code)
    }

    /// Redeem an authorization code for tokens (authorization_code grant).
    ///
    /// The code is single-use: once the client and PKCE checks pass it is
    /// deleted before any token is minted, and a delete that removes nothing
    /// means a concurrent redemption already consumed it. Failed checks leave
    /// the code in place so the legitimate client can still redeem it, unless
    /// `delete_code_on_pkce_failure` is configured.
    ///
    /// # Errors
    /// `INVALID_CODE`, `INVALID_CLIENT_ID`, `INVALID_CODE_VERIFIER`,
    /// `NOT_FOUND` for a vanished user, or a 500 on storage failures
    pub async fn authorization_code_flow(
        &self,
        client: &OAuthClient,
        code: &str,
        code_verifier: &str,
    ) -> Result<IssuedTokens, ApiError> {
        let key = format!("{AUTHORIZATION_CODE_PREFIX}{code}");

        let record = self
            .cache
            .hgetall(&key, ReadOptions::cached(CODE_READ_CACHE_TTL))
            .await
            .map_err(|e| {
                error!("failed to get authorization code: {e}");
                ApiError::internal("Failed to get authorization code")
            })?;

        if record.is_empty() {
            warn!("authorization code not found");
            return Err(ApiError::bad_request(
                ErrorCode::InvalidCode,
                "Invalid authorization code",
            ));
        }

        if record.get(FIELD_CLIENT_ID).map(String::as_str) != Some(client.client_id.as_str()) {
            warn!("client id does not match authorization code");
            return Err(ApiError::bad_request(
                ErrorCode::InvalidClientId,
                "Client ID does not match authorization code",
            ));
        }

        let computed = compute_code_challenge(code_verifier);
        let stored = record
            .get(FIELD_CODE_CHALLENGE)
            .map(String::as_str)
            .unwrap_or_default();
        let challenge_matches: bool = computed.as_bytes().ct_eq(stored.as_bytes()).into();
        if !challenge_matches {
            warn!("code verifier does not match code challenge");
            if self.config.delete_code_on_pkce_failure {
                if let Err(e) = self.cache.del(&key).await {
                    error!("failed to delete authorization code after PKCE failure: {e}");
                }
            }
            return Err(ApiError::bad_request(
                ErrorCode::InvalidCodeVerifier,
                "Invalid code verifier",
            ));
        }

        let user_id = record
            .get(FIELD_USER_ID)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| {
                error!("stored authorization code carries an unparseable user id");
                ApiError::internal("Failed to parse user ID")
            })?;

        let (user, user_scopes) = match self.database.get_user_with_scopes(user_id).await {
            Ok(Some(found)) => found,
            Ok(None) => {
                warn!("user {user_id} not found during code redemption");
                return Err(ApiError::not_found(ErrorCode::NotFound, "User not found"));
            }
            Err(e) => {
                error!("failed to get user {user_id}: {e}");
                return Err(ApiError::internal("Failed to get user"));
            }
        };
        debug!("found user with id {}", user.id);

        let final_scopes = filter_scopes(&user_scopes, &client.scopes);

        // Consume the code now. A removed-count of zero means another request
        // redeemed it between our read and this delete.
        let removed = self.cache.del(&key).await.map_err(|e| {
            error!("failed to delete authorization code: {e}");
            ApiError::internal("Failed to delete authorization code")
        })?;
        if removed == 0 {
            warn!("authorization code was already consumed");
            return Err(ApiError::bad_request(
                ErrorCode::InvalidCode,
                "Invalid authorization code",
            ));
        }

        let session_id = Uuid::new_v4().to_string();
        self.issue_session_tokens(client, &user.id.to_string(), final_scopes, &session_id)
            .await
    }

    /// Issue an access token directly from the client registration
    /// (client_credentials grant). No user, no PKCE, no refresh token; the
    /// scopes are the client's registered scopes verbatim.
    ///
    /// # Errors
    /// Returns a 500 when signing fails
    pub fn client_credentials_flow(
        &self,
        client: &OAuthClient,
    ) -> Result<(String, Vec<String>), ApiError> {
        let session_id = Uuid::new_v4().to_string();
        let access_token = generate_access_token(
            &self.keys,
            &AccessTokenParams {
                issuer: &self.config.issuer(),
                subject: &client.client_id,
                audience: &client.name,
                scopes: &client.scopes,
                session_id: &session_id,
                valid_for_secs: client.access_token_valid_duration,
            },
        )
        .map_err(|e| {
            error!("failed to generate access token: {e}");
            ApiError::internal("Failed to generate access token")
        })?;

        Ok((access_token, client.scopes.clone()))
    }

    /// Rotate a refresh token (refresh_token grant). The session id survives
    /// rotation; the record is re-keyed under the new refresh token and the
    /// old key deleted afterwards. Scopes are the ones granted at issuance —
    /// they are not re-checked against the user's current roles.
    ///
    /// # Errors
    /// `INVALID_REFRESH_TOKEN` for an unknown token, or a 500 on storage
    /// failures (the old session stays intact when the new write fails)
    pub async fn refresh_token_flow(
        &self,
        client: &OAuthClient,
        refresh_token: &str,
    ) -> Result<IssuedTokens, ApiError> {
        let session_key = format!("{SESSION_PREFIX}{refresh_token}");

        let session = self
            .cache
            .hgetall(&session_key, ReadOptions::uncached())
            .await
            .map_err(|e| {
                error!("failed to get session: {e}");
                ApiError::internal("Failed to get session")
            })?;

        if session.is_empty() {
            warn!("session not found for presented refresh token");
            return Err(ApiError::bad_request(
                ErrorCode::InvalidRefreshToken,
                "Invalid refresh token",
            ));
        }

        let session_scopes: Vec<String> = session
            .get(FIELD_SCOPES)
            .map(String::as_str)
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();

        let subject = session
            .get(FIELD_SUBJECT)
            .cloned()
            .unwrap_or_default();
        let session_id = session
            .get(FIELD_SESSION_ID)
            .cloned()
            .unwrap_or_default();

        let issued = self
            .issue_session_tokens(client, &subject, session_scopes, &session_id)
            .await?;

        if let Err(e) = self.cache.del(&session_key).await {
            error!("failed to delete old session: {e}");
        } else {
            debug!("deleted old session record");
        }

        Ok(issued)
    }

    /// Mint an access/refresh token pair and store the session record under
    /// the new refresh token
    async fn issue_session_tokens(
        &self,
        client: &OAuthClient,
        subject: &str,
        scopes: Vec<String>,
        session_id: &str,
    ) -> Result<IssuedTokens, ApiError> {
        let access_token = generate_access_token(
            &self.keys,
            &AccessTokenParams {
                issuer: &self.config.issuer(),
                subject,
                audience: &client.name,
                scopes: &scopes,
                session_id,
                valid_for_secs: client.access_token_valid_duration,
            },
        )
        .map_err(|e| {
            error!("failed to generate tokens: {e}");
            ApiError::internal("Failed to generate tokens")
        })?;

        let refresh_token = generate_refresh_token().map_err(|e| {
            error!("failed to generate refresh token: {e}");
            ApiError::internal("Failed to generate tokens")
        })?;

        let session_key = format!("{SESSION_PREFIX}{refresh_token}");
        let session_record: HashMap<String, String> = [
            (FIELD_SESSION_ID.to_owned(), session_id.to_owned()),
            (FIELD_SUBJECT.to_owned(), subject.to_owned()),
            (FIELD_SCOPES.to_owned(), scopes.join(",")),
        ]
        .into();

        let ttl = duration_secs(client.refresh_token_valid_duration);
        if let Err(e) = self.cache.hset(&session_key, session_record, Some(ttl)).await {
            error!("failed to store session: {e}");
            return Err(ApiError::internal("Failed to store session"));
        }
        debug!("stored session with id {session_id}");

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            scopes,
        })
    }
}

fn duration_secs(secs: i64) -> Duration {
    Duration::from_secs(u64::try_from(secs).unwrap_or(0))
}
