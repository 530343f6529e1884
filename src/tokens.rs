// ABOUTME: JWT access/session token generation and validation plus opaque token material
// ABOUTME: EdDSA (Ed25519) only; refresh tokens and authorization codes are random strings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::error;

use crate::keys::SigningKeys;

/// Token layer failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("failed to sign token")]
    FailedToSignToken,
    #[error("failed to generate random token material")]
    FailedToGenerateRandom,
    #[error("unexpected signing method")]
    UnexpectedSigningMethod,
    #[error("failed to parse token")]
    FailedToParseToken,
    #[error("invalid token")]
    InvalidToken,
}

/// Kind of JWT issued by this server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
    Session,
}

/// JWT payload: registered claims plus scopes and the token type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer (configured base URL)
    pub iss: String,
    /// Subject: user id or client id
    pub sub: String,
    /// Audience: the client name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Vec<String>>,
    /// Issued-at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Token id; the session id for access tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Granted scopes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    /// Token kind
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,
}

/// Parameters for minting an access token
pub struct AccessTokenParams<'a> {
    /// Issuer URL
    pub issuer: &'a str,
    /// User id or client id
    pub subject: &'a str,
    /// Client name placed in `aud`
    pub audience: &'a str,
    /// Scopes carried by the token
    pub scopes: &'a [String],
    /// Session id placed in `jti`, stable across refreshes
    pub session_id: &'a str,
    /// Lifetime in seconds
    pub valid_for_secs: i64,
}

/// Sign a JWT with the server's Ed25519 key
fn sign(keys: &SigningKeys, claims: &TokenClaims) -> Result<String, TokenError> {
    encode(&Header::new(Algorithm::EdDSA), claims, keys.encoding_key()).map_err(|e| {
        error!("failed to sign token: {e}");
        TokenError::FailedToSignToken
    })
}

/// Generate a session token for browser authentication
///
/// # Errors
/// Returns an error if signing fails
pub fn generate_session_token(
    issuer: &str,
    keys: &SigningKeys,
    user_id: &str,
    expiry_hours: i64,
    jti: &str,
) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = TokenClaims {
        iss: issuer.to_owned(),
        sub: user_id.to_owned(),
        aud: None,
        iat: now.timestamp(),
        exp: (now + Duration::hours(expiry_hours)).timestamp(),
        jti: Some(jti.to_owned()),
        scopes: Vec::new(),
        token_type: Some(TokenType::Session),
    };

    sign(keys, &claims)
}

/// Generate a bearer access token
///
/// # Errors
/// Returns an error if signing fails
pub fn generate_access_token(
    keys: &SigningKeys,
    params: &AccessTokenParams<'_>,
) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = TokenClaims {
        iss: params.issuer.to_owned(),
        sub: params.subject.to_owned(),
        aud: Some(vec![params.audience.to_owned()]),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(params.valid_for_secs)).timestamp(),
        jti: Some(params.session_id.to_owned()),
        scopes: params.scopes.to_vec(),
        token_type: Some(TokenType::Access),
    };

    sign(keys, &claims)
}

/// Generate an opaque refresh token: two concatenated 256-bit random values.
/// Never a JWT.
///
/// # Errors
/// Returns an error if the system RNG fails
pub fn generate_refresh_token() -> Result<String, TokenError> {
    Ok(format!("{}{}", random_urlsafe(32)?, random_urlsafe(32)?))
}

/// Generate an opaque single-use authorization code (256 bits of entropy)
///
/// # Errors
/// Returns an error if the system RNG fails
pub fn generate_authorization_code() -> Result<String, TokenError> {
    random_urlsafe(32)
}

/// Generate a fresh client id, client secret and the SHA-256 hex hash of the
/// secret, as stored for confidential clients
///
/// # Errors
/// Returns an error if the system RNG fails
pub fn generate_client_credentials() -> Result<(String, String, String), TokenError> {
    let client_id = random_urlsafe(16)?;
    let client_secret = format!("{}{}", random_urlsafe(32)?, random_urlsafe(32)?);
    let secret_hash = hex::encode(Sha256::digest(client_secret.as_bytes()));
    Ok((client_id, client_secret, secret_hash))
}

/// Compare a presented client secret against the stored SHA-256 hex hash in
/// constant time
#[must_use]
pub fn verify_client_secret(client_secret: &str, client_secret_hash: &str) -> bool {
    let computed = hex::encode(Sha256::digest(client_secret.as_bytes()));
    computed
        .as_bytes()
        .ct_eq(client_secret_hash.as_bytes())
        .into()
}

/// Compute the S256 PKCE challenge for a verifier: base64url-no-pad(SHA-256)
#[must_use]
pub fn compute_code_challenge(code_verifier: &str) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

/// Validate a JWT signed by this server.
///
/// Only `EdDSA` is accepted; any other `alg` header fails with
/// [`TokenError::UnexpectedSigningMethod`] before signature verification.
///
/// # Errors
/// Returns an error if the token is malformed, carries the wrong algorithm,
/// has an invalid signature or is expired
pub fn validate_jwt(keys: &SigningKeys, token: &str) -> Result<TokenClaims, TokenError> {
    let header = decode_header(token).map_err(|_| TokenError::FailedToParseToken)?;
    if header.alg != Algorithm::EdDSA {
        return Err(TokenError::UnexpectedSigningMethod);
    }

    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.validate_aud = false;
    validation.leeway = 0;

    decode::<TokenClaims>(token, keys.decoding_key(), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::ExpiredSignature
                | ErrorKind::ImmatureSignature => TokenError::InvalidToken,
                _ => TokenError::FailedToParseToken,
            }
        })
}

/// Fill `len` random bytes from the system RNG and encode them URL-safe
fn random_urlsafe(len: usize) -> Result<String, TokenError> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes).map_err(|e| {
        error!("system RNG failure, cannot generate secure token material: {e}");
        TokenError::FailedToGenerateRandom
    })?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(&bytes))
}
