// ABOUTME: OAuth2 protocol endpoints: authorization (PKCE code issuance) and token exchange
// ABOUTME: Implements the fail-closed / redirect-with-error decision tree and client authentication
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::collections::HashMap;
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::database::{GrantType, OAuthClient};
use crate::errors::{catch_panics, ApiError, ErrorCode};
use crate::middleware::session::SessionGuard;
use crate::services::oauth::OAuthService;
use crate::services::Services;
use crate::tokens::verify_client_secret;

use super::with_shared;

/// Token endpoint response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Access-token lifetime in seconds
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Refresh-token lifetime in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_expires_in: Option<i64>,
    pub scopes: Vec<String>,
}

/// Dynamic client registration request (RFC 7591). The registration endpoint
/// is not exposed yet; the DTOs document the intended contract.
#[derive(Debug, Deserialize)]
pub struct ClientRegistrationRequest {
    pub client_name: String,
    pub description: Option<String>,
    pub redirect_uris: Vec<String>,
    pub scopes: Vec<String>,
    pub grant_types: Option<Vec<String>>,
    pub is_public: bool,
    /// Seconds, 60..=1800
    pub authorization_code_valid_duration: Option<i64>,
    /// Seconds, 300..=86400
    pub access_token_valid_duration: Option<i64>,
    /// Seconds, 3600..=604800
    pub refresh_token_valid_duration: Option<i64>,
}

/// Dynamic client registration response (RFC 7591); see
/// [`ClientRegistrationRequest`]
#[derive(Debug, Serialize)]
pub struct ClientRegistrationResponse {
    pub client_id: String,
    /// Returned exactly once, at registration time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub scopes: Vec<String>,
    pub grant_types: Vec<String>,
    pub is_public: bool,
}

/// OAuth2 route filters
pub fn oauth_routes(
    services: &Services,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let authorize_route = warp::path!("oauth" / "authorize")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(warp::header::optional::<String>("cookie"))
        .and(with_shared(services.oauth.clone()))
        .and(with_shared(services.guard.clone()))
        .and_then(handle_authorize);

    let token_route = warp::path!("oauth" / "token")
        .and(warp::post())
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::body::bytes())
        .and(with_shared(services.oauth.clone()))
        .and_then(handle_token);

    authorize_route.or(token_route)
}

/// Handle GET /oauth/authorize
async fn handle_authorize(
    params: HashMap<String, String>,
    cookie_header: Option<String>,
    oauth: Arc<OAuthService>,
    guard: Arc<SessionGuard>,
) -> Result<Box<dyn Reply>, Rejection> {
    match catch_panics(authorize_reply(params, cookie_header, oauth, guard)).await {
        Ok(reply) => Ok(reply),
        Err(err) => Ok(Box::new(err)),
    }
}

/// The authorize decision tree. Validation order matters: failures before the
/// redirect URI is accepted answer with JSON, later ones are delivered to the
/// client as query parameters on a 302 (RFC 6749 section 4.1.2.1).
async fn authorize_reply(
    params: HashMap<String, String>,
    cookie_header: Option<String>,
    oauth: Arc<OAuthService>,
    guard: Arc<SessionGuard>,
) -> Result<Box<dyn Reply>, ApiError> {
    // Browser authentication first; failures leak nothing and bounce to login.
    let claims = match guard.authenticate(cookie_header.as_deref()).await {
        Ok(claims) => claims,
        Err(_) => {
            tracing::debug!("no authenticated session for authorization, redirecting to login");
            let next = original_request_url(&params);
            return Ok(redirect_found(&guard.login_redirect_url(&next)));
        }
    };

    let client_id = params.get("client_id").map(String::as_str).unwrap_or("");
    if client_id.is_empty() {
        return Ok(Box::new(ApiError::bad_request(
            ErrorCode::MissingClientId,
            "The client_id query parameter is required",
        )));
    }

    let client = match oauth.get_client(client_id).await {
        Ok(client) => client,
        Err(err) => return Ok(Box::new(err)),
    };

    // Resolve the redirect URI before anything else; until it is accepted,
    // errors must not be sent anywhere but back to the caller.
    let redirect_uri = params.get("redirect_uri").map(String::as_str).unwrap_or("");
    if redirect_uri.is_empty() && client.redirect_uris.len() > 1 {
        return Ok(Box::new(ApiError::bad_request(
            ErrorCode::MissingRedirectUri,
            "The redirect_uri query parameter is required",
        )));
    }

    let redirect_uri = if redirect_uri.is_empty() {
        client.redirect_uris[0].as_str()
    } else if !client.redirect_uris.iter().any(|uri| uri == redirect_uri) {
        return Ok(Box::new(ApiError::bad_request(
            ErrorCode::InvalidRedirectUri,
            "The provided redirect_uri is not registered for this client",
        )));
    } else {
        redirect_uri
    };

    let Ok(uri) = Url::parse(redirect_uri) else {
        return Ok(Box::new(ApiError::bad_request(
            ErrorCode::InvalidRedirectUri,
            "The provided redirect_uri is not a valid URI",
        )));
    };

    // From here on, errors travel on the redirect.
    let state = params.get("state").map(String::as_str).unwrap_or("");
    if state.is_empty() {
        return Ok(redirect_with_error(
            &uri,
            "invalid_request",
            "The state query parameter is required",
            "",
        ));
    }
    if state.len() > 255 {
        return Ok(redirect_with_error(
            &uri,
            "invalid_request",
            "The state query parameter must not exceed 255 characters",
            state,
        ));
    }

    let response_type = params.get("response_type").map(String::as_str).unwrap_or("");
    if response_type.is_empty() {
        return Ok(redirect_with_error(
            &uri,
            "invalid_request",
            "The response_type query parameter is required",
            state,
        ));
    }
    if response_type != "code" {
        return Ok(redirect_with_error(
            &uri,
            "unsupported_response_type",
            "The /oauth/authorize endpoint only supports the 'code' response type",
            state,
        ));
    }

    let code_challenge = params.get("code_challenge").map(String::as_str).unwrap_or("");
    if code_challenge.is_empty() {
        return Ok(redirect_with_error(
            &uri,
            "invalid_request",
            "The code_challenge query parameter is required",
            state,
        ));
    }

    // S256 is implicit; an explicit method must spell it out. `plain` is
    // never accepted.
    if let Some(method) = params.get("code_challenge_method") {
        if method != "S256" {
            return Ok(redirect_with_error(
                &uri,
                "invalid_request",
                "Only the S256 code_challenge_method is supported",
                state,
            ));
        }
    }

    let code = match oauth.authorize(&client, code_challenge, &claims.sub).await {
        Ok(code) => code,
        Err(_) => return Ok(redirect_with_error(&uri, "server_error", "", state)),
    };

    let mut location = uri;
    location
        .query_pairs_mut()
        .append_pair("code", &code)
        .append_pair("state", state);

    Ok(redirect_found(location.as_str()))
}

/// Handle POST /oauth/token
async fn handle_token(
    content_type: Option<String>,
    authorization: Option<String>,
    body: Bytes,
    oauth: Arc<OAuthService>,
) -> Result<Box<dyn Reply>, Rejection> {
    match catch_panics(token_reply(content_type, authorization, body, oauth)).await {
        Ok(response) => Ok(Box::new(warp::reply::with_status(
            warp::reply::json(&response),
            StatusCode::OK,
        ))),
        Err(err) => Ok(Box::new(err)),
    }
}

/// Token endpoint prelude, client authentication and grant dispatch
async fn token_reply(
    content_type: Option<String>,
    authorization: Option<String>,
    body: Bytes,
    oauth: Arc<OAuthService>,
) -> Result<TokenResponse, ApiError> {
    let media_type = content_type
        .as_deref()
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if media_type != "application/x-www-form-urlencoded" {
        return Err(ApiError::bad_request(
            ErrorCode::InvalidContentType,
            "The Content-Type header must be application/x-www-form-urlencoded",
        ));
    }

    let form: HashMap<String, String> = serde_urlencoded::from_bytes(&body).map_err(|_| {
        ApiError::bad_request(ErrorCode::InvalidRequestBody, "Failed to parse request body")
    })?;

    let grant_type = form.get("grant_type").map(String::as_str).unwrap_or("");
    if grant_type.is_empty() {
        return Err(ApiError::bad_request(
            ErrorCode::MissingGrantType,
            "The grant_type parameter is required",
        ));
    }

    // Client id comes from the form body, falling back to HTTP Basic. The
    // secret may arrive through either channel independently.
    let basic = authorization.as_deref().and_then(parse_basic_auth);
    let (client_id, client_secret) = match form.get("client_id") {
        Some(client_id) if !client_id.is_empty() => {
            let secret = form
                .get("client_secret")
                .filter(|s| !s.is_empty())
                .cloned()
                .or_else(|| basic.as_ref().map(|(_, secret)| secret.clone()))
                .unwrap_or_default();
            (client_id.clone(), secret)
        }
        _ => match basic {
            Some((id, secret)) if !id.is_empty() => (id, secret),
            _ => {
                return Err(ApiError::bad_request(
                    ErrorCode::MissingClientId,
                    "The client_id parameter is required",
                ))
            }
        },
    };

    let client = oauth.get_client(&client_id).await?;

    if !client.is_public {
        if client_secret.is_empty() {
            return Err(ApiError::bad_request(
                ErrorCode::MissingClientSecret,
                "Client secret is required for confidential clients",
            ));
        }

        let secret_valid = client
            .client_secret_hash
            .as_deref()
            .is_some_and(|hash| verify_client_secret(&client_secret, hash));
        if !secret_valid {
            return Err(ApiError::bad_request(
                ErrorCode::InvalidClientSecret,
                "Invalid client secret",
            ));
        }
    }

    let Some(grant) = GrantType::parse(grant_type) else {
        return Err(ApiError::bad_request(
            ErrorCode::UnsupportedGrantType,
            "The grant_type is not supported",
        ));
    };

    if !client.allows_grant(grant) {
        return Err(ApiError::bad_request(
            ErrorCode::UnsupportedGrantType,
            format!(
                "The client is not authorized to use the {} grant type",
                grant.as_str()
            ),
        ));
    }

    match grant {
        GrantType::AuthorizationCode => {
            authorization_code_grant(&oauth, &client, &form).await
        }
        GrantType::ClientCredentials => {
            let (access_token, scopes) = oauth.client_credentials_flow(&client)?;
            Ok(TokenResponse {
                access_token,
                expires_in: client.access_token_valid_duration,
                refresh_token: None,
                refresh_token_expires_in: None,
                scopes,
            })
        }
        GrantType::RefreshToken => refresh_token_grant(&oauth, &client, &form).await,
    }
}

async fn authorization_code_grant(
    oauth: &OAuthService,
    client: &OAuthClient,
    form: &HashMap<String, String>,
) -> Result<TokenResponse, ApiError> {
    let code = form.get("code").map(String::as_str).unwrap_or("");
    if code.is_empty() {
        return Err(ApiError::bad_request(
            ErrorCode::MissingCode,
            "The code parameter is required",
        ));
    }

    let code_verifier = form.get("code_verifier").map(String::as_str).unwrap_or("");
    if code_verifier.is_empty() {
        return Err(ApiError::bad_request(
            ErrorCode::MissingCodeVerifier,
            "The code_verifier parameter is required",
        ));
    }

    let issued = oauth
        .authorization_code_flow(client, code, code_verifier)
        .await?;

    let mut response = TokenResponse {
        access_token: issued.access_token,
        expires_in: client.access_token_valid_duration,
        refresh_token: None,
        refresh_token_expires_in: None,
        scopes: issued.scopes,
    };

    if client.allows_grant(GrantType::RefreshToken) {
        response.refresh_token = Some(issued.refresh_token);
        response.refresh_token_expires_in = Some(client.refresh_token_valid_duration);
    }

    Ok(response)
}

async fn refresh_token_grant(
    oauth: &OAuthService,
    client: &OAuthClient,
    form: &HashMap<String, String>,
) -> Result<TokenResponse, ApiError> {
    let refresh_token = form.get("refresh_token").map(String::as_str).unwrap_or("");
    if refresh_token.is_empty() {
        return Err(ApiError::bad_request(
            ErrorCode::MissingRefreshToken,
            "The refresh_token parameter is required",
        ));
    }

    let issued = oauth.refresh_token_flow(client, refresh_token).await?;

    Ok(TokenResponse {
        access_token: issued.access_token,
        expires_in: client.access_token_valid_duration,
        refresh_token: Some(issued.refresh_token),
        refresh_token_expires_in: Some(client.refresh_token_valid_duration),
        scopes: issued.scopes,
    })
}

/// Reconstruct the original request URL for the login `next` parameter
fn original_request_url(params: &HashMap<String, String>) -> String {
    let query = serde_urlencoded::to_string(params).unwrap_or_default();
    if query.is_empty() {
        "/oauth/authorize".to_owned()
    } else {
        format!("/oauth/authorize?{query}")
    }
}

/// 302 redirect reply
fn redirect_found(location: &str) -> Box<dyn Reply> {
    Box::new(warp::reply::with_status(
        warp::reply::with_header(warp::reply(), "location", location.to_owned()),
        StatusCode::FOUND,
    ))
}

/// Deliver an OAuth error to the client as redirect query parameters.
/// Empty description or state are omitted.
fn redirect_with_error(
    redirect_uri: &Url,
    error_code: &str,
    error_description: &str,
    state: &str,
) -> Box<dyn Reply> {
    let mut location = redirect_uri.clone();
    {
        let mut query = location.query_pairs_mut();
        query.append_pair("error", error_code);
        if !error_description.is_empty() {
            query.append_pair("error_description", error_description);
        }
        if !state.is_empty() {
            query.append_pair("state", state);
        }
    }
    redirect_found(location.as_str())
}

/// Parse an HTTP Basic `client_id:client_secret` pair
fn parse_basic_auth(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (client_id, client_secret) = decoded.split_once(':')?;
    Some((client_id.to_owned(), client_secret.to_owned()))
}
