// ABOUTME: Wire-level error taxonomy and the standard API error envelope
// ABOUTME: Maps error codes to HTTP statuses and renders warp rejections as JSON
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

//! # Unified Error Handling
//!
//! Every error surfaced over HTTP uses the same envelope:
//! `{"code": <http_status>, "error": <ERROR_CODE>, "details": <string|[string]|null>}`.
//! Storage and cache failures are logged with full error text and surface as
//! `INTERNAL_SERVER_ERROR` with generic details; internal error strings never
//! reach response bodies.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::{Serialize, Serializer};
use tracing::error;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

/// Error codes carried on the wire in the `error` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Authentication / authorization
    Unauthorized,
    NotAllowed,
    MissingSessionToken,
    InvalidSessionToken,
    // Client authentication
    MissingClientId,
    InvalidClientId,
    MissingClientSecret,
    InvalidClientSecret,
    // Authorize request
    MissingResponseType,
    UnsupportedResponseType,
    MissingCodeChallenge,
    MissingState,
    InvalidState,
    MissingRedirectUri,
    InvalidRedirectUri,
    // Token request
    InvalidContentType,
    InvalidRequestBody,
    MissingGrantType,
    UnsupportedGrantType,
    MissingCode,
    InvalidCode,
    MissingCodeVerifier,
    InvalidCodeVerifier,
    MissingRefreshToken,
    InvalidRefreshToken,
    // Resources
    NotFound,
    AlreadyExists,
    // Server
    InternalServerError,
}

impl ErrorCode {
    /// Wire representation of the code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotAllowed => "NOT_ALLOWED",
            Self::MissingSessionToken => "MISSING_SESSION_TOKEN",
            Self::InvalidSessionToken => "INVALID_SESSION_TOKEN",
            Self::MissingClientId => "MISSING_CLIENT_ID",
            Self::InvalidClientId => "INVALID_CLIENT_ID",
            Self::MissingClientSecret => "MISSING_CLIENT_SECRET",
            Self::InvalidClientSecret => "INVALID_CLIENT_SECRET",
            Self::MissingResponseType => "MISSING_RESPONSE_TYPE",
            Self::UnsupportedResponseType => "UNSUPPORTED_RESPONSE_TYPE",
            Self::MissingCodeChallenge => "MISSING_CODE_CHALLENGE",
            Self::MissingState => "MISSING_STATE",
            Self::InvalidState => "INVALID_STATE",
            Self::MissingRedirectUri => "MISSING_REDIRECT_URI",
            Self::InvalidRedirectUri => "INVALID_REDIRECT_URI",
            Self::InvalidContentType => "INVALID_CONTENT_TYPE",
            Self::InvalidRequestBody => "INVALID_REQUEST_BODY",
            Self::MissingGrantType => "MISSING_GRANT_TYPE",
            Self::UnsupportedGrantType => "UNSUPPORTED_GRANT_TYPE",
            Self::MissingCode => "MISSING_CODE",
            Self::InvalidCode => "INVALID_CODE",
            Self::MissingCodeVerifier => "MISSING_CODE_VERIFIER",
            Self::InvalidCodeVerifier => "INVALID_CODE_VERIFIER",
            Self::MissingRefreshToken => "MISSING_REFRESH_TOKEN",
            Self::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Additional error information carried in the `details` field
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ErrorDetails {
    /// Single message
    Message(String),
    /// Multiple messages, e.g. field validation failures
    Messages(Vec<String>),
}

/// Standard API error envelope
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// HTTP status code
    pub code: u16,
    /// Wire-level error code
    pub error: ErrorCode,
    /// Optional additional information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

impl ApiError {
    /// Create a new error with the given status, code and detail message
    #[must_use]
    pub fn new(status: StatusCode, error: ErrorCode, details: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            error,
            details: Some(ErrorDetails::Message(details.into())),
        }
    }

    /// 400 Bad Request
    #[must_use]
    pub fn bad_request(error: ErrorCode, details: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, details)
    }

    /// 400 Bad Request carrying a list of validation messages
    #[must_use]
    pub fn validation(messages: Vec<String>) -> Self {
        Self {
            code: StatusCode::BAD_REQUEST.as_u16(),
            error: ErrorCode::InvalidRequestBody,
            details: Some(ErrorDetails::Messages(messages)),
        }
    }

    /// 401 Unauthorized
    #[must_use]
    pub fn unauthorized(details: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, details)
    }

    /// 404 Not Found
    #[must_use]
    pub fn not_found(error: ErrorCode, details: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error, details)
    }

    /// 409 Conflict
    #[must_use]
    pub fn conflict(details: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, ErrorCode::AlreadyExists, details)
    }

    /// 500 Internal Server Error with a generic, scrubbed detail message
    #[must_use]
    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalServerError,
            details,
        )
    }

    /// HTTP status of this error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Render the envelope as a warp response
    #[must_use]
    pub fn into_reply(self) -> warp::reply::Response {
        let status = self.status();
        warp::reply::with_status(warp::reply::json(&self), status).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error.as_str(), self.code)
    }
}

impl std::error::Error for ApiError {}

impl Reply for ApiError {
    fn into_response(self) -> warp::reply::Response {
        self.into_reply()
    }
}

/// Run a handler future, converting panics into a 500 response instead of
/// tearing down the connection task
pub async fn catch_panics<T, F>(fut: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            error!("handler panicked, responding with 500");
            Err(ApiError::internal("Internal server error"))
        }
    }
}

/// Map warp rejections onto the standard error envelope
///
/// # Errors
/// Infallible; every rejection becomes a JSON response
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let api_error = if err.is_not_found() {
        ApiError::not_found(ErrorCode::NotFound, "Resource not found")
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        ApiError::bad_request(ErrorCode::InvalidRequestBody, "Failed to parse request body")
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        ApiError::bad_request(ErrorCode::InvalidRequestBody, "Invalid query string")
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        ApiError::bad_request(
            ErrorCode::InvalidContentType,
            "Unsupported request content type",
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiError::new(
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::NotAllowed,
            "Method not allowed",
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        ApiError::bad_request(ErrorCode::InvalidRequestBody, "Request body too large")
    } else {
        error!("unhandled rejection: {err:?}");
        ApiError::internal("Internal server error")
    };

    Ok(api_error.into_reply())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_wire_shape() {
        let err = ApiError::bad_request(
            ErrorCode::MissingClientId,
            "The client_id query parameter is required",
        );
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], 400);
        assert_eq!(json["error"], "MISSING_CLIENT_ID");
        assert_eq!(json["details"], "The client_id query parameter is required");
    }

    #[test]
    fn envelope_omits_absent_details() {
        let err = ApiError {
            code: 500,
            error: ErrorCode::InternalServerError,
            details: None,
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(!json.contains("details"));
    }

    #[test]
    fn validation_details_serialize_as_list() {
        let err =
            ApiError::validation(vec!["email is invalid".into(), "password too short".into()]);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["details"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn catch_panics_converts_panic_to_internal_error() {
        let result: Result<(), ApiError> = catch_panics(async {
            panic!("boom");
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.error, ErrorCode::InternalServerError);
        assert_eq!(err.code, 500);
    }
}
