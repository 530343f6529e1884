// ABOUTME: Browser-facing authentication endpoints: register, login, logout
// ABOUTME: Login sets the HTTP-only session cookie; logout clears it and revokes the session
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::sync::Arc;

use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::config::{Environment, ServerConfig};
use crate::errors::catch_panics;
use crate::services::auth::{AuthService, LoginRequest, RegisterRequest};
use crate::services::Services;

use super::with_shared;

/// Authentication route filters
pub fn auth_routes(
    services: &Services,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let register_route = warp::path!("auth" / "register")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_shared(services.auth.clone()))
        .and_then(handle_register);

    let login_route = warp::path!("auth" / "login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_shared(services.auth.clone()))
        .and(with_shared(services.config.clone()))
        .and_then(handle_login);

    let logout_route = warp::path!("auth" / "logout")
        .and(warp::delete())
        .and(warp::header::optional::<String>("cookie"))
        .and(with_shared(services.auth.clone()))
        .and(with_shared(services.config.clone()))
        .and_then(handle_logout);

    register_route.or(login_route).or(logout_route)
}

/// Handle POST /auth/register
async fn handle_register(
    payload: RegisterRequest,
    auth: Arc<AuthService>,
) -> Result<Box<dyn Reply>, Rejection> {
    match catch_panics(auth.register(payload)).await {
        Ok(user) => Ok(Box::new(warp::reply::with_status(
            warp::reply::json(&user),
            StatusCode::CREATED,
        ))),
        Err(err) => Ok(Box::new(err)),
    }
}

/// Handle POST /auth/login
async fn handle_login(
    payload: LoginRequest,
    auth: Arc<AuthService>,
    config: Arc<ServerConfig>,
) -> Result<Box<dyn Reply>, Rejection> {
    match catch_panics(auth.login(payload)).await {
        Ok(login) => {
            let cookie = session_cookie(
                &config,
                &login.session_token,
                config.session_token_expiry_secs(),
            );
            Ok(Box::new(warp::reply::with_header(
                warp::reply::with_status(warp::reply::json(&login), StatusCode::OK),
                "set-cookie",
                cookie,
            )))
        }
        Err(err) => Ok(Box::new(err)),
    }
}

/// Handle DELETE /auth/logout
async fn handle_logout(
    cookie_header: Option<String>,
    auth: Arc<AuthService>,
    config: Arc<ServerConfig>,
) -> Result<Box<dyn Reply>, Rejection> {
    auth.logout(cookie_header.as_deref()).await;

    let cookie = session_cookie(&config, "", 0);
    Ok(Box::new(warp::reply::with_status(
        warp::reply::with_header(warp::reply(), "set-cookie", cookie),
        StatusCode::NO_CONTENT,
    )))
}

/// Build the session cookie string. HttpOnly and SameSite=Lax always; Secure
/// only in production so local development over plain HTTP keeps working.
fn session_cookie(config: &ServerConfig, value: &str, max_age: i64) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; Domain={}; Max-Age={}; HttpOnly; SameSite=Lax",
        config.session_cookie_name, value, config.domain, max_age
    );
    if config.environment == Environment::Production {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_carries_session_attributes() {
        let config = crate::config::tests::test_config();
        let cookie = session_cookie(&config, "tok", 86400);
        assert!(cookie.starts_with("session_token=tok;"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Domain=localhost"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn cookie_is_secure_in_production() {
        let mut config = crate::config::tests::test_config();
        config.environment = Environment::Production;
        let cookie = session_cookie(&config, "tok", 60);
        assert!(cookie.contains("; Secure"));
    }
}
