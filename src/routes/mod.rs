// ABOUTME: HTTP route composition for the authorization server
// ABOUTME: Thin warp handlers that parse requests and delegate to the service layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

pub mod admin;
pub mod auth;
pub mod oauth;
pub mod wellknown;

use std::convert::Infallible;
use std::sync::Arc;

use warp::{Filter, Reply};

use crate::errors::handle_rejection;
use crate::services::Services;

/// Compose every route of the server
pub fn routes(
    services: &Services,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    auth::auth_routes(services)
        .or(oauth::oauth_routes(services))
        .or(wellknown::wellknown_routes(services))
        .or(admin::admin_routes(services))
        .recover(handle_rejection)
}

/// Inject a shared resource into a filter chain
pub(crate) fn with_shared<T: Send + Sync + 'static>(
    value: Arc<T>,
) -> impl Filter<Extract = (Arc<T>,), Error = Infallible> + Clone {
    warp::any().map(move || value.clone())
}
