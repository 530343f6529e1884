// ABOUTME: Discovery endpoints: RFC 8414 metadata, its openid-configuration alias, and JWKS
// ABOUTME: The alias returns the same OAuth2 document; no OpenID Connect claims are added
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::sync::Arc;

use warp::{Filter, Rejection, Reply};

use crate::services::wellknown::WellKnownService;
use crate::services::Services;

use super::with_shared;

/// Well-known route filters
pub fn wellknown_routes(
    services: &Services,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let metadata_route = warp::path!(".well-known" / "oauth-authorization-server")
        .and(warp::get())
        .and(with_shared(services.wellknown.clone()))
        .and_then(handle_metadata);

    // Alias kept for clients that only probe the OIDC location.
    let openid_alias_route = warp::path!(".well-known" / "openid-configuration")
        .and(warp::get())
        .and(with_shared(services.wellknown.clone()))
        .and_then(handle_metadata);

    let jwks_route = warp::path!(".well-known" / "jwks.json")
        .and(warp::get())
        .and(with_shared(services.wellknown.clone()))
        .and_then(handle_jwks);

    metadata_route.or(openid_alias_route).or(jwks_route)
}

/// Handle GET /.well-known/oauth-authorization-server (and the alias)
async fn handle_metadata(
    wellknown: Arc<WellKnownService>,
) -> Result<impl Reply, Rejection> {
    let metadata = wellknown.oauth2_metadata().await;
    Ok(warp::reply::json(&metadata))
}

/// Handle GET /.well-known/jwks.json
async fn handle_jwks(wellknown: Arc<WellKnownService>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&wellknown.jwks()))
}
