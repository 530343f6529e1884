// ABOUTME: Domain service layer wired with explicit constructor dependencies
// ABOUTME: Bundles the services and guard handed to the route filters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

pub mod admin;
pub mod auth;
pub mod oauth;
pub mod wellknown;

use std::sync::Arc;

use crate::cache::Cache;
use crate::config::ServerConfig;
use crate::database::Database;
use crate::keys::SigningKeys;
use crate::middleware::session::SessionGuard;

use self::admin::AdminService;
use self::auth::AuthService;
use self::oauth::OAuthService;
use self::wellknown::WellKnownService;

/// Everything the HTTP layer needs, built once at startup
pub struct Services {
    pub config: Arc<ServerConfig>,
    pub auth: Arc<AuthService>,
    pub oauth: Arc<OAuthService>,
    pub wellknown: Arc<WellKnownService>,
    pub admin: Arc<AdminService>,
    pub guard: Arc<SessionGuard>,
}

impl Services {
    /// Assemble the service graph from the shared resources
    #[must_use]
    pub fn new(
        config: Arc<ServerConfig>,
        database: Arc<Database>,
        cache: Arc<Cache>,
        keys: Arc<SigningKeys>,
    ) -> Self {
        Self {
            auth: Arc::new(AuthService::new(
                config.clone(),
                database.clone(),
                cache.clone(),
                keys.clone(),
            )),
            oauth: Arc::new(OAuthService::new(
                config.clone(),
                database.clone(),
                cache.clone(),
                keys.clone(),
            )),
            wellknown: Arc::new(WellKnownService::new(
                config.clone(),
                database,
                keys.clone(),
            )),
            admin: Arc::new(AdminService::new()),
            guard: Arc::new(SessionGuard::new(config.clone(), keys, cache)),
            config,
        }
    }
}
