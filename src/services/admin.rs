// ABOUTME: Admin endpoints business logic
// ABOUTME: System info and stats are placeholders until real reporting lands
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use serde_json::{json, Value};
use tracing::info;

/// Admin service
#[derive(Default)]
pub struct AdminService;

impl AdminService {
    /// Create a new service instance
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// System information placeholder
    #[must_use]
    pub fn system_info(&self) -> Value {
        info!("admin requested system info");
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "status": "healthy",
        })
    }

    /// System statistics placeholder
    #[must_use]
    pub fn stats(&self) -> Value {
        info!("admin requested system stats");
        json!({
            "users_count": 0,
            "clients_count": 0,
            "sessions": 0,
        })
    }
}
