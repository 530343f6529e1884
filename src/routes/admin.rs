// ABOUTME: Admin endpoints for operational visibility
// ABOUTME: System-info and stats placeholders
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::sync::Arc;

use warp::{Filter, Rejection, Reply};

use crate::services::admin::AdminService;
use crate::services::Services;

use super::with_shared;

/// Admin route filters
pub fn admin_routes(
    services: &Services,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let system_info_route = warp::path!("admin" / "system-info")
        .and(warp::get())
        .and(with_shared(services.admin.clone()))
        .and_then(handle_system_info);

    let stats_route = warp::path!("admin" / "stats")
        .and(warp::get())
        .and(with_shared(services.admin.clone()))
        .and_then(handle_stats);

    system_info_route.or(stats_route)
}

/// Handle GET /admin/system-info
async fn handle_system_info(admin: Arc<AdminService>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&admin.system_info()))
}

/// Handle GET /admin/stats
async fn handle_stats(admin: Arc<AdminService>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&admin.stats()))
}
