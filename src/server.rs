// ABOUTME: Server bootstrap: backend connections, service wiring, serve with graceful shutdown
// ABOUTME: In-flight handlers get a 10-second drain window after SIGINT/SIGTERM
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cache::{Cache, CacheConfig};
use crate::config::ServerConfig;
use crate::database::Database;
use crate::keys::SigningKeys;
use crate::retry::{with_backoff, RetryConfig};
use crate::routes;
use crate::services::Services;

/// Seconds to wait for in-flight handlers after a shutdown signal
const SHUTDOWN_DRAIN_SECS: u64 = 10;

/// Connect the backends, build the service graph and serve until a shutdown
/// signal arrives.
///
/// # Errors
/// Returns an error if key derivation or a backend connection fails after
/// retries
pub async fn run(config: ServerConfig) -> Result<()> {
    let config = Arc::new(config);

    let keys = Arc::new(
        SigningKeys::from_seed(&config.jwt_secret).context("failed to derive signing keys")?,
    );

    let database = {
        let config = config.clone();
        with_backoff("database connection", RetryConfig::default(), move || {
            let config = config.clone();
            async move { Database::connect(&config.database_url, &config.migrations_path).await }
        })
        .await
        .context("failed to connect to the database")?
    };

    let cache = {
        let cache_config = CacheConfig {
            url: config.valkey_url.clone(),
            username: config.valkey_username.clone(),
            password: config.valkey_password.clone(),
            client_name: config.valkey_client_name.clone(),
            ..CacheConfig::default()
        };
        with_backoff("cache connection", RetryConfig::default(), move || {
            let cache_config = cache_config.clone();
            async move { Cache::connect(cache_config).await }
        })
        .await
        .context("failed to connect to the cache")?
    };

    let services = Services::new(config.clone(), Arc::new(database), Arc::new(cache), keys);
    let filter = routes::routes(&services);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let (addr, server) = warp::serve(filter).bind_with_graceful_shutdown(
        ([0, 0, 0, 0], config.port),
        async {
            shutdown_rx.await.ok();
        },
    );

    info!("listening on {addr}");
    let server_handle = tokio::spawn(server);

    shutdown_signal().await;
    info!("shutting down server");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(Duration::from_secs(SHUTDOWN_DRAIN_SECS), server_handle).await {
        Ok(Ok(())) => info!("server stopped"),
        Ok(Err(e)) => warn!("server task failed during shutdown: {e}"),
        Err(_) => warn!("shutdown drain window elapsed with handlers still in flight"),
    }

    Ok(())
}

/// Resolve when SIGINT or SIGTERM is received
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
