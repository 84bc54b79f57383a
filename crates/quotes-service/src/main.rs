//! Quotes Service
//!
//! Entry point for the quotes API identity and group-membership service.

use quotes_service::auth::{KeySetCache, KeySetConfig, TokenVerifier};
use quotes_service::config::Config;
use quotes_service::observability::metrics::init_metrics_recorder;
use quotes_service::repositories::{PgGroupRepository, PgMembershipRepository, PgUserRepository};
use quotes_service::routes::{self, AppState};
use quotes_service::services::HttpAuthorityClient;
use quotes_service::tasks::{start_cache_stats_logger, start_key_set_refresher};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quotes_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Quotes Service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        jwks_url = %config.jwks_url,
        issuers = config.jwt_issuers.len(),
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    info!("Connecting to database...");
    let db_url_with_timeout = add_query_timeout(&config.database_url, 5);
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&db_url_with_timeout)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| {
            error!("Failed to run database migrations: {}", e);
            e
        })?;

    info!("Database connection established");

    let key_set = Arc::new(KeySetCache::new(KeySetConfig {
        jwks_url: config.jwks_url.clone(),
        ttl: Duration::from_secs(config.key_set_cache_ttl_seconds),
        max_refreshes_per_hour: config.key_set_max_refreshes_per_hour,
        max_kid_miss_refreshes_per_minute: config.key_set_max_kid_miss_refreshes_per_minute,
        fetch_timeout: config.http_timeout(),
    }));
    let verifier = Arc::new(TokenVerifier::new(
        Arc::clone(&key_set),
        config.jwt_issuers.clone(),
        config.jwt_clock_skew(),
    ));
    let authority = Arc::new(
        HttpAuthorityClient::new(
            config.authority_url.clone(),
            config.authority_user.clone(),
            config.authority_password.clone(),
            config.http_timeout(),
        )
        .map_err(|e| {
            error!("Failed to create authority client: {}", e);
            e
        })?,
    );

    let state = Arc::new(AppState::new(
        Arc::new(PgUserRepository::new(db_pool.clone())),
        Arc::new(PgGroupRepository::new(db_pool.clone())),
        Arc::new(PgMembershipRepository::new(db_pool)),
        verifier,
        authority,
        config.cache_max_entries,
    ));

    let cancel_token = CancellationToken::new();
    let refresher_handle = tokio::spawn(start_key_set_refresher(
        key_set,
        Duration::from_secs(config.key_set_refresh_interval_seconds),
        cancel_token.clone(),
    ));
    let stats_handle = tokio::spawn(start_cache_stats_logger(
        Arc::clone(&state),
        Duration::from_secs(config.cache_stats_interval_seconds),
        cancel_token.clone(),
    ));

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Quotes Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cancel_token.cancel();
    for (name, handle) in [("key_set_refresher", refresher_handle), ("cache_stats_logger", stats_handle)] {
        if let Err(e) = handle.await {
            warn!(task = name, error = %e, "Background task ended abnormally");
        }
    }

    info!("Quotes Service shutdown complete");

    Ok(())
}

/// Returns when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// Adds `statement_timeout` to the database URL.
fn add_query_timeout(url: &str, timeout_secs: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}options=-c%20statement_timeout%3D{timeout_secs}s")
}
