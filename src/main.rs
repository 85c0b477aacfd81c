use anyhow::Context;
use book_api::{
    adapters::postgres::{PostgresBookRepository, pool_options, run_migrations},
    api::{AppState, create_router},
    config::Config,
    observability::{Metrics, spawn_pool_metrics_collector},
    ports::BookRepository,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "book_api=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("failed to read configuration")?;

    // Initialize database connection pool
    let pool = pool_options(&config)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    run_migrations(&pool)
        .await
        .context("failed to run migrations")?;

    let metrics = Arc::new(Metrics::new().context("failed to build metrics registry")?);
    let books: Arc<dyn BookRepository> =
        Arc::new(PostgresBookRepository::new(pool.clone(), metrics.clone()));

    // Start collecting pool metrics in the background
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let collector = spawn_pool_metrics_collector(
        books.clone(),
        metrics.clone(),
        config.metrics_interval,
        shutdown_rx,
    );

    let app_state = Arc::new(AppState { books, metrics });
    let app = create_router(app_state, config.request_timeout);

    // Server configuration
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    tracing::info!("API server listening on {}", addr);
    tracing::info!("Metrics available at http://localhost:{}/metrics", config.port);

    // Stops accepting on SIGINT/SIGTERM and drains in-flight requests
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server is shutting down...");

    // Ignore send errors -- the collector may already have exited
    let _ = shutdown_tx.send(true);
    if let Err(e) = collector.await {
        tracing::warn!("pool metrics collector ended abnormally: {}", e);
    }
    pool.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
