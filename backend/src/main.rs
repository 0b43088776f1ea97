//! Indago Coffee Pipeline - Backend Server
//!
//! Runs any subset of the pipeline roles (orders, kitchen, inventory,
//! finance, sales) selected by `service.roles`.

use std::{net::SocketAddr, time::Duration};

use indago_backend::{
    build_state,
    config::{Config, LogFormat, StorageBackend},
    create_app,
    store::Stores,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(format: LogFormat) {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "indago_server=debug,indago_backend=debug,tower_http=debug,sqlx=warn".into())
    };

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter())
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter())
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    init_tracing(config.logging.format);

    tracing::info!("Starting Indago pipeline server");
    tracing::info!("Environment: {}", config.environment);

    let (stores, db) = match config.storage.backend {
        StorageBackend::Postgres => {
            // Create database connection pool
            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(&config.database.url)
                .await?;

            tracing::info!("Database connection established");

            // Run migrations in development
            if config.environment == "development" {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&db_pool).await?;
                tracing::info!("Migrations completed");
            }

            (Stores::postgres(db_pool.clone()), Some(db_pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; state is lost on restart");
            (Stores::memory(), None)
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let state = build_state(config, stores, db).await?;

    // Build application
    let app = create_app(state);

    // Start server
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
