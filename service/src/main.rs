mod config;
mod models;
mod routes;
mod storage;

use axum::{Router, extract::DefaultBodyLimit};
use config::ServiceConfig;
use routes::AppState;
use std::sync::Arc;
use storage::ImportStorage;
use tower_http::cors::{CorsLayer, Any};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scorecard_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env()?;
    let state = AppState {
        storage: Arc::new(ImportStorage::new(&config.data_dir)?),
        validation: Arc::new(config.validation.clone()),
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Result files are small; 16 MB leaves room for multi-session XML
    let app = Router::new()
        .merge(routes::create_routes(state))
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .layer(cors);

    tracing::info!("Starting scorecard service on {}", config.addr);
    tracing::info!("Storing imports under {}", config.data_dir.display());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
