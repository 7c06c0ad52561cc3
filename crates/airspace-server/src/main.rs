//! Airspace Server - split configurations and combined sector boundaries

use airspace_server::{api, config::Config, persistence, state::AppState};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("airspace_server=debug".parse()?),
        )
        .init();

    tracing::info!("Starting Airspace Server...");

    let config = Config::from_env();
    let port = config.server_port;
    let db =
        persistence::init_database(&config.database_path, config.database_max_connections).await?;
    let state = Arc::new(AppState::new(db, config));

    let app = api::routes()
        .with_state(state)
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
