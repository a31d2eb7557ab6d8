use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use rental_hub::config::AppConfig;
use rental_hub::db;
use rental_hub::handlers;
use rental_hub::services::oauth::GoogleProvider;
use rental_hub::services::session::JwtService;
use rental_hub::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    if config.jwt_secret == "changeme" {
        tracing::warn!("JWT_SECRET not set, using the insecure default");
    }
    if !config.google.is_configured() {
        tracing::warn!("Google OAuth credentials not set, /auth/google is disabled");
    }

    let conn = db::init_db(&config.database_url)?;

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .client_url
                .parse::<HeaderValue>()
                .context("CLIENT_URL is not a valid origin")?,
        )
        .allow_methods(Any)
        .allow_headers(Any);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        jwt: JwtService::new(&config.jwt_secret, config.jwt_ttl_secs),
        identity: Box::new(GoogleProvider::new(config.google.clone())),
        config: config.clone(),
    });

    let app = handlers::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
