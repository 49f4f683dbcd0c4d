// The endpoint catalogue in api/index.rs is a single large json! literal
#![recursion_limit = "256"]

use axum::Server;
use config::Config;
use std::net::SocketAddr;

mod api;
mod config;
mod db;
mod errors;
mod logging;
mod schema;
mod services;
mod validation;

/// Result type for API
pub type Result<T> = std::result::Result<T, errors::ApiError>;

/// Static configuration instance for the API
static CONFIG: once_cell::sync::Lazy<Config> = once_cell::sync::Lazy::new(|| {
    dotenv::dotenv().ok();
    envy::from_env::<Config>().expect("Failed to load configuration")
});

#[tokio::main]
async fn main() {
    if let Err(err) = logging::setup_logging(&CONFIG.log_format) {
        eprintln!("Failed to initialize logging: {err}");
    }

    // Initialize database and Redis connections
    let db_client =
        db::DbClient::with_config(&CONFIG.database_url, &CONFIG.redis_url, CONFIG.db_pool_size);

    if let (Some(email), Some(password)) = (&CONFIG.admin_email, &CONFIG.admin_password) {
        match services::auth::ensure_admin(&db_client, email, password).await {
            Ok(true) => tracing::info!("Bootstrap admin {} created", email),
            Ok(false) => tracing::debug!("Bootstrap admin {} already exists", email),
            Err(err) => tracing::error!("Failed to create bootstrap admin: {}", err),
        }
    }

    // Start background jobs
    let bg_job_manager = services::background_jobs::BackgroundJobManager::new(db_client.clone());

    let initial_health = bg_job_manager.get_health_status().await;
    tracing::info!("Background job initial status: {:?}", initial_health);

    bg_job_manager.start_all_jobs().await;

    // Setup API router and start server
    let app = api::initialize_router(db_client);
    let addr = SocketAddr::from(([0, 0, 0, 0], CONFIG.port));
    tracing::info!("Server starting on {}", addr);

    if let Err(err) = Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
    {
        tracing::error!("Server error: {}", err);
    }
}
