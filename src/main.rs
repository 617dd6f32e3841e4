use std::sync::{Arc, Mutex};

use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use slotbook::config::AppConfig;
use slotbook::db;
use slotbook::handlers;
use slotbook::services::resources::http::HttpResourceLookup;
use slotbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let resources = HttpResourceLookup::new(
        config.resource_service_url.clone(),
        config.internal_service_key.clone(),
        config.resource_timeout_ms,
    )?;
    tracing::info!(
        "resource lookups via {} (timeout {}ms)",
        config.resource_service_url,
        config.resource_timeout_ms
    );

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        resources: Box::new(resources),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id",
            patch(handlers::bookings::update_booking),
        )
        .route(
            "/api/bookings/:id",
            delete(handlers::bookings::delete_booking),
        )
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/:id/status",
            post(handlers::bookings::update_booking_status),
        )
        .route(
            "/api/bookings/:id/payment",
            post(handlers::bookings::update_payment_status),
        )
        .route(
            "/api/users/:id/bookings",
            get(handlers::bookings::user_bookings),
        )
        .route(
            "/api/vendors/:id/bookings",
            get(handlers::bookings::vendor_bookings),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
