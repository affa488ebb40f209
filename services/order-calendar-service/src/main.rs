// =============================================================================
// ORDER CALENDAR SERVICE - Main Entry Point
// =============================================================================
// Backend for the flower shop's order calendar.
//
// WHAT THIS SERVICE DOES:
// - Builds month/week calendar views of orders by shipping date
// - Saves, edits and deletes orders, keeping decoration stock in step
// - Manages the decoration character inventory
// - Summarizes revenue, shipping and net revenue for the visible period
// - Exposes Prometheus metrics for observability
//
// Sessions are read from Redis; orders and stock live in PostgreSQL, one
// owner per signed-in account.
// =============================================================================

mod auth; // Bearer token -> owner (auth.rs)
mod calendar; // Calendar grid and display model (calendar.rs)
mod config; // Configuration loading (config.rs)
mod db; // PostgreSQL gateway (db.rs)
mod error; // Error types (error.rs)
mod gateway; // Persistence trait (gateway.rs)
mod handlers; // HTTP request handlers (handlers.rs)
#[cfg(test)]
mod memory; // In-memory gateway for tests (memory.rs)
mod metrics; // Prometheus metrics setup (metrics.rs)
mod models; // Data structures (models.rs)
mod orders; // Order submit/delete workflow (orders.rs)
mod period; // Date and period arithmetic (period.rs)
mod stock; // Decoration stock accounting (stock.rs)
mod summary; // Revenue aggregation (summary.rs)

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::metrics::setup_metrics;

// -----------------------------------------------------------------------------
// APPLICATION STATE
// -----------------------------------------------------------------------------
// Shared by all handlers through State<Arc<AppState>>.
pub struct AppState {
    /// PostgreSQL pool; handlers scope it per request with `db.scoped(owner)`
    pub db: Database,

    /// Session store
    pub redis: redis::aio::ConnectionManager,

    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,

    pub config: Config,
}

fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        // ----- Calendar -----
        .route("/calendar", get(handlers::get_calendar))
        .route("/calendar/navigate", post(handlers::navigate_calendar))
        .route("/calendar/mode", post(handlers::set_view_mode))
        .route("/calendar/expand", post(handlers::expand_day))
        .route("/summary", get(handlers::get_summary))
        // ----- Orders -----
        .route(
            "/orders",
            get(handlers::list_orders).post(handlers::create_order),
        )
        .route("/orders/draft", get(handlers::order_draft))
        .route("/orders/decorations", post(handlers::select_decoration))
        .route(
            "/orders/:id",
            get(handlers::get_order)
                .put(handlers::update_order)
                .delete(handlers::delete_order),
        )
        // ----- Decoration stock -----
        .route("/stock", get(handlers::list_stock).post(handlers::add_stock))
        .route("/stock/:id", delete(handlers::delete_stock))
        .route("/stock/:id/adjust", post(handlers::adjust_stock))
        // ----- Session -----
        .route("/session", delete(handlers::logout));

    Router::new()
        // ----- Health, readiness, metrics (no session required) -----
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/api/v1", api)
        .route_layer(middleware::from_fn(handlers::track_metrics))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -------------------------------------------------------------------------
    // STEP 1: Environment and logging
    // -------------------------------------------------------------------------
    // .env is optional; real deployments set the variables directly
    dotenvy::dotenv().ok();

    // RUST_LOG overrides, e.g. RUST_LOG=info,order_calendar_service=trace
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,order_calendar_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Order Calendar Service...");

    // -------------------------------------------------------------------------
    // STEP 2: Configuration and metrics
    // -------------------------------------------------------------------------
    let config = Config::from_env()?;
    info!(
        port = config.port,
        month_badges = config.badge_limits.month,
        week_badges = config.badge_limits.week,
        "Configuration loaded"
    );

    let metrics_handle = setup_metrics()?;
    info!("Prometheus metrics initialized");

    // -------------------------------------------------------------------------
    // STEP 3: PostgreSQL
    // -------------------------------------------------------------------------
    let db = Database::connect(&config.database_url, config.db_max_connections).await?;
    info!("Connected to PostgreSQL");

    db.run_migrations().await?;
    info!("Database migrations completed");

    // -------------------------------------------------------------------------
    // STEP 4: Redis session store
    // -------------------------------------------------------------------------
    let redis_client = redis::Client::open(config.redis_url.as_str())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;
    info!("Connected to Redis");

    // -------------------------------------------------------------------------
    // STEP 5: Serve
    // -------------------------------------------------------------------------
    let addr = format!("0.0.0.0:{}", config.port);

    let state = Arc::new(AppState {
        db,
        redis: redis_conn,
        metrics_handle,
        config,
    });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Order Calendar Service is listening");

    axum::serve(listener, router(state)).await?;

    Ok(())
}
