//! services/api/src/bin/api.rs

use api_lib::{
    adapters::DbAdapter,
    config::Config,
    error::ApiError,
    web::{
        book_progress_handler, create_book_handler, create_session_handler,
        delete_session_handler, get_book_handler, list_books_handler, list_sessions_handler,
        load_correction_handler, preview_correction_handler, rest::ApiDoc,
        save_correction_handler, state::AppState, trace_requests, update_session_handler,
    },
};
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(db_adapter, config.clone()));

    let allowed_origin = config
        .cors_allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS origin: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    let api_router = Router::new()
        .route("/books", get(list_books_handler).post(create_book_handler))
        .route("/books/{id}", get(get_book_handler))
        .route("/books/{id}/progress", get(book_progress_handler))
        .route(
            "/books/{id}/progress-correction",
            get(load_correction_handler).post(save_correction_handler),
        )
        .route(
            "/books/{id}/progress-correction/preview",
            post(preview_correction_handler),
        )
        .route("/sessions", get(list_sessions_handler).post(create_session_handler))
        .route(
            "/sessions/{id}",
            put(update_session_handler).delete(delete_session_handler),
        )
        .layer(axum_middleware::from_fn(trace_requests))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Wire Up Graceful Shutdown ---
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received.");
        signal_token.cancel();
    });

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Server stopped.");
    Ok(())
}
