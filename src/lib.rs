//! Golf Club Tournament Server Library
//!
//! This module exposes the server components for integration testing.

pub mod api;
pub mod club;
pub mod config;
pub mod db;
pub mod error;
pub mod tournament;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Creates the application router with all endpoints
pub fn create_app(tournament_state: Arc<api::TournamentAppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "Golf Tournament Server" }))
        .route("/health", get(|| async { "OK" }))
        .nest(
            "/api/tournaments",
            api::tournaments_router().with_state(tournament_state),
        )
        .layer(cors)
}

/// Test helper to create an in-memory database and run migrations
pub async fn create_test_db() -> db::DbPool {
    let pool = sqlx::sqlite::SqlitePool::connect(":memory:")
        .await
        .expect("Failed to create in-memory database");

    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Test helper to create a fully configured test app
pub async fn create_test_app() -> (Router, db::DbPool) {
    let pool = create_test_db().await;

    let tournament_manager = Arc::new(tournament::TournamentManager::new(Arc::new(pool.clone())));

    let tournament_state = Arc::new(api::TournamentAppState {
        pool: pool.clone(),
        tournament_manager,
    });

    let app = create_app(tournament_state);
    (app, pool)
}
