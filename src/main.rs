use golf_server::{api, config::Config, create_app, db, tournament::TournamentManager};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    tracing::info!(
        "Starting golf tournament server (production: {})",
        config.is_production
    );

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let tournament_manager = Arc::new(TournamentManager::new(Arc::new(pool.clone())));

    let tournament_state = Arc::new(api::TournamentAppState {
        pool,
        tournament_manager,
    });

    let app = create_app(tournament_state);

    let addr = config.server_addr();
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
