mod config;
mod db;
mod protocol;
mod routes;
mod rules;
mod services;
mod state;

use std::sync::Arc;

use services::persistence::{self, GameStore, NullGameStore, PgGameStore};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::ServerConfig::from_env();

    // Storage is optional: without it games are played but not recorded.
    let store: Arc<dyn GameStore> = match config.database_url.as_deref() {
        Some(url) => match db::init_pool(url, config.db_max_connections).await {
            Ok(pool) => {
                tracing::info!(max_connections = config.db_max_connections, "game storage connected");
                Arc::new(PgGameStore::new(pool))
            }
            Err(e) => {
                tracing::error!(error = %e, "database init failed; game records disabled");
                Arc::new(NullGameStore)
            }
        },
        None => {
            tracing::warn!("DATABASE_URL not set; game records disabled");
            Arc::new(NullGameStore)
        }
    };

    let (recorder, _record_worker) = persistence::spawn_record_worker(store.clone(), config.record_queue_capacity);
    let state = state::AppState::new(recorder, store, config.game);

    let app = routes::app(state, &config.static_dir);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, clock_seconds = config.game.clock_seconds, "xiangqi server listening");
    axum::serve(listener, app).await.expect("server failed");
}
