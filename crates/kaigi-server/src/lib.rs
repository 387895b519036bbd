pub mod ai;
pub mod api;
pub mod collab;
pub mod config;
pub mod db;
pub mod error;
pub mod store;

use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use kaigi_sync::PresenceHub;

use crate::ai::TextGenerator;
use crate::collab::FeedHub;
use crate::config::Config;
use crate::db::Database;
use crate::store::PgStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub store: PgStore,
    pub presence: Arc<PresenceHub>,
    pub generator: Arc<dyn TextGenerator>,
}

/// Run the server with the given configuration
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    // Initialize database
    let db = Database::connect(&config.database_url).await?;

    // Run migrations
    db.migrate().await?;

    // Change-notification fan-out and durable store
    let feeds = Arc::new(FeedHub::new());
    let store = PgStore::new(db.clone(), Arc::clone(&feeds));

    // Ephemeral presence hub
    let presence = Arc::new(PresenceHub::new());

    // AI collaborator
    let generator = ai::generator_from_config(&config);

    // Create application state
    let state = AppState {
        db,
        store,
        presence,
        generator,
    };

    // Build the router
    let app = Router::new()
        .merge(api::router())
        .merge(collab::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
