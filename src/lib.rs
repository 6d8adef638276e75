pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use error::{MatrixError, MatrixResult};

// Export engine types
pub use logic::{
    canonicalize, ClientIndexAllocator, CombinationGenerator, HydrationReport, Hydrator,
    ImageStager, RowReconciler, SessionPhase, SubmissionBuilder, SubmissionTransport,
    VariantSession,
};

// Export all model types
pub use model::*;

pub use store::SessionCache;

use std::sync::Arc;
use std::time::Duration;

/// Build handler state from configuration
pub fn app_state(config: &config::AppConfig) -> api::AppState {
    Arc::new(api::ApiContext {
        sessions: SessionCache::new(Duration::from_secs(config.sessions.ttl_secs)),
        matrix: config.matrix.clone(),
    })
}

/// Load configuration, start the idle-session sweeper and serve the API
pub async fn run_server() -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with INFO level unless RUST_LOG says otherwise
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();

    log::info!("Variant matrix: session server");

    // Load configuration
    let config = crate::config::AppConfig::load()?;
    log::info!(
        "Configuration loaded: server={}:{}, combination cap={}",
        config.server.host,
        config.server.port,
        config.matrix.combination_cap
    );

    let state = app_state(&config);

    // Sweep idle sessions so their previews are released
    let sessions = state.sessions.clone();
    let sweep_every = Duration::from_secs(config.sessions.ttl_secs.clamp(1, 60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            sessions.evict_expired().await;
        }
    });

    let app = crate::api::routes::create_router().with_state(state);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Variant matrix server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
