use std::sync::Arc;

use authgate::core::auth::{AuthApiState, KeyError, PasswordError, SigningKey, auth_api_router};
use authgate::core::config::Config;
use authgate::core::db::{
    DbConfig, DbError, InMemoryUserStore, PgUserStore, UserStore, create_pool_with_migrations,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Errors that stop the process before it serves a request
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error("Invalid hasher settings: {0}")]
    Hasher(#[from] PasswordError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(Config::from_env()).await {
        tracing::error!("Startup failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    // Log config status (without revealing secrets)
    tracing::info!(
        "Config loaded: bind_addr={}, database={}, bcrypt_cost={}, hash_workers={}",
        config.bind_addr,
        config.has_database(),
        config.bcrypt_cost,
        config.hash_workers
    );

    // No request may be served without a key
    let key = Arc::new(SigningKey::generate()?);
    tracing::info!("Signing key generated; tokens from previous runs are invalid");

    let store: Arc<dyn UserStore> = match DbConfig::from_config(&config) {
        Some(db_config) => {
            let pool = create_pool_with_migrations(&db_config).await?;
            Arc::new(PgUserStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; identities are kept in memory only");
            Arc::new(InMemoryUserStore::new())
        }
    };

    let state = AuthApiState::new(&config, key, store)?;
    let app = auth_api_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
