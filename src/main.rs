use std::sync::Arc;

use fleet::config::AppConfig;
use fleet::db::{init_pool, run_migrations};
use fleet::error::AppError;
use fleet::routes::create_router;
use fleet::services::{api::HttpBackend, storage::StorageService};
use fleet::state::AppState;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let db = init_pool(&config.database_url).await?;

    if let Err(err) = run_migrations(&db).await {
        error!("migration failed: {err:?}");
        return Err(err);
    }

    let storage = StorageService::new(config.data_root.clone());
    storage.ensure_structure().await?;

    let api = HttpBackend::new(config.api_base_url.clone())?;
    info!(backend = %config.api_base_url, "using backend api");

    let state = AppState::new(config.clone(), db, storage, Arc::new(api));

    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,fleet=debug,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
