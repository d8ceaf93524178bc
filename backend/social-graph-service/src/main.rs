use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use social_graph_service::config::{Config, StoreBackend};
use social_graph_service::{
    configure, db, telemetry, AppState, InMemorySocialStore, PostgresSocialStore, SocialStore,
};

#[actix_web::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    info!("Starting social-graph-service");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        env = %config.app.env,
        port = config.app.http_port,
        backend = ?config.store.backend,
        "Configuration loaded"
    );

    // One store handle per process, closed on shutdown
    let (store, pool) = match config.store.backend {
        StoreBackend::Postgres => {
            let db_config = config
                .store
                .database
                .as_ref()
                .context("DATABASE_URL environment variable not set")?;
            let pool = db::init_pool(db_config)
                .await
                .context("Failed to initialize database")?;
            let store: Arc<dyn SocialStore> = Arc::new(PostgresSocialStore::new(pool.clone()));
            (store, Some(pool))
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            let store: Arc<dyn SocialStore> = Arc::new(InMemorySocialStore::new());
            (store, None)
        }
    };

    let state = web::Data::new(AppState::new(
        store,
        &config.graph,
        config.feed.clone(),
    ));

    let bind_address = format!("{}:{}", config.app.host, config.app.http_port);
    info!("Starting HTTP server at {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run()
    .await
    .context("HTTP server error")?;

    if let Some(pool) = pool {
        pool.close().await;
        info!("Database pool closed");
    }

    info!("social-graph-service stopped");
    Ok(())
}
