use std::sync::Arc;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::info;

use catalog_watcher::bus::BusClient;
use catalog_watcher::config::AppConfig;
use catalog_watcher::fetcher::PageFetcher;
use catalog_watcher::notifier::Notifier;
use catalog_watcher::pipeline::Pipeline;
use catalog_watcher::reconciler::Reconciler;
use catalog_watcher::registry::ConnectionRegistry;
use catalog_watcher::scheduler::Scheduler;
use catalog_watcher::store::ProductStore;
use catalog_watcher::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("catalog_watcher=debug".parse()?),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!("Starting Catalog Watcher...");

    std::fs::create_dir_all("data").ok();
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    let store = ProductStore::new(pool.clone());
    store.ensure_schema().await?;

    let registry = Arc::new(ConnectionRegistry::new());
    let bus = BusClient::connect(&config.nats.url).await;
    let notifier = Notifier::new(bus.clone(), Arc::clone(&registry));

    // bus -> live bridge runs on its own task
    {
        let bus = bus.clone();
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { bus.run_bridge(registry).await });
    }

    let fetcher = PageFetcher::new(config.parser.clone())?;
    let pipeline = Arc::new(Pipeline::new(
        fetcher,
        Reconciler::new(pool),
        notifier.clone(),
    ));

    let shutdown = CancellationToken::new();
    let scheduler = Scheduler::new(
        Arc::clone(&pipeline),
        config.parser.interval_seconds,
        shutdown.clone(),
    );
    let scheduler_handle = tokio::spawn(scheduler.run());

    // ctrl-c fires the shared cancellation token
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down...");
                shutdown.cancel();
            }
        });
    }

    let state = AppState {
        store,
        pipeline,
        notifier,
        registry,
        shutdown: shutdown.clone(),
    };
    web::serve(&config.server, state, shutdown.clone()).await?;

    shutdown.cancel();
    scheduler_handle.await.ok();
    info!("Shutdown complete");
    Ok(())
}
