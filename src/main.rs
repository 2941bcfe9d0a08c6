use anyhow::Context;
use basisbook::config::CacheBackendKind;
use basisbook::{api, config::Config, init_db, BinanceQuoteSource, CacheBackend, SqliteCache, TtlCache};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;

    // Both backends run a reaper that must be stopped on shutdown; keep typed handles.
    let mut memory_cache: Option<Arc<TtlCache<serde_json::Value>>> = None;
    let mut sqlite_cache: Option<Arc<SqliteCache>> = None;
    let cache: Arc<dyn CacheBackend> = match config.cache_backend {
        CacheBackendKind::Memory => {
            let cache = Arc::new(TtlCache::<serde_json::Value>::new(
                config.cache_default_ttl,
                config.cache_cleanup_interval,
            ));
            cache.start().await;
            let backend: Arc<dyn CacheBackend> = cache.clone();
            memory_cache = Some(cache);
            backend
        }
        CacheBackendKind::Sqlite => {
            let path = config
                .cache_database_path
                .as_deref()
                .context("CACHE_DATABASE_PATH is required for the sqlite cache")?;
            let pool = init_db(path)
                .await
                .with_context(|| format!("Failed to initialize cache database at {}", path))?;
            let cache = Arc::new(SqliteCache::new(
                pool,
                config.cache_default_ttl,
                config.cache_cleanup_interval,
            ));
            cache.start().await;
            let backend: Arc<dyn CacheBackend> = cache.clone();
            sqlite_cache = Some(cache);
            backend
        }
    };

    let source = Arc::new(BinanceQuoteSource::new(
        config.binance_api_url.clone(),
        tokio::runtime::Handle::current(),
    ));
    let state = api::AppState::build(&config, source, cache);
    let app = api::create_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(cache) = memory_cache {
        cache.stop().await;
    }
    if let Some(cache) = sqlite_cache {
        cache.stop().await;
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
