use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use beacon::app::alerts::LogAlerter;
use beacon::app::engine::{EngineDeps, NotificationEngine};
use beacon::app::persistence::{MemorySlot, NotificationSlot};
use beacon::config::AppConfig;
use beacon::domain::change::Source;
use beacon::infra::{cache::RedisCache, cache::RedisSlot, change_feed::PgChangeFeed, db::Db, records::PgSeedSource};
use beacon::{http, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::connect(&config).await?;
    let slot: Arc<dyn NotificationSlot> = match RedisCache::connect(&config.redis_url).await {
        Ok(cache) => Arc::new(RedisSlot::new(cache, config.persistence_key.clone())),
        Err(err) => {
            tracing::warn!(error = ?err, "redis unavailable, notification feed will not persist");
            Arc::new(MemorySlot::new())
        }
    };

    let mut deps = EngineDeps::new(
        Arc::new(PgChangeFeed::new(db.clone())),
        Arc::new(PgSeedSource::new(db)),
        slot,
    );
    deps.feed_policy = config.feed;
    deps.reconnect_policy = config.reconnect;
    if config.watch_content_submissions {
        deps.sources.push(Source::Content);
    }
    if config.log_alerts {
        deps.alerter = Arc::new(LogAlerter);
    }

    let engine = Arc::new(NotificationEngine::start(deps).await);
    let state = AppState {
        engine: engine.clone(),
        admin_token: config.admin_token.clone(),
    };

    let app = http::router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!("listening on {}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
