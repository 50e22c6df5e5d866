//! lixd - Norwegian readability analysis daemon
//!
//! Serves HTTP/WebSocket analysis endpoints, bridges the Redis pub/sub bus
//! and a durable AMQP queue for critical requests, and offers background
//! job/batch processing for oversized input.

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::unused_async)]
#![allow(clippy::unused_self)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::similar_names)]
#![allow(clippy::ref_option)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::float_cmp)]

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod bus;
mod cache;
mod circuit_breaker;
mod config;
mod daemon;
mod metrics;
mod pubsub;
mod queue;
mod scheduler;
mod validation;
mod ws;

use crate::cache::CacheLayer;
use crate::config::Config;
use crate::daemon::AppState;
use crate::pubsub::PubSubRouter;
use crate::queue::PersistentQueue;
use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    lix_core::util::load_env_file();

    let config = Config::load()?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("lixd={},tower_http=debug", config.logging.level).into());

    let file_logging_enabled = if !config.daemon.log_file.is_empty() {
        let log_path = std::path::Path::new(&config.daemon.log_file);
        let log_dir = log_path.parent().unwrap_or(std::path::Path::new("."));
        let log_filename = log_path.file_name().and_then(|s| s.to_str()).unwrap_or("lixd.log");

        let can_write = (|| -> std::io::Result<()> {
            if !log_dir.exists() {
                std::fs::create_dir_all(log_dir)?;
            }
            let test_path = log_dir.join(".write_test");
            std::fs::write(&test_path, "test")?;
            std::fs::remove_file(&test_path)?;
            Ok(())
        })();

        match can_write {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
                    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
                    .init();

                Box::leak(Box::new(guard));
                true
            }
            Err(e) => {
                tracing_subscriber::registry().with(env_filter).with(tracing_subscriber::fmt::layer()).init();
                eprintln!("Warning: Could not set up file logging to '{}': {e}. Using stdout only.", config.daemon.log_file);
                false
            }
        }
    } else {
        tracing_subscriber::registry().with(env_filter).with(tracing_subscriber::fmt::layer()).init();
        false
    };

    info!("Starting lixd v{}", env!("CARGO_PKG_VERSION"));
    if file_logging_enabled {
        info!("Logging to file: {}", config.daemon.log_file);
    } else if !config.daemon.log_file.is_empty() {
        warn!("File logging was configured but could not be enabled");
    }
    info!(bind_address = %config.daemon.bind_address, "configuration loaded");

    let cache = Arc::new(CacheLayer::connect(&config.cache)?);
    metrics::set_cache_connected(cache.ping().await);

    let queue = PersistentQueue::new(&config.messaging);
    let pubsub = PubSubRouter::new(&config.cache);
    let service = Arc::new(lix_core::ReadabilityService::new());
    let scheduler = Scheduler::new(Arc::clone(&service), Arc::clone(&cache), &config);

    queue.register_handler(bus::queue_consumer_handler(Arc::clone(&scheduler), Arc::clone(&cache), Arc::clone(&pubsub)));
    pubsub.register(
        pubsub::channels::LIX,
        bus::domain_channel_handler(Arc::clone(&scheduler), Arc::clone(&cache), Arc::clone(&queue)),
    );

    if let Err(e) = queue.start_consumer().await {
        warn!(error = %e, "persistent queue consumer failed to start, critical requests will retry lazily");
    }
    if let Err(e) = pubsub.start().await {
        warn!(error = %e, "pub/sub router failed to start, will keep retrying in the background");
    }

    daemon::log_routes();
    let state = AppState {
        scheduler,
        cache,
        pubsub: Arc::clone(&pubsub),
        queue,
        config: Arc::new(config.clone()),
        started_at: Instant::now(),
    };

    let app = daemon::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.daemon.bind_address).await?;
    info!(bind_address = %config.daemon.bind_address, "lixd listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        error!(error = %e, "server error");
    }

    let _ = pubsub.shutdown().await;
    info!("lixd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}. Using fallback.");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}. Using Ctrl+C only.");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        () = terminate => {
            info!("Received SIGTERM");
        }
    }
}
