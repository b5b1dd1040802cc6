//! # chathubd: chathub daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (`chathub.toml`, env vars)
//! - Initialize logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Pick the channel provider (virtual or Z-API)
//! - Build the session registry, the inbound pipeline and the dispatcher
//! - Build the axum router and serve it
//! - On SIGTERM/SIGINT, stop accepting requests and disconnect every session
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use chathub_adapter_http_axum::state::AppState;
use chathub_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, Database, SqliteAutomationRuleRepository, SqliteMessageStore,
};
use chathub_adapter_virtual::VirtualProvider;
use chathub_adapter_zapi::ZapiProvider;
use chathub_app::automation_engine::AutomationEngine;
use chathub_app::dispatcher::MessageDispatcher;
use chathub_app::event_bus::InProcessEventBus;
use chathub_app::ingestion::MessageIngestion;
use chathub_app::message_log::MessageLog;
use chathub_app::normalizer::WebhookNormalizer;
use chathub_app::ports::ChannelProvider;
use chathub_app::qr_cache::QrCodeCache;
use chathub_app::registry::SessionRegistry;
use chathub_app::services::automation_service::AutomationService;

use crate::config::{Config, ProviderKind};

/// Buffer between connection workers and the inbound pipeline.
const INBOUND_BUFFER: usize = 1024;
/// Capacity of the session event bus feeding SSE subscribers.
const EVENT_BUS_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;

    match config.provider.kind {
        ProviderKind::Virtual => {
            let provider = VirtualProvider::new(config.virtual_config());
            serve(&config, &db, provider).await
        }
        ProviderKind::Zapi => {
            let provider = ZapiProvider::new(config.zapi_config()?)?;
            serve(&config, &db, provider).await
        }
    }
}

async fn serve<P>(
    config: &Config,
    db: &Database,
    provider: P,
) -> Result<(), Box<dyn std::error::Error>>
where
    P: ChannelProvider + Send + Sync + 'static,
{
    let pool = db.pool().clone();

    // Repositories
    let automation_repo = Arc::new(SqliteAutomationRuleRepository::new(pool.clone()));
    let message_store = Arc::new(SqliteMessageStore::new(pool));

    // Sessions
    let event_bus = Arc::new(InProcessEventBus::new(EVENT_BUS_CAPACITY));
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
    let registry = Arc::new(SessionRegistry::new(
        provider,
        Arc::clone(&event_bus),
        Arc::new(QrCodeCache::new()),
        inbound_tx,
        config.session_config(),
    ));

    // Inbound pipeline
    let dispatcher = MessageDispatcher::new()
        .with_handler(Arc::new(MessageLog::new(Arc::clone(&message_store))))
        .with_handler(Arc::new(AutomationEngine::new(
            Arc::clone(&automation_repo),
            Arc::clone(&registry),
        )));
    tracing::info!(handlers = ?dispatcher.handler_names(), "message dispatcher ready");
    let ingestion = Arc::new(MessageIngestion::new(
        WebhookNormalizer::new(config.dedup_window()),
        Arc::new(dispatcher),
    ));
    let pipeline = tokio::spawn(Arc::clone(&ingestion).run(inbound_rx));

    // HTTP
    let state = AppState::new(
        Arc::clone(&registry),
        ingestion,
        Arc::new(AutomationService::new(automation_repo)),
        message_store,
        event_bus,
    );
    let app = chathub_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        addr = %bind_addr,
        provider = %config.provider.kind,
        "chathubd listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down, disconnecting sessions");
    registry.disconnect_all().await;
    // The automation engine keeps the registry, and with it the inbound
    // sender, alive: the pipeline never drains on its own.
    pipeline.abort();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
