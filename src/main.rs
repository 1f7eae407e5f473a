//! Countdown Sequencer - serial/parallel countdowns with reminders over HTTP
//!
//! This is the main entry point for the countdown-sequencer application.

use std::sync::Arc;
use tokio::{
    net::TcpListener,
    sync::{broadcast, mpsc, watch},
};
use tracing::info;

use countdown_sequencer::{
    api::create_router,
    config::Config,
    engine::{Engine, TokioClock},
    services::{AlertDispatcher, ChannelSink, FileBackend, Store},
    state::AppState,
    tasks::engine_task,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("countdown_sequencer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting countdown-sequencer v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, state_dir={}",
        config.host,
        config.port,
        config.state_dir.display()
    );

    let mut store = Store::new(Box::new(FileBackend::new(&config.state_dir)));
    if config.fresh {
        info!("Discarding saved session");
        store.clear();
    }

    // Engine and its event queue
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (notifications, _) = broadcast::channel(256);
    let engine = Engine::restore(
        TokioClock::new(events_tx.clone()),
        store,
        AlertDispatcher::with_sink(ChannelSink::new(notifications.clone())),
        config.mode.into(),
    );
    let (session_tx, session_rx) = watch::channel(engine.session().clone());
    let engine_handle = tokio::spawn(engine_task(engine, events_rx, session_tx));

    // Create application state
    let state = Arc::new(AppState::new(
        config.port,
        config.host.clone(),
        events_tx,
        session_rx,
        notifications,
    ));

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /countdowns/:id/{{start,toggle,pause,resume,reset}}");
    info!("  PUT  /timers/:index/{{duration,reminders,name,appearance,beep-at,sound}}");
    info!("  GET  /events     - Stream alerts and display updates");
    info!("  GET  /status     - Current session");
    info!("  GET  /health     - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        result = shutdown_signal() => {
            match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => tracing::error!("Failed to listen for signals: {}", e),
            }
        }
    }

    state.shutdown_engine().await;
    if let Err(e) = engine_handle.await {
        tracing::error!("Engine task failed: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}
