use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use teledraw::canvas::CanvasStore;
use teledraw::config::ServerConfig;
use teledraw::routes;
use teledraw::services::engine::spawn_engine;
use teledraw::services::loader::load_state;
use teledraw::services::persistence::spawn_persistence_worker;
use teledraw::services::storage::FileStorage;
use teledraw::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();
    info!(public_dir = %config.public_dir.display(), state_file = %config.state_file.display(), "teledraw starting");

    // State is loaded before the listener exists, so no client sees an empty canvas first.
    let storage = Arc::new(FileStorage::new(config.state_file.clone()));
    let mut store = CanvasStore::default();
    load_state(storage.as_ref(), &mut store).await;
    let (writer, writer_task) = spawn_persistence_worker(storage);
    let (engine, engine_task) = spawn_engine(store, config.engine, writer);

    let app = routes::app(AppState::new(engine.clone(), &config), &config);
    let listener = match TcpListener::bind(("0.0.0.0", config.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, port = config.port, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(port = config.port, "teledraw listening");
    let served = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;
    if let Err(e) = &served {
        error!(error = %e, "server failed");
    }

    // Stop the engine first: it flushes a pending save, then drops the
    // writer's only sender so the writer drains and exits.
    if engine.shutdown().await.is_err() {
        warn!("engine already stopped");
    }
    if let Err(e) = engine_task.await {
        error!(error = %e, "engine task failed");
    }
    if let Err(e) = writer_task.await {
        error!(error = %e, "persistence writer failed");
    }
    info!("teledraw stopped");

    if served.is_ok() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
