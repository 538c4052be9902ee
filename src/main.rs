//! Worldsync Server
//!
//! Runs the login gateway and the world server in one process.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use worldsync_server::config::{LogFormat, ServerConfig};
use worldsync_server::game::world::run_world_loop;
use worldsync_server::net::handler::accept_connections;
use worldsync_server::state::AppState;
use worldsync_server::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env before reading WORLDSYNC_* overrides
    dotenv::dotenv().ok();

    // Load configuration. Logging depends on it, so this comes first.
    let config = ServerConfig::load().await?;

    // Initialize logging
    init_logging(&config);

    info!("Worldsync Server v{}", VERSION);
    if config.config_path.exists() {
        info!(
            "Configuration loaded from: {}",
            config.config_path.display()
        );
    } else {
        warn!(
            "No config file at {}, running with defaults",
            config.config_path.display()
        );
    }

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let state = Arc::new(
        AppState::new(config.clone(), shutdown_tx.clone())
            .context("Failed to initialize application state")?,
    );

    // Start the world tick
    let world_handle = tokio::spawn(run_world_loop(
        state.world.clone(),
        state.tick_rate(),
        shutdown_tx.subscribe(),
    ));

    // Gateway
    let gateway_addr: SocketAddr = format!("0.0.0.0:{}", config.gateway_port).parse()?;
    let gateway_listener = TcpListener::bind(gateway_addr)
        .await
        .with_context(|| format!("Failed to bind gateway on {}", gateway_addr))?;
    info!("Gateway listening on: {}", gateway_addr);

    // World server
    let world_addr: SocketAddr = format!("0.0.0.0:{}", config.world_port).parse()?;
    let world_listener = TcpListener::bind(world_addr)
        .await
        .with_context(|| format!("Failed to bind world server on {}", world_addr))?;
    info!("World server listening on: {}", world_addr);

    let mut handles = vec![
        tokio::spawn(accept_connections(
            gateway_listener,
            Arc::new(state.gateway_handler()),
            false,
            shutdown_tx.subscribe(),
        )),
        tokio::spawn(accept_connections(
            world_listener,
            Arc::new(state.world_handler()),
            false,
            shutdown_tx.subscribe(),
        )),
    ];

    // Browser clients reach the world server over WebSocket
    if config.websocket_enabled {
        let ws_addr: SocketAddr = format!("0.0.0.0:{}", config.websocket_port).parse()?;
        let ws_listener = TcpListener::bind(ws_addr)
            .await
            .with_context(|| format!("Failed to bind WebSocket server on {}", ws_addr))?;
        info!("WebSocket server listening on: {}", ws_addr);

        handles.push(tokio::spawn(accept_connections(
            ws_listener,
            Arc::new(state.world_handler()),
            true,
            shutdown_tx.subscribe(),
        )));
    }

    info!("Server startup complete!");

    // Wait for shutdown signal
    wait_for_shutdown(shutdown_tx.clone()).await;

    info!("Shutting down server...");

    // Wait for acceptors and the world loop to finish
    for handle in handles {
        if let Err(e) = handle.await {
            error!("Acceptor task failed: {}", e);
        }
    }
    if let Err(e) = world_handle.await {
        error!("World loop task failed: {}", e);
    }

    // Cleanup
    state.session_manager.disconnect_all();
    info!("All sessions disconnected");

    info!("Server shutdown complete. Goodbye!");
    Ok(())
}

/// Initialize the logging/tracing system
fn init_logging(config: &ServerConfig) {
    let default_filter = if config.debug {
        "debug"
    } else {
        "info,worldsync_server=debug"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Signal all tasks to shut down
    let _ = shutdown_tx.send(());
}
