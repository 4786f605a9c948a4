use std::net::SocketAddr;

use tokio::signal;
use tracing::info;

use csvpipe::config::{default_storage_root, load_settings};
use csvpipe::logging::init_logging;
use csvpipe::{App, Settings};
use csvpipe_server::{router, ServerError};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8080";

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let settings = match std::env::var("CSVPIPE_CONFIG") {
        Ok(path) => load_settings(path)?,
        Err(_) => Settings::new(default_storage_root()),
    };
    init_logging(&settings.logging);

    let app = App::start(&settings)?;
    let routes = router(app.service(), settings.upload.max_bytes);

    let host = std::env::var("CSVPIPE_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = std::env::var("CSVPIPE_PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
    let raw = format!("{}:{}", host, port);
    let addr: SocketAddr = raw.parse().map_err(|_| ServerError::InvalidAddress(raw))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, routes)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let in-flight jobs finish before the process exits.
    tokio::task::spawn_blocking(move || app.shutdown())
        .await
        .map_err(|e| ServerError::Io(std::io::Error::other(e)))?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("Received terminate signal, starting graceful shutdown"),
    }
}
