use tokio::net::TcpListener;

mod common;
mod config;
mod extractors;
mod logging;
mod middlewares;
mod routes;
mod server;
mod state;
mod upload;

/// Same code as an invalid logging option.
const EXIT_LOGGING_FAILED: i32 = 8;
/// Exit code when the listen address cannot be bound.
const EXIT_BIND_FAILED: i32 = 10;
/// Exit code when the server stops with an error.
const EXIT_SERVER_FAILED: i32 = 11;

#[tokio::main]
async fn main() {
    let config = match config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}, exiting...");
            std::process::exit(err.exit_code());
        }
    };
    let logs = match logging::registry_logs(&config.logs) {
        Ok(logs) => logs,
        Err(err) => {
            eprintln!("Error: Failed to initialize logging: {err:?}, exiting...");
            std::process::exit(EXIT_LOGGING_FAILED);
        }
    };
    let listener = match TcpListener::bind(&config.server.listen_address).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(
                "Failed to bind {}: {err}, exiting...",
                config.server.listen_address
            );
            std::process::exit(EXIT_BIND_FAILED);
        }
    };

    tracing::info!("Listening at {}", config.server.listen_address);
    tracing::info!(
        "Web interface is {}",
        if config.server.enable_webform {
            "enabled"
        } else {
            "disabled"
        }
    );
    tracing::info!("Public root set to {}", config.upload.public_root);
    tracing::info!("Storage is at {:?}", config.storage.dir);
    tracing::info!("Max file size is {} MB", config.upload.max_upload_size_mb);

    let args = server::ServerArgs { logs, config };
    if let Err(err) = server::run_until_done(args, listener).await {
        tracing::error!("Server stopped: {err:?}");
        std::process::exit(EXIT_SERVER_FAILED);
    }
}
