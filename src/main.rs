use sheet_rollup::api::state::AppState;
use sheet_rollup::config::Config;
use sheet_rollup::server;
use sheet_rollup::sheet::source::CsvDirectory;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sheet_rollup=info,tower_http=info".into());
    let json_logs = std::env::var("ROLLUP_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref().map(std::path::Path::new));

    tracing::info!(
        host = %config.host,
        port = config.port,
        sheets_dir = %config.sheets_dir.display(),
        sources = config.sources.len(),
        "Starting sheet-rollup"
    );

    if !config.sheets_dir.is_dir() {
        tracing::warn!(
            sheets_dir = %config.sheets_dir.display(),
            "Sheets directory does not exist; every rollup will fail until it is created"
        );
    }

    let sheets = Arc::new(CsvDirectory::new(&config.sheets_dir));
    let state = Arc::new(AppState::new(config, sheets));

    // Periodically drop expired cache entries
    if !state.cache.ttl().is_zero() {
        let cache = state.cache.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cache.ttl());
            loop {
                interval.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "Purged expired cache entries");
                }
            }
        });
    }

    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = server::build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(addr = %addr, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
    tracing::info!("Shut down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
