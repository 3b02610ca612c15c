use std::{
    fs::OpenOptions,
    net::{IpAddr, SocketAddr},
    process::ExitCode,
    sync::Arc,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use finance_tracker::{
    AppState, build_router,
    config::{DEFAULT_HOST, DEFAULT_PORT, resolve_database_url},
    graceful_shutdown, logging_middleware,
    stores::{ConnectionManager, Storage},
};

/// The REST API server for the finance tracker.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// URL of the document database, e.g. `sqlite://finance_tracker.db` or `sqlite::memory:`.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// The address to serve the API from.
    #[arg(long, default_value = DEFAULT_HOST)]
    host: IpAddr,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(error) = setup_logging() {
        eprintln!("Could not set up logging: {error}");
        return ExitCode::FAILURE;
    }

    let args = Args::parse();
    let addr = SocketAddr::new(args.host, args.port);

    let database_url = resolve_database_url(args.database_url);
    let state = AppState::new(Storage::new(ConnectionManager::new(database_url)));

    // Requests are served from memory until a connection succeeds.
    let storage = state.storage.clone();
    tokio::spawn(async move {
        if let Err(error) = storage.connections().acquire().await {
            tracing::warn!("Starting without a database connection: {error}");
        }
    });

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(
        build_router(state.clone()).layer(middleware::from_fn(logging_middleware)),
    );

    tracing::info!("Server running on http://{addr}");
    let served = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await;

    if let Err(error) = state.storage.connections().close() {
        tracing::error!("Could not close the database connection: {error}");
    }

    match served {
        Ok(()) => {
            tracing::info!("Server shut down");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!("Failed to start server: {error}");
            ExitCode::FAILURE
        }
    }
}

fn setup_logging() -> Result<(), std::io::Error> {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")?;

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();

    Ok(())
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are logged by the handlers and the storage adapter.
        .on_failure(());

    router.layer(tracing_layer)
}
