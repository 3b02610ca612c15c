//! Finance Tracker is a web app for tracking personal income and expenses.
//!
//! This library provides a JSON REST API for transactions. Transactions are
//! stored in a SQLite document database, and in memory whenever the database
//! cannot be reached.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::Serialize;
use tokio::signal;

mod app_state;
pub mod config;
pub mod database_id;
pub mod endpoints;
mod logging;
mod routing;
pub mod stores;
pub mod transaction;
pub mod user;
pub mod validation;

pub use app_state::AppState;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;

use crate::validation::ValidationErrors;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(error) => {
                tracing::error!("Failed to install terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The transaction ID in the request path is not an integer.
    #[error("invalid transaction ID")]
    InvalidTransactionId,

    /// The request body for a transaction failed validation.
    #[error("{0}")]
    InvalidTransactionData(ValidationErrors),

    /// The request body could not be read as JSON of the expected shape.
    #[error("could not parse request body: {0}")]
    InvalidRequestBody(String),

    /// The requested transaction does not exist.
    #[error("the transaction could not be found")]
    TransactionNotFound,

    /// The requested route does not exist.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The username is already taken by another user.
    #[error("the username \"{0}\" already exists")]
    DuplicateUsername(String),

    /// Another caller is already connecting to the database.
    #[error("database connection already in progress")]
    ConnectionInProgress,

    /// The previous connection attempt started too recently to try again.
    #[error("database connection attempt rate limited")]
    ConnectionRateLimited,

    /// The database URL does not point to a supported database.
    #[error("unsupported database URL \"{0}\"")]
    UnsupportedDatabaseUrl(String),

    /// A blocking database task panicked or was cancelled.
    #[error("database task failed: {0}")]
    ConnectionTask(String),

    /// A string could not be parsed as a native document ID.
    #[error("malformed native ID \"{0}\"")]
    MalformedNativeId(String),

    /// A stored document could not be encoded or decoded.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// No free integer ID could be found for a new document.
    #[error("could not find an unused ID in the {0} collection")]
    IdCollision(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire a store lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A storage operation failed unexpectedly. Holds the message shown to the client.
    #[error("{0}")]
    OperationFailed(&'static str),
}

impl Error {
    /// Whether the error is a failure of the storage machinery rather than a
    /// problem with the request.
    ///
    /// Operational errors from the database are absorbed by
    /// [Storage](stores::Storage), which retries the operation in memory.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            Error::ConnectionInProgress
                | Error::ConnectionRateLimited
                | Error::UnsupportedDatabaseUrl(_)
                | Error::ConnectionTask(_)
                | Error::MalformedNativeId(_)
                | Error::MalformedDocument(_)
                | Error::IdCollision(_)
                | Error::SqlError(_)
                | Error::DatabaseLockError
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        tracing::debug!("SQL error: {value}");
        Error::SqlError(value)
    }
}

/// The JSON body of an error response.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn render_error(status: StatusCode, message: &str, error: Option<String>) -> Response {
    (status, Json(ErrorBody { message, error })).into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::InvalidTransactionId => {
                render_error(StatusCode::BAD_REQUEST, "Invalid transaction ID", None)
            }
            Error::InvalidTransactionData(errors) => render_error(
                StatusCode::BAD_REQUEST,
                "Invalid transaction data",
                Some(errors.to_string()),
            ),
            Error::InvalidRequestBody(reason) => render_error(
                StatusCode::BAD_REQUEST,
                "Invalid transaction data",
                Some(reason),
            ),
            Error::TransactionNotFound => {
                render_error(StatusCode::NOT_FOUND, "Transaction not found", None)
            }
            Error::NotFound => render_error(StatusCode::NOT_FOUND, "Not found", None),
            Error::OperationFailed(message) => {
                render_error(StatusCode::INTERNAL_SERVER_ERROR, message, None)
            }
            Error::DuplicateUsername(_) => render_error(
                StatusCode::CONFLICT,
                "Username already exists",
                None,
            ),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                render_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong",
                    None,
                )
            }
        }
    }
}
