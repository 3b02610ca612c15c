//! Route handlers for the transactions REST API.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    AppState, Error,
    database_id::TransactionId,
    transaction::{Transaction, TransactionPayload},
};

/// A route handler for listing every transaction, most recent first.
pub async fn get_transactions_endpoint(
    State(state): State<AppState>,
) -> Result<Json<Vec<Transaction>>, Error> {
    state
        .storage
        .list_transactions()
        .await
        .map(Json)
        .map_err(failed("Failed to fetch transactions"))
}

/// A route handler for getting a transaction by its ID.
///
/// Responds with 400 if the ID is not an integer and 404 if there is no such transaction.
pub async fn get_transaction_endpoint(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<Transaction>, Error> {
    let id = parse_transaction_id(&transaction_id)?;

    state
        .storage
        .get_transaction(id)
        .await
        .map_err(failed("Failed to fetch transaction"))?
        .map(Json)
        .ok_or(Error::TransactionNotFound)
}

/// A route handler for creating a new transaction, responds with 201 and the
/// created transaction.
pub async fn create_transaction_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<TransactionPayload>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(payload) = payload.map_err(reject_body)?;
    let new_transaction = payload.validate().map_err(Error::InvalidTransactionData)?;

    let transaction = state
        .storage
        .create_transaction(new_transaction)
        .await
        .map_err(failed("Failed to create transaction"))?;

    Ok((StatusCode::CREATED, Json(transaction)).into_response())
}

/// A route handler for updating some fields of a transaction.
///
/// The transaction must exist before the body is validated, so an unknown ID
/// responds with 404 even if the body is invalid.
pub async fn update_transaction_endpoint(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    payload: Result<Json<TransactionPayload>, JsonRejection>,
) -> Result<Json<Transaction>, Error> {
    let id = parse_transaction_id(&transaction_id)?;

    let existing = state
        .storage
        .get_transaction(id)
        .await
        .map_err(failed("Failed to update transaction"))?;
    if existing.is_none() {
        return Err(Error::TransactionNotFound);
    }

    let Json(payload) = payload.map_err(reject_body)?;
    let patch = payload
        .validate_patch()
        .map_err(Error::InvalidTransactionData)?;

    state
        .storage
        .update_transaction(id, patch)
        .await
        .map_err(failed("Failed to update transaction"))?
        .map(Json)
        .ok_or(Error::TransactionNotFound)
}

/// A route handler for deleting a transaction, responds with 204 on success.
pub async fn delete_transaction_endpoint(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<StatusCode, Error> {
    let id = parse_transaction_id(&transaction_id)?;

    let deleted = state
        .storage
        .delete_transaction(id)
        .await
        .map_err(failed("Failed to delete transaction"))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::TransactionNotFound)
    }
}

fn parse_transaction_id(transaction_id: &str) -> Result<TransactionId, Error> {
    transaction_id
        .parse()
        .map_err(|_| Error::InvalidTransactionId)
}

/// Log an unexpected storage error and replace it with `message` for the client.
fn failed(message: &'static str) -> impl FnOnce(Error) -> Error {
    move |error| {
        tracing::error!("{message}: {error}");
        Error::OperationFailed(message)
    }
}

fn reject_body(rejection: JsonRejection) -> Error {
    Error::InvalidRequestBody(rejection.body_text())
}
