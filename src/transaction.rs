//! Transactions: the data model, request validation and the REST endpoints.

mod endpoints;
mod models;
mod payload;

pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
    get_transactions_endpoint, update_transaction_endpoint,
};
pub use models::{Category, NewTransaction, Transaction, TransactionPatch, UnknownCategory};
pub use payload::{AmountInput, MIN_AMOUNT, TransactionPayload, parse_date};
