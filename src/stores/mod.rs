//! Contains traits and implementations for objects that store transactions and users.
//!
//! Both the primary [DocumentStore] and the in-memory [MemoryStore] implement
//! [TransactionStore] and [UserStore]. The [Storage] adapter composes the two,
//! preferring the document store and degrading to memory when it fails.

mod adapter;
mod connection;
mod document;
mod memory;

pub use adapter::Storage;
pub use connection::{
    CONNECTION_COOLDOWN, ConnectionManager, ConnectionStatus, DEFAULT_DATABASE_URL, DatabaseHandle,
};
pub use document::{DocumentStore, initialize};
pub use memory::MemoryStore;

use crate::{
    Error,
    database_id::TransactionId,
    transaction::{NewTransaction, Transaction, TransactionPatch},
    user::{NewUser, User, UserId},
};

/// Handles the creation, retrieval, update and deletion of transactions.
///
/// A missing record is a normal outcome (`None` or `false`), errors are
/// reserved for failures of the store itself.
pub trait TransactionStore {
    /// All transactions, most recent first.
    fn list_transactions(&self) -> Result<Vec<Transaction>, Error>;

    /// Retrieve a transaction by its ID.
    fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, Error>;

    /// Store a new transaction and assign it an ID.
    fn create_transaction(&self, transaction: NewTransaction) -> Result<Transaction, Error>;

    /// Merge `patch` onto an existing transaction and return the result.
    fn update_transaction(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
    ) -> Result<Option<Transaction>, Error>;

    /// Remove a transaction, returning whether one was removed.
    fn delete_transaction(&self, id: TransactionId) -> Result<bool, Error>;
}

/// Handles the creation and retrieval of users.
pub trait UserStore {
    /// Retrieve a user by their ID.
    fn get_user(&self, id: UserId) -> Result<Option<User>, Error>;

    /// Retrieve a user by their username.
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, Error>;

    /// Store a new user and assign them an ID.
    ///
    /// # Errors
    /// Implementers should return [Error::DuplicateUsername] if the username is taken.
    fn create_user(&self, user: NewUser) -> Result<User, Error>;
}
