//! The storage adapter used by the route handlers.

use crate::{
    Error,
    database_id::TransactionId,
    stores::{
        ConnectionManager, ConnectionStatus, DocumentStore, MemoryStore, TransactionStore,
        UserStore,
    },
    transaction::{NewTransaction, Transaction, TransactionPatch},
    user::{NewUser, User, UserId},
};

/// Stores transactions and users in the document database, degrading to an
/// in-memory store whenever the database cannot be used.
///
/// Every operation is first tried against the database. If connecting or the
/// operation itself fails with an [operational](Error::is_operational) error,
/// the error is logged and the same operation is run against the
/// [MemoryStore] instead. Callers therefore only see not-found outcomes and
/// errors from the in-memory store.
///
/// Records written while degraded live only in memory and are never copied to
/// the database.
#[derive(Debug)]
pub struct Storage {
    connections: ConnectionManager,
    fallback: MemoryStore,
}

impl Storage {
    /// Create storage backed by the database behind `connections`.
    pub fn new(connections: ConnectionManager) -> Self {
        Self {
            connections,
            fallback: MemoryStore::new(),
        }
    }

    /// The connection manager for the database.
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Whether the database connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.connections.status() == ConnectionStatus::Connected
    }

    /// Run `primary` against the database, or `fallback` against the
    /// in-memory store if the database fails.
    ///
    /// SQLite calls block, so `primary` runs on tokio's blocking thread pool.
    /// The in-memory `fallback` runs in place.
    async fn run<T: Send + 'static>(
        &self,
        operation: &str,
        primary: impl FnOnce(&DocumentStore) -> Result<T, Error> + Send + 'static,
        fallback: impl FnOnce(&MemoryStore) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let outcome = match self.connections.acquire().await {
            Ok(handle) => {
                tokio::task::spawn_blocking(move || primary(&DocumentStore::new(handle)))
                    .await
                    .unwrap_or_else(|error| Err(Error::ConnectionTask(error.to_string())))
            }
            Err(error) => Err(error),
        };

        match outcome {
            Err(error) if error.is_operational() => {
                tracing::error!("Error {operation}, using fallback storage: {error}");
                fallback(&self.fallback)
            }
            outcome => outcome,
        }
    }

    /// All transactions, most recent first.
    pub async fn list_transactions(&self) -> Result<Vec<Transaction>, Error> {
        self.run(
            "getting transactions",
            |store| store.list_transactions(),
            |store| store.list_transactions(),
        )
        .await
    }

    /// Retrieve a transaction by its ID, `None` if it does not exist.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, Error> {
        self.run(
            "getting transaction",
            move |store| store.get_transaction(id),
            |store| store.get_transaction(id),
        )
        .await
    }

    /// Store a new transaction and assign it an ID.
    pub async fn create_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, Error> {
        let fallback_transaction = transaction.clone();

        self.run(
            "creating transaction",
            move |store| store.create_transaction(transaction),
            |store| store.create_transaction(fallback_transaction),
        )
        .await
    }

    /// Merge `patch` onto a transaction, `None` if it does not exist.
    pub async fn update_transaction(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
    ) -> Result<Option<Transaction>, Error> {
        let fallback_patch = patch.clone();

        self.run(
            "updating transaction",
            move |store| store.update_transaction(id, patch),
            |store| store.update_transaction(id, fallback_patch),
        )
        .await
    }

    /// Remove a transaction, returning whether one was removed.
    pub async fn delete_transaction(&self, id: TransactionId) -> Result<bool, Error> {
        self.run(
            "deleting transaction",
            move |store| store.delete_transaction(id),
            |store| store.delete_transaction(id),
        )
        .await
    }

    /// Retrieve a user by their ID.
    pub async fn get_user(&self, id: UserId) -> Result<Option<User>, Error> {
        self.run(
            "getting user",
            move |store| store.get_user(id),
            |store| store.get_user(id),
        )
        .await
    }

    /// Retrieve a user by their username.
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        let owned_username = username.to_owned();

        self.run(
            "getting user by username",
            move |store| store.get_user_by_username(&owned_username),
            |store| store.get_user_by_username(username),
        )
        .await
    }

    /// Store a new user and assign them an ID.
    ///
    /// # Errors
    /// Returns [Error::DuplicateUsername] if the username is taken in whichever
    /// store handled the request.
    pub async fn create_user(&self, user: NewUser) -> Result<User, Error> {
        let fallback_user = user.clone();

        self.run(
            "creating user",
            move |store| store.create_user(user),
            |store| store.create_user(fallback_user),
        )
        .await
    }
}
