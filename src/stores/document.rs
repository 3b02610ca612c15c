//! Implements a document store on top of SQLite.
//!
//! Each collection is a table of JSON documents keyed by a [NativeId]. Records
//! are exposed with integer IDs derived from the native ID, see
//! [NativeId::to_database_id].

use std::sync::MutexGuard;

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{DatabaseId, NativeId, TransactionId},
    stores::{DatabaseHandle, TransactionStore, UserStore},
    transaction::{Category, NewTransaction, Transaction, TransactionPatch},
    user::{NewUser, User, UserId},
};

/// How many native IDs to try before giving up on finding one whose integer
/// ID is not taken.
const MAX_ID_ATTEMPTS: usize = 8;

/// Matches a document by its explicit integer `id` field (?1) or by its
/// native ID (?2).
const MATCH_ID: &str = "json_extract(document, '$.id') = ?1 OR _id = ?2";

/// Create the collections and their indexes.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS transactions (
                _id TEXT PRIMARY KEY,
                document TEXT NOT NULL
                );
        CREATE INDEX IF NOT EXISTS transactions_date
            ON transactions(json_extract(document, '$.date'));
        CREATE INDEX IF NOT EXISTS transactions_id
            ON transactions(json_extract(document, '$.id'));
        CREATE TABLE IF NOT EXISTS users (
                _id TEXT PRIMARY KEY,
                document TEXT NOT NULL
                );
        CREATE UNIQUE INDEX IF NOT EXISTS users_username
            ON users(json_extract(document, '$.username'));",
    )
}

/// Stores transactions and users as JSON documents in a SQLite database.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    connection: DatabaseHandle,
}

impl DocumentStore {
    /// Create a new store for the SQLite `connection`.
    ///
    /// The connection must have been set up with [initialize].
    pub fn new(connection: DatabaseHandle) -> Self {
        Self { connection }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|error| {
            tracing::error!("Could not acquire the database lock: {error}");
            Error::DatabaseLockError
        })
    }

    /// Pick a native ID whose integer ID is not already used in `collection`.
    fn unused_native_id(connection: &Connection, collection: &str) -> Result<NativeId, Error> {
        let mut statement = connection.prepare(&format!(
            "SELECT EXISTS(SELECT 1 FROM {collection} WHERE json_extract(document, '$.id') = ?1)"
        ))?;

        for _ in 0..MAX_ID_ATTEMPTS {
            let native_id = NativeId::generate();
            let taken: bool = statement.query_row([native_id.to_database_id()], |row| row.get(0))?;

            if !taken {
                return Ok(native_id);
            }

            tracing::warn!(
                "Native ID {native_id} maps to the taken ID {} in {collection}, generating another",
                native_id.to_database_id()
            );
        }

        Err(Error::IdCollision(collection.to_owned()))
    }
}

// ============================================================================
// DOCUMENTS
// ============================================================================

/// A transaction as stored in the `transactions` collection.
///
/// `date` is stored as unix milliseconds so that documents sort numerically.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<TransactionId>,
    description: String,
    amount: f64,
    date: i64,
    category: Category,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    is_income: bool,
}

impl TransactionDocument {
    fn new(id: TransactionId, transaction: &NewTransaction) -> Self {
        Self {
            id: Some(id),
            description: transaction.description.clone(),
            amount: transaction.amount,
            date: to_unix_millis(transaction.date),
            category: transaction.category,
            notes: transaction.notes.clone(),
            is_income: transaction.is_income(),
        }
    }

    fn into_transaction(self, native_id: &NativeId) -> Result<Transaction, Error> {
        Ok(Transaction {
            id: native_id.to_database_id(),
            description: self.description,
            amount: self.amount,
            date: from_unix_millis(self.date)?,
            category: self.category,
            notes: self.notes,
            is_income: self.category.is_income(),
        })
    }
}

/// The fields of a [TransactionPatch] to merge onto a stored document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionPatchDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<Category>,
    /// `Some(None)` is written as `null`, which `json_patch` removes.
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_income: Option<bool>,
}

impl From<TransactionPatch> for TransactionPatchDocument {
    fn from(patch: TransactionPatch) -> Self {
        Self {
            description: patch.description,
            amount: patch.amount,
            date: patch.date.map(to_unix_millis),
            is_income: patch.category.map(|category| category.is_income()),
            category: patch.category,
            notes: patch.notes,
        }
    }
}

/// A user as stored in the `users` collection.
#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<DatabaseId>,
    username: String,
    password: String,
}

impl UserDocument {
    fn into_user(self, native_id: &NativeId) -> User {
        User {
            id: UserId::new(native_id.to_database_id()),
            username: self.username,
            password: self.password,
        }
    }
}

fn to_unix_millis(date: OffsetDateTime) -> i64 {
    (date.unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_unix_millis(millis: i64) -> Result<OffsetDateTime, Error> {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .map_err(|error| Error::MalformedDocument(error.to_string()))
}

fn encode<T: Serialize>(document: &T) -> Result<String, Error> {
    serde_json::to_string(document).map_err(|error| Error::MalformedDocument(error.to_string()))
}

/// Parse the native ID and JSON body of a stored document.
fn decode<T: DeserializeOwned>(
    (native_id, document): (String, String),
) -> Result<(NativeId, T), Error> {
    let native_id = native_id.parse()?;
    let document = serde_json::from_str(&document)
        .map_err(|error| Error::MalformedDocument(format!("{native_id}: {error}")))?;

    Ok((native_id, document))
}

fn decode_transaction(row: (String, String)) -> Result<Transaction, Error> {
    let (native_id, document) = decode::<TransactionDocument>(row)?;
    document.into_transaction(&native_id)
}

fn decode_user(row: (String, String)) -> Result<User, Error> {
    let (native_id, document) = decode::<UserDocument>(row)?;
    Ok(document.into_user(&native_id))
}

/// Map a `(_id, document)` row.
fn map_document_row(row: &Row) -> Result<(String, String), rusqlite::Error> {
    Ok((row.get(0)?, row.get(1)?))
}

// ============================================================================
// STORE IMPLEMENTATIONS
// ============================================================================

impl TransactionStore for DocumentStore {
    fn list_transactions(&self) -> Result<Vec<Transaction>, Error> {
        let connection = self.lock()?;

        let rows = connection
            .prepare(
                "SELECT _id, document FROM transactions
                 ORDER BY json_extract(document, '$.date') DESC, rowid ASC",
            )?
            .query_map([], map_document_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(decode_transaction).collect()
    }

    /// Retrieve a transaction by matching either its explicit `id` field or
    /// the native ID reconstructed from `id`.
    ///
    /// # Errors
    /// Returns [Error::MalformedNativeId] if `id` cannot be turned into a native
    /// ID, or [Error::SqlError] if there is an SQL error.
    fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, Error> {
        let native_id = NativeId::from_database_id(id)?;
        let connection = self.lock()?;

        connection
            .prepare(&format!(
                "SELECT _id, document FROM transactions WHERE {MATCH_ID} LIMIT 1"
            ))?
            .query_row(params![id, native_id.to_string()], map_document_row)
            .optional()?
            .map(decode_transaction)
            .transpose()
    }

    fn create_transaction(&self, transaction: NewTransaction) -> Result<Transaction, Error> {
        let connection = self.lock()?;

        let native_id = Self::unused_native_id(&connection, "transactions")?;
        let id = native_id.to_database_id();
        let document = encode(&TransactionDocument::new(id, &transaction))?;

        connection.execute(
            "INSERT INTO transactions (_id, document) VALUES (?1, ?2)",
            params![native_id.to_string(), document],
        )?;

        Ok(transaction.into_transaction(id))
    }

    /// Merge `patch` onto the first document matching `id` with `json_patch`.
    fn update_transaction(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
    ) -> Result<Option<Transaction>, Error> {
        let native_id = NativeId::from_database_id(id)?;
        let patch = encode(&TransactionPatchDocument::from(patch))?;
        let connection = self.lock()?;

        connection
            .prepare(&format!(
                "UPDATE transactions SET document = json_patch(document, ?3)
                 WHERE _id = (SELECT _id FROM transactions WHERE {MATCH_ID} LIMIT 1)
                 RETURNING _id, document"
            ))?
            .query_row(
                params![id, native_id.to_string(), patch],
                map_document_row,
            )
            .optional()?
            .map(decode_transaction)
            .transpose()
    }

    /// Delete the first document matching `id`.
    fn delete_transaction(&self, id: TransactionId) -> Result<bool, Error> {
        let native_id = NativeId::from_database_id(id)?;
        let connection = self.lock()?;

        let rows_affected = connection.execute(
            &format!(
                "DELETE FROM transactions
                 WHERE _id = (SELECT _id FROM transactions WHERE {MATCH_ID} LIMIT 1)"
            ),
            params![id, native_id.to_string()],
        )?;

        Ok(rows_affected == 1)
    }
}

impl UserStore for DocumentStore {
    fn get_user(&self, id: UserId) -> Result<Option<User>, Error> {
        let native_id = NativeId::from_database_id(id.as_i64())?;
        let connection = self.lock()?;

        connection
            .prepare(&format!(
                "SELECT _id, document FROM users WHERE {MATCH_ID} LIMIT 1"
            ))?
            .query_row(
                params![id.as_i64(), native_id.to_string()],
                map_document_row,
            )
            .optional()?
            .map(decode_user)
            .transpose()
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        let connection = self.lock()?;

        connection
            .prepare(
                "SELECT _id, document FROM users
                 WHERE json_extract(document, '$.username') = ?1 LIMIT 1",
            )?
            .query_row([username], map_document_row)
            .optional()?
            .map(decode_user)
            .transpose()
    }

    /// Create a user.
    ///
    /// # Errors
    /// Returns [Error::DuplicateUsername] if the username is taken, or
    /// [Error::SqlError] if there is some other SQL error.
    fn create_user(&self, user: NewUser) -> Result<User, Error> {
        let connection = self.lock()?;

        let native_id = Self::unused_native_id(&connection, "users")?;
        let id = native_id.to_database_id();
        let document = encode(&UserDocument {
            id: Some(id),
            username: user.username.clone(),
            password: user.password.clone(),
        })?;

        connection
            .execute(
                "INSERT INTO users (_id, document) VALUES (?1, ?2)",
                params![native_id.to_string(), document],
            )
            .map_err(|error| match error {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error {
                        code: _,
                        extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                    },
                    Some(ref desc),
                ) if desc.contains("users_username") => {
                    Error::DuplicateUsername(user.username.clone())
                }
                error => error.into(),
            })?;

        Ok(user.into_user(UserId::new(id)))
    }
}
