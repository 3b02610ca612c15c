//! Manages the lifecycle of the single, lazily established database connection.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use rusqlite::Connection;

use crate::{Error, stores::initialize};

/// A shared handle to the open database connection.
pub type DatabaseHandle = Arc<Mutex<Connection>>;

/// The minimum time between the starts of two connection attempts.
pub const CONNECTION_COOLDOWN: Duration = Duration::from_secs(30);

/// How long a statement waits for another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The database used when no URL is configured.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://finance_tracker.db";

/// Where a database URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DatabaseTarget {
    Memory,
    File(String),
}

/// The state of the [ConnectionManager].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connection is open and no attempt is underway.
    Disconnected,
    /// A connection attempt is underway.
    Connecting,
    /// A connection is open and cached.
    Connected,
}

#[derive(Debug, Default)]
struct ConnectionState {
    handle: Option<DatabaseHandle>,
    connecting: bool,
    last_attempt: Option<Instant>,
}

/// Opens the database connection on first use and caches it for the rest of
/// the process.
///
/// Attempts are guarded so that at most one is underway at a time, and a new
/// attempt is refused if the previous one started less than the cooldown ago.
/// This keeps an unreachable database from being hammered by every request.
#[derive(Debug)]
pub struct ConnectionManager {
    database_url: String,
    cooldown: Duration,
    state: Mutex<ConnectionState>,
}

impl ConnectionManager {
    /// Create a manager for `database_url` with the default [CONNECTION_COOLDOWN].
    ///
    /// No connection is made until [ConnectionManager::acquire] is called.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            cooldown: CONNECTION_COOLDOWN,
            state: Mutex::new(ConnectionState::default()),
        }
    }

    /// Set the minimum time between connection attempts.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// The URL of the database this manager connects to.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// The current state of the connection.
    pub fn status(&self) -> ConnectionStatus {
        let state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if state.handle.is_some() {
            ConnectionStatus::Connected
        } else if state.connecting {
            ConnectionStatus::Connecting
        } else {
            ConnectionStatus::Disconnected
        }
    }

    /// Get the open connection, connecting first if needed.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::ConnectionInProgress] if another caller is already connecting,
    /// - [Error::ConnectionRateLimited] if the previous attempt started less than the cooldown ago,
    /// - [Error::UnsupportedDatabaseUrl] if the URL does not point to a SQLite database,
    /// - or [Error::SqlError] if the database could not be opened or initialized.
    pub async fn acquire(&self) -> Result<DatabaseHandle, Error> {
        {
            let mut state = self.lock()?;

            if let Some(handle) = &state.handle {
                return Ok(handle.clone());
            }

            if state.connecting {
                return Err(Error::ConnectionInProgress);
            }

            let now = Instant::now();
            if let Some(last_attempt) = state.last_attempt
                && now.duration_since(last_attempt) < self.cooldown
            {
                return Err(Error::ConnectionRateLimited);
            }

            state.connecting = true;
            state.last_attempt = Some(now);
        }

        // Clears the in-progress flag even if this future is dropped mid-attempt.
        let _attempt = AttemptGuard { state: &self.state };

        tracing::info!("Attempting to connect to the database at {}", self.database_url);

        match open(&self.database_url).await {
            Ok(connection) => {
                let handle = Arc::new(Mutex::new(connection));
                self.lock()?.handle = Some(handle.clone());
                tracing::info!("Connected to the database successfully");

                Ok(handle)
            }
            Err(error) => {
                tracing::error!("Database connection failed: {error}");
                Err(error)
            }
        }
    }

    /// Close the cached connection, if any.
    ///
    /// If requests still hold the handle, the connection is closed once the
    /// last of them drops it.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if SQLite fails to close the connection.
    pub fn close(&self) -> Result<(), Error> {
        let Some(handle) = self.lock()?.handle.take() else {
            return Ok(());
        };

        match Arc::try_unwrap(handle) {
            Ok(connection) => {
                let connection = connection
                    .into_inner()
                    .map_err(|_| Error::DatabaseLockError)?;
                connection.close().map_err(|(_, error)| Error::from(error))?;
                tracing::info!("Database connection closed");
            }
            Err(_) => {
                tracing::warn!("Database connection is still in use, it will close once released");
            }
        }

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ConnectionState>, Error> {
        self.state.lock().map_err(|error| {
            tracing::error!("Could not acquire the connection state lock: {error}");
            Error::DatabaseLockError
        })
    }
}

struct AttemptGuard<'a> {
    state: &'a Mutex<ConnectionState>,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.connecting = false;
    }
}

fn parse_database_url(database_url: &str) -> Result<DatabaseTarget, Error> {
    if database_url == "sqlite::memory:" || database_url == ":memory:" {
        return Ok(DatabaseTarget::Memory);
    }

    let path = match database_url.strip_prefix("sqlite://") {
        Some(path) => path,
        None if database_url.contains("://") => {
            return Err(Error::UnsupportedDatabaseUrl(database_url.to_owned()));
        }
        None => database_url,
    };

    if path.is_empty() {
        return Err(Error::UnsupportedDatabaseUrl(database_url.to_owned()));
    }

    Ok(DatabaseTarget::File(path.to_owned()))
}

/// Open and initialize the database on a blocking worker thread.
async fn open(database_url: &str) -> Result<Connection, Error> {
    let target = parse_database_url(database_url)?;

    tokio::task::spawn_blocking(move || -> Result<Connection, Error> {
        let connection = match target {
            DatabaseTarget::Memory => Connection::open_in_memory()?,
            DatabaseTarget::File(path) => Connection::open(path)?,
        };
        connection.busy_timeout(BUSY_TIMEOUT)?;
        initialize(&connection)?;

        Ok(connection)
    })
    .await
    .map_err(|error| Error::ConnectionTask(error.to_string()))?
}

#[cfg(test)]
mod connection_manager_tests {
    use std::{sync::Arc, time::Duration};

    use rusqlite::Connection;

    use crate::{
        Error,
        stores::{ConnectionManager, ConnectionStatus},
    };

    use super::{DatabaseTarget, parse_database_url};

    const UNREACHABLE_URL: &str = "sqlite:///nonexistent-directory/finance_tracker.db";

    #[tokio::test]
    async fn acquire_connects_and_caches_handle() {
        let manager = ConnectionManager::new("sqlite::memory:");
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);

        let first = manager.acquire().await.expect("Could not connect");
        let second = manager.acquire().await.expect("Could not reuse connection");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn failed_attempt_returns_to_disconnected() {
        let manager = ConnectionManager::new(UNREACHABLE_URL);

        let result = manager.acquire().await;

        assert!(matches!(result, Err(Error::SqlError(_))), "got {result:?}");
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn second_attempt_within_cooldown_is_rate_limited() {
        let manager = ConnectionManager::new(UNREACHABLE_URL);
        let _ = manager.acquire().await;

        let result = manager.acquire().await;

        assert_eq!(result.err(), Some(Error::ConnectionRateLimited));
    }

    #[tokio::test]
    async fn attempts_again_after_cooldown() {
        let manager =
            ConnectionManager::new(UNREACHABLE_URL).with_cooldown(Duration::from_millis(10));
        let _ = manager.acquire().await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        let result = manager.acquire().await;

        assert!(matches!(result, Err(Error::SqlError(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn concurrent_attempt_is_refused_while_first_is_connecting() {
        let path = std::env::temp_dir().join(format!(
            "finance_tracker_locked_{}_{}.db",
            std::process::id(),
            rand::random::<u32>()
        ));
        // Holds the file lock so the first attempt blocks while initializing.
        let blocker = Connection::open(&path).expect("Could not create database file");
        blocker
            .execute_batch("BEGIN EXCLUSIVE;")
            .expect("Could not lock database file");
        let manager = Arc::new(ConnectionManager::new(format!(
            "sqlite://{}",
            path.display()
        )));

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.acquire().await }
        });
        tokio::time::timeout(Duration::from_secs(5), async {
            while manager.status() != ConnectionStatus::Connecting {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("First attempt never started connecting");

        let second = manager.acquire().await;
        blocker
            .execute_batch("COMMIT;")
            .expect("Could not unlock database file");
        let first = first.await.expect("First attempt panicked");

        assert_eq!(second.err(), Some(Error::ConnectionInProgress));
        assert!(first.is_ok(), "got {first:?}");
        assert_eq!(manager.status(), ConnectionStatus::Connected);

        drop(first);
        manager.close().expect("Could not close connection");
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn unsupported_scheme_fails_attempt() {
        let manager = ConnectionManager::new("mongodb://localhost:27017/admin");

        let result = manager.acquire().await;

        assert_eq!(
            result.err(),
            Some(Error::UnsupportedDatabaseUrl(
                "mongodb://localhost:27017/admin".to_owned()
            ))
        );
        assert_eq!(
            manager.acquire().await.err(),
            Some(Error::ConnectionRateLimited)
        );
    }

    #[tokio::test]
    async fn close_disconnects() {
        let manager = ConnectionManager::new("sqlite::memory:");
        let handle = manager.acquire().await.expect("Could not connect");
        drop(handle);

        manager.close().expect("Could not close connection");

        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn parses_database_urls() {
        assert_eq!(
            parse_database_url("sqlite::memory:"),
            Ok(DatabaseTarget::Memory)
        );
        assert_eq!(
            parse_database_url("sqlite://data/finance.db"),
            Ok(DatabaseTarget::File("data/finance.db".to_owned()))
        );
        assert_eq!(
            parse_database_url("finance.db"),
            Ok(DatabaseTarget::File("finance.db".to_owned()))
        );
        assert!(parse_database_url("postgres://localhost/finance").is_err());
        assert!(parse_database_url("sqlite://").is_err());
    }
}
