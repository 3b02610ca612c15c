//! Implements a struct that holds the state of the REST server.

use std::sync::Arc;

use crate::stores::Storage;

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The storage adapter shared by every request.
    pub storage: Arc<Storage>,
}

impl AppState {
    /// Create a new [AppState] around `storage`.
    ///
    /// The database is not touched here, the connection is opened on first use.
    pub fn new(storage: Storage) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }
}
