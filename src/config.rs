//! Server configuration defaults.

use crate::stores::DEFAULT_DATABASE_URL;

/// The port the API is served from when none is configured.
pub const DEFAULT_PORT: u16 = 3001;

/// The host the API binds to when none is configured.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Pick the database URL to connect to.
///
/// Falls back to [DEFAULT_DATABASE_URL] with a warning when `database_url` is
/// unset or blank.
pub fn resolve_database_url(database_url: Option<String>) -> String {
    match database_url {
        Some(url) if !url.trim().is_empty() => url.trim().to_owned(),
        _ => {
            tracing::warn!(
                "DATABASE_URL is not set, using the default database {DEFAULT_DATABASE_URL}"
            );
            DEFAULT_DATABASE_URL.to_owned()
        }
    }
}

#[cfg(test)]
mod config_tests {
    use crate::{config::resolve_database_url, stores::DEFAULT_DATABASE_URL};

    #[test]
    fn uses_configured_url() {
        let got = resolve_database_url(Some("sqlite://ledger.db".to_owned()));

        assert_eq!(got, "sqlite://ledger.db");
    }

    #[test]
    fn falls_back_to_default_url() {
        assert_eq!(resolve_database_url(None), DEFAULT_DATABASE_URL);
        assert_eq!(
            resolve_database_url(Some("  ".to_owned())),
            DEFAULT_DATABASE_URL
        );
    }
}
