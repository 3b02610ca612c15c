//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/transactions/{transaction_id}', use [format_endpoint].

/// The prefix shared by every API route.
pub const API_PREFIX: &str = "/api";
/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to get, update and delete a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// Assumes `endpoint_path` contains exactly one parameter in braces.
pub fn format_endpoint(endpoint_path: &str, id: impl std::fmt::Display) -> String {
    match (endpoint_path.find('{'), endpoint_path.find('}')) {
        (Some(start), Some(end)) if start < end => {
            format!("{}{id}{}", &endpoint_path[..start], &endpoint_path[end + 1..])
        }
        _ => endpoint_path.to_owned(),
    }
}

#[cfg(test)]
mod endpoints_tests {
    use crate::endpoints::{self, format_endpoint};

    #[test]
    fn routes_share_api_prefix() {
        assert!(endpoints::TRANSACTIONS.starts_with(endpoints::API_PREFIX));
        assert!(endpoints::TRANSACTION.starts_with(endpoints::TRANSACTIONS));
    }

    #[test]
    fn format_endpoint_replaces_parameter() {
        assert_eq!(
            format_endpoint(endpoints::TRANSACTION, 42),
            "/api/transactions/42"
        );
    }

    #[test]
    fn format_endpoint_without_parameter_is_unchanged() {
        assert_eq!(
            format_endpoint(endpoints::TRANSACTIONS, 42),
            endpoints::TRANSACTIONS
        );
    }
}
