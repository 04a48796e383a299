//! # Backoffice Shared Library
//!
//! Types, persistence and business rules shared by the Backoffice API server
//! and its integration tests.
//!
//! ## Module Organization
//!
//! - `db`: Connection pool and migrations
//! - `auth`: Passwords, JWT, auth middleware, permission checks
//! - `models`: Database models and their CRUD operations
//! - `pagination`: Page parameters and paginated responses
//! - `export`: CSV export helpers
//! - `broadcast`: Private/presence channel authorization signatures
//! - `integrations`: Health probes for database, cache, storage and queue

pub mod auth;
pub mod broadcast;
pub mod db;
pub mod export;
pub mod integrations;
pub mod models;
pub mod pagination;

/// Current version of the Backoffice shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
