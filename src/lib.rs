//! # Citydepot - City-Model Import Store
//!
//! Relational storage for hierarchical city-model documents.
//!
//! Citydepot provides:
//! - SQLite-backed storage for city objects with binary payload columns
//! - A durable queue of deferred cross-references (XLinks) recorded while
//!   the primary object graph is written
//! - A family of resolvers that complete those references after primary
//!   import, streaming external binary payloads into the store under
//!   per-record transaction control
//! - Aggregate success/failure reporting so one bad reference never aborts
//!   an import

pub mod config;
pub mod link;
pub mod resolver;
pub mod source;
pub mod storage;

// Re-exports for convenient access
pub use link::{LinkKind, LinkRecord};
pub use resolver::{ResolutionRunner, ResolutionStats, ResolverRegistry, XlinkResolver};
pub use source::PayloadSource;
pub use storage::SqliteStore;

/// Result type alias for Citydepot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Citydepot operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid link: {0}")]
    InvalidLink(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resolver configuration error: {0}")]
    ResolverConfiguration(String),
}
