//! Deferred cross-reference resolution
//!
//! After primary import has written the object graph, a family of resolvers
//! completes the references that could not be resolved inline: binary
//! payloads fetched from disk or the network, and geometry pointers whose
//! targets did not exist yet when the referencing row was written.
//!
//! One resolver instance per [`LinkKind`], each owning a dedicated database
//! connection. Streaming resolvers commit or roll back per record so a single
//! bad reference corrupts at most its own row; pointer resolvers batch their
//! updates and flush them at session end.

mod blob;
pub mod library_object;
pub mod runner;
pub mod surface_geometry;
pub mod texture_image;

pub use library_object::LibraryObjectResolver;
pub use runner::{ResolutionRunner, ResolutionStats};
pub use surface_geometry::SurfaceGeometryResolver;
pub use texture_image::TextureImageResolver;

use std::collections::BTreeMap;
use std::path::Path;
use rusqlite::Connection;
use crate::link::{LinkKind, LinkRecord};
use crate::{Error, Result};

/// Internal failure taxonomy for a single record.
///
/// Never crosses the [`XlinkResolver::insert`] boundary: resolvers convert it
/// into a `false` return plus one diagnostic line carrying the target id and
/// locator.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ResolveError {
    /// Local file missing, unreadable or empty; or remote fetch refused
    #[error("{0}")]
    SourceUnavailable(String),

    /// The expected placeholder row could not be obtained
    #[error("database inconsistency: {0}")]
    TargetInconsistent(String),

    /// I/O failure mid-copy
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// Any other database error for this record
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Capability contract implemented by every resolver kind.
///
/// A resolver is constructed once per import session with its own database
/// connection, serves many `insert` calls, and is torn down at session end.
/// Instances are not safe for concurrent use; parallelism across kinds means
/// one resolver (and one connection) per worker.
pub trait XlinkResolver {
    /// Which link kind this instance handles
    fn resolver_type(&self) -> LinkKind;

    /// Attempt to complete one deferred reference.
    ///
    /// Returns `false` on any recoverable failure; the failure is logged with
    /// target id and locator, and the run continues with the next record.
    fn insert(&mut self, record: &LinkRecord) -> bool;

    /// Flush accumulated batched updates. No-op for streaming kinds, which
    /// commit per record.
    fn execute_batch(&mut self) -> Result<()>;

    /// Release prepared statements. Idempotent.
    fn close(&mut self) -> Result<()>;
}

/// Maps every link kind to the resolver instance responsible for it.
///
/// A kind without a resolver is a wiring defect, not bad data, so
/// completeness is verified here at construction rather than per record.
pub struct ResolverRegistry {
    resolvers: BTreeMap<LinkKind, Box<dyn XlinkResolver>>,
}

impl ResolverRegistry {
    /// Build a registry from resolver instances, verifying that every
    /// [`LinkKind`] is covered exactly once
    pub fn new(resolvers: Vec<Box<dyn XlinkResolver>>) -> Result<Self> {
        let mut map: BTreeMap<LinkKind, Box<dyn XlinkResolver>> = BTreeMap::new();

        for resolver in resolvers {
            let kind = resolver.resolver_type();
            if map.insert(kind, resolver).is_some() {
                return Err(Error::ResolverConfiguration(format!(
                    "duplicate resolver registered for kind '{}'",
                    kind
                )));
            }
        }

        for kind in LinkKind::all() {
            if !map.contains_key(kind) {
                return Err(Error::ResolverConfiguration(format!(
                    "no resolver registered for kind '{}'",
                    kind
                )));
            }
        }

        Ok(Self { resolvers: map })
    }

    /// Build the full resolver set for a database, opening one dedicated
    /// connection per resolver.
    ///
    /// Resolvers never share the primary-import connection: their per-record
    /// commit/rollback cycles must not interfere with the bulk-insert
    /// transaction of the main pipeline.
    pub fn for_database(db_path: &Path, import_path: &Path) -> Result<Self> {
        let library = LibraryObjectResolver::new(Connection::open(db_path)?, import_path.to_path_buf());
        let texture = TextureImageResolver::new(Connection::open(db_path)?, import_path.to_path_buf());
        let geometry = SurfaceGeometryResolver::new(Connection::open(db_path)?);

        Self::new(vec![
            Box::new(library),
            Box::new(texture),
            Box::new(geometry),
        ])
    }

    /// Route to the resolver for a kind
    pub(crate) fn get_mut(&mut self, kind: LinkKind) -> &mut dyn XlinkResolver {
        self.resolvers
            .get_mut(&kind)
            .expect("registry completeness is verified at construction")
            .as_mut()
    }

    /// Iterate all resolvers in kind order, for session teardown
    pub(crate) fn resolvers_mut(
        &mut self,
    ) -> impl Iterator<Item = (&LinkKind, &mut Box<dyn XlinkResolver>)> {
        self.resolvers.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubResolver {
        kind: LinkKind,
    }

    impl StubResolver {
        fn new(kind: LinkKind) -> Self {
            Self { kind }
        }
    }

    impl XlinkResolver for StubResolver {
        fn resolver_type(&self) -> LinkKind {
            self.kind
        }

        fn insert(&mut self, _record: &LinkRecord) -> bool {
            true
        }

        fn execute_batch(&mut self) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_complete_registry() {
        let registry = ResolverRegistry::new(vec![
            Box::new(StubResolver::new(LinkKind::LibraryObject)),
            Box::new(StubResolver::new(LinkKind::TextureImage)),
            Box::new(StubResolver::new(LinkKind::SurfaceGeometry)),
        ]);
        assert!(registry.is_ok());
    }

    #[test]
    fn test_missing_kind_fails_at_setup() {
        let registry = ResolverRegistry::new(vec![
            Box::new(StubResolver::new(LinkKind::LibraryObject)),
            Box::new(StubResolver::new(LinkKind::TextureImage)),
        ]);
        match registry {
            Err(Error::ResolverConfiguration(msg)) => {
                assert!(msg.contains("surface_geometry"));
            }
            other => panic!("expected configuration error, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_duplicate_kind_fails_at_setup() {
        let registry = ResolverRegistry::new(vec![
            Box::new(StubResolver::new(LinkKind::LibraryObject)),
            Box::new(StubResolver::new(LinkKind::LibraryObject)),
            Box::new(StubResolver::new(LinkKind::TextureImage)),
            Box::new(StubResolver::new(LinkKind::SurfaceGeometry)),
        ]);
        assert!(matches!(registry, Err(Error::ResolverConfiguration(_))));
    }
}
