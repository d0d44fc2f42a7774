//! Library-object resolver
//!
//! Implicit geometries may point at an external 3D asset (a library object)
//! instead of carrying geometry inline. Primary import writes the row with an
//! empty `library_object` column; this resolver fetches the asset from disk
//! or the network and streams it into that column.
//!
//! Library objects can be large, so each record is handled in its own
//! transaction: allocate the placeholder, stream the bytes in, commit. A
//! failure rolls back just that record's row and the run continues, which
//! bounds the blast radius of one bad reference to exactly one row.

use std::path::PathBuf;
use rusqlite::Connection;

use super::blob::{self, BlobTarget};
use super::XlinkResolver;
use crate::link::{LinkKind, LinkRecord};
use crate::source::PayloadSource;
use crate::Result;

const LIBRARY_OBJECT: BlobTarget = BlobTarget {
    table: "implicit_geometry",
    column: "library_object",
};

/// Completes `implicit_geometry.library_object` payloads
pub struct LibraryObjectResolver {
    conn: Connection,
    import_path: PathBuf,
}

impl LibraryObjectResolver {
    /// Construct with a dedicated connection and the import base path used
    /// to resolve relative locators
    pub fn new(conn: Connection, import_path: PathBuf) -> Self {
        Self { conn, import_path }
    }
}

impl XlinkResolver for LibraryObjectResolver {
    fn resolver_type(&self) -> LinkKind {
        LinkKind::LibraryObject
    }

    fn insert(&mut self, record: &LinkRecord) -> bool {
        let source = PayloadSource::classify(&record.source_locator, &self.import_path);
        tracing::debug!("Importing library object: {}", source);

        match blob::store_payload(&mut self.conn, &LIBRARY_OBJECT, record.target_id, &source) {
            Ok(bytes) => {
                tracing::debug!("Stored {} byte library object for geometry {}", bytes, record.target_id);
                true
            }
            Err(e) => {
                tracing::error!(
                    "Failed to import library object '{}' for geometry {}: {}",
                    record.source_locator,
                    record.target_id,
                    e
                );
                false
            }
        }
    }

    fn execute_batch(&mut self) -> Result<()> {
        // nothing to flush: insert commits or rolls back per record, which is
        // also why this resolver holds its own connection
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.conn.flush_prepared_statement_cache();
        Ok(())
    }
}
