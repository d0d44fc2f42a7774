//! Texture-image resolver
//!
//! Surface-data rows reference their texture by URI; primary import leaves
//! the `tex_image` column empty. This resolver follows the same per-record
//! transactional streaming protocol as the library-object resolver, only the
//! destination column differs.

use std::path::PathBuf;
use rusqlite::Connection;

use super::blob::{self, BlobTarget};
use super::XlinkResolver;
use crate::link::{LinkKind, LinkRecord};
use crate::source::PayloadSource;
use crate::Result;

const TEX_IMAGE: BlobTarget = BlobTarget {
    table: "surface_data",
    column: "tex_image",
};

/// Completes `surface_data.tex_image` payloads
pub struct TextureImageResolver {
    conn: Connection,
    import_path: PathBuf,
}

impl TextureImageResolver {
    pub fn new(conn: Connection, import_path: PathBuf) -> Self {
        Self { conn, import_path }
    }
}

impl XlinkResolver for TextureImageResolver {
    fn resolver_type(&self) -> LinkKind {
        LinkKind::TextureImage
    }

    fn insert(&mut self, record: &LinkRecord) -> bool {
        let source = PayloadSource::classify(&record.source_locator, &self.import_path);
        tracing::debug!("Importing texture image: {}", source);

        match blob::store_payload(&mut self.conn, &TEX_IMAGE, record.target_id, &source) {
            Ok(bytes) => {
                tracing::debug!("Stored {} byte texture for surface data {}", bytes, record.target_id);
                true
            }
            Err(e) => {
                tracing::error!(
                    "Failed to import texture image '{}' for surface data {}: {}",
                    record.source_locator,
                    record.target_id,
                    e
                );
                false
            }
        }
    }

    fn execute_batch(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.conn.flush_prepared_statement_cache();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use std::fs;

    #[test]
    fn test_texture_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("depot.db");
        let import_dir = dir.path().join("import");
        fs::create_dir(&import_dir).unwrap();
        fs::write(import_dir.join("brick.png"), b"\x89PNG fake bytes").unwrap();

        let store = SqliteStore::open(&db_path).unwrap();
        let id = store.insert_surface_data("wall_1", Some("brick.png")).unwrap();

        let mut resolver =
            TextureImageResolver::new(Connection::open(&db_path).unwrap(), import_dir);
        let record = LinkRecord::new(LinkKind::TextureImage, id, "brick.png").unwrap();

        assert!(resolver.insert(&record));
        assert_eq!(
            store.get_texture_image(id).unwrap(),
            Some(b"\x89PNG fake bytes".to_vec())
        );
    }

    #[test]
    fn test_missing_texture_fails_and_row_stays_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("depot.db");

        let store = SqliteStore::open(&db_path).unwrap();
        let id = store.insert_surface_data("wall_1", Some("gone.png")).unwrap();

        let mut resolver = TextureImageResolver::new(
            Connection::open(&db_path).unwrap(),
            dir.path().to_path_buf(),
        );
        let record = LinkRecord::new(LinkKind::TextureImage, id, "gone.png").unwrap();

        assert!(!resolver.insert(&record));
        assert_eq!(store.get_texture_image(id).unwrap(), None);
    }
}
