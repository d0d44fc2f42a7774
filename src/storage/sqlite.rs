//! SQLite storage implementation

use std::path::Path;
use std::str::FromStr;
use rusqlite::{Connection, OptionalExtension, params};
use crate::Result;
use crate::link::{LinkKind, LinkRecord};
use super::schema;

/// SQLite-backed storage for the city-model import database.
///
/// This is the primary-import connection. Resolvers never share it: each
/// resolver opens its own connection to the same database file so that its
/// per-record commit/rollback cycles cannot interfere with bulk inserts
/// running here.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== City Object Operations ==========

    /// Insert an implicit-geometry placeholder row, returning its id.
    ///
    /// The `library_object` and `relative_geometry_id` columns start out
    /// empty; the resolution phase completes them.
    pub fn insert_implicit_geometry(
        &self,
        gmlid: &str,
        reference_to_library: Option<&str>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO implicit_geometry (gmlid, reference_to_library) VALUES (?1, ?2)",
            params![gmlid, reference_to_library],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert a surface-data placeholder row, returning its id
    pub fn insert_surface_data(&self, gmlid: &str, tex_image_uri: Option<&str>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO surface_data (gmlid, tex_image_uri) VALUES (?1, ?2)",
            params![gmlid, tex_image_uri],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert a surface-geometry row, returning its id
    pub fn insert_surface_geometry(
        &self,
        gmlid: &str,
        parent_id: Option<i64>,
        root_id: Option<i64>,
        geometry: Option<&str>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO surface_geometry (gmlid, parent_id, root_id, geometry) VALUES (?1, ?2, ?3, ?4)",
            params![gmlid, parent_id, root_id, geometry],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Read back the library-object payload of an implicit geometry
    pub fn get_library_object(&self, id: i64) -> Result<Option<Vec<u8>>> {
        self.conn
            .query_row(
                "SELECT library_object FROM implicit_geometry WHERE id = ?1",
                [id],
                |row| row.get::<_, Option<Vec<u8>>>(0),
            )
            .optional()
            .map(Option::flatten)
            .map_err(Into::into)
    }

    /// Read back the texture payload of a surface-data row
    pub fn get_texture_image(&self, id: i64) -> Result<Option<Vec<u8>>> {
        self.conn
            .query_row(
                "SELECT tex_image FROM surface_data WHERE id = ?1",
                [id],
                |row| row.get::<_, Option<Vec<u8>>>(0),
            )
            .optional()
            .map(Option::flatten)
            .map_err(Into::into)
    }

    /// Read back the resolved geometry pointer of an implicit geometry
    pub fn get_relative_geometry_id(&self, id: i64) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT relative_geometry_id FROM implicit_geometry WHERE id = ?1",
                [id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()
            .map(Option::flatten)
            .map_err(Into::into)
    }

    // ========== Pending Link Operations ==========

    /// Append a deferred reference to the durable queue, returning its id
    pub fn enqueue_link(&self, record: &LinkRecord) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO pending_links (kind, target_id, source_locator) VALUES (?1, ?2, ?3)",
            params![record.kind.as_str(), record.target_id, record.source_locator],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get all queued deferred references in enqueue order.
    ///
    /// Rows whose kind or locator no longer parse are skipped with a warning
    /// rather than aborting the drain.
    pub fn pending_links(&self) -> Result<Vec<PendingLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, target_id, source_locator FROM pending_links ORDER BY id",
        )?;

        let rows: Vec<(i64, String, i64, String)> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .filter_map(|r| r.ok())
            .collect();

        let mut links = Vec::with_capacity(rows.len());
        for (id, kind, target_id, locator) in rows {
            match LinkKind::from_str(&kind)
                .and_then(|kind| LinkRecord::new(kind, target_id, locator))
            {
                Ok(record) => links.push(PendingLink { id, record }),
                Err(e) => tracing::warn!("Skipping malformed pending link {}: {}", id, e),
            }
        }

        Ok(links)
    }

    /// Remove a resolved reference from the queue
    pub fn delete_pending_link(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM pending_links WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Count queued references
    pub fn pending_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM pending_links", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ========== Statistics ==========

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(DbStats {
            implicit_geometries: count("SELECT COUNT(*) FROM implicit_geometry")?,
            surface_data: count("SELECT COUNT(*) FROM surface_data")?,
            surface_geometries: count("SELECT COUNT(*) FROM surface_geometry")?,
            pending_links: count("SELECT COUNT(*) FROM pending_links")?,
        })
    }
}

/// A queued deferred reference together with its queue row id
#[derive(Debug, Clone)]
pub struct PendingLink {
    pub id: i64,
    pub record: LinkRecord,
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub implicit_geometries: usize,
    pub surface_data: usize,
    pub surface_geometries: usize,
    pub pending_links: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Implicit Geometries: {}", self.implicit_geometries)?;
        writeln!(f, "  Surface Data: {}", self.surface_data)?;
        writeln!(f, "  Surface Geometries: {}", self.surface_geometries)?;
        writeln!(f, "  Pending Links: {}", self.pending_links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_rows_start_empty() {
        let store = SqliteStore::open_in_memory().unwrap();

        let geom = store.insert_implicit_geometry("tree_1", Some("models/tree.obj")).unwrap();
        let tex = store.insert_surface_data("wall_1", Some("textures/brick.png")).unwrap();

        assert_eq!(store.get_library_object(geom).unwrap(), None);
        assert_eq!(store.get_texture_image(tex).unwrap(), None);
        assert_eq!(store.get_relative_geometry_id(geom).unwrap(), None);
    }

    #[test]
    fn test_enqueue_and_drain() {
        let store = SqliteStore::open_in_memory().unwrap();

        let geom = store.insert_implicit_geometry("tree_1", None).unwrap();
        let record = LinkRecord::new(LinkKind::LibraryObject, geom, "models/tree.obj").unwrap();
        let id = store.enqueue_link(&record).unwrap();

        let pending = store.pending_links().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].record, record);

        store.delete_pending_link(id).unwrap();
        assert_eq!(store.pending_count().unwrap(), 0);
    }

    #[test]
    fn test_pending_links_preserve_enqueue_order() {
        let store = SqliteStore::open_in_memory().unwrap();

        for i in 0..5 {
            let record =
                LinkRecord::new(LinkKind::SurfaceGeometry, i, format!("#geom_{}", i)).unwrap();
            store.enqueue_link(&record).unwrap();
        }

        let pending = store.pending_links().unwrap();
        let targets: Vec<i64> = pending.iter().map(|l| l.record.target_id).collect();
        assert_eq!(targets, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_malformed_pending_rows_are_skipped() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO pending_links (kind, target_id, source_locator) VALUES ('appearance', 1, 'x')",
                [],
            )
            .unwrap();

        assert_eq!(store.pending_links().unwrap().len(), 0);
        assert_eq!(store.pending_count().unwrap(), 1);
    }

    #[test]
    fn test_stats() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_implicit_geometry("g", None).unwrap();
        store.insert_surface_geometry("sg", None, None, None).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.implicit_geometries, 1);
        assert_eq!(stats.surface_geometries, 1);
        assert_eq!(stats.pending_links, 0);
    }
}
