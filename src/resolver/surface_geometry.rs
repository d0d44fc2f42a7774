//! Surface-geometry resolver
//!
//! An implicit geometry may reference its relative geometry by gml:id
//! (`#some_id`) instead of inline coordinates. When the referenced row did
//! not exist yet at write time, primary import leaves
//! `relative_geometry_id` empty and queues a link.
//!
//! This kind carries no payload, so there is nothing to stream: each insert
//! looks up the referenced row and buffers a pointer update, and the whole
//! batch is flushed in a single transaction at session end.

use rusqlite::{Connection, OptionalExtension, params};

use super::XlinkResolver;
use crate::link::{LinkKind, LinkRecord};
use crate::Result;

/// Completes `implicit_geometry.relative_geometry_id` pointers
pub struct SurfaceGeometryResolver {
    conn: Connection,
    /// (target row, resolved geometry id) pairs awaiting flush
    batch: Vec<(i64, i64)>,
}

impl SurfaceGeometryResolver {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            batch: Vec::new(),
        }
    }

    fn lookup_geometry(&self, gmlid: &str) -> rusqlite::Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT id FROM surface_geometry WHERE gmlid = ?1",
                [gmlid],
                |row| row.get(0),
            )
            .optional()
    }
}

impl XlinkResolver for SurfaceGeometryResolver {
    fn resolver_type(&self) -> LinkKind {
        LinkKind::SurfaceGeometry
    }

    fn insert(&mut self, record: &LinkRecord) -> bool {
        let gmlid = record.source_locator.trim_start_matches('#');

        match self.lookup_geometry(gmlid) {
            Ok(Some(geometry_id)) => {
                self.batch.push((record.target_id, geometry_id));
                true
            }
            Ok(None) => {
                tracing::warn!(
                    "No surface geometry with gml:id '{}' for implicit geometry {}",
                    gmlid,
                    record.target_id
                );
                false
            }
            Err(e) => {
                tracing::error!(
                    "Failed to look up surface geometry '{}' for implicit geometry {}: {}",
                    gmlid,
                    record.target_id,
                    e
                );
                false
            }
        }
    }

    fn execute_batch(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "UPDATE implicit_geometry SET relative_geometry_id = ?1 WHERE id = ?2",
            )?;
            for (target_id, geometry_id) in &self.batch {
                let affected = stmt.execute(params![geometry_id, target_id])?;
                if affected == 0 {
                    // the referencing row disappeared between insert and
                    // flush; the rest of the batch is still good
                    tracing::warn!(
                        "Implicit geometry {} vanished before its pointer was flushed",
                        target_id
                    );
                }
            }
        }
        tx.commit()?;

        self.batch.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.conn.flush_prepared_statement_cache();
        Ok(())
    }
}
