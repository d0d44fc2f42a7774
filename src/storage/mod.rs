//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - implicit_geometry(gmlid, reference_to_library, library_object, relative_geometry_id)
//! - surface_data(gmlid, tex_image_uri, tex_image)
//! - surface_geometry(gmlid, parent_id, root_id, geometry)
//! - pending_links(kind, target_id, source_locator)

pub mod schema;
pub mod sqlite;

pub use sqlite::{DbStats, PendingLink, SqliteStore};
