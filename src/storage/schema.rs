//! Database schema definitions

/// SQL to create the implicit_geometry table.
/// `library_object` starts out empty and is filled by the library-object
/// resolver; `relative_geometry_id` is completed by the surface-geometry
/// resolver.
pub const CREATE_IMPLICIT_GEOMETRY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS implicit_geometry (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    gmlid TEXT,
    reference_to_library TEXT,
    library_object BLOB,
    relative_geometry_id INTEGER REFERENCES surface_geometry(id)
)
"#;

/// SQL to create the surface_data table.
/// `tex_image` is filled by the texture-image resolver.
pub const CREATE_SURFACE_DATA_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS surface_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    gmlid TEXT,
    tex_image_uri TEXT,
    tex_image BLOB
)
"#;

/// SQL to create the surface_geometry table
pub const CREATE_SURFACE_GEOMETRY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS surface_geometry (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    gmlid TEXT UNIQUE,
    parent_id INTEGER,
    root_id INTEGER,
    geometry TEXT
)
"#;

/// SQL to create the pending_links table.
/// The durable queue of deferred references written during primary import
/// and drained by the resolution phase.
pub const CREATE_PENDING_LINKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS pending_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    target_id INTEGER NOT NULL,
    source_locator TEXT NOT NULL
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_implicit_geometry_gmlid ON implicit_geometry(gmlid)",
    "CREATE INDEX IF NOT EXISTS idx_surface_data_gmlid ON surface_data(gmlid)",
    "CREATE INDEX IF NOT EXISTS idx_surface_geometry_gmlid ON surface_geometry(gmlid)",
    "CREATE INDEX IF NOT EXISTS idx_pending_links_kind ON pending_links(kind)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_SURFACE_GEOMETRY_TABLE,
        CREATE_IMPLICIT_GEOMETRY_TABLE,
        CREATE_SURFACE_DATA_TABLE,
        CREATE_PENDING_LINKS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
