//! Link types - deferred cross-references recorded during primary import
//!
//! A city-model document may reference entities that do not exist yet at the
//! moment the referencing row is written, or whose payload lives outside the
//! document entirely. Primary import records each such reference as a
//! [`LinkRecord`] and moves on; the resolver family completes them after the
//! main object graph is in place.
//!
//! The kinds are a closed set:
//! - `LibraryObject`: external binary asset referenced by an implicit geometry
//! - `TextureImage`: texture payload referenced by a surface-data row
//! - `SurfaceGeometry`: pointer to a geometry row identified by its gml:id

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kinds of deferred references. Each kind is handled by exactly one
/// resolver; extending the set means adding a variant and its resolver pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// External binary asset (e.g. a 3D model file) for an implicit geometry
    LibraryObject,
    /// Texture image payload for a surface-data row
    TextureImage,
    /// Geometry pointer resolved through a gml:id lookup
    SurfaceGeometry,
}

impl LinkKind {
    /// Get the string representation of the link kind
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::LibraryObject => "library_object",
            LinkKind::TextureImage => "texture_image",
            LinkKind::SurfaceGeometry => "surface_geometry",
        }
    }

    /// Get all link kinds
    pub fn all() -> &'static [LinkKind] {
        &[
            LinkKind::LibraryObject,
            LinkKind::TextureImage,
            LinkKind::SurfaceGeometry,
        ]
    }

    /// Whether this kind streams a binary payload into the store.
    ///
    /// Streaming kinds commit per record; non-streaming kinds accumulate
    /// pointer updates and flush them in one batch.
    pub fn is_streaming(&self) -> bool {
        matches!(self, LinkKind::LibraryObject | LinkKind::TextureImage)
    }
}

impl FromStr for LinkKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "library_object" | "library-object" | "library" => Ok(LinkKind::LibraryObject),
            "texture_image" | "texture-image" | "texture" => Ok(LinkKind::TextureImage),
            "surface_geometry" | "surface-geometry" | "geometry" => Ok(LinkKind::SurfaceGeometry),
            _ => Err(crate::Error::InvalidLink(format!("Unknown link kind: {}", s))),
        }
    }
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One deferred reference: produced once by primary import, consumed once by
/// the resolver of its kind.
///
/// `target_id` names a row that primary import already created as a
/// placeholder; resolvers only ever complete that row, they never create it.
/// Whether the row still exists is checked at resolution time, not here,
/// since it can change between enqueue and drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Which resolver protocol applies
    pub kind: LinkKind,
    /// Row id of the placeholder row whose column must be completed
    pub target_id: i64,
    /// Payload source: local path (absolute or relative to the import base
    /// path), remote URL, or a `#gmlid` fragment for pointer kinds
    pub source_locator: String,
}

impl LinkRecord {
    /// Create a new link record, rejecting an empty source locator
    pub fn new(kind: LinkKind, target_id: i64, source_locator: impl Into<String>) -> crate::Result<Self> {
        let source_locator = source_locator.into();
        if source_locator.is_empty() {
            return Err(crate::Error::InvalidLink(format!(
                "empty source locator for {} target {}",
                kind, target_id
            )));
        }

        Ok(Self {
            kind,
            target_id,
            source_locator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_kind_roundtrip() {
        for kind in LinkKind::all() {
            let s = kind.as_str();
            let parsed: LinkKind = s.parse().unwrap();
            assert_eq!(*kind, parsed);
        }
    }

    #[test]
    fn test_link_kind_aliases() {
        assert_eq!(LinkKind::from_str("library").unwrap(), LinkKind::LibraryObject);
        assert_eq!(LinkKind::from_str("texture").unwrap(), LinkKind::TextureImage);
        assert_eq!(LinkKind::from_str("geometry").unwrap(), LinkKind::SurfaceGeometry);
        assert!(LinkKind::from_str("appearance").is_err());
    }

    #[test]
    fn test_streaming_kinds() {
        assert!(LinkKind::LibraryObject.is_streaming());
        assert!(LinkKind::TextureImage.is_streaming());
        assert!(!LinkKind::SurfaceGeometry.is_streaming());
    }

    #[test]
    fn test_record_creation() {
        let record = LinkRecord::new(LinkKind::LibraryObject, 42, "models/tree.obj").unwrap();
        assert_eq!(record.kind, LinkKind::LibraryObject);
        assert_eq!(record.target_id, 42);
        assert_eq!(record.source_locator, "models/tree.obj");
    }

    #[test]
    fn test_record_rejects_empty_locator() {
        assert!(LinkRecord::new(LinkKind::TextureImage, 7, "").is_err());
    }
}
