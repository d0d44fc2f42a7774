//! Payload source classification
//!
//! A source locator from a city-model document is either a remote URL or a
//! filesystem path, and document authors rarely say which. Classification is
//! decided once per record: probe for an absolute URL first, fall back to
//! path handling with separator normalization and resolution against the
//! configured import base path.

use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Where a binary payload comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSource {
    /// Fetched over the network
    Remote(Url),
    /// Read from the local filesystem
    Local(PathBuf),
}

// Schemes accepted as remote sources. `Url::parse` happily treats a Windows
// drive letter ("C:\models\x.obj") as a scheme, so anything outside this list
// is a filesystem path.
const REMOTE_SCHEMES: &[&str] = &["http", "https", "ftp"];

impl PayloadSource {
    /// Classify a source locator against the import base path.
    ///
    /// Relative paths resolve against `import_base`; absolute paths are used
    /// unchanged. Backslash separators are normalized first so documents
    /// written on Windows import everywhere.
    pub fn classify(locator: &str, import_base: &Path) -> Self {
        if let Ok(url) = Url::parse(locator) {
            if REMOTE_SCHEMES.contains(&url.scheme()) {
                return PayloadSource::Remote(url);
            }
        }

        let normalized = locator.replace('\\', "/");
        let path = Path::new(&normalized);
        if path.is_absolute() {
            PayloadSource::Local(path.to_path_buf())
        } else {
            PayloadSource::Local(import_base.join(path))
        }
    }
}

impl fmt::Display for PayloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadSource::Remote(url) => write!(f, "{}", url),
            PayloadSource::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PathBuf {
        PathBuf::from("/data/import")
    }

    #[test]
    fn test_classify_http_url() {
        let source = PayloadSource::classify("https://example.com/models/tree.obj", &base());
        match source {
            PayloadSource::Remote(url) => assert_eq!(url.scheme(), "https"),
            other => panic!("expected remote source, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_relative_path() {
        let source = PayloadSource::classify("textures/a.png", &base());
        assert_eq!(source, PayloadSource::Local(PathBuf::from("/data/import/textures/a.png")));
    }

    #[test]
    fn test_classify_absolute_path() {
        let source = PayloadSource::classify("/srv/assets/a.png", &base());
        assert_eq!(source, PayloadSource::Local(PathBuf::from("/srv/assets/a.png")));
    }

    #[test]
    fn test_classify_backslash_path() {
        let source = PayloadSource::classify("textures\\roof\\a.png", &base());
        assert_eq!(
            source,
            PayloadSource::Local(PathBuf::from("/data/import/textures/roof/a.png"))
        );
    }

    #[test]
    fn test_drive_letter_is_not_a_scheme() {
        // "c:" parses as a URL scheme but must stay a local path
        let source = PayloadSource::classify("C:\\models\\tree.obj", &base());
        assert!(matches!(source, PayloadSource::Local(_)));
    }
}
