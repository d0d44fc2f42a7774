//! Transactional blob streaming
//!
//! The shared routine behind every binary-payload resolver: open a
//! bounded-memory stream from the source, allocate an empty placeholder of
//! the payload's exact size in the target column, fill it through an
//! incremental blob handle, and commit. Every exit path through the
//! transaction ends in exactly one commit or one rollback; the rollback is
//! the transaction guard's drop behavior, so no failure path can leave the
//! row half-written.
//!
//! SQLite incremental blobs cannot grow after allocation, so the payload
//! length must be known up front: local files report it from metadata, remote
//! sources from the Content-Length header, and a remote body without one is
//! spooled through an unnamed temp file first.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use rusqlite::blob::ZeroBlob;
use rusqlite::{Connection, DatabaseName, params};
use url::Url;

use super::ResolveError;
use crate::source::PayloadSource;

/// Destination column for a streamed payload
pub(crate) struct BlobTarget {
    pub table: &'static str,
    pub column: &'static str,
}

/// Stream a payload from its source into `target.column` of the row
/// `row_id`, inside one transaction. Returns the number of bytes stored.
pub(crate) fn store_payload(
    conn: &mut Connection,
    target: &BlobTarget,
    row_id: i64,
    source: &PayloadSource,
) -> Result<u64, ResolveError> {
    // Source problems (missing file, refused fetch, zero length) are caught
    // here, before any database work.
    let (mut reader, len) = open_source(source)?;
    fill_blob(conn, target, row_id, len, &mut reader)
}

/// Open a byte stream from the source and learn its exact length
fn open_source(source: &PayloadSource) -> Result<(Box<dyn Read>, u64), ResolveError> {
    match source {
        PayloadSource::Local(path) => open_local(path),
        PayloadSource::Remote(url) => open_remote(url),
    }
}

fn open_local(path: &Path) -> Result<(Box<dyn Read>, u64), ResolveError> {
    let meta = std::fs::metadata(path).map_err(|_| {
        ResolveError::SourceUnavailable(format!("failed to read file '{}'", path.display()))
    })?;

    if !meta.is_file() {
        return Err(ResolveError::SourceUnavailable(format!(
            "'{}' is not a regular file",
            path.display()
        )));
    }

    let file = File::open(path).map_err(|_| {
        ResolveError::SourceUnavailable(format!("failed to read file '{}'", path.display()))
    })?;

    if meta.len() == 0 {
        return Err(ResolveError::SourceUnavailable(format!(
            "skipping 0 byte file '{}'",
            path.display()
        )));
    }

    Ok((Box::new(file), meta.len()))
}

fn open_remote(url: &Url) -> Result<(Box<dyn Read>, u64), ResolveError> {
    let response = ureq::get(url.as_str()).call().map_err(|e| {
        ResolveError::SourceUnavailable(format!("failed to open remote source '{}': {}", url, e))
    })?;

    let len = response
        .headers()
        .get(ureq::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let reader = response.into_body().into_reader();

    match len {
        Some(0) => Err(ResolveError::SourceUnavailable(format!(
            "skipping 0 byte remote source '{}'",
            url
        ))),
        Some(len) => Ok((Box::new(reader), len)),
        None => spool_remote(reader, url),
    }
}

/// A remote body of unknown length is spooled to an unnamed temp file so the
/// placeholder can still be allocated at the exact payload size
fn spool_remote(mut reader: impl Read, url: &Url) -> Result<(Box<dyn Read>, u64), ResolveError> {
    let mut spool = tempfile::tempfile()
        .map_err(|e| ResolveError::Transfer(format!("failed to create spool file: {}", e)))?;

    io::copy(&mut reader, &mut spool)
        .map_err(|e| ResolveError::Transfer(format!("failed to fetch '{}': {}", url, e)))?;

    let len = spool
        .stream_position()
        .and_then(|len| spool.seek(SeekFrom::Start(0)).map(|_| len))
        .map_err(|e| ResolveError::Transfer(format!("failed to rewind spool file: {}", e)))?;

    if len == 0 {
        return Err(ResolveError::SourceUnavailable(format!(
            "skipping 0 byte remote source '{}'",
            url
        )));
    }

    Ok((Box::new(spool), len))
}

/// Allocate a `len`-byte placeholder in the target column and fill it from
/// the reader, all inside one transaction.
///
/// Dropping the transaction guard on any early return is the rollback; the
/// single `commit` at the end is the only path that makes bytes visible.
pub(crate) fn fill_blob(
    conn: &mut Connection,
    target: &BlobTarget,
    row_id: i64,
    len: u64,
    reader: &mut dyn Read,
) -> Result<u64, ResolveError> {
    if len > i32::MAX as u64 {
        return Err(ResolveError::Transfer(format!(
            "payload of {} bytes exceeds the blob size limit",
            len
        )));
    }

    let tx = conn.transaction()?;

    // Allocate the empty placeholder at its final size
    let sql = format!(
        "UPDATE {} SET {} = ?1 WHERE id = ?2",
        target.table, target.column
    );
    let affected = {
        let mut stmt = tx.prepare_cached(&sql)?;
        stmt.execute(params![ZeroBlob(len as i32), row_id])?
    };
    if affected == 0 {
        return Err(ResolveError::TargetInconsistent(format!(
            "no row with id {} in {}",
            row_id, target.table
        )));
    }

    // Fill it through an incremental handle; io::copy keeps memory bounded
    // by its fixed intermediate buffer regardless of payload size
    let mut handle = tx.blob_open(DatabaseName::Main, target.table, target.column, row_id, false)?;
    let copied = io::copy(reader, &mut handle)
        .map_err(|e| ResolveError::Transfer(e.to_string()))?;
    handle.close()?;

    if copied != len {
        return Err(ResolveError::Transfer(format!(
            "expected {} bytes, copied {}",
            len, copied
        )));
    }

    tx.commit()?;
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use std::io::Cursor;
    use std::io::Write;

    const TARGET: BlobTarget = BlobTarget {
        table: "implicit_geometry",
        column: "library_object",
    };

    /// Reader that yields `good` bytes and then fails mid-stream
    struct FailingReader {
        good: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.good == 0 {
                return Err(io::Error::other("simulated mid-transfer failure"));
            }
            let n = buf.len().min(self.good);
            buf[..n].fill(0xAB);
            self.good -= n;
            Ok(n)
        }
    }

    fn store_with_row() -> (SqliteStore, rusqlite::Connection, i64, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("depot.db");
        let store = SqliteStore::open(&db_path).unwrap();
        let id = store.insert_implicit_geometry("g1", None).unwrap();
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        (store, conn, id, dir)
    }

    #[test]
    fn test_fill_blob_roundtrip() {
        let (store, mut conn, id, _dir) = store_with_row();
        let payload = b"solid cube facet normal".to_vec();

        let copied = fill_blob(&mut conn, &TARGET, id, payload.len() as u64, &mut Cursor::new(&payload)).unwrap();
        assert_eq!(copied, payload.len() as u64);
        assert_eq!(store.get_library_object(id).unwrap(), Some(payload));
    }

    #[test]
    fn test_fill_blob_missing_row_rolls_back() {
        let (_store, mut conn, _id, _dir) = store_with_row();
        let err = fill_blob(&mut conn, &TARGET, 9999, 4, &mut Cursor::new(b"abcd")).unwrap_err();
        assert!(matches!(err, ResolveError::TargetInconsistent(_)));
    }

    #[test]
    fn test_mid_transfer_failure_leaves_column_unchanged() {
        let (store, mut conn, id, _dir) = store_with_row();

        // Seed the column so rollback is observable against a known state
        let before = b"previous payload".to_vec();
        fill_blob(&mut conn, &TARGET, id, before.len() as u64, &mut Cursor::new(&before)).unwrap();

        let err = fill_blob(&mut conn, &TARGET, id, 1000, &mut FailingReader { good: 100 }).unwrap_err();
        assert!(matches!(err, ResolveError::Transfer(_)));
        assert_eq!(store.get_library_object(id).unwrap(), Some(before));
    }

    #[test]
    fn test_short_source_is_a_transfer_failure() {
        let (store, mut conn, id, _dir) = store_with_row();

        // Claimed length exceeds what the reader delivers
        let err = fill_blob(&mut conn, &TARGET, id, 100, &mut Cursor::new(b"short")).unwrap_err();
        assert!(matches!(err, ResolveError::Transfer(_)));
        assert_eq!(store.get_library_object(id).unwrap(), None);
    }

    #[test]
    fn test_open_local_missing_file() {
        let err = open_local(Path::new("/nonexistent/payload.obj")).err().unwrap();
        assert!(matches!(err, ResolveError::SourceUnavailable(_)));
    }

    #[test]
    fn test_open_local_zero_length_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.obj");
        File::create(&path).unwrap();

        let err = open_local(&path).err().unwrap();
        match err {
            ResolveError::SourceUnavailable(msg) => assert!(msg.contains("0 byte")),
            other => panic!("expected source-unavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_open_local_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.obj");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"v 0 0 0").unwrap();

        let (mut reader, len) = open_local(&path).unwrap();
        assert_eq!(len, 7);
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"v 0 0 0");
    }
}
