//! Flat-file persistence for stage artifacts.
//!
//! Every write goes through a temp file in the destination directory followed
//! by a rename, so a reader (or a crash) never observes a half-written file.
//! That property is what makes the enrichment stage's save-after-every-image
//! loop safe to interrupt.

use crate::error::IngestError;
use crate::model::RawElement;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Read a JSON array of elements or chunks.
pub fn read_raw(path: &Path) -> Result<Vec<RawElement>, IngestError> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IngestError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            IngestError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|e| IngestError::MalformedJson {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Atomically replace `path` with `bytes`, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IngestError> {
    let write_err = |source: std::io::Error| IngestError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Pretty-print `value` as JSON and write it atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), IngestError> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| IngestError::Internal(format!("serialise {}: {e}", path.display())))?;
    write_atomic(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/doc.json");
        let elements = vec![RawElement {
            element_type: "Title".into(),
            element_id: "t".into(),
            text: Some("Hello".into()),
            ..Default::default()
        }];
        write_json_atomic(&path, &elements).expect("write");
        assert_eq!(read_raw(&path).expect("read"), elements);
        // No temp files left behind.
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_raw(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound { .. }));
    }

    #[test]
    fn non_array_is_malformed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"type\": \"Title\"}").unwrap();
        assert!(matches!(
            read_raw(&path).unwrap_err(),
            IngestError::MalformedJson { .. }
        ));
    }
}
