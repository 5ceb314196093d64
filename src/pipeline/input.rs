//! Input discovery: which documents a task should process.
//!
//! Documents are keyed by their file stem everywhere downstream
//! (`manual.pdf` → `01_partitioned/manual.json` → `03_markdown/manual.md`),
//! so listing is the only place that looks at extensions.
//! We validate the PDF magic bytes (`%PDF`) up front so a stray file fails
//! with a clear message instead of an opaque partitioning error.

use crate::error::IngestError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The document name used for every artifact derived from `path`.
pub fn document_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn list_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, IngestError> {
    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::ReadFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().to_lowercase().ends_with(suffix))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// All `*.pdf` files (any case) directly inside `dir`, sorted by name.
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !dir.is_dir() {
        return Err(IngestError::InvalidDirectory {
            path: dir.to_path_buf(),
        });
    }
    let files = list_with_suffix(dir, ".pdf")?;
    debug!("{} PDF files in {}", files.len(), dir.display());
    Ok(files)
}

/// All `*.json` files directly inside `dir`, sorted by name. A missing
/// directory simply has no files.
pub fn list_json(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    list_with_suffix(dir, ".json")
}

/// Check that `path` exists and starts with the PDF magic bytes.
pub fn validate_pdf(path: &Path) -> Result<(), IngestError> {
    let mut file = std::fs::File::open(path).map_err(|e| {
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

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_ok() && &magic == b"%PDF" {
        Ok(())
    } else {
        Err(IngestError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        })
    }
}

/// Rename `<name>.json.json` files in `dir` to `<name>.json`.
///
/// Some uploaders append `.json` to a name that already ends in `.json`.
/// Returns the number of files renamed.
pub fn repair_double_json_extension(dir: &Path) -> Result<usize, IngestError> {
    let mut renamed = 0;
    for path in list_json(dir)? {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let Some(stem) = name.strip_suffix(".json.json") else {
            continue;
        };
        let target = path.with_file_name(format!("{stem}.json"));
        std::fs::rename(&path, &target).map_err(|e| IngestError::OutputWriteFailed {
            path: target.clone(),
            source: e,
        })?;
        debug!("Renamed {} → {}", path.display(), target.display());
        renamed += 1;
    }
    if renamed > 0 {
        info!("Renamed {} files to remove duplicate .json extension", renamed);
    }
    Ok(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_pdfs_case_insensitively_and_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.PDF", "a.pdf", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"%PDF-1.7").unwrap();
        }
        let names: Vec<String> = list_pdfs(dir.path())
            .unwrap()
            .iter()
            .map(|p| document_name(p))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn missing_input_dir_is_invalid() {
        let err = list_pdfs(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, IngestError::InvalidDirectory { .. }));
        assert!(list_json(Path::new("/definitely/not/here")).unwrap().is_empty());
    }

    #[test]
    fn validates_magic_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = dir.path().join("good.pdf");
        let bad = dir.path().join("bad.pdf");
        let short = dir.path().join("short.pdf");
        std::fs::write(&good, b"%PDF-1.4\n").unwrap();
        std::fs::write(&bad, b"PK\x03\x04zip").unwrap();
        std::fs::write(&short, b"%P").unwrap();

        assert!(validate_pdf(&good).is_ok());
        assert!(matches!(
            validate_pdf(&bad),
            Err(IngestError::NotAPdf { magic, .. }) if &magic == b"PK\x03\x04"
        ));
        assert!(matches!(validate_pdf(&short), Err(IngestError::NotAPdf { .. })));
        assert!(matches!(
            validate_pdf(&dir.path().join("absent.pdf")),
            Err(IngestError::FileNotFound { .. })
        ));
    }

    #[test]
    fn repairs_double_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("manual.json.json"), "[]").unwrap();
        std::fs::write(dir.path().join("guide.json"), "[]").unwrap();

        assert_eq!(repair_double_json_extension(dir.path()).unwrap(), 1);
        assert!(dir.path().join("manual.json").exists());
        assert!(!dir.path().join("manual.json.json").exists());
        assert_eq!(list_json(dir.path()).unwrap().len(), 2);
    }
}
