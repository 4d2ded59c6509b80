use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StorageError;

/// Write a JSON document atomically: serialize to `<name>.tmp`, then rename.
///
/// A crash mid-write leaves at most a stray temp file; the previous document
/// stays intact.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_vec_pretty(value)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_path_for(path);
    std::fs::write(&tmp_path, &json)?;
    std::fs::rename(&tmp_path, path)?;

    tracing::debug!(path = %path.display(), bytes = json.len(), "document written");
    Ok(())
}

/// Read a JSON document. `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StorageError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// First path in `dir` named by `name(slug)` that is not already taken,
/// suffixing `_1`, `_2`, … to the slug on collision.
pub fn unique_document_path(dir: &Path, slug: &str, name: impl Fn(&str) -> String) -> PathBuf {
    let candidate = dir.join(name(slug));
    if !candidate.exists() {
        return candidate;
    }
    let mut n = 1u32;
    loop {
        let candidate = dir.join(name(&format!("{slug}_{n}")));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_document_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let value: Option<serde_json::Value> = read_json(&dir.path().join("absent.json")).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn garbage_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = read_json::<serde_json::Value>(&path).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("doc.json");
        write_json_atomic(&path, &serde_json::json!({"a": 1})).unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("sub").join("doc.json.tmp").exists());
    }

    #[test]
    fn colliding_names_get_suffixed() {
        let dir = tempfile::tempdir().unwrap();
        let name = |slug: &str| format!("report_{slug}.json");
        let first = unique_document_path(dir.path(), "x", name);
        std::fs::write(&first, b"{}").unwrap();
        let second = unique_document_path(dir.path(), "x", name);
        assert_eq!(second, dir.path().join("report_x_1.json"));
    }
}
