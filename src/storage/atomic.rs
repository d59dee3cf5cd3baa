//! Atomic document writes - temp file in the target directory, then rename.

use std::path::Path;

use serde::Serialize;
use uuid::Uuid;

use crate::error::PluginError;

/// Write `contents` to `path` so that a concurrent reader sees either the old
/// document or the new one, never a partial write.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PluginError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
            tracing::debug!(tmp = %tmp.display(), error = %cleanup, "Failed to remove temp file");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Serialize `value` as pretty-printed JSON and write it atomically.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PluginError> {
    let mut data = serde_json::to_string_pretty(value)?;
    data.push('\n');
    write_atomic(path, data.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");

        write_atomic(&path, b"{}").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");

        write_atomic(&path, b"old").await.unwrap();
        write_atomic(&path, b"new").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");

        for _ in 0..3 {
            write_atomic(&path, b"content").await.unwrap();
        }

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["doc.json".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_rename_leaves_target_untouched() {
        let dir = tempdir().unwrap();
        // A non-empty directory at the target path makes the rename fail.
        let path = dir.path().join("doc.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("existing.txt"), "keep me").unwrap();

        let result = write_atomic(&path, b"replacement").await;
        assert!(result.is_err());
        assert_eq!(
            std::fs::read_to_string(path.join("existing.txt")).unwrap(),
            "keep me"
        );

        // The failed attempt must not leave its temp file around.
        let stray: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(stray.is_empty(), "stray temp files: {stray:?}");
    }

    #[tokio::test]
    async fn test_write_json_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");

        write_json(&path, &serde_json::json!({"name": "test"}))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["name"], "test");
    }
}
