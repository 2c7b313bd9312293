//! Local file storage.
//!
//! The whole collection is one JSON array written to `<dir>/<key>.json`.
//! Writes go to a sibling temp file first and are renamed into place, so a
//! crash mid-write leaves the previous snapshot intact.

use super::{StorageFuture, StorageStrategy, StrategyKind};
use crate::error::{StorageError, StorageErrorKind};
use crate::types::Task;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Default snapshot key
pub const DEFAULT_KEY: &str = "todos";

/// Default byte quota (5 MiB)
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

/// Task storage backed by a JSON file
#[derive(Clone, Debug)]
pub struct LocalStorage {
    dir: PathBuf,
    key: String,
    quota_bytes: Option<u64>,
}

impl LocalStorage {
    /// Storage under `dir` with the default key and quota
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            key: DEFAULT_KEY.to_string(),
            quota_bytes: Some(DEFAULT_QUOTA_BYTES),
        }
    }

    /// Use a different snapshot key
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Limit the snapshot size; `None` removes the limit
    #[must_use]
    pub const fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    /// Path of the snapshot file
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    /// Directory holding the snapshot
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Size of the current snapshot in bytes (0 when absent)
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the file exists but cannot be inspected.
    pub async fn storage_size(&self) -> Result<u64, StorageError> {
        match tokio::fs::metadata(self.path()).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(map_io_error(e, "inspect")),
        }
    }

    /// Percentage of the quota in use (0 without a quota)
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the snapshot size cannot be read.
    #[allow(clippy::cast_precision_loss)] // snapshot sizes are far below 2^52
    pub async fn storage_usage(&self) -> Result<f64, StorageError> {
        let Some(quota) = self.quota_bytes.filter(|q| *q > 0) else {
            return Ok(0.0);
        };
        let used = self.storage_size().await?;
        Ok(used as f64 / quota as f64 * 100.0)
    }

    async fn read(&self) -> Result<Vec<Task>, StorageError> {
        let path = self.path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound && self.dir.is_dir() => {
                tracing::debug!(path = %path.display(), "No snapshot yet, starting empty");
                return Ok(Vec::new());
            },
            Err(e) => return Err(map_io_error(e, "read")),
        };

        let tasks: Vec<Task> = serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::invalid_data(format!("snapshot {} is malformed", path.display()))
                .with_source(e)
        })?;

        tracing::debug!(count = tasks.len(), "Loaded tasks from local storage");
        Ok(tasks)
    }

    async fn write(&self, tasks: &[Task]) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(tasks).map_err(|e| {
            StorageError::invalid_data("tasks could not be serialized").with_source(e)
        })?;

        if let Some(quota) = self.quota_bytes.filter(|q| *q > 0) {
            let size = bytes.len() as u64;
            if size > quota {
                return Err(StorageError::new(
                    StorageErrorKind::QuotaExceeded,
                    format!("snapshot of {size} bytes exceeds the {quota} byte quota"),
                ));
            }
        }

        let path = self.path();
        let tmp = self.dir.join(format!("{}.json.tmp", self.key));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| map_io_error(e, "write"))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| map_io_error(e, "replace"))?;

        tracing::debug!(count = tasks.len(), bytes = bytes.len(), "Saved tasks to local storage");
        Ok(())
    }

    async fn remove(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io_error(e, "clear")),
        }
    }
}

impl StorageStrategy for LocalStorage {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Local
    }

    fn get_all(&self) -> StorageFuture<'_, Vec<Task>> {
        Box::pin(self.read())
    }

    fn save_all<'a>(&'a self, tasks: &'a [Task]) -> StorageFuture<'a, ()> {
        Box::pin(self.write(tasks))
    }

    fn clear(&self) -> StorageFuture<'_, ()> {
        Box::pin(self.remove())
    }

    fn is_available(&self) -> bool {
        std::fs::metadata(&self.dir)
            .map(|meta| meta.is_dir() && !meta.permissions().readonly())
            .unwrap_or(false)
    }
}

/// Map an I/O failure onto the shared error kinds
fn map_io_error(error: std::io::Error, action: &str) -> StorageError {
    let kind = match error.kind() {
        ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => StorageErrorKind::Permission,
        ErrorKind::StorageFull | ErrorKind::FileTooLarge => StorageErrorKind::QuotaExceeded,
        ErrorKind::NotFound => StorageErrorKind::ServiceUnavailable,
        _ => StorageErrorKind::Unknown,
    };
    StorageError::new(kind, format!("failed to {action} local snapshot")).with_source(error)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use crate::types::{CreateTaskInput, Priority, TaskId};
    use taskstore_core::environment::Clock;
    use taskstore_testing::test_clock;

    fn tasks() -> Vec<Task> {
        let now = test_clock().now() + chrono::Duration::milliseconds(250);
        vec![
            Task::create(TaskId::new("a"), &CreateTaskInput::new("A"), now).unwrap(),
            Task::create(
                TaskId::new("b"),
                &CreateTaskInput::new("B").with_priority(Priority::High),
                now,
            )
            .unwrap(),
        ]
    }

    #[tokio::test]
    async fn missing_snapshot_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(storage.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.save_all(&tasks()).await.unwrap();
        assert_eq!(storage.get_all().await.unwrap(), tasks());
        assert!(dir.path().join("todos.json").exists());
    }

    #[tokio::test]
    async fn malformed_snapshot_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("todos.json"), b"{not json").unwrap();

        let err = LocalStorage::new(dir.path()).get_all().await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn oversized_snapshot_exceeds_quota() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).with_quota(Some(16));

        let err = storage.save_all(&tasks()).await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::QuotaExceeded);
        assert!(!storage.path().exists());
    }

    #[tokio::test]
    async fn clear_removes_snapshot_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).with_key("work");

        storage.save_all(&tasks()).await.unwrap();
        assert!(dir.path().join("work.json").exists());

        storage.clear().await.unwrap();
        storage.clear().await.unwrap();
        assert!(storage.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("nope"));

        assert!(!storage.is_available());
        let err = storage.save_all(&tasks()).await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::ServiceUnavailable);
    }

    #[tokio::test]
    async fn usage_reports_share_of_quota() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert_eq!(storage.storage_size().await.unwrap(), 0);

        storage.save_all(&tasks()).await.unwrap();
        let size = storage.storage_size().await.unwrap();
        assert!(size > 0);

        let usage = storage.storage_usage().await.unwrap();
        assert!(usage > 0.0 && usage < 1.0);

        let unlimited = storage.clone().with_quota(None);
        assert!(unlimited.storage_usage().await.unwrap().abs() < f64::EPSILON);
    }
}
