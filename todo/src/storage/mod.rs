//! Persistence strategies and the coordinator that falls back between them.
//!
//! Every backend implements [`StorageStrategy`]: read, write and clear the
//! whole task collection as one snapshot, plus a cheap availability check.
//! The trait is object safe so strategies can be held as
//! `Arc<dyn StorageStrategy>` and swapped at runtime.

use crate::error::StorageError;
use crate::types::Task;
use std::future::Future;
use std::pin::Pin;

pub mod coordinator;
pub mod local;
pub mod remote;

pub use coordinator::{CoordinatorStatus, StorageCoordinator};
pub use local::LocalStorage;
pub use remote::{RemoteConfig, RemoteEvent, RemoteStatus, RemoteStorage};

/// Boxed future returned by [`StorageStrategy`] operations
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Which backend a strategy talks to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Files on the local machine
    Local,
    /// An HTTP API
    Remote,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!("unknown storage strategy '{other}' (expected local or remote)")),
        }
    }
}

/// A persistence backend for the task collection
///
/// # Example
///
/// ```ignore
/// let storage: Arc<dyn StorageStrategy> = Arc::new(LocalStorage::new("./data"));
/// storage.save_all(&tasks).await?;
/// assert_eq!(storage.get_all().await?, tasks);
/// ```
pub trait StorageStrategy: Send + Sync {
    /// Which backend this is
    fn kind(&self) -> StrategyKind;

    /// Read the stored collection; an empty store yields an empty list
    fn get_all(&self) -> StorageFuture<'_, Vec<Task>>;

    /// Replace the stored collection
    fn save_all<'a>(&'a self, tasks: &'a [Task]) -> StorageFuture<'a, ()>;

    /// Remove the stored collection
    fn clear(&self) -> StorageFuture<'_, ()>;

    /// Synchronous capability check with no side effects
    fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_kind_parses_case_insensitively() {
        assert_eq!("Remote".parse::<StrategyKind>(), Ok(StrategyKind::Remote));
        assert_eq!(" local ".parse::<StrategyKind>(), Ok(StrategyKind::Local));
        assert!("cloud".parse::<StrategyKind>().is_err());
    }
}
