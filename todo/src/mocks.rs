//! In-memory storage for tests and demos.
//!
//! **WARNING**: Nothing written to [`MockStorage`] survives the process.

use crate::error::{StorageError, StorageErrorKind};
use crate::storage::{StorageFuture, StorageStrategy, StrategyKind};
use crate::types::Task;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// In-memory strategy with failure injection
///
/// ```
/// use todo::mocks::MockStorage;
/// use todo::storage::StrategyKind;
/// use todo::StorageErrorKind;
///
/// let storage = MockStorage::new(StrategyKind::Local);
/// storage.fail_with(Some(StorageErrorKind::QuotaExceeded));
/// storage.set_available(false);
/// ```
#[derive(Debug)]
pub struct MockStorage {
    kind: StrategyKind,
    tasks: Mutex<Vec<Task>>,
    failure: Mutex<Option<StorageErrorKind>>,
    available: AtomicBool,
    calls: AtomicUsize,
}

impl MockStorage {
    /// Empty, available storage reporting `kind`
    #[must_use]
    pub fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            tasks: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            available: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    /// Replace the stored collection without counting a call
    pub fn seed(&self, tasks: Vec<Task>) {
        *self.tasks.lock().unwrap_or_else(PoisonError::into_inner) = tasks;
    }

    /// Copy of the stored collection
    #[must_use]
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make every following operation fail with `kind`; `None` heals
    pub fn fail_with(&self, kind: Option<StorageErrorKind>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = kind;
    }

    /// Set the result of the availability check
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Number of get/save/clear calls so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin(&self, operation: &str) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failure = *self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        match failure {
            Some(kind) => Err(StorageError::new(
                kind,
                format!("injected {operation} failure in {} mock", self.kind),
            )),
            None => Ok(()),
        }
    }
}

impl StorageStrategy for MockStorage {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn get_all(&self) -> StorageFuture<'_, Vec<Task>> {
        Box::pin(async move {
            self.begin("read")?;
            Ok(self.snapshot())
        })
    }

    fn save_all<'a>(&'a self, tasks: &'a [Task]) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            self.begin("write")?;
            self.seed(tasks.to_vec());
            Ok(())
        })
    }

    fn clear(&self) -> StorageFuture<'_, ()> {
        Box::pin(async move {
            self.begin("clear")?;
            self.seed(Vec::new());
            Ok(())
        })
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }
}
