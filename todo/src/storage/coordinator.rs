//! Strategy selection with automatic fallback.
//!
//! The coordinator holds strategies in priority order and a pointer to the
//! current one. Every operation goes to the current strategy first; when it
//! fails and auto-switch is on, the remaining *available* strategies are
//! tried in order and the first one that succeeds becomes current.

use super::{StorageFuture, StorageStrategy, StrategyKind};
use crate::error::StorageError;
use crate::types::Task;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Snapshot of coordinator state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorStatus {
    /// Strategy operations go to first
    pub current: StrategyKind,
    /// Strategies whose availability check currently passes, in priority order
    pub available: Vec<StrategyKind>,
    /// Whether failures fall back automatically
    pub auto_switch: bool,
}

/// Chooses a storage strategy and falls back between them
pub struct StorageCoordinator {
    strategies: Vec<Arc<dyn StorageStrategy>>,
    current: AtomicUsize,
    auto_switch: AtomicBool,
}

impl StorageCoordinator {
    /// Coordinate `strategies`, highest priority first
    ///
    /// The first strategy starts as current and auto-switch is on.
    ///
    /// # Errors
    ///
    /// Returns a service-unavailable [`StorageError`] if `strategies` is empty.
    pub fn new(strategies: Vec<Arc<dyn StorageStrategy>>) -> Result<Self, StorageError> {
        if strategies.is_empty() {
            return Err(StorageError::unavailable("no storage strategies registered"));
        }

        Ok(Self {
            strategies,
            current: AtomicUsize::new(0),
            auto_switch: AtomicBool::new(true),
        })
    }

    /// Start on `kind` instead of the first strategy, if it is registered
    #[must_use]
    pub fn with_default(self, kind: StrategyKind) -> Self {
        if let Some(index) = self.position(kind) {
            self.current.store(index, Ordering::Release);
        }
        self
    }

    /// Enable or disable automatic fallback
    #[must_use]
    pub fn with_auto_switch(self, enabled: bool) -> Self {
        self.set_auto_switch(enabled);
        self
    }

    /// Enable or disable automatic fallback
    pub fn set_auto_switch(&self, enabled: bool) {
        self.auto_switch.store(enabled, Ordering::Release);
    }

    /// Whether failures fall back automatically
    #[must_use]
    pub fn is_auto_switch_enabled(&self) -> bool {
        self.auto_switch.load(Ordering::Acquire)
    }

    /// Kind of the current strategy
    #[must_use]
    pub fn current(&self) -> StrategyKind {
        self.current_strategy().kind()
    }

    /// Kinds whose availability check passes, in priority order
    #[must_use]
    pub fn available_strategies(&self) -> Vec<StrategyKind> {
        self.strategies
            .iter()
            .filter(|s| s.is_available())
            .map(|s| s.kind())
            .collect()
    }

    /// Whether `kind` is registered and available
    #[must_use]
    pub fn is_strategy_available(&self, kind: StrategyKind) -> bool {
        self.strategies
            .iter()
            .any(|s| s.kind() == kind && s.is_available())
    }

    /// Current strategy, availability and auto-switch in one snapshot
    #[must_use]
    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            current: self.current(),
            available: self.available_strategies(),
            auto_switch: self.is_auto_switch_enabled(),
        }
    }

    /// Make `kind` the current strategy
    ///
    /// # Errors
    ///
    /// Returns a service-unavailable [`StorageError`] if `kind` is not
    /// registered or its availability check fails.
    pub fn switch_to(&self, kind: StrategyKind) -> Result<(), StorageError> {
        let index = self
            .position(kind)
            .filter(|&i| self.strategies[i].is_available())
            .ok_or_else(|| StorageError::unavailable(format!("{kind} storage is not available")))?;

        let previous = self.current.swap(index, Ordering::AcqRel);
        if previous != index {
            tracing::info!(to = %kind, "Switched storage strategy");
        }
        Ok(())
    }

    /// Make local storage current
    ///
    /// # Errors
    ///
    /// See [`StorageCoordinator::switch_to`].
    pub fn switch_to_local(&self) -> Result<(), StorageError> {
        self.switch_to(StrategyKind::Local)
    }

    /// Make remote storage current
    ///
    /// # Errors
    ///
    /// See [`StorageCoordinator::switch_to`].
    pub fn switch_to_remote(&self) -> Result<(), StorageError> {
        self.switch_to(StrategyKind::Remote)
    }

    /// Pick a usable starting strategy
    ///
    /// Keeps the current strategy when it is available, otherwise moves to
    /// the first available one.
    ///
    /// # Errors
    ///
    /// Returns a service-unavailable [`StorageError`] when no strategy is available.
    pub fn initialize(&self) -> Result<StrategyKind, StorageError> {
        let current = self.current_strategy();
        if current.is_available() {
            tracing::info!(strategy = %current.kind(), "Storage initialized");
            return Ok(current.kind());
        }

        let index = self
            .strategies
            .iter()
            .position(|s| s.is_available())
            .ok_or_else(|| StorageError::unavailable("no storage strategy is available"))?;

        self.current.store(index, Ordering::Release);
        let kind = self.strategies[index].kind();
        tracing::warn!(
            configured = %current.kind(),
            selected = %kind,
            "Configured storage unavailable, using fallback"
        );
        Ok(kind)
    }

    /// Copy the current strategy's collection onto every other available strategy
    ///
    /// Returns the number of tasks copied.
    ///
    /// # Errors
    ///
    /// Returns the first read or write failure.
    pub async fn sync_between_storages(&self) -> Result<usize, StorageError> {
        let source_index = self.current.load(Ordering::Acquire);
        let source = &self.strategies[source_index];
        let tasks = source.get_all().await?;

        for (index, target) in self.strategies.iter().enumerate() {
            if index == source_index || !target.is_available() {
                continue;
            }
            target.save_all(&tasks).await?;
            tracing::info!(
                from = %source.kind(),
                to = %target.kind(),
                count = tasks.len(),
                "Synced storages"
            );
        }

        Ok(tasks.len())
    }

    fn position(&self, kind: StrategyKind) -> Option<usize> {
        self.strategies.iter().position(|s| s.kind() == kind)
    }

    fn current_strategy(&self) -> &Arc<dyn StorageStrategy> {
        let index = self.current.load(Ordering::Acquire);
        &self.strategies[index]
    }

    /// Run `call` against the current strategy, falling back on failure
    async fn run<'a, T, F>(&'a self, operation: &'static str, call: F) -> Result<T, StorageError>
    where
        F: Fn(&'a dyn StorageStrategy) -> StorageFuture<'a, T>,
    {
        let start = self.current.load(Ordering::Acquire);
        let primary = &self.strategies[start];

        let error = match call(primary.as_ref()).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !self.is_auto_switch_enabled() {
            return Err(error);
        }

        tracing::warn!(
            strategy = %primary.kind(),
            operation,
            %error,
            "Storage operation failed, trying fallback"
        );

        let mut last_error = None;
        for (index, candidate) in self.strategies.iter().enumerate() {
            if index == start || !candidate.is_available() {
                continue;
            }

            metrics::counter!("storage.fallback.total").increment(1);
            match call(candidate.as_ref()).await {
                Ok(value) => {
                    self.current.store(index, Ordering::Release);
                    tracing::info!(
                        from = %primary.kind(),
                        to = %candidate.kind(),
                        operation,
                        "Switched storage strategy after fallback"
                    );
                    return Ok(value);
                },
                Err(fallback_error) => {
                    tracing::warn!(
                        strategy = %candidate.kind(),
                        operation,
                        error = %fallback_error,
                        "Fallback storage failed"
                    );
                    last_error = Some(fallback_error);
                },
            }
        }

        Err(last_error.unwrap_or(error))
    }
}

impl StorageStrategy for StorageCoordinator {
    /// Kind of the current strategy
    fn kind(&self) -> StrategyKind {
        self.current()
    }

    fn get_all(&self) -> StorageFuture<'_, Vec<Task>> {
        Box::pin(self.run("get_all", |s| s.get_all()))
    }

    fn save_all<'a>(&'a self, tasks: &'a [Task]) -> StorageFuture<'a, ()> {
        Box::pin(self.run("save_all", move |s| s.save_all(tasks)))
    }

    fn clear(&self) -> StorageFuture<'_, ()> {
        Box::pin(self.run("clear", |s| s.clear()))
    }

    /// Any registered strategy is available
    fn is_available(&self) -> bool {
        self.strategies.iter().any(|s| s.is_available())
    }
}

impl std::fmt::Debug for StorageCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCoordinator")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use crate::error::StorageErrorKind;
    use crate::mocks::MockStorage;
    use crate::types::{CreateTaskInput, TaskId};
    use taskstore_core::environment::Clock;
    use taskstore_testing::test_clock;

    fn tasks() -> Vec<Task> {
        vec![Task::create(TaskId::new("t1"), &CreateTaskInput::new("Sync me"), test_clock().now()).unwrap()]
    }

    fn pair() -> (Arc<MockStorage>, Arc<MockStorage>, StorageCoordinator) {
        let local = Arc::new(MockStorage::new(StrategyKind::Local));
        let remote = Arc::new(MockStorage::new(StrategyKind::Remote));
        let coordinator = StorageCoordinator::new(vec![
            Arc::clone(&local) as Arc<dyn StorageStrategy>,
            Arc::clone(&remote) as Arc<dyn StorageStrategy>,
        ])
        .unwrap();
        (local, remote, coordinator)
    }

    #[test]
    fn empty_strategy_list_is_rejected() {
        let err = StorageCoordinator::new(Vec::new()).unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::ServiceUnavailable);
    }

    #[tokio::test]
    async fn operations_use_current_strategy() {
        let (local, remote, coordinator) = pair();
        coordinator.save_all(&tasks()).await.unwrap();

        assert_eq!(local.snapshot(), tasks());
        assert!(remote.snapshot().is_empty());
        assert_eq!(coordinator.current(), StrategyKind::Local);
    }

    #[tokio::test]
    async fn failure_falls_back_and_switches() {
        let (local, remote, coordinator) = pair();
        local.fail_with(Some(StorageErrorKind::QuotaExceeded));

        coordinator.save_all(&tasks()).await.unwrap();

        assert_eq!(remote.snapshot(), tasks());
        assert_eq!(coordinator.current(), StrategyKind::Remote);
    }

    #[tokio::test]
    async fn failure_propagates_without_auto_switch() {
        let (local, remote, coordinator) = pair();
        let coordinator = coordinator.with_auto_switch(false);
        local.fail_with(Some(StorageErrorKind::Permission));

        let err = coordinator.get_all().await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::Permission);
        assert_eq!(remote.calls(), 0);
        assert_eq!(coordinator.current(), StrategyKind::Local);
    }

    #[tokio::test]
    async fn both_failing_surfaces_second_error() {
        let (local, remote, coordinator) = pair();
        local.fail_with(Some(StorageErrorKind::QuotaExceeded));
        remote.fail_with(Some(StorageErrorKind::Network));

        let err = coordinator.save_all(&tasks()).await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::Network);
        assert_eq!(coordinator.current(), StrategyKind::Local);
    }

    #[tokio::test]
    async fn unavailable_alternate_surfaces_original_error() {
        let (local, remote, coordinator) = pair();
        local.fail_with(Some(StorageErrorKind::InvalidData));
        remote.set_available(false);

        let err = coordinator.get_all().await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::InvalidData);
        assert_eq!(remote.calls(), 0);
    }

    #[test]
    fn switching_requires_availability() {
        let (_local, remote, coordinator) = pair();

        coordinator.switch_to_remote().unwrap();
        assert_eq!(coordinator.current(), StrategyKind::Remote);

        remote.set_available(false);
        coordinator.switch_to_local().unwrap();
        let err = coordinator.switch_to_remote().unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::ServiceUnavailable);
        assert_eq!(coordinator.current(), StrategyKind::Local);
    }

    #[test]
    fn initialize_picks_first_available() {
        let (local, remote, coordinator) = pair();
        assert_eq!(coordinator.initialize().unwrap(), StrategyKind::Local);

        local.set_available(false);
        assert_eq!(coordinator.initialize().unwrap(), StrategyKind::Remote);
        assert_eq!(coordinator.available_strategies(), vec![StrategyKind::Remote]);

        remote.set_available(false);
        assert!(coordinator.initialize().is_err());
        assert!(!coordinator.is_available());
    }

    #[test]
    fn default_strategy_sets_starting_point() {
        let (_local, _remote, coordinator) = pair();
        let coordinator = coordinator.with_default(StrategyKind::Remote);

        let status = coordinator.status();
        assert_eq!(status.current, StrategyKind::Remote);
        assert!(status.auto_switch);
        assert_eq!(status.available, vec![StrategyKind::Local, StrategyKind::Remote]);
    }

    #[tokio::test]
    async fn sync_copies_current_onto_others() {
        let (local, remote, coordinator) = pair();
        local.seed(tasks());

        let copied = coordinator.sync_between_storages().await.unwrap();
        assert_eq!(copied, 1);
        assert_eq!(remote.snapshot(), tasks());
    }

    #[tokio::test]
    async fn sync_propagates_write_failure() {
        let (local, remote, coordinator) = pair();
        local.seed(tasks());
        remote.fail_with(Some(StorageErrorKind::ServiceUnavailable));

        let err = coordinator.sync_between_storages().await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::ServiceUnavailable);
    }
}
