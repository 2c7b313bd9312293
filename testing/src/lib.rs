//! # Taskstore Testing
//!
//! Testing utilities and helpers for the taskstore reducer architecture.
//!
//! This crate provides:
//! - Deterministic implementations of the Environment traits
//! - A Given-When-Then harness for reducers
//! - Assertion helpers for effects
//!
//! ## Example
//!
//! ```ignore
//! use taskstore_testing::{test_clock, SequentialIdGenerator};
//! use taskstore_runtime::Store;
//!
//! #[tokio::test]
//! async fn adds_a_task() {
//!     let env = TaskEnvironment::new(Arc::new(test_clock()), Arc::new(SequentialIdGenerator::new("task")));
//!     let store = Store::new(TaskState::default(), TaskReducer, env);
//!
//!     store.send(TaskAction::add(input)).await?.wait().await;
//!
//!     let count = store.state(|s| s.tasks.len()).await;
//!     assert_eq!(count, 1);
//! }
//! ```

use chrono::{DateTime, Utc};
use taskstore_core::environment::{Clock, IdGenerator};


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, IdGenerator, Utc};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use taskstore_testing::mocks::FixedClock;
    /// use taskstore_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to
    ///
    /// Useful for asserting that an update refreshes a timestamp.
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self
                .time
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self
                .time
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
        }
    }

    /// Predictable ids: `<prefix>-1`, `<prefix>-2`, ...
    ///
    /// ```
    /// use taskstore_testing::mocks::SequentialIdGenerator;
    /// use taskstore_core::environment::IdGenerator;
    ///
    /// let ids = SequentialIdGenerator::new("task");
    /// assert_eq!(ids.next_id(), "task-1");
    /// assert_eq!(ids.next_id(), "task-2");
    /// ```
    #[derive(Debug)]
    pub struct SequentialIdGenerator {
        prefix: String,
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Create a generator whose ids start with `prefix`
        #[must_use]
        pub fn new(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                next: AtomicU64::new(1),
            }
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_id(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            format!("{}-{n}", self.prefix)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, SequentialIdGenerator, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(test_clock().now());
        let before = clock.now();
        clock.advance(chrono::Duration::seconds(5));
        assert_eq!(clock.now() - before, chrono::Duration::seconds(5));
    }

    #[test]
    fn test_sequential_ids_are_unique() {
        let ids = SequentialIdGenerator::new("t");
        let first = ids.next_id();
        let second = ids.next_id();
        assert_ne!(first, second);
        assert_eq!(second, "t-2");
    }
}
