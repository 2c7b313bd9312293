//! # Todo
//!
//! A task list built on the taskstore reducer architecture.
//!
//! - [`types`]: tasks, inputs, state and actions
//! - [`reducer`]: the pure transition function and the persisting [`TaskReducer`]
//! - [`query`]: filtering, sorting and statistics
//! - [`storage`]: local and remote persistence behind one trait, plus a
//!   coordinator that falls back between them
//! - [`service`]: validated commands over a running store
//! - [`config`]: `TODO_*` environment configuration
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskstore_core::environment::SystemClock;
//! use todo::{CreateTaskInput, LocalStorage, TaskEnvironment, TaskService, TimestampIdGenerator};
//!
//! # async fn run() -> todo::Result<()> {
//! let clock = Arc::new(SystemClock);
//! let env = TaskEnvironment::new(clock.clone(), Arc::new(TimestampIdGenerator::new(clock)))
//!     .with_storage(Arc::new(LocalStorage::new("./.todo-data")));
//!
//! let service = TaskService::new(env);
//! service.load().await?;
//! let task = service.add_task(CreateTaskInput::new("Write docs")).await?;
//! service.toggle_task(&task.id).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod mocks;
pub mod query;
pub mod reducer;
pub mod service;
pub mod storage;
pub mod types;

pub use config::{ConfigError, TodoConfig};
pub use error::{Result, StorageError, StorageErrorKind, TodoError, ValidationError};
pub use query::{SortDirection, SortField, TaskFilter, TaskSort, TaskStats};
pub use reducer::{TaskEnvironment, TaskReducer, TimestampIdGenerator, reduce};
pub use service::{TaskService, TaskStore};
pub use storage::{
    CoordinatorStatus, LocalStorage, RemoteConfig, RemoteEvent, RemoteStatus, RemoteStorage,
    StorageCoordinator, StorageStrategy, StrategyKind,
};
pub use types::{
    CreateTaskInput, MAX_TITLE_LENGTH, PersistenceStatus, Priority, Status, Task, TaskAction,
    TaskId, TaskState, UpdateTaskInput,
};
