//! Reducer logic for the task list.
//!
//! [`reduce`] is the pure state transition over the collection. [`TaskReducer`]
//! wraps it for the [`Store`](taskstore_runtime::Store): it records
//! validation failures in state, bumps the revision on every change and
//! returns an effect that writes the new snapshot through the configured
//! storage strategy.

use crate::error::ValidationError;
use crate::storage::StorageStrategy;
use crate::types::{PersistenceStatus, Task, TaskAction, TaskState};
use rand::Rng;
use std::sync::Arc;
use taskstore_core::{
    SmallVec,
    effect::Effect,
    environment::{Clock, IdGenerator},
    reducer::Reducer,
    smallvec,
};
use tokio::sync::Mutex;

/// Environment dependencies for the task reducer
#[derive(Clone)]
pub struct TaskEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Source of new task ids
    pub ids: Arc<dyn IdGenerator>,
    /// Where snapshots are written; `None` keeps everything in memory
    pub storage: Option<Arc<dyn StorageStrategy>>,
    /// Revision of the newest snapshot written so far
    last_written: Arc<Mutex<u64>>,
}

impl TaskEnvironment {
    /// Creates an in-memory environment
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            clock,
            ids,
            storage: None,
            last_written: Arc::new(Mutex::new(0)),
        }
    }

    /// Persist snapshots through `storage`
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn StorageStrategy>) -> Self {
        self.storage = Some(storage);
        self
    }
}

impl std::fmt::Debug for TaskEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskEnvironment")
            .field("storage", &self.storage.as_ref().map(|s| s.kind()))
            .finish_non_exhaustive()
    }
}

/// Production ids: `todo_<unix millis>_<9 random base36 chars>`
pub struct TimestampIdGenerator {
    clock: Arc<dyn Clock>,
}

impl TimestampIdGenerator {
    /// Ids stamped with `clock`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl IdGenerator for TimestampIdGenerator {
    fn next_id(&self) -> String {
        const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let mut rng = rand::thread_rng();
        let suffix: String = (0..9)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect();
        format!("todo_{}_{suffix}", self.clock.now().timestamp_millis())
    }
}

/// Compute the next collection for `action`
///
/// Only the collection actions (`Add`, `Update`, `Delete`, `Toggle`,
/// `SetAll`, `ClearCompleted`, `UpdateMany`) change anything; every other action, including
/// [`TaskAction::Unknown`], returns the collection unchanged.
///
/// # Errors
///
/// Returns a [`ValidationError`] for an `Add`, `Update` or `UpdateMany`
/// whose title is empty after trimming or too long, and for an `Add` whose
/// id is already taken. `tasks` is never modified.
pub fn reduce(
    tasks: &[Task],
    action: &TaskAction,
    env: &TaskEnvironment,
) -> Result<Vec<Task>, ValidationError> {
    match action {
        TaskAction::Add { id, input } => {
            let id = match id {
                Some(id) if tasks.iter().any(|t| &t.id == id) => {
                    return Err(ValidationError::DuplicateId(id.to_string()));
                },
                Some(id) => id.clone(),
                None => env.ids.next_id().into(),
            };
            let task = Task::create(id, input, env.clock.now())?;
            let mut next = tasks.to_vec();
            next.push(task);
            Ok(next)
        },
        TaskAction::Update(updated) => {
            updated.validate()?;
            Ok(tasks
                .iter()
                .map(|t| if t.id == updated.id { updated.clone() } else { t.clone() })
                .collect())
        },
        TaskAction::Delete(id) => Ok(tasks.iter().filter(|t| &t.id != id).cloned().collect()),
        TaskAction::Toggle(id) => {
            let now = env.clock.now();
            Ok(tasks
                .iter()
                .map(|t| if &t.id == id { t.toggled(now) } else { t.clone() })
                .collect())
        },
        TaskAction::SetAll(all) => Ok(all.clone()),
        TaskAction::ClearCompleted => {
            Ok(tasks.iter().filter(|t| !t.is_completed()).cloned().collect())
        },
        TaskAction::UpdateMany { ids, update } => {
            let now = env.clock.now();
            tasks
                .iter()
                .map(|t| if ids.contains(&t.id) { t.apply(update, now) } else { Ok(t.clone()) })
                .collect()
        },
        TaskAction::Load
        | TaskAction::Loaded(_)
        | TaskAction::LoadFailed { .. }
        | TaskAction::Persisted { .. }
        | TaskAction::PersistFailed { .. }
        | TaskAction::Unknown => Ok(tasks.to_vec()),
    }
}

/// Reducer for the task store
#[derive(Clone, Debug, Default)]
pub struct TaskReducer;

impl TaskReducer {
    /// Creates a new `TaskReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Effect writing `tasks` as snapshot `revision`
    ///
    /// Writes are serialised; a snapshot older than one already written is
    /// dropped so a slow write can never overwrite newer data.
    fn persist(env: &TaskEnvironment, revision: u64, tasks: Vec<Task>) -> SmallVec<[Effect<TaskAction>; 4]> {
        let Some(storage) = env.storage.clone() else {
            return SmallVec::new();
        };
        let last_written = Arc::clone(&env.last_written);

        smallvec![Effect::future(async move {
            let mut written = last_written.lock().await;
            if *written >= revision {
                tracing::debug!(revision, newest = *written, "Skipping stale snapshot");
                return None;
            }

            let count = tasks.len();
            match storage.save_all(&tasks).await {
                Ok(()) => {
                    *written = revision;
                    Some(TaskAction::Persisted { revision, count })
                },
                Err(error) => Some(TaskAction::PersistFailed {
                    revision,
                    kind: error.kind(),
                    message: error.message().to_string(),
                }),
            }
        })]
    }

    /// Effect reading the collection from storage
    fn load(env: &TaskEnvironment) -> Option<Effect<TaskAction>> {
        let storage = env.storage.clone()?;
        Some(Effect::future(async move {
            Some(match storage.get_all().await {
                Ok(tasks) => TaskAction::Loaded(tasks),
                Err(error) => TaskAction::LoadFailed {
                    kind: error.kind(),
                    message: error.message().to_string(),
                },
            })
        }))
    }
}

impl Reducer for TaskReducer {
    type State = TaskState;
    type Action = TaskAction;
    type Environment = TaskEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Persistence lifecycle ==========
            TaskAction::Load => match Self::load(env) {
                Some(effect) => {
                    state.loading = true;
                    smallvec![effect]
                },
                None => SmallVec::new(),
            },

            TaskAction::Loaded(tasks) => {
                tracing::debug!(count = tasks.len(), "Loaded tasks");
                state.tasks = tasks;
                state.loading = false;
                state.last_error = None;
                state.revision += 1;
                SmallVec::new()
            },

            TaskAction::LoadFailed { kind, message } => {
                tracing::error!(%kind, %message, "Loading tasks failed");
                state.loading = false;
                state.persistence = PersistenceStatus::Failed { kind, message };
                SmallVec::new()
            },

            TaskAction::Persisted { revision, count } => {
                tracing::debug!(revision, count, "Snapshot persisted");
                state.persistence = PersistenceStatus::Saved {
                    count,
                    at: env.clock.now(),
                };
                SmallVec::new()
            },

            TaskAction::PersistFailed {
                revision,
                kind,
                message,
            } => {
                tracing::error!(revision, %kind, %message, "Persisting tasks failed");
                state.persistence = PersistenceStatus::Failed { kind, message };
                SmallVec::new()
            },

            TaskAction::Unknown => {
                tracing::debug!("Ignoring unknown action");
                SmallVec::new()
            },

            // ========== Collection changes ==========
            action => match reduce(&state.tasks, &action, env) {
                Err(error) => {
                    tracing::debug!(%error, "Rejected action");
                    state.last_error = Some(error.to_string());
                    SmallVec::new()
                },
                Ok(next) => {
                    state.last_error = None;
                    if next == state.tasks {
                        return SmallVec::new();
                    }
                    state.tasks = next;
                    state.revision += 1;
                    Self::persist(env, state.revision, state.tasks.clone())
                },
            },
        }
    }
}
