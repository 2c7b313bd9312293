//! Task service: validated commands, batch helpers and views over a [`Store`].
//!
//! The service is built once at startup and passed by reference to whatever
//! needs the task list. Input is validated here, before any action reaches
//! the reducer, so callers get a typed [`TodoError`] instead of having to
//! inspect `last_error`.

use crate::error::{Result, TodoError};
use crate::query::{self, TaskFilter, TaskSort, TaskStats};
use crate::reducer::{TaskEnvironment, TaskReducer};
use crate::types::{
    CreateTaskInput, Priority, Status, Task, TaskAction, TaskId, TaskState, UpdateTaskInput,
    validate_title,
};
use futures::future::try_join_all;
use std::collections::HashSet;
use std::time::Duration;
use taskstore_core::environment::Clock;
use taskstore_runtime::Store;

/// Store type driven by the service
pub type TaskStore = Store<TaskState, TaskAction, TaskEnvironment, TaskReducer>;

/// Task operations over a shared store
#[derive(Clone)]
pub struct TaskService {
    store: TaskStore,
}

impl TaskService {
    /// Service over an empty store
    #[must_use]
    pub fn new(env: TaskEnvironment) -> Self {
        Self::with_store(Store::new(TaskState::new(), TaskReducer::new(), env))
    }

    /// Service over an existing store
    #[must_use]
    pub const fn with_store(store: TaskStore) -> Self {
        Self { store }
    }

    /// The underlying store
    #[must_use]
    pub const fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Send an action and wait for its effects, including persistence
    async fn dispatch(&self, action: TaskAction) -> Result<()> {
        let mut handle = self.store.send(action).await?;
        handle.wait().await;
        Ok(())
    }

    /// Read the collection from storage into the store
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`] if the store is shutting down. A failed
    /// read is recorded in [`TaskState::persistence`].
    pub async fn load(&self) -> Result<()> {
        self.dispatch(TaskAction::Load).await
    }

    /// Create a task and return it
    ///
    /// The id is drawn here and carried in the action, so the returned task
    /// is the one this call created even when other adds run concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Validation`] without dispatching anything if the
    /// title is invalid.
    pub async fn add_task(&self, input: CreateTaskInput) -> Result<Task> {
        validate_title(&input.title)?;
        let id = self.fresh_id().await;
        self.dispatch(TaskAction::Add {
            id: Some(id.clone()),
            input,
        })
        .await?;

        self.task(&id).await.ok_or(TodoError::NotApplied)
    }

    /// Edit a task; `Ok(None)` if no task has `id`
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Validation`] if the edit has an invalid title.
    pub async fn update_task(&self, id: &TaskId, update: UpdateTaskInput) -> Result<Option<Task>> {
        let Some(current) = self.task(id).await else {
            return Ok(None);
        };

        let now = self.store.environment().clock.now();
        let edited = current.apply(&update, now)?;
        if edited != current {
            self.dispatch(TaskAction::Update(edited.clone())).await?;
        }
        Ok(Some(edited))
    }

    /// Remove a task; no-op if absent
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`] if the store is shutting down.
    pub async fn delete_task(&self, id: &TaskId) -> Result<()> {
        self.dispatch(TaskAction::Delete(id.clone())).await
    }

    /// Flip a task between pending and completed; `Ok(None)` if absent
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`] if the store is shutting down.
    pub async fn toggle_task(&self, id: &TaskId) -> Result<Option<Task>> {
        self.dispatch(TaskAction::Toggle(id.clone())).await?;
        Ok(self.task(id).await)
    }

    /// Replace the whole collection
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Validation`] if any task has an invalid title.
    pub async fn set_tasks(&self, tasks: Vec<Task>) -> Result<()> {
        for task in &tasks {
            task.validate()?;
        }
        self.dispatch(TaskAction::SetAll(tasks)).await
    }

    /// Create several tasks concurrently
    ///
    /// All inputs are validated first; nothing is dispatched if any is
    /// invalid. Returns the tasks this call created, in store order.
    ///
    /// # Errors
    ///
    /// Returns the first validation or store error.
    pub async fn add_many(&self, inputs: Vec<CreateTaskInput>) -> Result<Vec<Task>> {
        for input in &inputs {
            validate_title(&input.title)?;
        }
        let mut actions = Vec::with_capacity(inputs.len());
        for input in inputs {
            actions.push((self.fresh_id().await, input));
        }
        let ids: HashSet<TaskId> = actions.iter().map(|(id, _)| id.clone()).collect();

        try_join_all(actions.into_iter().map(|(id, input)| {
            self.dispatch(TaskAction::Add { id: Some(id), input })
        }))
        .await?;

        Ok(self
            .store
            .state(|s| s.tasks.iter().filter(|t| ids.contains(&t.id)).cloned().collect())
            .await)
    }

    /// Delete several tasks concurrently
    ///
    /// # Errors
    ///
    /// Returns the first store error.
    pub async fn delete_many(&self, ids: &[TaskId]) -> Result<()> {
        try_join_all(ids.iter().map(|id| self.delete_task(id))).await?;
        Ok(())
    }

    /// Remove every completed task
    ///
    /// Returns how many tasks were completed when the call started.
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`] if the store is shutting down.
    pub async fn clear_completed(&self) -> Result<usize> {
        let completed = self.store.state(TaskState::completed_count).await;
        if completed > 0 {
            self.dispatch(TaskAction::ClearCompleted).await?;
        }
        Ok(completed)
    }

    /// Remove every task
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`] if the store is shutting down.
    pub async fn clear_all(&self) -> Result<()> {
        self.dispatch(TaskAction::SetAll(Vec::new())).await
    }

    /// Copy a task as a new pending task titled `<title> (copy)`
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Validation`] if the copied title is too long.
    pub async fn duplicate_task(&self, id: &TaskId) -> Result<Option<Task>> {
        let Some(original) = self.task(id).await else {
            return Ok(None);
        };

        let copy = CreateTaskInput::new(format!("{} (copy)", original.title))
            .with_priority(original.priority);
        self.add_task(copy).await.map(Some)
    }

    /// Set the priority of several tasks at once
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`] if the store is shutting down.
    pub async fn set_priorities(&self, ids: &[TaskId], priority: Priority) -> Result<usize> {
        self.bulk_update(ids, &UpdateTaskInput::default().priority(priority))
            .await
    }

    /// Set the status of several tasks at once
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`] if the store is shutting down.
    pub async fn set_statuses(&self, ids: &[TaskId], status: Status) -> Result<usize> {
        self.bulk_update(ids, &UpdateTaskInput::default().status(status))
            .await
    }

    /// Apply one edit to several tasks as a single collection change
    ///
    /// The edit is checked against the current tasks first so an invalid
    /// title is reported before anything is dispatched. Returns how many of
    /// the tasks the edit changed at that point.
    async fn bulk_update(&self, ids: &[TaskId], update: &UpdateTaskInput) -> Result<usize> {
        let now = self.store.environment().clock.now();
        let targets: Vec<Task> = self
            .store
            .state(|s| s.tasks.iter().filter(|t| ids.contains(&t.id)).cloned().collect())
            .await;

        let mut changed = 0;
        for task in &targets {
            if &task.apply(update, now)? != task {
                changed += 1;
            }
        }

        if changed > 0 {
            self.dispatch(TaskAction::UpdateMany {
                ids: ids.to_vec(),
                update: update.clone(),
            })
            .await?;
        }
        Ok(changed)
    }

    /// Draw an id no task in the store has yet
    async fn fresh_id(&self) -> TaskId {
        loop {
            let id = TaskId::from(self.store.environment().ids.next_id());
            if !self.store.state(|s| s.exists(&id)).await {
                return id;
            }
        }
    }

    /// All tasks in insertion order
    pub async fn tasks(&self) -> Vec<Task> {
        self.store.state(|s| s.tasks.clone()).await
    }

    /// One task by id
    pub async fn task(&self, id: &TaskId) -> Option<Task> {
        self.store.state(|s| s.get(id).cloned()).await
    }

    /// Tasks matching `criteria`
    pub async fn filtered(&self, criteria: &TaskFilter) -> Vec<Task> {
        self.store.state(|s| query::filter(&s.tasks, criteria)).await
    }

    /// Tasks matching `criteria`, ordered by `order`
    pub async fn view(&self, criteria: &TaskFilter, order: &TaskSort) -> Vec<Task> {
        self.store
            .state(|s| query::view(&s.tasks, criteria, order))
            .await
    }

    /// Counts over all tasks
    pub async fn stats(&self) -> TaskStats {
        self.store.state(|s| query::stats(&s.tasks)).await
    }

    /// Snapshot of the whole store state
    pub async fn state(&self) -> TaskState {
        self.store.state(Clone::clone).await
    }

    /// Stop accepting commands and wait for pending writes
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Store`] if writes are still running after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.store.shutdown(timeout).await?;
        Ok(())
    }
}

impl std::fmt::Debug for TaskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskService")
            .field("environment", self.store.environment())
            .finish_non_exhaustive()
    }
}
