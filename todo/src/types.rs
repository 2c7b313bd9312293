//! Domain types for the task list.
//!
//! A task list is an ordered collection of [`Task`] records. Tasks are
//! created from a [`CreateTaskInput`], edited through an [`UpdateTaskInput`],
//! and every change flows through a [`TaskAction`].

use crate::error::{StorageErrorKind, ValidationError};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of characters in a task title
pub const MAX_TITLE_LENGTH: usize = 100;

/// Unique identifier for a task
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// How important a task is
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Can wait
    Low,
    /// The default
    #[default]
    Medium,
    /// Do first
    High,
}

impl Priority {
    /// All priorities, lowest first
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Sort rank: low=1, medium=2, high=3
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// Whether a task is done
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Not done yet
    #[default]
    Pending,
    /// Done
    Completed,
}

impl Status {
    /// The other status
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Pending => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        })
    }
}

/// A single task
///
/// Serialized with camelCase field names and millisecond ISO-8601
/// timestamps, e.g. `"createdAt": "2025-01-01T00:00:00.000Z"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier, fixed at creation
    pub id: TaskId,
    /// Trimmed, non-empty title
    pub title: String,
    /// Importance
    pub priority: Priority,
    /// Completion state
    pub status: Status,
    /// When the task was created
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// When the task last changed
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a new pending task from validated input
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the title is empty after trimming or
    /// longer than [`MAX_TITLE_LENGTH`] characters.
    pub fn create(
        id: TaskId,
        input: &CreateTaskInput,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let title = validate_title(&input.title)?;
        let now = to_millis(now);

        Ok(Self {
            id,
            title,
            priority: input.priority.unwrap_or_default(),
            status: Status::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply an edit, returning the edited copy
    ///
    /// An empty edit returns the task unchanged, without touching
    /// `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the new title is invalid.
    pub fn apply(&self, update: &UpdateTaskInput, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        if update.is_empty() {
            return Ok(self.clone());
        }

        let mut next = self.clone();
        if let Some(title) = &update.title {
            next.title = validate_title(title)?;
        }
        if let Some(priority) = update.priority {
            next.priority = priority;
        }
        if let Some(status) = update.status {
            next.status = status;
        }
        next.touch(now);
        Ok(next)
    }

    /// Copy with the status flipped
    #[must_use]
    pub fn toggled(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.status = self.status.toggled();
        next.touch(now);
        next
    }

    /// Returns `true` once the task is done
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    /// Check the title of a task that arrived from outside the reducer
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the title is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title).map(|_| ())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        // updated_at never precedes created_at, even with a skewed clock
        self.updated_at = to_millis(now).max(self.created_at);
    }
}

/// Input for creating a task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskInput {
    /// Raw title, trimmed during validation
    pub title: String,
    /// Priority, defaults to medium
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl CreateTaskInput {
    /// Input with the given title and default priority
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            priority: None,
        }
    }

    /// Set the priority
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Partial edit of a task; `None` fields are left alone
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTaskInput {
    /// New title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New priority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// New status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl UpdateTaskInput {
    /// Change the title
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Change the priority
    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Change the status
    #[must_use]
    pub const fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns `true` if the edit changes nothing
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.priority.is_none() && self.status.is_none()
    }
}

/// Outcome of the most recent persistence attempt
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PersistenceStatus {
    /// Nothing written yet
    #[default]
    Idle,
    /// The snapshot was written
    Saved {
        /// Tasks in the written snapshot
        count: usize,
        /// When the write was acknowledged
        at: DateTime<Utc>,
    },
    /// The last read or write failed
    Failed {
        /// Failure classification
        kind: StorageErrorKind,
        /// Failure description
        message: String,
    },
}

/// State owned by the task store
#[derive(Clone, Debug, Default)]
pub struct TaskState {
    /// Tasks in insertion order
    pub tasks: Vec<Task>,
    /// Last validation error (if any)
    pub last_error: Option<String>,
    /// Last persistence outcome
    pub persistence: PersistenceStatus,
    /// A load from storage is in flight
    pub loading: bool,
    /// Bumped on every change to `tasks`
    pub revision: u64,
}

impl TaskState {
    /// Creates an empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State seeded with tasks, as if loaded
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            ..Self::default()
        }
    }

    /// Returns the number of tasks
    #[must_use]
    pub fn count(&self) -> usize {
        self.tasks.len()
    }

    /// Returns the number of completed tasks
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_completed()).count()
    }

    /// Returns a task by ID
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Checks if a task exists
    #[must_use]
    pub fn exists(&self, id: &TaskId) -> bool {
        self.get(id).is_some()
    }
}

/// Everything that can happen to the task list
///
/// Serialized adjacently tagged, e.g. `{"type": "TOGGLE", "payload": "todo_1"}`.
/// Tags that are not recognised decode as [`TaskAction::Unknown`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskAction {
    // ========== Collection changes ==========
    /// Append a new task built from the input
    ///
    /// The payload is the input itself, plus an optional `id` chosen by the
    /// sender; without one the reducer draws an id from the environment.
    Add {
        /// Id for the new task
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<TaskId>,
        /// Title and priority
        #[serde(flatten)]
        input: CreateTaskInput,
    },
    /// Replace the task with the same id
    Update(Task),
    /// Remove a task
    Delete(TaskId),
    /// Flip a task between pending and completed
    Toggle(TaskId),
    /// Replace the whole collection
    SetAll(Vec<Task>),
    /// Remove every completed task
    ClearCompleted,
    /// Apply one edit to each listed task
    UpdateMany {
        /// Tasks to edit; unknown ids are skipped
        ids: Vec<TaskId>,
        /// Edit applied to each of them
        update: UpdateTaskInput,
    },

    // ========== Persistence lifecycle ==========
    /// Read the collection from storage
    Load,
    /// Storage returned a collection
    Loaded(Vec<Task>),
    /// Storage could not be read
    LoadFailed {
        /// Failure classification
        kind: StorageErrorKind,
        /// Failure description
        message: String,
    },
    /// A snapshot was written
    Persisted {
        /// Revision of the written snapshot
        revision: u64,
        /// Tasks in the snapshot
        count: usize,
    },
    /// A snapshot could not be written
    PersistFailed {
        /// Revision of the failed snapshot
        revision: u64,
        /// Failure classification
        kind: StorageErrorKind,
        /// Failure description
        message: String,
    },

    /// Any unrecognised action; ignored
    #[serde(other)]
    Unknown,
}

impl TaskAction {
    /// `Add` with an id drawn by the reducer
    #[must_use]
    pub const fn add(input: CreateTaskInput) -> Self {
        Self::Add { id: None, input }
    }
}

/// Trim and check a title
///
/// # Errors
///
/// Returns [`ValidationError::EmptyTitle`] for blank titles and
/// [`ValidationError::TitleTooLong`] past [`MAX_TITLE_LENGTH`] characters.
pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }

    let actual = trimmed.chars().count();
    if actual > MAX_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong {
            max: MAX_TITLE_LENGTH,
            actual,
        });
    }

    Ok(trimmed.to_string())
}

/// Truncate an instant to the millisecond precision that survives storage
#[must_use]
pub fn to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.trunc_subsecs(3)
}

/// Millisecond ISO-8601 timestamps (`2025-01-01T00:00:00.000Z`)
mod timestamp {
    use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&instant.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc).trunc_subsecs(3))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_735_689_600 + secs, 0).unwrap()
    }

    fn sample() -> Task {
        Task::create(TaskId::new("todo_1"), &CreateTaskInput::new("  Buy milk  "), at(0)).unwrap()
    }

    #[test]
    fn create_trims_and_defaults() {
        let task = sample();
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, Status::Pending);
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn create_rejects_blank_and_long_titles() {
        let blank = Task::create(TaskId::new("x"), &CreateTaskInput::new("   "), at(0));
        assert_eq!(blank.unwrap_err(), ValidationError::EmptyTitle);

        let long = "é".repeat(MAX_TITLE_LENGTH + 1);
        let err = Task::create(TaskId::new("x"), &CreateTaskInput::new(long), at(0)).unwrap_err();
        assert_eq!(err, ValidationError::TitleTooLong { max: 100, actual: 101 });
    }

    #[test]
    fn title_limit_counts_characters_not_bytes() {
        let title = "é".repeat(MAX_TITLE_LENGTH);
        assert!(validate_title(&title).is_ok());
    }

    #[test]
    fn empty_update_keeps_updated_at() {
        let task = sample();
        let same = task.apply(&UpdateTaskInput::default(), at(60)).unwrap();
        assert_eq!(same, task);
    }

    #[test]
    fn update_refreshes_updated_at() {
        let task = sample();
        let edited = task
            .apply(&UpdateTaskInput::default().title(" Buy oat milk ").priority(Priority::High), at(60))
            .unwrap();

        assert_eq!(edited.title, "Buy oat milk");
        assert_eq!(edited.priority, Priority::High);
        assert_eq!(edited.updated_at, at(60));
        assert_eq!(edited.created_at, task.created_at);
    }

    #[test]
    fn updated_at_never_precedes_created_at() {
        let task = sample();
        let toggled = task.toggled(at(-3600));
        assert_eq!(toggled.updated_at, toggled.created_at);
        assert_eq!(toggled.status, Status::Completed);
    }

    #[test]
    fn task_json_shape() {
        let task = sample();
        let json = serde_json::to_value(&task).unwrap();

        assert_eq!(json["id"], "todo_1");
        assert_eq!(json["priority"], "medium");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["createdAt"], "2025-01-01T00:00:00.000Z");
        assert_eq!(json["updatedAt"], "2025-01-01T00:00:00.000Z");
    }

    #[test]
    fn timestamps_keep_millisecond_precision() {
        let precise = at(0) + chrono::Duration::microseconds(123_456);
        let task = Task::create(TaskId::new("t"), &CreateTaskInput::new("x"), precise).unwrap();

        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("2025-01-01T00:00:00.123Z"));

        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn actions_use_type_payload_tags() {
        let json = serde_json::to_value(TaskAction::Toggle(TaskId::new("todo_1"))).unwrap();
        assert_eq!(json, serde_json::json!({"type": "TOGGLE", "payload": "todo_1"}));

        let set_all: TaskAction =
            serde_json::from_str(r#"{"type": "SET_ALL", "payload": []}"#).unwrap();
        assert_eq!(set_all, TaskAction::SetAll(Vec::new()));
    }

    #[test]
    fn add_payload_is_the_input_with_an_optional_id() {
        let json = serde_json::to_value(TaskAction::add(CreateTaskInput::new("Buy milk"))).unwrap();
        assert_eq!(json, serde_json::json!({"type": "ADD", "payload": {"title": "Buy milk"}}));

        let with_id: TaskAction = serde_json::from_str(
            r#"{"type": "ADD", "payload": {"id": "todo_9", "title": "Call", "priority": "high"}}"#,
        )
        .unwrap();
        assert_eq!(
            with_id,
            TaskAction::Add {
                id: Some(TaskId::new("todo_9")),
                input: CreateTaskInput::new("Call").with_priority(Priority::High),
            }
        );
    }

    #[test]
    fn unrecognised_action_decodes_as_unknown() {
        let action: TaskAction = serde_json::from_str(r#"{"type": "ARCHIVE_ALL"}"#).unwrap();
        assert_eq!(action, TaskAction::Unknown);
    }
}
