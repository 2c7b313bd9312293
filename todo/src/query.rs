//! Derived views over the task list: filtering, sorting and statistics.
//!
//! All functions here are pure and leave their input untouched.

use crate::types::{Priority, Status, Task};
use std::cmp::Ordering;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Which tasks to show
///
/// `None` for `status` or `priority` means "all".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Only tasks with this status
    pub status: Option<Status>,
    /// Only tasks with this priority
    pub priority: Option<Priority>,
    /// Case-insensitive substring of the title
    pub search: Option<String>,
}

impl TaskFilter {
    /// Filter matching everything
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to `status`
    #[must_use]
    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict to `priority`
    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Restrict to titles containing `search`
    #[must_use]
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Lowercased search term, unless blank
    ///
    /// Blankness is judged on the trimmed term but matching uses it as
    /// typed, so `"task "` does not match a title ending in `task`.
    fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_lowercase)
    }

    /// Number of criteria that actually narrow the list
    #[must_use]
    pub fn active_filter_count(&self) -> usize {
        usize::from(self.status.is_some())
            + usize::from(self.priority.is_some())
            + usize::from(self.needle().is_some())
    }

    /// Whether any criterion narrows the list
    #[must_use]
    pub fn has_active_filters(&self) -> bool {
        self.active_filter_count() > 0
    }
}

/// Field to sort by
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortField {
    /// Creation time
    #[default]
    CreatedAt,
    /// Last change
    UpdatedAt,
    /// Priority rank
    Priority,
    /// Title, ignoring case and accents
    Title,
}

/// Sort direction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    /// Smallest first
    Asc,
    /// Largest first
    #[default]
    Desc,
}

/// How to order tasks; defaults to newest first
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TaskSort {
    /// Field to compare
    pub field: SortField,
    /// Direction
    pub direction: SortDirection,
}

impl TaskSort {
    /// Sort by `field` in `direction`
    #[must_use]
    pub const fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

/// Counts over the task list
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskStats {
    /// All tasks
    pub total: usize,
    /// Completed tasks
    pub completed: usize,
    /// Pending tasks
    pub pending: usize,
    /// Low priority tasks
    pub low: usize,
    /// Medium priority tasks
    pub medium: usize,
    /// High priority tasks
    pub high: usize,
    /// Completed share in percent, rounded; 0 for an empty list
    pub completion_rate: u8,
}

/// Tasks matching every criterion of `filter`, in input order
#[must_use]
pub fn filter(tasks: &[Task], filter: &TaskFilter) -> Vec<Task> {
    let needle = filter.needle();
    tasks
        .iter()
        .filter(|t| filter.status.is_none_or(|s| t.status == s))
        .filter(|t| filter.priority.is_none_or(|p| t.priority == p))
        .filter(|t| {
            needle
                .as_deref()
                .is_none_or(|n| t.title.to_lowercase().contains(n))
        })
        .cloned()
        .collect()
}

/// Sorted copy of `tasks`
///
/// The sort is stable in both directions: `Desc` reverses the comparison,
/// not the result, so equal tasks keep their input order.
#[must_use]
pub fn sort(tasks: &[Task], order: &TaskSort) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by(|a, b| {
        let ordering = compare(a, b, order.field);
        match order.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
    sorted
}

fn compare(a: &Task, b: &Task, field: SortField) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
        SortField::Title => compare_titles(&a.title, &b.title),
    }
}

/// Dictionary order for titles
///
/// Letters compare by their base form first, so `Éclair` sorts between
/// `apple` and `Zebra`. Titles that differ only in accents fall back to
/// the lowercased titles.
fn compare_titles(a: &str, b: &str) -> Ordering {
    fold(a)
        .cmp(&fold(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
}

/// Lowercase with diacritics stripped
fn fold(title: &str) -> String {
    title
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Filter then sort
#[must_use]
pub fn view(tasks: &[Task], criteria: &TaskFilter, order: &TaskSort) -> Vec<Task> {
    sort(&filter(tasks, criteria), order)
}

/// Count tasks by status and priority
#[must_use]
pub fn stats(tasks: &[Task]) -> TaskStats {
    let mut stats = tasks.iter().fold(TaskStats::default(), |mut acc, task| {
        acc.total += 1;
        match task.status {
            Status::Completed => acc.completed += 1,
            Status::Pending => acc.pending += 1,
        }
        match task.priority {
            Priority::Low => acc.low += 1,
            Priority::Medium => acc.medium += 1,
            Priority::High => acc.high += 1,
        }
        acc
    });

    if stats.total > 0 {
        // Round half up
        let rate = (stats.completed * 200 + stats.total) / (stats.total * 2);
        stats.completion_rate = u8::try_from(rate).unwrap_or(100);
    }
    stats
}
