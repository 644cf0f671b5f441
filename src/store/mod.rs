//! Data access layer.
//!
//! The guard never talks to SQLite directly. It consumes a [`TaskStore`]: a
//! capability to read, insert and update task rows *as seen by one acting
//! identity*. Implementations must scope every read to rows the identity may
//! see; the ownership checks in [`crate::guard`] are a second layer on top of
//! that scoping, not a replacement for it.

pub mod sqlite;

pub use sqlite::{Database, ScopedStore};

use crate::error::StoreResult;
use crate::types::{NewTask, Task, TaskUpdate};

/// Identity-scoped access to the `tasks` table.
pub trait TaskStore: Send + Sync {
    /// Read one task by id. `Ok(None)` if no visible row has this id.
    fn fetch_task(&self, task_id: &str) -> StoreResult<Option<Task>>;

    /// Insert a task and return the stored row, including its assigned id
    /// and timestamps.
    fn insert_task(&self, input: &NewTask) -> StoreResult<Task>;

    /// Apply a partial update to the task with this id and return the
    /// updated row.
    fn update_task(&self, task_id: &str, updates: &TaskUpdate) -> StoreResult<Task>;
}

impl<S: TaskStore + ?Sized> TaskStore for &S {
    fn fetch_task(&self, task_id: &str) -> StoreResult<Option<Task>> {
        (**self).fetch_task(task_id)
    }

    fn insert_task(&self, input: &NewTask) -> StoreResult<Task> {
        (**self).insert_task(input)
    }

    fn update_task(&self, task_id: &str, updates: &TaskUpdate) -> StoreResult<Task> {
        (**self).update_task(task_id, updates)
    }
}
