//! Shared test doubles.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tasknest::error::{StoreError, StoreResult};
use tasknest::store::TaskStore;
use tasknest::types::{NewTask, Task, TaskUpdate};

/// In-memory task store that counts every call.
///
/// With `scoped_to` set it hides rows owned by anyone else, like a
/// row-level-security policy; without it every row is visible.
pub struct CountingStore {
    tasks: Mutex<HashMap<String, Task>>,
    scoped_to: Option<String>,
    next_id: AtomicUsize,
    pub fetches: AtomicUsize,
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
}

impl CountingStore {
    pub fn unscoped() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            scoped_to: None,
            next_id: AtomicUsize::new(1),
            fetches: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
        }
    }

    pub fn scoped_to(user_id: &str) -> Self {
        Self {
            scoped_to: Some(user_id.to_string()),
            ..Self::unscoped()
        }
    }

    /// Put a row in place directly, bypassing counters and scoping.
    pub fn seed(&self, id: &str, user_id: &str) -> Task {
        let task = Task {
            id: id.to_string(),
            user_id: user_id.to_string(),
            parent_task_id: None,
            title: format!("Parent task for {}", user_id),
            description: None,
            status: Default::default(),
            context: Default::default(),
            priority: 0,
            sequence_order: 0,
            estimated_minutes: None,
            completed_at: None,
            created_at: 1,
            updated_at: 1,
        };
        self.tasks
            .lock()
            .unwrap()
            .insert(task.id.clone(), task.clone());
        task
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn row_count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    fn visible(&self, task: &Task) -> bool {
        self.scoped_to
            .as_deref()
            .is_none_or(|user_id| task.user_id == user_id)
    }
}

impl TaskStore for CountingStore {
    fn fetch_task(&self, task_id: &str) -> StoreResult<Option<Task>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks.get(task_id).filter(|t| self.visible(t)).cloned())
    }

    fn insert_task(&self, input: &NewTask) -> StoreResult<Task> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let task = Task {
            id: format!("task-{}", n),
            user_id: input.user_id.clone(),
            parent_task_id: input.parent_task_id.clone(),
            title: input.title.clone(),
            description: input.description.clone(),
            status: input.status,
            context: input.context,
            priority: input.priority,
            sequence_order: input.sequence_order,
            estimated_minutes: input.estimated_minutes,
            completed_at: None,
            created_at: 2,
            updated_at: 2,
        };
        self.tasks
            .lock()
            .unwrap()
            .insert(task.id.clone(), task.clone());
        Ok(task)
    }

    fn update_task(&self, task_id: &str, updates: &TaskUpdate) -> StoreResult<Task> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get_mut(task_id)
            .filter(|t| self.visible(t))
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        if let Some(ref parent) = updates.parent_task_id {
            task.parent_task_id = parent.clone();
        }
        if let Some(ref user_id) = updates.user_id {
            task.user_id = user_id.clone();
        }
        if let Some(ref title) = updates.title {
            task.title = title.clone();
        }
        if let Some(status) = updates.status {
            task.status = status;
        }
        task.updated_at += 1;
        Ok(task.clone())
    }
}
