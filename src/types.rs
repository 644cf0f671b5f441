//! Core types for the task service.

use serde::{Deserialize, Deserializer, Serialize};

/// Task priority as an integer (higher = more important).
pub type Priority = i32;

/// Default values applied to tasks created without explicit settings.
pub const PRIORITY_DEFAULT: Priority = 0;
pub const SEQUENCE_ORDER_DEFAULT: i32 = 0;

/// Placeholder some clients send as `parent_task_id` to mean "this task".
/// A task being created has no id yet, so this is always a self-reference.
pub const SELF_PARENT_PLACEHOLDER: &str = "self";

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

/// Life area a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskContext {
    Work,
    #[default]
    Personal,
}

impl TaskContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskContext::Work => "work",
            TaskContext::Personal => "personal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "work" => Some(TaskContext::Work),
            "personal" => Some(TaskContext::Personal),
            _ => None,
        }
    }
}

/// A user known to the service. Identity itself is owned by the external
/// identity provider; this row only mirrors it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A stored task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub parent_task_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub context: TaskContext,
    pub priority: Priority,

    // Ordering & estimation
    pub sequence_order: i32,
    pub estimated_minutes: Option<i32>,

    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for creating a task. The id and timestamps are assigned on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub user_id: String,
    #[serde(default)]
    pub parent_task_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub context: TaskContext,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub sequence_order: i32,
    #[serde(default)]
    pub estimated_minutes: Option<i32>,
}

impl NewTask {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            parent_task_id: None,
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            context: TaskContext::default(),
            priority: PRIORITY_DEFAULT,
            sequence_order: SEQUENCE_ORDER_DEFAULT,
            estimated_minutes: None,
        }
    }

    pub fn with_parent(mut self, parent_task_id: impl Into<String>) -> Self {
        self.parent_task_id = Some(parent_task_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_context(mut self, context: TaskContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Partial update of a task.
///
/// Fields that may be cleared are `Option<Option<T>>`: the outer `None` means
/// "leave unchanged", `Some(None)` means "set to null". In JSON an absent key
/// is unchanged and an explicit `null` clears the column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<TaskContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_order: Option<i32>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_minutes: Option<Option<i32>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_task_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl TaskUpdate {
    /// True if the update changes the parent reference or the owner.
    pub fn touches_ownership(&self) -> bool {
        self.parent_task_id.is_some() || self.user_id.is_some()
    }

    /// The parent the task will have after this update, if the update sets one.
    /// `None` both when the parent is untouched and when it is being cleared.
    pub fn new_parent(&self) -> Option<&str> {
        self.parent_task_id.as_ref().and_then(|p| p.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskUpdate::default()
    }

    pub fn with_parent(mut self, parent_task_id: Option<String>) -> Self {
        self.parent_task_id = Some(parent_task_id);
        self
    }

    pub fn with_owner(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Maps a present JSON key (including `null`) to `Some(..)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Row counts for status reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreCounts {
    pub users: i64,
    pub tasks: i64,
    pub tasks_by_status: Vec<(TaskStatus, i64)>,
}
