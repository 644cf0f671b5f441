//! SQLite-backed task store.
//!
//! [`Database`] is the service-role handle: it owns the connection, runs the
//! schema migrations and manages users. Task rows are only reachable through a
//! [`ScopedStore`], which filters every statement on the acting identity the
//! way a row-level-security policy would.

use super::TaskStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{NewTask, StoreCounts, Task, TaskContext, TaskStatus, TaskUpdate, User};
use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

const POLICY_MESSAGE: &str = "new row violates row-level security policy for table \"tasks\"";

/// Database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for concurrent access
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations.
    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.lock()?;
        embedded::migrations::runner().run(&mut *conn)?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Execute a function with mutable access to the connection (for transactions).
    pub fn with_conn_mut<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T>,
    {
        let mut conn = self.lock()?;
        f(&mut conn)
    }

    /// A task store that sees only rows owned by `user_id`.
    pub fn scoped(&self, user_id: impl Into<String>) -> ScopedStore {
        ScopedStore {
            db: self.clone(),
            user_id: user_id.into(),
        }
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Register a user. Generates a UUID7 id when none is given.
    pub fn create_user(&self, id: Option<String>, email: &str, name: &str) -> StoreResult<User> {
        let id = id.unwrap_or_else(|| Uuid::now_v7().to_string());
        let now = now_ms();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![&id, email, name, now, now],
            )?;
            debug!(user_id = %id, email, "Created user");
            Ok(User {
                id,
                email: email.to_string(),
                name: name.to_string(),
                created_at: now,
                updated_at: now,
            })
        })
    }

    pub fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT id, email, name, created_at, updated_at FROM users WHERE id = ?1",
                params![user_id],
                parse_user_row,
            );

            match result {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn list_users(&self) -> StoreResult<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, name, created_at, updated_at FROM users ORDER BY email",
            )?;
            let users = stmt
                .query_map([], parse_user_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }

    /// Delete every user and task.
    pub fn clear_all(&self) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            // Children first so the SET NULL cascade has nothing to do.
            tx.execute("UPDATE tasks SET parent_task_id = NULL", [])?;
            tx.execute("DELETE FROM tasks", [])?;
            tx.execute("DELETE FROM users", [])?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Row counts across all users.
    pub fn counts(&self) -> StoreResult<StoreCounts> {
        self.with_conn(|conn| {
            let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            let tasks: i64 = conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;

            let mut tasks_by_status = Vec::new();
            for status in TaskStatus::ALL {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM tasks WHERE status = ?1",
                    params![status.as_str()],
                    |row| row.get(0),
                )?;
                tasks_by_status.push((status, count));
            }

            Ok(StoreCounts {
                users,
                tasks,
                tasks_by_status,
            })
        })
    }

    /// Check that both tables can be read.
    pub fn ping(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT id FROM users LIMIT 1", [], |_| Ok(()))
                .or_else(ignore_no_rows)?;
            conn.query_row("SELECT id FROM tasks LIMIT 1", [], |_| Ok(()))
                .or_else(ignore_no_rows)?;
            Ok(())
        })
    }
}

fn ignore_no_rows(err: rusqlite::Error) -> rusqlite::Result<()> {
    match err {
        rusqlite::Error::QueryReturnedNoRows => Ok(()),
        other => Err(other),
    }
}

/// Task access on behalf of one identity.
#[derive(Clone)]
pub struct ScopedStore {
    db: Database,
    user_id: String,
}

impl ScopedStore {
    /// The identity this store acts as.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// All tasks owned by the acting identity.
    pub fn list_tasks(&self) -> StoreResult<Vec<Task>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM tasks WHERE user_id = ?1
                 ORDER BY sequence_order, priority DESC, created_at",
            )?;
            let tasks = stmt
                .query_map(params![&self.user_id], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    /// Direct subtasks of a task owned by the acting identity.
    pub fn list_children(&self, parent_task_id: &str) -> StoreResult<Vec<Task>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM tasks WHERE parent_task_id = ?1 AND user_id = ?2
                 ORDER BY sequence_order, priority DESC, created_at",
            )?;
            let tasks = stmt
                .query_map(params![parent_task_id, &self.user_id], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    fn check_policy(&self, owner: &str) -> StoreResult<()> {
        if owner != self.user_id {
            return Err(StoreError::PolicyViolation(POLICY_MESSAGE.to_string()));
        }
        Ok(())
    }
}

impl TaskStore for ScopedStore {
    fn fetch_task(&self, task_id: &str) -> StoreResult<Option<Task>> {
        self.db
            .with_conn(|conn| get_task_internal(conn, task_id, &self.user_id))
    }

    fn insert_task(&self, input: &NewTask) -> StoreResult<Task> {
        self.check_policy(&input.user_id)?;

        let now = now_ms();
        let task = Task {
            id: Uuid::now_v7().to_string(),
            user_id: input.user_id.clone(),
            parent_task_id: non_empty(input.parent_task_id.clone()),
            title: input.title.clone(),
            description: input.description.clone(),
            status: input.status,
            context: input.context,
            priority: input.priority,
            sequence_order: input.sequence_order,
            estimated_minutes: input.estimated_minutes,
            completed_at: (input.status == TaskStatus::Completed).then_some(now),
            created_at: now,
            updated_at: now,
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (
                    id, user_id, parent_task_id, title, description, status, context,
                    priority, sequence_order, estimated_minutes, completed_at,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    &task.id,
                    &task.user_id,
                    &task.parent_task_id,
                    &task.title,
                    &task.description,
                    task.status.as_str(),
                    task.context.as_str(),
                    task.priority,
                    task.sequence_order,
                    task.estimated_minutes,
                    task.completed_at,
                    task.created_at,
                    task.updated_at,
                ],
            )?;
            Ok(())
        })?;

        debug!(task_id = %task.id, user_id = %task.user_id, "Inserted task");
        Ok(task)
    }

    fn update_task(&self, task_id: &str, updates: &TaskUpdate) -> StoreResult<Task> {
        let now = now_ms();

        let task = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let current = get_task_internal(&tx, task_id, &self.user_id)?
                .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
            let task = apply_update(current, updates, now);
            self.check_policy(&task.user_id)?;

            tx.execute(
                "UPDATE tasks SET
                    user_id = ?1, parent_task_id = ?2, title = ?3, description = ?4,
                    status = ?5, context = ?6, priority = ?7, sequence_order = ?8,
                    estimated_minutes = ?9, completed_at = ?10, updated_at = ?11
                 WHERE id = ?12 AND user_id = ?13",
                params![
                    &task.user_id,
                    &task.parent_task_id,
                    &task.title,
                    &task.description,
                    task.status.as_str(),
                    task.context.as_str(),
                    task.priority,
                    task.sequence_order,
                    task.estimated_minutes,
                    task.completed_at,
                    task.updated_at,
                    task_id,
                    &self.user_id,
                ],
            )?;

            tx.commit()?;
            Ok(task)
        })?;

        debug!(task_id = %task.id, user_id = %task.user_id, "Updated task");
        Ok(task)
    }
}

/// Merge a partial update into the stored row.
fn apply_update(current: Task, updates: &TaskUpdate, now: i64) -> Task {
    let status = updates.status.unwrap_or(current.status);
    let completed_at = match (current.status, status) {
        (TaskStatus::Completed, TaskStatus::Completed) => current.completed_at,
        (_, TaskStatus::Completed) => Some(now),
        _ => None,
    };

    Task {
        user_id: updates.user_id.clone().unwrap_or(current.user_id),
        parent_task_id: match &updates.parent_task_id {
            Some(parent) => non_empty(parent.clone()),
            None => current.parent_task_id,
        },
        title: updates.title.clone().unwrap_or(current.title),
        description: updates.description.clone().unwrap_or(current.description),
        status,
        context: updates.context.unwrap_or(current.context),
        priority: updates.priority.unwrap_or(current.priority),
        sequence_order: updates.sequence_order.unwrap_or(current.sequence_order),
        estimated_minutes: updates
            .estimated_minutes
            .unwrap_or(current.estimated_minutes),
        completed_at,
        updated_at: now,
        ..current
    }
}

/// An empty parent id means "no parent".
fn non_empty(parent_task_id: Option<String>) -> Option<String> {
    parent_task_id.filter(|id| !id.is_empty())
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
fn get_task_internal(
    conn: &Connection,
    task_id: &str,
    user_id: &str,
) -> StoreResult<Option<Task>> {
    let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1 AND user_id = ?2")?;

    let result = stmt.query_row(params![task_id, user_id], parse_task_row);

    match result {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn enum_column<T>(row: &Row, column: &str, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            row.as_ref().column_index(column).unwrap_or_default(),
            Type::Text,
            format!("unknown {} '{}'", column, raw).into(),
        )
    })
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        parent_task_id: row.get("parent_task_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: enum_column(row, "status", TaskStatus::from_str)?,
        context: enum_column(row, "context", TaskContext::from_str)?,
        priority: row.get("priority")?,
        sequence_order: row.get("sequence_order")?,
        estimated_minutes: row.get("estimated_minutes")?,
        completed_at: row.get("completed_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Get the current timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, User, User) {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user(None, "alice@example.com", "Alice").unwrap();
        let bob = db.create_user(None, "bob@example.com", "Bob").unwrap();
        (db, alice, bob)
    }

    #[test]
    fn scoped_fetch_hides_other_users_rows() {
        let (db, alice, bob) = setup();
        let task = db
            .scoped(&alice.id)
            .insert_task(&NewTask::new(&alice.id, "Buy groceries"))
            .unwrap();

        assert!(db.scoped(&alice.id).fetch_task(&task.id).unwrap().is_some());
        assert!(db.scoped(&bob.id).fetch_task(&task.id).unwrap().is_none());
    }

    #[test]
    fn insert_for_another_owner_is_a_policy_violation() {
        let (db, alice, bob) = setup();
        let err = db
            .scoped(&alice.id)
            .insert_task(&NewTask::new(&bob.id, "Sneaky"))
            .unwrap_err();
        assert!(matches!(err, StoreError::PolicyViolation(_)));
    }

    #[test]
    fn trigger_rejects_cross_user_parent_on_insert() {
        let (db, alice, bob) = setup();
        let parent = db
            .scoped(&alice.id)
            .insert_task(&NewTask::new(&alice.id, "Alice parent"))
            .unwrap();

        // Goes straight to the store, bypassing the application guard.
        let err = db
            .scoped(&bob.id)
            .insert_task(&NewTask::new(&bob.id, "Bob child").with_parent(&parent.id))
            .unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)), "{err:?}");
    }

    #[test]
    fn check_constraint_rejects_self_parent() {
        let (db, alice, _) = setup();
        let store = db.scoped(&alice.id);
        let task = store.insert_task(&NewTask::new(&alice.id, "Loop")).unwrap();

        let err = store
            .update_task(&task.id, &TaskUpdate::default().with_parent(Some(task.id.clone())))
            .unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)), "{err:?}");
    }

    #[test]
    fn trigger_rejects_owner_change_that_strands_children() {
        let (db, alice, bob) = setup();
        let store = db.scoped(&alice.id);
        let parent = store.insert_task(&NewTask::new(&alice.id, "Parent")).unwrap();
        store
            .insert_task(&NewTask::new(&alice.id, "Child").with_parent(&parent.id))
            .unwrap();

        let err = db
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE tasks SET user_id = ?1 WHERE id = ?2",
                    params![&bob.id, &parent.id],
                )?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)), "{err:?}");
        assert_eq!(store.fetch_task(&parent.id).unwrap().unwrap().user_id, alice.id);
    }

    #[test]
    fn empty_parent_id_is_stored_as_no_parent() {
        let (db, alice, _) = setup();
        let store = db.scoped(&alice.id);
        let parent = store.insert_task(&NewTask::new(&alice.id, "Parent")).unwrap();

        let task = store
            .insert_task(&NewTask::new(&alice.id, "Loose").with_parent(""))
            .unwrap();
        assert_eq!(task.parent_task_id, None);

        let child = store
            .insert_task(&NewTask::new(&alice.id, "Child").with_parent(&parent.id))
            .unwrap();
        let cleared = store
            .update_task(&child.id, &TaskUpdate::default().with_parent(Some(String::new())))
            .unwrap();
        assert_eq!(cleared.parent_task_id, None);
        assert_eq!(store.fetch_task(&child.id).unwrap().unwrap().parent_task_id, None);
    }

    #[test]
    fn update_of_invisible_task_is_not_found() {
        let (db, alice, bob) = setup();
        let task = db
            .scoped(&alice.id)
            .insert_task(&NewTask::new(&alice.id, "Private"))
            .unwrap();

        let err = db
            .scoped(&bob.id)
            .update_task(&task.id, &TaskUpdate::default().with_title("Mine now"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn completing_a_task_stamps_completed_at() {
        let (db, alice, _) = setup();
        let store = db.scoped(&alice.id);
        let task = store.insert_task(&NewTask::new(&alice.id, "Report")).unwrap();
        assert!(task.completed_at.is_none());

        let done = store
            .update_task(&task.id, &TaskUpdate::default().with_status(TaskStatus::Completed))
            .unwrap();
        assert!(done.completed_at.is_some());

        let reopened = store
            .update_task(&task.id, &TaskUpdate::default().with_status(TaskStatus::Pending))
            .unwrap();
        assert!(reopened.completed_at.is_none());
    }

    #[test]
    fn list_children_returns_direct_subtasks() {
        let (db, alice, _) = setup();
        let store = db.scoped(&alice.id);
        let parent = store.insert_task(&NewTask::new(&alice.id, "Parent")).unwrap();
        let child = store
            .insert_task(&NewTask::new(&alice.id, "Child").with_parent(&parent.id))
            .unwrap();
        store
            .insert_task(&NewTask::new(&alice.id, "Grandchild").with_parent(&child.id))
            .unwrap();

        let children = store.list_children(&parent.id).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, child.id);
        assert_eq!(store.list_tasks().unwrap().len(), 3);
    }

    #[test]
    fn counts_and_clear_all() {
        let (db, alice, _) = setup();
        db.scoped(&alice.id)
            .insert_task(&NewTask::new(&alice.id, "One").with_status(TaskStatus::InProgress))
            .unwrap();

        let counts = db.counts().unwrap();
        assert_eq!(counts.users, 2);
        assert_eq!(counts.tasks, 1);
        assert!(counts.tasks_by_status.contains(&(TaskStatus::InProgress, 1)));

        db.clear_all().unwrap();
        let counts = db.counts().unwrap();
        assert_eq!((counts.users, counts.tasks), (0, 0));
        db.ping().unwrap();
    }
}
