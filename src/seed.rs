//! Development data: a repeatable two-user fixture and a status report.

use crate::guard::{TaskSecurityContext, create_task_securely};
use crate::store::Database;
use crate::types::TaskContext::{Personal, Work};
use crate::types::TaskStatus::{Cancelled, Completed, InProgress, Pending};
use crate::types::{NewTask, StoreCounts, TaskContext, TaskStatus, User};
use anyhow::{Context, Result};
use std::fmt::Write;
use tracing::info;

/// Seed users with fixed ids so tests and manual runs see the same identities.
pub const SEED_USERS: [(&str, &str, &str); 2] = [
    (
        "11111111-1111-1111-1111-111111111111",
        "test-user-1@example.com",
        "Test User 1",
    ),
    (
        "22222222-2222-2222-2222-222222222222",
        "test-user-2@example.com",
        "Test User 2",
    ),
];

/// (owner index, title, description, status, context, priority)
type SeedTask = (usize, &'static str, &'static str, TaskStatus, TaskContext, i32);

const SEED_TASKS: [SeedTask; 7] = [
    (0, "Buy groceries", "Get milk, bread, eggs", Pending, Personal, 1),
    (0, "Finish report", "Complete quarterly analysis", InProgress, Work, 2),
    (0, "Call dentist", "Schedule cleaning appointment", Completed, Personal, 0),
    (1, "Team meeting", "Prepare agenda for standup", Pending, Work, 2),
    (1, "Code review", "Review pull request #123", InProgress, Work, 3),
    (1, "Gym workout", "Evening cardio session", Pending, Personal, 1),
    (1, "Pay bills", "Monthly utilities and rent", Cancelled, Personal, 0),
];

/// What [`seed_basic_data`] created.
#[derive(Debug, Clone)]
pub struct SeedReport {
    pub users: Vec<User>,
    pub tasks_created: usize,
}

/// Wipe the database and load the fixture. Tasks go through the guarded
/// create path, each as its own owner.
pub fn seed_basic_data(db: &Database) -> Result<SeedReport> {
    db.clear_all().context("clearing existing data")?;
    info!("Cleared existing users and tasks");

    let mut users = Vec::with_capacity(SEED_USERS.len());
    for (id, email, name) in SEED_USERS {
        let user = db
            .create_user(Some(id.to_string()), email, name)
            .with_context(|| format!("creating user {}", email))?;
        info!(user_id = %user.id, email = %user.email, "Created seed user");
        users.push(user);
    }

    let mut tasks_created = 0;
    for (owner, title, description, status, context, priority) in SEED_TASKS {
        let user = &users[owner];
        let store = db.scoped(&user.id);
        let input = NewTask::new(&user.id, title)
            .with_description(description)
            .with_status(status)
            .with_context(context)
            .with_priority(priority);
        create_task_securely(&TaskSecurityContext::from(&store), &input)
            .with_context(|| format!("creating task {:?}", title))?;
        tasks_created += 1;
    }
    info!(tasks_created, "Seeded tasks");

    Ok(SeedReport {
        users,
        tasks_created,
    })
}

/// Render users and row counts for the `status` command.
pub fn format_status(users: &[User], counts: &StoreCounts) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Users: {}", counts.users);
    for user in users {
        let _ = writeln!(out, "  {} <{}> ({})", user.name, user.email, user.id);
    }
    let _ = writeln!(out, "Tasks: {}", counts.tasks);
    for (status, count) in &counts.tasks_by_status {
        let _ = writeln!(out, "  {:<12} {}", status.as_str(), count);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_creates_two_users_and_seven_tasks() {
        let db = Database::open_in_memory().unwrap();
        let report = seed_basic_data(&db).unwrap();

        assert_eq!(report.users.len(), 2);
        assert_eq!(report.tasks_created, 7);
        assert_eq!(db.scoped(SEED_USERS[0].0).list_tasks().unwrap().len(), 3);
        assert_eq!(db.scoped(SEED_USERS[1].0).list_tasks().unwrap().len(), 4);
    }

    #[test]
    fn seed_is_repeatable() {
        let db = Database::open_in_memory().unwrap();
        seed_basic_data(&db).unwrap();
        seed_basic_data(&db).unwrap();

        let counts = db.counts().unwrap();
        assert_eq!((counts.users, counts.tasks), (2, 7));
    }

    #[test]
    fn status_lists_every_state() {
        let db = Database::open_in_memory().unwrap();
        seed_basic_data(&db).unwrap();

        let text = format_status(&db.list_users().unwrap(), &db.counts().unwrap());
        assert!(text.contains("Users: 2"));
        assert!(text.contains("Tasks: 7"));
        assert!(text.contains("test-user-1@example.com"));
        assert!(text.contains("cancelled"));
    }
}
