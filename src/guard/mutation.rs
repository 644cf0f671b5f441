use super::{TaskSecurityContext, validate_parent_ownership};
use crate::error::{GuardError, GuardResult, Mutation, ValidationError, Verdict};
use crate::types::{NewTask, SELF_PARENT_PLACEHOLDER, Task, TaskUpdate};

/// Validate a task about to be created.
pub fn validate_task_creation(ctx: &TaskSecurityContext<'_>, input: &NewTask) -> Verdict {
    if input.parent_task_id.as_deref() == Some(SELF_PARENT_PLACEHOLDER) {
        return Err(ValidationError::SelfReference);
    }

    validate_parent_ownership(ctx, &input.user_id, input.parent_task_id.as_deref())
}

/// Validate an update to an existing task.
///
/// Ownership is checked against the owner the task will have *after* the
/// update. Updates that change neither the parent nor the owner skip the
/// lookup entirely.
pub fn validate_task_update(
    ctx: &TaskSecurityContext<'_>,
    task_id: &str,
    updates: &TaskUpdate,
) -> Verdict {
    if updates.new_parent() == Some(task_id) {
        return Err(ValidationError::SelfReference);
    }

    if !updates.touches_ownership() {
        return Ok(());
    }

    let current = match ctx.store.fetch_task(task_id) {
        Ok(Some(task)) => task,
        Ok(None) | Err(_) => return Err(ValidationError::TaskNotFound),
    };

    let final_user_id = updates.user_id.as_deref().unwrap_or(&current.user_id);

    validate_parent_ownership(ctx, final_user_id, updates.new_parent())
}

/// Validate, then insert. Nothing is written when validation fails.
pub fn create_task_securely(ctx: &TaskSecurityContext<'_>, input: &NewTask) -> GuardResult<Task> {
    validate_task_creation(ctx, input)
        .map_err(|reason| GuardError::blocked(Mutation::Creation, reason))?;

    ctx.store
        .insert_task(input)
        .map_err(|e| GuardError::storage(Mutation::Creation, e))
}

/// Validate, then update. Nothing is written when validation fails.
pub fn update_task_securely(
    ctx: &TaskSecurityContext<'_>,
    task_id: &str,
    updates: &TaskUpdate,
) -> GuardResult<Task> {
    validate_task_update(ctx, task_id, updates)
        .map_err(|reason| GuardError::blocked(Mutation::Update, reason))?;

    ctx.store
        .update_task(task_id, updates)
        .map_err(|e| GuardError::storage(Mutation::Update, e))
}
