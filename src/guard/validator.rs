use super::TaskSecurityContext;
use crate::error::{ValidationError, Verdict};

/// Decide whether `claimed_owner_id` may have `parent_task_id` as its parent.
///
/// The identity check runs before the parent lookup, so a caller probing with
/// a mismatched owner learns nothing about whether the parent exists.
pub fn validate_parent_ownership(
    ctx: &TaskSecurityContext<'_>,
    claimed_owner_id: &str,
    parent_task_id: Option<&str>,
) -> Verdict {
    let Some(parent_task_id) = parent_task_id.filter(|id| !id.is_empty()) else {
        return Ok(());
    };

    if claimed_owner_id != ctx.user_id {
        return Err(ValidationError::OwnerMismatch);
    }

    let parent = match ctx.store.fetch_task(parent_task_id) {
        Ok(Some(parent)) => parent,
        Ok(None) => return Err(ValidationError::ParentNotFoundOrDenied { cause: None }),
        Err(e) => {
            return Err(ValidationError::ParentNotFoundOrDenied {
                cause: Some(e.to_string()),
            });
        }
    };

    if parent.user_id != claimed_owner_id {
        return Err(ValidationError::CrossUserParent);
    }

    Ok(())
}
