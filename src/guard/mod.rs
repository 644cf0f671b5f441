//! Task parent-ownership guard.
//!
//! Prevents a user from attaching a task under another user's task. Two
//! layers exist:
//!
//! - **Ownership validator** ([`validate_parent_ownership`]): a pure decision
//!   on a proposed (owner, parent) pairing.
//! - **Mutation guard** ([`create_task_securely`], [`update_task_securely`]):
//!   runs validation before any insert or update reaches the store.
//!
//! Validation and the write are two separate round trips. The schema's
//! write-time triggers re-check parent ownership inside the write itself, so
//! a parent changing hands between check and use is still rejected; the
//! checks here are the application-level mirror of those triggers.
//!
//! Correctness also leans on the store scoping reads to the acting identity.
//! [`ValidationError::CrossUserParent`](crate::error::ValidationError::CrossUserParent)
//! is only reachable when a store does not.

mod mutation;
mod validator;

pub use mutation::{
    create_task_securely, update_task_securely, validate_task_creation, validate_task_update,
};
pub use validator::validate_parent_ownership;

use crate::store::{ScopedStore, TaskStore};

/// Who is acting, and the store as that identity sees it.
#[derive(Clone, Copy)]
pub struct TaskSecurityContext<'a> {
    pub user_id: &'a str,
    pub store: &'a dyn TaskStore,
}

impl<'a> TaskSecurityContext<'a> {
    pub fn new(user_id: &'a str, store: &'a dyn TaskStore) -> Self {
        Self { user_id, store }
    }
}

impl<'a> From<&'a ScopedStore> for TaskSecurityContext<'a> {
    fn from(store: &'a ScopedStore) -> Self {
        Self::new(store.user_id(), store)
    }
}
