//! Author-only mutation policy.
//!
//! - No IO
//! - No panics
//! - Pure predicate over the acting user and the resource owner

use thiserror::Error;

use quill_core::{Owned, UserId};

/// Kind of mutation being attempted on an owned resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mutation {
    Update,
    Delete,
}

impl Mutation {
    /// User-facing message returned when the actor is not the owner.
    pub fn denial_message(self) -> &'static str {
        match self {
            Mutation::Update => "수정 권한이 없습니다.",
            Mutation::Delete => "삭제 권한이 없습니다.",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// Authenticated, but not the owner of the resource.
    #[error("{}", .action.denial_message())]
    Forbidden { action: Mutation },
}

/// Only the recorded owner may mutate a resource.
pub fn can_mutate<R: Owned + ?Sized>(actor: UserId, resource: &R) -> bool {
    actor == resource.owner_id()
}

/// Check [`can_mutate`] and turn a denial into an [`AuthzError`].
pub fn authorize_mutation<R: Owned + ?Sized>(
    actor: UserId,
    resource: &R,
    action: Mutation,
) -> Result<(), AuthzError> {
    if can_mutate(actor, resource) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden { action })
    }
}
