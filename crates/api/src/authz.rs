//! API-side authorization guard for author-only mutations.
//!
//! Runs after the target is loaded and before the request body is validated.

use quill_auth::{authorize_mutation, Mutation};
use quill_core::{Entity, Owned};

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

/// Check that the caller owns `resource` before mutating it.
pub fn authorize_owner<R>(
    principal: &PrincipalContext,
    resource: &R,
    action: Mutation,
) -> Result<(), ApiError>
where
    R: Owned + Entity,
    R::Id: std::fmt::Display,
{
    authorize_mutation(principal.user_id(), resource, action).map_err(|e| {
        tracing::warn!(
            actor = %principal.user_id(),
            owner = %resource.owner_id(),
            resource = %resource.id(),
            ?action,
            "mutation denied"
        );
        ApiError::from(e)
    })
}
