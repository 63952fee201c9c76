//! Entity traits: identity, and ownership by a user.

use crate::id::UserId;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// An entity that belongs to exactly one user (its author).
///
/// Ownership is what the authorization layer checks before a mutation.
pub trait Owned {
    fn owner_id(&self) -> UserId;
}
