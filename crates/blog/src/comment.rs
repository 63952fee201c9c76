use chrono::{DateTime, Utc};
use serde::Deserialize;

use quill_core::{CommentId, DomainError, DomainResult, Entity, PostId, UserId};

use crate::post::reject_nul;

/// Longest accepted comment, in characters.
pub const MAX_COMMENT_LEN: usize = 2000;

/// A reply attached to exactly one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: UserId,
    pub content: String,
    pub modified_at: DateTime<Utc>,
}

/// Input for creating a comment. Post and author come from the route and the
/// caller's identity respectively, never from the body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewComment {
    pub content: String,
}

impl Comment {
    pub fn create(
        post_id: PostId,
        input: NewComment,
        author: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        reject_nul("content", &input.content)?;
        if input.content.trim().is_empty() {
            return Err(DomainError::validation("content cannot be empty"));
        }
        if input.content.chars().count() > MAX_COMMENT_LEN {
            return Err(DomainError::validation(format!(
                "comment cannot exceed {MAX_COMMENT_LEN} characters"
            )));
        }

        Ok(Self {
            id: CommentId::new(),
            post_id,
            author,
            content: input.content,
            modified_at: now,
        })
    }
}

impl Entity for Comment {
    type Id = CommentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
