use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use quill_core::{DomainError, DomainResult, Entity, Owned, PostId, UserId};

use crate::hashtag::{HashTagName, normalize_hashtags};

/// Longest accepted post title, in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// A blog post with its hashtag set and liking users.
///
/// Comments are owned by the post but loaded separately (see `Comment`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub author: UserId,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub view_count: u64,
    pub hashtags: Vec<HashTagName>,
    pub like_users: BTreeSet<UserId>,
}

/// Input for creating a post. Any author the client may have sent is not part
/// of this type; the author is always the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

/// Field updates for an existing post. `None` leaves the field untouched;
/// `Some(vec![])` for hashtags clears the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub hashtags: Option<Vec<String>>,
}

impl Post {
    pub fn create(input: NewPost, author: UserId, now: DateTime<Utc>) -> DomainResult<Self> {
        let title = validate_title(&input.title)?;
        validate_content(&input.content)?;
        let hashtags = normalize_hashtags(&input.hashtags)?;

        Ok(Self {
            id: PostId::new(),
            title,
            content: input.content,
            author,
            created_at: now,
            modified_at: now,
            view_count: 0,
            hashtags,
            like_users: BTreeSet::new(),
        })
    }

    /// Apply an update made by `actor`.
    ///
    /// The caller must have authorized `actor` already. The author field is
    /// rewritten to `actor`, which is a no-op for the owner. All fields are
    /// validated before any of them is assigned.
    pub fn apply_changes(
        &mut self,
        changes: PostChanges,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let title = changes.title.as_deref().map(validate_title).transpose()?;
        if let Some(content) = &changes.content {
            validate_content(content)?;
        }
        let hashtags = changes.hashtags.as_ref().map(normalize_hashtags).transpose()?;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(content) = changes.content {
            self.content = content;
        }
        if let Some(hashtags) = hashtags {
            self.hashtags = hashtags;
        }
        self.author = actor;
        self.modified_at = now;
        Ok(())
    }

    pub fn like_count(&self) -> usize {
        self.like_users.len()
    }

    /// Flip `user`'s like. Returns whether the post is liked by `user` afterwards.
    pub fn toggle_like(&mut self, user: UserId) -> bool {
        if self.like_users.remove(&user) {
            false
        } else {
            self.like_users.insert(user);
            true
        }
    }

    pub fn has_hashtag(&self, name: &HashTagName) -> bool {
        self.hashtags.contains(name)
    }
}

impl Entity for Post {
    type Id = PostId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Owned for Post {
    fn owner_id(&self) -> UserId {
        self.author
    }
}

fn validate_title(title: &str) -> DomainResult<String> {
    let title = title.trim();
    reject_nul("title", title)?;
    if title.is_empty() {
        return Err(DomainError::validation("title cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::validation(format!(
            "title cannot exceed {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_content(content: &str) -> DomainResult<()> {
    reject_nul("content", content)?;
    if content.trim().is_empty() {
        return Err(DomainError::validation("content cannot be empty"));
    }
    Ok(())
}

/// Text columns cannot store NUL, so no text field may carry one.
pub(crate) fn reject_nul(field: &str, value: &str) -> DomainResult<()> {
    if value.contains('\0') {
        return Err(DomainError::validation(format!(
            "{field} cannot contain NUL characters"
        )));
    }
    Ok(())
}
