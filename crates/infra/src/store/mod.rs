//! Blog data access boundary.
//!
//! `BlogStore` is the repository the request handlers talk to. Each method is
//! one atomic store interaction; implementations decide how (a lock for the
//! in-memory store, a transaction for Postgres).

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use quill_blog::{Comment, HashTag, HashTagName, Post};
use quill_core::{PostId, UserId};

pub use in_memory::InMemoryBlogStore;
pub use postgres::PgBlogStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Data access error.
///
/// These are infrastructure errors; domain validation happens before a call
/// ever reaches the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced record does not exist (or disappeared mid-operation).
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Anything else: connectivity, poisoned locks, corrupt rows.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Post list filter. `None` fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    /// Only posts associated with this hashtag name.
    pub hashtag: Option<HashTagName>,
}

impl PostFilter {
    pub fn matches(&self, post: &Post) -> bool {
        self.hashtag.as_ref().is_none_or(|name| post.has_hashtag(name))
    }
}

#[async_trait]
pub trait BlogStore: Send + Sync {
    /// Posts in stored (creation) order.
    async fn list_posts(&self, filter: &PostFilter) -> StoreResult<Vec<Post>>;

    async fn get_post(&self, id: PostId) -> StoreResult<Option<Post>>;

    /// Increment the view count by one and return the post as it is afterwards.
    async fn record_view(&self, id: PostId) -> StoreResult<Option<Post>>;

    /// Persist a new post, resolving its hashtag names by upsert.
    async fn insert_post(&self, post: &Post) -> StoreResult<()>;

    /// Overwrite title, content, author, modified time and the hashtag set.
    ///
    /// View count and likes are left alone. `StoreError::NotFound` if the post is gone.
    async fn update_post(&self, post: &Post) -> StoreResult<()>;

    /// Remove a post together with its comments, hashtag links and likes.
    /// Returns `false` if there was nothing to delete.
    async fn delete_post(&self, id: PostId) -> StoreResult<bool>;

    /// Flip `user`'s like on a post. Returns the post and whether it is now liked.
    async fn toggle_like(&self, id: PostId, user: UserId) -> StoreResult<Option<(Post, bool)>>;

    /// Comments of a post, oldest first.
    async fn list_comments(&self, post_id: PostId) -> StoreResult<Vec<Comment>>;

    /// `StoreError::NotFound` if the comment's post does not exist.
    async fn insert_comment(&self, comment: &Comment) -> StoreResult<()>;

    /// All hashtags ordered by name.
    async fn list_hashtags(&self) -> StoreResult<Vec<HashTag>>;
}

#[async_trait]
impl<S> BlogStore for Arc<S>
where
    S: BlogStore + ?Sized,
{
    async fn list_posts(&self, filter: &PostFilter) -> StoreResult<Vec<Post>> {
        (**self).list_posts(filter).await
    }

    async fn get_post(&self, id: PostId) -> StoreResult<Option<Post>> {
        (**self).get_post(id).await
    }

    async fn record_view(&self, id: PostId) -> StoreResult<Option<Post>> {
        (**self).record_view(id).await
    }

    async fn insert_post(&self, post: &Post) -> StoreResult<()> {
        (**self).insert_post(post).await
    }

    async fn update_post(&self, post: &Post) -> StoreResult<()> {
        (**self).update_post(post).await
    }

    async fn delete_post(&self, id: PostId) -> StoreResult<bool> {
        (**self).delete_post(id).await
    }

    async fn toggle_like(&self, id: PostId, user: UserId) -> StoreResult<Option<(Post, bool)>> {
        (**self).toggle_like(id, user).await
    }

    async fn list_comments(&self, post_id: PostId) -> StoreResult<Vec<Comment>> {
        (**self).list_comments(post_id).await
    }

    async fn insert_comment(&self, comment: &Comment) -> StoreResult<()> {
        (**self).insert_comment(comment).await
    }

    async fn list_hashtags(&self) -> StoreResult<Vec<HashTag>> {
        (**self).list_hashtags().await
    }
}
