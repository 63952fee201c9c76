use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use quill_blog::{Comment, HashTag, HashTagName, Post};
use quill_core::{Entity, PostId, UserId};

use super::{BlogStore, PostFilter, StoreError, StoreResult};

#[derive(Debug, Default)]
struct State {
    /// Insertion order is the stored order.
    posts: Vec<Post>,
    comments: Vec<Comment>,
    hashtags: Vec<HashTag>,
}

/// In-memory blog store for tests/dev.
///
/// A single lock guards all tables, so every method is atomic with respect to
/// the others. The lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct InMemoryBlogStore {
    inner: RwLock<State>,
}

impl InMemoryBlogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Storage("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Storage("in-memory store lock poisoned".to_string()))
    }
}

fn position<E: Entity>(items: &[E], id: &E::Id) -> Option<usize> {
    items.iter().position(|item| item.id() == id)
}

impl State {
    /// Get-or-create each name by its unique key.
    fn upsert_hashtags(&mut self, names: &[HashTagName]) {
        for name in names {
            if !self.hashtags.iter().any(|h| &h.name == name) {
                self.hashtags.push(HashTag::new(name.clone()));
            }
        }
    }
}

#[async_trait]
impl BlogStore for InMemoryBlogStore {
    async fn list_posts(&self, filter: &PostFilter) -> StoreResult<Vec<Post>> {
        let state = self.read()?;
        Ok(state
            .posts
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn get_post(&self, id: PostId) -> StoreResult<Option<Post>> {
        let state = self.read()?;
        Ok(position(&state.posts, &id).map(|i| state.posts[i].clone()))
    }

    async fn record_view(&self, id: PostId) -> StoreResult<Option<Post>> {
        let mut state = self.write()?;
        let Some(i) = position(&state.posts, &id) else {
            return Ok(None);
        };
        let post = &mut state.posts[i];
        post.view_count += 1;
        Ok(Some(post.clone()))
    }

    async fn insert_post(&self, post: &Post) -> StoreResult<()> {
        let mut state = self.write()?;
        if position(&state.posts, &post.id).is_some() {
            return Err(StoreError::Conflict(format!("post {} already exists", post.id)));
        }
        state.upsert_hashtags(&post.hashtags);
        state.posts.push(post.clone());
        Ok(())
    }

    async fn update_post(&self, post: &Post) -> StoreResult<()> {
        let mut state = self.write()?;
        let i = position(&state.posts, &post.id).ok_or(StoreError::NotFound)?;
        state.upsert_hashtags(&post.hashtags);

        let stored = &mut state.posts[i];
        stored.title = post.title.clone();
        stored.content = post.content.clone();
        stored.author = post.author;
        stored.modified_at = post.modified_at;
        stored.hashtags = post.hashtags.clone();
        Ok(())
    }

    async fn delete_post(&self, id: PostId) -> StoreResult<bool> {
        let mut state = self.write()?;
        let Some(i) = position(&state.posts, &id) else {
            return Ok(false);
        };
        state.posts.remove(i);
        state.comments.retain(|c| c.post_id != id);
        Ok(true)
    }

    async fn toggle_like(&self, id: PostId, user: UserId) -> StoreResult<Option<(Post, bool)>> {
        let mut state = self.write()?;
        let Some(i) = position(&state.posts, &id) else {
            return Ok(None);
        };
        let post = &mut state.posts[i];
        let liked = post.toggle_like(user);
        Ok(Some((post.clone(), liked)))
    }

    async fn list_comments(&self, post_id: PostId) -> StoreResult<Vec<Comment>> {
        let state = self.read()?;
        Ok(state
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn insert_comment(&self, comment: &Comment) -> StoreResult<()> {
        let mut state = self.write()?;
        if position(&state.posts, &comment.post_id).is_none() {
            return Err(StoreError::NotFound);
        }
        if position(&state.comments, &comment.id).is_some() {
            return Err(StoreError::Conflict(format!("comment {} already exists", comment.id)));
        }
        state.comments.push(comment.clone());
        Ok(())
    }

    async fn list_hashtags(&self) -> StoreResult<Vec<HashTag>> {
        let state = self.read()?;
        let mut tags = state.hashtags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }
}
