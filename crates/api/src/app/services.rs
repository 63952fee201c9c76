//! Request-level operations: each composes the store, the domain model and
//! the ownership check for one endpoint.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use quill_auth::Mutation;
use quill_blog::{Comment, HashTagName, NewComment, NewPost, Post, PostChanges};
use quill_core::PostId;
use quill_infra::{db, BlogStore, InMemoryBlogStore, PgBlogStore, PostFilter};

use crate::app::dto::{CommentView, HashTagView, LikeState, PostDetail, PostListItem};
use crate::app::errors::ApiError;
use crate::authz::authorize_owner;
use crate::config::ApiConfig;
use crate::context::PrincipalContext;

pub struct AppServices {
    store: Arc<dyn BlogStore>,
}

impl AppServices {
    pub fn new(store: Arc<dyn BlogStore>) -> Self {
        Self { store }
    }

    /// Posts in creation order, optionally restricted to one hashtag.
    ///
    /// An empty filter value means no filter. A value that cannot name any
    /// hashtag matches nothing.
    pub async fn list_posts(&self, hashtag: Option<&str>) -> Result<Vec<PostListItem>, ApiError> {
        let filter = match hashtag.map(str::trim).filter(|raw| !raw.is_empty()) {
            None => PostFilter::default(),
            Some(raw) => match HashTagName::parse(raw) {
                Ok(name) => PostFilter { hashtag: Some(name) },
                Err(_) => return Ok(Vec::new()),
            },
        };

        let posts = self.store.list_posts(&filter).await?;
        Ok(posts.iter().map(PostListItem::from).collect())
    }

    pub async fn create_post(
        &self,
        principal: &PrincipalContext,
        input: NewPost,
    ) -> Result<PostDetail, ApiError> {
        let post = Post::create(input, principal.user_id(), Utc::now())?;

        self.store.insert_post(&post).await?;

        tracing::info!(post_id = %post.id, author = %post.author, "post created");
        Ok(PostDetail::new(&post, &[]))
    }

    /// Detail view. Every call counts as one view, whoever the caller is.
    pub async fn retrieve_post(&self, id: PostId) -> Result<PostDetail, ApiError> {
        let post = self.store.record_view(id).await?.ok_or(ApiError::NotFound)?;
        let comments = self.store.list_comments(id).await?;
        Ok(PostDetail::new(&post, &comments))
    }

    /// Load a post and check that `principal` may apply `action` to it.
    pub async fn owned_post(
        &self,
        principal: &PrincipalContext,
        id: PostId,
        action: Mutation,
    ) -> Result<Post, ApiError> {
        let post = self.store.get_post(id).await?.ok_or(ApiError::NotFound)?;
        authorize_owner(principal, &post, action)?;
        Ok(post)
    }

    /// Apply `changes` to a post already returned by [`Self::owned_post`].
    pub async fn update_post(
        &self,
        principal: &PrincipalContext,
        mut post: Post,
        changes: PostChanges,
    ) -> Result<PostDetail, ApiError> {
        post.apply_changes(changes, principal.user_id(), Utc::now())?;

        self.store.update_post(&post).await?;
        let comments = self.store.list_comments(post.id).await?;

        tracing::info!(post_id = %post.id, "post updated");
        Ok(PostDetail::new(&post, &comments))
    }

    pub async fn destroy_post(
        &self,
        principal: &PrincipalContext,
        id: PostId,
    ) -> Result<(), ApiError> {
        let post = self.owned_post(principal, id, Mutation::Delete).await?;

        if !self.store.delete_post(post.id).await? {
            return Err(ApiError::NotFound);
        }

        tracing::info!(post_id = %post.id, "post deleted");
        Ok(())
    }

    /// Any authenticated user may comment on an existing post. The store
    /// reports a missing post as `NotFound`.
    pub async fn create_comment(
        &self,
        principal: &PrincipalContext,
        post_id: PostId,
        input: NewComment,
    ) -> Result<CommentView, ApiError> {
        let comment = Comment::create(post_id, input, principal.user_id(), Utc::now())?;
        self.store.insert_comment(&comment).await?;

        tracing::info!(comment_id = %comment.id, %post_id, "comment created");
        Ok(CommentView::from(&comment))
    }

    pub async fn toggle_like(
        &self,
        principal: &PrincipalContext,
        id: PostId,
    ) -> Result<LikeState, ApiError> {
        let (post, liked) = self
            .store
            .toggle_like(id, principal.user_id())
            .await?
            .ok_or(ApiError::NotFound)?;

        tracing::info!(post_id = %post.id, user = %principal.user_id(), liked, "like toggled");
        Ok(LikeState {
            post: post.id,
            liked,
            like_users_count: post.like_count(),
        })
    }

    pub async fn list_hashtags(&self) -> Result<Vec<HashTagView>, ApiError> {
        let tags = self.store.list_hashtags().await?;
        Ok(tags.iter().map(HashTagView::from).collect())
    }
}

/// Pick the store from configuration: Postgres when `DATABASE_URL` is set,
/// otherwise an in-memory store.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn BlogStore> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::connect(url, config.db_max_connections)
                .await
                .context("failed to connect to postgres")?;
            if config.run_migrations {
                db::run_migrations(&pool)
                    .await
                    .context("failed to run migrations")?;
            }
            tracing::info!("using postgres store");
            Arc::new(PgBlogStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            Arc::new(InMemoryBlogStore::new())
        }
    };

    Ok(AppServices::new(store))
}
