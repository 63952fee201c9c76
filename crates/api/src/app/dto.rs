use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quill_blog::{Comment, HashTag, HashTagName, NewComment, NewPost, Post, PostChanges};
use quill_core::{CommentId, PostId, UserId};

// -------------------------
// Request DTOs
// -------------------------
//
// Clients may send `author` (and `post` for comments). Those keys are not
// declared here, so they are dropped during deserialization; the server fills
// them in from the token and the path.

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    #[serde(rename = "hashtags__name")]
    pub hashtag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub hashtags: Option<Vec<String>>,
}

impl From<CreatePostRequest> for NewPost {
    fn from(body: CreatePostRequest) -> Self {
        NewPost {
            title: body.title,
            content: body.content,
            hashtags: body.hashtags.unwrap_or_default(),
        }
    }
}

/// PUT body: title and content are required.
#[derive(Debug, Deserialize)]
pub struct ReplacePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub hashtags: Option<Vec<String>>,
}

impl From<ReplacePostRequest> for PostChanges {
    fn from(body: ReplacePostRequest) -> Self {
        PostChanges {
            title: Some(body.title),
            content: Some(body.content),
            hashtags: body.hashtags,
        }
    }
}

/// PATCH body: every field optional.
#[derive(Debug, Default, Deserialize)]
pub struct PatchPostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub hashtags: Option<Vec<String>>,
}

impl From<PatchPostRequest> for PostChanges {
    fn from(body: PatchPostRequest) -> Self {
        PostChanges {
            title: body.title,
            content: body.content,
            hashtags: body.hashtags,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

impl From<CreateCommentRequest> for NewComment {
    fn from(body: CreateCommentRequest) -> Self {
        NewComment { content: body.content }
    }
}

// -------------------------
// Response projections
// -------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PostListItem {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub author: UserId,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
    pub like_users_count: usize,
}

impl From<&Post> for PostListItem {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            content: post.content.clone(),
            author: post.author,
            created_date: post.created_at,
            modified_date: post.modified_at,
            like_users_count: post.like_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub author: UserId,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
    pub view_count: u64,
    pub like_users_count: usize,
    pub hashtags: Vec<HashTagView>,
    pub comments: Vec<CommentView>,
}

impl PostDetail {
    pub fn new(post: &Post, comments: &[Comment]) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            content: post.content.clone(),
            author: post.author,
            created_date: post.created_at,
            modified_date: post.modified_at,
            view_count: post.view_count,
            like_users_count: post.like_count(),
            hashtags: post.hashtags.iter().map(HashTagView::from).collect(),
            comments: comments.iter().map(CommentView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HashTagView {
    pub name: HashTagName,
}

impl From<&HashTagName> for HashTagView {
    fn from(name: &HashTagName) -> Self {
        Self { name: name.clone() }
    }
}

impl From<&HashTag> for HashTagView {
    fn from(tag: &HashTag) -> Self {
        Self { name: tag.name.clone() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: CommentId,
    pub content: String,
    pub post: PostId,
    pub author: UserId,
    pub modified_date: DateTime<Utc>,
}

impl From<&Comment> for CommentView {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            content: comment.content.clone(),
            post: comment.post_id,
            author: comment.author,
            modified_date: comment.modified_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeState {
    pub post: PostId,
    pub liked: bool,
    pub like_users_count: usize,
}
