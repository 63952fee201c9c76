//! Blog domain module.
//!
//! Business rules for posts, hashtags and comments, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod comment;
pub mod hashtag;
pub mod post;

pub use comment::{Comment, NewComment, MAX_COMMENT_LEN};
pub use hashtag::{HashTag, HashTagName, MAX_HASHTAG_LEN, MAX_HASHTAGS_PER_POST, normalize_hashtags};
pub use post::{NewPost, Post, PostChanges, MAX_TITLE_LEN};
