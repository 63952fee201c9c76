//! Infrastructure layer: data access for posts, hashtags and comments.

pub mod db;
pub mod store;


pub use store::{BlogStore, InMemoryBlogStore, PgBlogStore, PostFilter, StoreError, StoreResult};
