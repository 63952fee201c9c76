//! Postgres-backed blog store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `NotFound` |
//! | Database (other) | any other | `Storage` |
//! | PoolClosed, Io, Tls, ... | N/A | `Storage` |
//!
//! Queries are runtime-checked (`sqlx::query`), so the crate builds without a
//! database. Every mutating method runs inside a single transaction.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use quill_blog::{Comment, HashTag, HashTagName, Post};
use quill_core::{CommentId, HashTagId, PostId, UserId};

use super::{BlogStore, PostFilter, StoreError, StoreResult};

const POST_COLUMNS: &str =
    "p.id, p.title, p.content, p.author_id, p.created_at, p.modified_at, p.view_count";

/// Postgres blog store. Cheap to clone (the pool is reference counted).
#[derive(Debug, Clone)]
pub struct PgBlogStore {
    pool: PgPool,
}

impl PgBlogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlogStore for PgBlogStore {
    #[instrument(skip(self), err)]
    async fn list_posts(&self, filter: &PostFilter) -> StoreResult<Vec<Post>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;

        let hashtag = filter.hashtag.as_ref().map(HashTagName::as_str);
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p
            WHERE $1::text IS NULL
               OR EXISTS (
                    SELECT 1
                    FROM post_hashtags ph
                    JOIN hashtags h ON h.id = ph.hashtag_id
                    WHERE ph.post_id = p.id AND h.name = $1
               )
            ORDER BY p.created_at ASC, p.id ASC
            "#
        ))
        .bind(hashtag)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("list_posts", e))?;

        hydrate_posts(&mut *conn, rows).await
    }

    #[instrument(skip(self), fields(post_id = %id), err)]
    async fn get_post(&self, id: PostId) -> StoreResult<Option<Post>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;

        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("get_post", e))?;

        hydrate_one(&mut *conn, row).await
    }

    #[instrument(skip(self), fields(post_id = %id), err)]
    async fn record_view(&self, id: PostId) -> StoreResult<Option<Post>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            UPDATE posts p
            SET view_count = p.view_count + 1
            WHERE p.id = $1
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("record_view", e))?;

        let post = hydrate_one(&mut *tx, row).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(post)
    }

    #[instrument(skip(self, post), fields(post_id = %post.id), err)]
    async fn insert_post(&self, post: &Post) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, title, content, author_id, created_at, modified_at, view_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(post.id.as_uuid())
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.author.as_uuid())
        .bind(post.created_at)
        .bind(post.modified_at)
        .bind(to_db_count(post.view_count)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_post", e))?;

        link_hashtags(&mut *tx, post.id, &post.hashtags).await?;

        for user in &post.like_users {
            sqlx::query("INSERT INTO post_likes (post_id, user_id) VALUES ($1, $2)")
                .bind(post.id.as_uuid())
                .bind(user.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_like", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self, post), fields(post_id = %post.id), err)]
    async fn update_post(&self, post: &Post) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let updated = sqlx::query(
            r#"
            UPDATE posts
            SET title = $2, content = $3, author_id = $4, modified_at = $5
            WHERE id = $1
            "#,
        )
        .bind(post.id.as_uuid())
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.author.as_uuid())
        .bind(post.modified_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_post", e))?;

        if updated.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::NotFound);
        }

        sqlx::query("DELETE FROM post_hashtags WHERE post_id = $1")
            .bind(post.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("unlink_hashtags", e))?;

        link_hashtags(&mut *tx, post.id, &post.hashtags).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(post_id = %id), err)]
    async fn delete_post(&self, id: PostId) -> StoreResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Children first; the FK cascades cover the same rows but the explicit
        // order keeps the delete independent of the schema's ON DELETE clauses.
        for (operation, sql) in [
            ("delete_comments", "DELETE FROM comments WHERE post_id = $1"),
            ("delete_post_hashtags", "DELETE FROM post_hashtags WHERE post_id = $1"),
            ("delete_post_likes", "DELETE FROM post_likes WHERE post_id = $1"),
        ] {
            sqlx::query(sql)
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(operation, e))?;
        }

        let deleted = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_post", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(deleted.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(post_id = %id, user_id = %user), err)]
    async fn toggle_like(&self, id: PostId, user: UserId) -> StoreResult<Option<(Post, bool)>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_post", e))?;
        if locked.is_none() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(None);
        }

        let removed = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(user.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_like", e))?;

        let liked = removed.rows_affected() == 0;
        if liked {
            sqlx::query("INSERT INTO post_likes (post_id, user_id) VALUES ($1, $2)")
                .bind(id.as_uuid())
                .bind(user.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_like", e))?;
        }

        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("get_post", e))?;
        let post = hydrate_one(&mut *tx, row).await?.ok_or(StoreError::NotFound)?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(Some((post, liked)))
    }

    #[instrument(skip(self), fields(post_id = %post_id), err)]
    async fn list_comments(&self, post_id: PostId) -> StoreResult<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, post_id, author_id, content, modified_at
            FROM comments
            WHERE post_id = $1
            ORDER BY modified_at ASC, id ASC
            "#,
        )
        .bind(post_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_comments", e))?;

        Ok(rows.into_iter().map(Comment::from).collect())
    }

    #[instrument(skip(self, comment), fields(post_id = %comment.post_id), err)]
    async fn insert_comment(&self, comment: &Comment) -> StoreResult<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO comments (id, post_id, author_id, content, modified_at)
            SELECT $1, $2, $3, $4, $5
            WHERE EXISTS (SELECT 1 FROM posts WHERE id = $2)
            "#,
        )
        .bind(comment.id.as_uuid())
        .bind(comment.post_id.as_uuid())
        .bind(comment.author.as_uuid())
        .bind(&comment.content)
        .bind(comment.modified_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_comment", e))?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_hashtags(&self) -> StoreResult<Vec<HashTag>> {
        let rows = sqlx::query_as::<_, HashTagRow>("SELECT id, name FROM hashtags ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_hashtags", e))?;

        rows.into_iter().map(HashTag::try_from).collect()
    }
}

/// Get-or-create by unique name. `DO UPDATE` (a no-op write) makes
/// `RETURNING` yield the existing row on conflict.
async fn upsert_hashtags(conn: &mut PgConnection, names: &[HashTagName]) -> StoreResult<Vec<HashTag>> {
    let mut tags = Vec::with_capacity(names.len());
    for name in names {
        let row = sqlx::query_as::<_, HashTagRow>(
            r#"
            INSERT INTO hashtags (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name
            "#,
        )
        .bind(HashTagId::new().as_uuid())
        .bind(name.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("upsert_hashtag", e))?;

        tags.push(HashTag::try_from(row)?);
    }
    Ok(tags)
}

async fn link_hashtags(conn: &mut PgConnection, post_id: PostId, names: &[HashTagName]) -> StoreResult<()> {
    let tags = upsert_hashtags(conn, names).await?;
    for (position, tag) in tags.iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| StoreError::Storage("too many hashtags on one post".to_string()))?;
        sqlx::query("INSERT INTO post_hashtags (post_id, hashtag_id, position) VALUES ($1, $2, $3)")
            .bind(post_id.as_uuid())
            .bind(tag.id.as_uuid())
            .bind(position)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("link_hashtag", e))?;
    }
    Ok(())
}

async fn hydrate_one(conn: &mut PgConnection, row: Option<PostRow>) -> StoreResult<Option<Post>> {
    match row {
        Some(row) => Ok(hydrate_posts(conn, vec![row]).await?.into_iter().next()),
        None => Ok(None),
    }
}

/// Attach hashtag names and liking users to post rows, keeping row order.
async fn hydrate_posts(conn: &mut PgConnection, rows: Vec<PostRow>) -> StoreResult<Vec<Post>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

    let tag_rows = sqlx::query_as::<_, (Uuid, String)>(
        r#"
        SELECT ph.post_id, h.name
        FROM post_hashtags ph
        JOIN hashtags h ON h.id = ph.hashtag_id
        WHERE ph.post_id = ANY($1)
        ORDER BY ph.post_id, ph.position
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("load_post_hashtags", e))?;

    let like_rows = sqlx::query_as::<_, (Uuid, Uuid)>(
        "SELECT post_id, user_id FROM post_likes WHERE post_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("load_post_likes", e))?;

    let mut tags: HashMap<Uuid, Vec<HashTagName>> = HashMap::new();
    for (post_id, name) in tag_rows {
        tags.entry(post_id).or_default().push(parse_stored_name(&name)?);
    }

    let mut likes: HashMap<Uuid, BTreeSet<UserId>> = HashMap::new();
    for (post_id, user_id) in like_rows {
        likes.entry(post_id).or_default().insert(UserId::from_uuid(user_id));
    }

    rows.into_iter()
        .map(|row| {
            let hashtags = tags.remove(&row.id).unwrap_or_default();
            let like_users = likes.remove(&row.id).unwrap_or_default();
            row.into_post(hashtags, like_users)
        })
        .collect()
}

fn parse_stored_name(name: &str) -> StoreResult<HashTagName> {
    HashTagName::parse(name)
        .map_err(|e| StoreError::Storage(format!("corrupt hashtag row '{name}': {e}")))
}

fn to_db_count(count: u64) -> StoreResult<i64> {
    i64::try_from(count).map_err(|_| StoreError::Storage(format!("view count {count} out of range")))
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::NotFound,
                _ => StoreError::Storage(msg),
            }
        }
        other => StoreError::Storage(format!("{operation}: {other}")),
    }
}

// SQLx row types

#[derive(Debug, FromRow)]
struct PostRow {
    id: Uuid,
    title: String,
    content: String,
    author_id: Uuid,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    view_count: i64,
}

impl PostRow {
    fn into_post(self, hashtags: Vec<HashTagName>, like_users: BTreeSet<UserId>) -> StoreResult<Post> {
        let view_count = u64::try_from(self.view_count)
            .map_err(|_| StoreError::Storage(format!("negative view count on post {}", self.id)))?;

        Ok(Post {
            id: PostId::from_uuid(self.id),
            title: self.title,
            content: self.content,
            author: UserId::from_uuid(self.author_id),
            created_at: self.created_at,
            modified_at: self.modified_at,
            view_count,
            hashtags,
            like_users,
        })
    }
}

#[derive(Debug, FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    content: String,
    modified_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: CommentId::from_uuid(row.id),
            post_id: PostId::from_uuid(row.post_id),
            author: UserId::from_uuid(row.author_id),
            content: row.content,
            modified_at: row.modified_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct HashTagRow {
    id: Uuid,
    name: String,
}

impl TryFrom<HashTagRow> for HashTag {
    type Error = StoreError;

    fn try_from(row: HashTagRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: HashTagId::from_uuid(row.id),
            name: parse_stored_name(&row.name)?,
        })
    }
}
