//! # rb-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `rb-core` domain models.
//!
//! Reads go through the `PostRepo` and `AuthorDirectory` ports. The write path
//! (users, posts, comments, votes) is exposed as inherent methods for seeding
//! and tests.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rb_core::error::{AppError, Result};
use rb_core::models::{Author, Comment, NewPost, Post, Vote};
use rb_core::traits::{AuthorDirectory, PostRepo};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

pub struct SqliteBoardRepo {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct PostRow {
    id: Uuid,
    title: String,
    content: Option<String>,
    author_id: Uuid,
    score: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct VoteRow {
    post_id: Uuid,
    user_id: Uuid,
    direction: i64,
}

#[derive(FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Upvoter and downvoter ids of one post.
#[derive(Default)]
struct VoteSets {
    up: Vec<Uuid>,
    down: Vec<Uuid>,
}

impl PostRow {
    fn into_post(self, votes: VoteSets) -> Post {
        Post {
            id: self.id,
            title: self.title,
            content: self.content,
            author_id: self.author_id,
            upvotes: votes.up,
            downvotes: votes.down,
            score: self.score,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn group_votes(rows: Vec<VoteRow>) -> HashMap<Uuid, VoteSets> {
    let mut sets: HashMap<Uuid, VoteSets> = HashMap::new();
    for row in rows {
        let entry = sets.entry(row.post_id).or_default();
        match Vote::from_direction(row.direction) {
            Some(Vote::Up) => entry.up.push(row.user_id),
            Some(Vote::Down) => entry.down.push(row.user_id),
            None => {}
        }
    }
    sets
}

fn db_error(err: sqlx::Error) -> AppError {
    AppError::Internal(format!("database error: {err}"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

const SELECT_POSTS: &str =
    "SELECT id, title, content, author_id, score, created_at, updated_at FROM posts";
const SELECT_POST_BY_ID: &str =
    "SELECT id, title, content, author_id, score, created_at, updated_at FROM posts WHERE id = ?";

impl SqliteBoardRepo {
    /// Connects (creating the database file if needed) and applies migrations.
    pub async fn new(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if url.contains(":memory:") {
            // Every connection to `:memory:` is its own database, so keep exactly one alive.
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(max_connections, "SQLite board repository ready");
        Ok(Self { pool })
    }

    /// A private, empty database. Handy for tests and demos.
    pub async fn in_memory() -> anyhow::Result<Self> {
        Self::new("sqlite::memory:", 1).await
    }

    pub async fn create_user(&self, username: &str, at: DateTime<Utc>) -> Result<Author> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::ValidationError("Username is required".into()));
        }

        let author = Author {
            id: Uuid::now_v7(),
            username: username.to_string(),
        };
        sqlx::query("INSERT INTO users (id, username, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(author.id)
            .bind(&author.username)
            .bind(at)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(format!("username '{}' is taken", author.username))
                } else {
                    db_error(e)
                }
            })?;
        Ok(author)
    }

    pub async fn create_post(&self, new_post: NewPost, at: DateTime<Utc>) -> Result<Post> {
        let post = Post {
            id: Uuid::now_v7(),
            title: new_post.title,
            content: new_post.content,
            author_id: new_post.author_id,
            upvotes: Vec::new(),
            downvotes: Vec::new(),
            score: 0,
            created_at: at,
            updated_at: at,
        };

        sqlx::query("INSERT INTO posts (id, title, content, author_id, score, created_at, updated_at) VALUES (?, ?, ?, ?, 0, ?, ?)")
            .bind(post.id)
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.author_id)
            .bind(post.created_at)
            .bind(post.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::NotFound("User".into(), post.author_id.to_string())
                } else {
                    db_error(e)
                }
            })?;

        debug!(post_id = %post.id, author_id = %post.author_id, "post created");
        Ok(post)
    }

    pub async fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::ValidationError("Comment content is required".into()));
        }

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        ensure_post_exists(&mut tx, post_id).await?;

        let comment = Comment {
            id: Uuid::now_v7(),
            post_id,
            author_id,
            content: content.to_string(),
            created_at: at,
            updated_at: at,
        };
        sqlx::query("INSERT INTO comments (id, post_id, author_id, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(comment.id)
            .bind(comment.post_id)
            .bind(comment.author_id)
            .bind(&comment.content)
            .bind(comment.created_at)
            .bind(comment.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::NotFound("User".into(), author_id.to_string())
                } else {
                    db_error(e)
                }
            })?;

        tx.commit().await.map_err(db_error)?;
        Ok(comment)
    }

    /// Records a vote and refreshes the post's score in the same transaction.
    ///
    /// Repeating the voter's current vote withdraws it; the opposite vote replaces it.
    pub async fn cast_vote(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        vote: Vote,
        at: DateTime<Utc>,
    ) -> Result<Post> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        ensure_post_exists(&mut tx, post_id).await?;

        let current: Option<i64> = sqlx::query_scalar(
            "SELECT direction FROM post_votes WHERE post_id = ? AND user_id = ?",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let write = match current {
            Some(direction) if direction == vote.direction() => {
                sqlx::query("DELETE FROM post_votes WHERE post_id = ? AND user_id = ?")
                    .bind(post_id)
                    .bind(user_id)
            }
            Some(_) => sqlx::query(
                "UPDATE post_votes SET direction = ?, created_at = ? WHERE post_id = ? AND user_id = ?",
            )
            .bind(vote.direction())
            .bind(at)
            .bind(post_id)
            .bind(user_id),
            None => sqlx::query(
                "INSERT INTO post_votes (post_id, user_id, direction, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(post_id)
            .bind(user_id)
            .bind(vote.direction())
            .bind(at),
        };
        write.execute(&mut *tx).await.map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::NotFound("User".into(), user_id.to_string())
            } else {
                db_error(e)
            }
        })?;

        sqlx::query(
            "UPDATE posts SET score = (SELECT COALESCE(SUM(direction), 0) FROM post_votes WHERE post_id = ?), updated_at = ? WHERE id = ?",
        )
        .bind(post_id)
        .bind(at)
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        let post = load_post(&mut tx, post_id)
            .await
            .map_err(db_error)?
            .ok_or_else(|| AppError::NotFound("Post".into(), post_id.to_string()))?;
        tx.commit().await.map_err(db_error)?;
        Ok(post)
    }

    /// Removes a post together with its votes and comments.
    pub async fn delete_post(&self, post_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

async fn ensure_post_exists(tx: &mut Transaction<'_, Sqlite>, post_id: Uuid) -> Result<()> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error)?;
    match found {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound("Post".into(), post_id.to_string())),
    }
}

async fn load_post(
    tx: &mut Transaction<'_, Sqlite>,
    post_id: Uuid,
) -> std::result::Result<Option<Post>, sqlx::Error> {
    let row: Option<PostRow> = sqlx::query_as(SELECT_POST_BY_ID)
        .bind(post_id)
        .fetch_optional(&mut **tx)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };

    let votes: Vec<VoteRow> = sqlx::query_as(
        "SELECT post_id, user_id, direction FROM post_votes WHERE post_id = ? ORDER BY user_id",
    )
    .bind(post_id)
    .fetch_all(&mut **tx)
    .await?;
    let sets = group_votes(votes).remove(&post_id).unwrap_or_default();
    Ok(Some(row.into_post(sets)))
}

#[async_trait]
impl PostRepo for SqliteBoardRepo {
    /// Posts and vote rows are read in one transaction so the sets match the rows.
    async fn list_posts(&self) -> anyhow::Result<Vec<Post>> {
        let mut tx = self.pool.begin().await?;
        let rows: Vec<PostRow> = sqlx::query_as(SELECT_POSTS).fetch_all(&mut *tx).await?;
        let votes: Vec<VoteRow> =
            sqlx::query_as("SELECT post_id, user_id, direction FROM post_votes ORDER BY user_id")
                .fetch_all(&mut *tx)
                .await?;
        tx.commit().await?;

        let mut sets = group_votes(votes);
        Ok(rows
            .into_iter()
            .map(|row| {
                let votes = sets.remove(&row.id).unwrap_or_default();
                row.into_post(votes)
            })
            .collect())
    }

    async fn count_posts(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count)?)
    }

    async fn get_post(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        let mut tx = self.pool.begin().await?;
        let post = load_post(&mut tx, id).await?;
        tx.commit().await?;
        Ok(post)
    }

    async fn list_comments(&self, post_id: Uuid) -> anyhow::Result<Vec<Comment>> {
        let rows: Vec<CommentRow> = sqlx::query_as(
            "SELECT id, post_id, author_id, content, created_at, updated_at FROM comments WHERE post_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }
}

#[async_trait]
impl AuthorDirectory for SqliteBoardRepo {
    async fn find_author(&self, id: Uuid) -> anyhow::Result<Option<Author>> {
        let row: Option<(Uuid, String)> =
            sqlx::query_as("SELECT id, username FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, username)| Author { id, username }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn repo() -> SqliteBoardRepo {
        SqliteBoardRepo::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_post() {
        let repo = repo().await;
        let now = Utc::now();
        let ada = repo.create_user("ada", now).await.unwrap();

        let new_post = NewPost::new("  First!  ", Some("body".into()), ada.id).unwrap();
        let post = repo.create_post(new_post, now).await.expect("Failed to create post");
        assert_eq!(post.title, "First!");

        let loaded = repo.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "First!");
        assert_eq!(loaded.content.as_deref(), Some("body"));
        assert_eq!(loaded.author_id, ada.id);
        assert_eq!(loaded.score, 0);
        assert_eq!(repo.count_posts().await.unwrap(), 1);
        assert_eq!(repo.find_author(ada.id).await.unwrap(), Some(ada));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let repo = repo().await;
        repo.create_user("ada", Utc::now()).await.unwrap();
        let err = repo.create_user(" ada ", Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn post_by_unknown_user_is_not_found() {
        let repo = repo().await;
        let new_post = NewPost::new("hi", None, Uuid::now_v7()).unwrap();
        let err = repo.create_post(new_post, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(..)));
    }

    #[tokio::test]
    async fn votes_toggle_and_switch() {
        let repo = repo().await;
        let now = Utc::now();
        let ada = repo.create_user("ada", now).await.unwrap();
        let bob = repo.create_user("bob", now).await.unwrap();
        let cy = repo.create_user("cy", now).await.unwrap();
        let post = repo
            .create_post(NewPost::new("vote me", None, ada.id).unwrap(), now)
            .await
            .unwrap();

        let post_after = repo.cast_vote(post.id, bob.id, Vote::Up, now).await.unwrap();
        assert_eq!(post_after.score, 1);
        assert_eq!(post_after.upvotes, vec![bob.id]);

        let post_after = repo.cast_vote(post.id, cy.id, Vote::Down, now).await.unwrap();
        assert_eq!(post_after.score, 0);
        assert_eq!(post_after.downvotes, vec![cy.id]);

        // bob flips to a downvote
        let post_after = repo.cast_vote(post.id, bob.id, Vote::Down, now).await.unwrap();
        assert_eq!(post_after.score, -2);
        assert!(post_after.upvotes.is_empty());
        assert_eq!(post_after.downvotes.len(), 2);

        // cy repeats the downvote, which withdraws it
        let post_after = repo.cast_vote(post.id, cy.id, Vote::Down, now).await.unwrap();
        assert_eq!(post_after.score, -1);
        assert_eq!(post_after.downvotes, vec![bob.id]);

        let listed = repo.list_posts().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].score, -1);
        assert_eq!(listed[0].downvotes, vec![bob.id]);
    }

    #[tokio::test]
    async fn vote_on_missing_post_is_not_found() {
        let repo = repo().await;
        let ada = repo.create_user("ada", Utc::now()).await.unwrap();
        let err = repo
            .cast_vote(Uuid::now_v7(), ada.id, Vote::Up, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(..)));
    }

    #[tokio::test]
    async fn comments_come_back_oldest_first() {
        let repo = repo().await;
        let now = Utc::now();
        let ada = repo.create_user("ada", now).await.unwrap();
        let bob = repo.create_user("bob", now).await.unwrap();
        let post = repo
            .create_post(NewPost::new("thread", None, ada.id).unwrap(), now)
            .await
            .unwrap();

        repo.add_comment(post.id, bob.id, "later", now).await.unwrap();
        repo.add_comment(post.id, ada.id, "earlier", now - Duration::minutes(5))
            .await
            .unwrap();
        let err = repo.add_comment(post.id, bob.id, "   ", now).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let contents: Vec<String> = repo
            .list_comments(post.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(contents, vec!["earlier", "later"]);
    }

    #[tokio::test]
    async fn delete_cascades_to_votes_and_comments() {
        let repo = repo().await;
        let now = Utc::now();
        let ada = repo.create_user("ada", now).await.unwrap();
        let post = repo
            .create_post(NewPost::new("doomed", None, ada.id).unwrap(), now)
            .await
            .unwrap();
        repo.cast_vote(post.id, ada.id, Vote::Up, now).await.unwrap();
        repo.add_comment(post.id, ada.id, "bye", now).await.unwrap();

        assert!(repo.delete_post(post.id).await.unwrap());
        assert!(!repo.delete_post(post.id).await.unwrap());
        assert!(repo.get_post(post.id).await.unwrap().is_none());
        assert!(repo.list_comments(post.id).await.unwrap().is_empty());
        assert_eq!(repo.count_posts().await.unwrap(), 0);
    }
}
