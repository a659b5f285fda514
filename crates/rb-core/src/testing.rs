//! In-memory doubles for the ports, for deterministic tests without a database.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Author, Comment, Post};
use crate::traits::{AuthorDirectory, Clock, PostRepo};

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A whole board held in memory: posts, comments, and the author directory.
#[derive(Debug, Default)]
pub struct InMemoryBoard {
    authors: RwLock<HashMap<Uuid, Author>>,
    posts: RwLock<Vec<Post>>,
    comments: RwLock<Vec<Comment>>,
}

impl InMemoryBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_author(&self, username: &str) -> Author {
        let author = Author {
            id: Uuid::now_v7(),
            username: username.to_string(),
        };
        self.authors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(author.id, author.clone());
        author
    }

    /// Simulates a user deleted behind the board's back.
    pub fn remove_author(&self, id: Uuid) {
        self.authors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Adds a post with a preset score and no recorded voters.
    pub fn add_post(
        &self,
        author: &Author,
        title: &str,
        score: i64,
        created_at: DateTime<Utc>,
    ) -> Post {
        let post = Post {
            id: Uuid::now_v7(),
            title: title.to_string(),
            content: None,
            author_id: author.id,
            upvotes: Vec::new(),
            downvotes: Vec::new(),
            score,
            created_at,
            updated_at: created_at,
        };
        self.posts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(post.clone());
        post
    }

    pub fn add_comment(
        &self,
        post: &Post,
        author: &Author,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Comment {
        let comment = Comment {
            id: Uuid::now_v7(),
            post_id: post.id,
            author_id: author.id,
            content: content.to_string(),
            created_at,
            updated_at: created_at,
        };
        self.comments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(comment.clone());
        comment
    }
}

#[async_trait]
impl PostRepo for InMemoryBoard {
    async fn list_posts(&self) -> anyhow::Result<Vec<Post>> {
        Ok(self
            .posts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn count_posts(&self) -> anyhow::Result<u64> {
        Ok(self.posts.read().unwrap_or_else(PoisonError::into_inner).len() as u64)
    }

    async fn get_post(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        Ok(self
            .posts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn list_comments(&self, post_id: Uuid) -> anyhow::Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .comments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| (c.created_at, c.id));
        Ok(comments)
    }
}

#[async_trait]
impl AuthorDirectory for InMemoryBoard {
    async fn find_author(&self, id: Uuid) -> anyhow::Result<Option<Author>> {
        Ok(self
            .authors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }
}
