//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Author, Comment, Post};

/// Read-only query contract for posts and their comments.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepo: Send + Sync {
    /// Every post, with its vote sets filled in. Order is unspecified.
    async fn list_posts(&self) -> anyhow::Result<Vec<Post>>;
    async fn count_posts(&self) -> anyhow::Result<u64>;
    async fn get_post(&self, id: Uuid) -> anyhow::Result<Option<Post>>;
    /// Comments of one post, oldest first.
    async fn list_comments(&self, post_id: Uuid) -> anyhow::Result<Vec<Comment>>;
}

/// Username lookup for bylines.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuthorDirectory: Send + Sync {
    async fn find_author(&self, id: Uuid) -> anyhow::Result<Option<Author>>;
}

/// Source of "now" for time-dependent ranking.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
