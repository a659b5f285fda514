//! # Domain Models
//!
//! These structs represent the core entities of Rusty-Board.
//! We use UUID v7 for time-ordered, globally unique identification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Projection of a user: just enough to render a byline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: Uuid,
    pub username: String,
}

/// A top-level submission on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub author_id: Uuid,
    /// Users who upvoted, sorted by id
    pub upvotes: Vec<Uuid>,
    /// Users who downvoted, sorted by id
    pub downvotes: Vec<Uuid>,
    /// Maintained by the voting path as `upvotes - downvotes`
    pub score: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reply owned by exactly one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for creating a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub content: Option<String>,
    pub author_id: Uuid,
}

impl NewPost {
    /// Trims the title and rejects it if nothing is left.
    pub fn new(title: &str, content: Option<String>, author_id: Uuid) -> Result<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::ValidationError("Title is required".into()));
        }
        Ok(Self {
            title: title.to_string(),
            content,
            author_id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Up,
    Down,
}

impl Vote {
    /// Stored as +1 / -1 so that `SUM(direction)` is the score.
    pub fn direction(self) -> i64 {
        match self {
            Vote::Up => 1,
            Vote::Down => -1,
        }
    }

    pub fn from_direction(direction: i64) -> Option<Self> {
        match direction {
            1 => Some(Vote::Up),
            -1 => Some(Vote::Down),
            _ => None,
        }
    }
}

/// Byline as rendered to clients: the id stays server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthorView {
    pub username: String,
}

impl From<Author> for AuthorView {
    fn from(author: Author) -> Self {
        Self {
            username: author.username,
        }
    }
}

/// One entry of the ranked feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPost {
    pub id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub author: AuthorView,
    pub score: i64,
    pub upvotes: Vec<Uuid>,
    pub downvotes: Vec<Uuid>,
    /// The decayed value this post was ordered by
    #[serde(skip)]
    pub sort_value: f64,
}

/// A page of the ranked feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub posts: Vec<RankedPost>,
    /// `None` once the requested page is the last one (serialized as `null`)
    pub next_page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub content: String,
    pub author: AuthorView,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single post with its comment thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    pub id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub author: AuthorView,
    pub score: i64,
    pub upvotes: Vec<Uuid>,
    pub downvotes: Vec<Uuid>,
    pub comments: Vec<CommentView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
