//! Single-post view: the post, its byline and its comment thread.

use std::collections::{BTreeSet, HashMap};

use futures_util::future::try_join_all;
use tracing::error;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Author, AuthorView, CommentView, PostDetail};
use crate::traits::{AuthorDirectory, PostRepo};

/// Loads a post and everything needed to render it.
///
/// Each distinct author is looked up once, however many comments they wrote.
pub async fn post_detail(
    posts: &dyn PostRepo,
    authors: &dyn AuthorDirectory,
    id: Uuid,
) -> Result<PostDetail> {
    let post = posts
        .get_post(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post".into(), id.to_string()))?;
    let comments = posts.list_comments(id).await?;

    let wanted: BTreeSet<Uuid> = std::iter::once(post.author_id)
        .chain(comments.iter().map(|c| c.author_id))
        .collect();
    let found = try_join_all(wanted.into_iter().map(|author_id| async move {
        let author: Option<Author> = authors.find_author(author_id).await?;
        author.ok_or_else(|| {
            error!(post_id = %id, %author_id, "post thread references a missing author");
            AppError::Internal(format!("author {author_id} is missing"))
        })
    }))
    .await?;
    let by_id: HashMap<Uuid, Author> = found.into_iter().map(|a| (a.id, a)).collect();
    let view = |author_id: Uuid| -> AuthorView {
        by_id
            .get(&author_id)
            .cloned()
            .map(AuthorView::from)
            .unwrap_or_default()
    };

    Ok(PostDetail {
        id: post.id,
        title: post.title,
        content: post.content,
        author: view(post.author_id),
        score: post.score,
        upvotes: post.upvotes,
        downvotes: post.downvotes,
        comments: comments
            .into_iter()
            .map(|c| CommentView {
                id: c.id,
                content: c.content,
                author: view(c.author_id),
                created_at: c.created_at,
                updated_at: c.updated_at,
            })
            .collect(),
        created_at: post.created_at,
        updated_at: post.updated_at,
    })
}
