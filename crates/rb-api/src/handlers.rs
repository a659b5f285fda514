//! # rb-api Handlers
//!
//! This module coordinates the flow between HTTP requests and Core services.

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use rb_core::traits::{AuthorDirectory, Clock, PostRepo};
use rb_core::{post_detail, AppError, PageRequest, RankedFeedService};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub feed: RankedFeedService,
    pub posts: Arc<dyn PostRepo>,
    pub authors: Arc<dyn AuthorDirectory>,
}

impl AppState {
    pub fn new(
        posts: Arc<dyn PostRepo>,
        authors: Arc<dyn AuthorDirectory>,
        clock: Arc<dyn Clock>,
        max_page_size: u32,
    ) -> Self {
        let feed = RankedFeedService::new(posts.clone(), authors.clone(), clock)
            .with_max_page_size(max_page_size);
        Self {
            feed,
            posts,
            authors,
        }
    }
}

/// Raw pagination values. Kept as strings so bad numbers get our own message.
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<String>,
    pub page: Option<String>,
}

/// `GET /posts?limit=&page=`: one page of the ranked feed.
pub async fn list_posts(
    data: web::Data<AppState>,
    query: web::Query<FeedQuery>,
) -> Result<HttpResponse, ApiError> {
    let request = PageRequest::parse(query.limit.as_deref(), query.page.as_deref())?;
    let page = data.feed.ranked_page(request).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// `GET /posts/{id}`: a post with its comments.
pub async fn get_post(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = Uuid::parse_str(path.as_str())
        .map_err(|_| AppError::ValidationError("Invalid post id".into()))?;
    let detail = post_detail(data.posts.as_ref(), data.authors.as_ref(), id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}
