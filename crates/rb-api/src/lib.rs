//! # rb-api
//!
//! The web routing and orchestration layer for Rusty-Board.

pub mod error;
pub mod handlers;
pub mod middleware;

use actix_web::{error::QueryPayloadError, web, HttpRequest};
use rb_core::{feed::INVALID_PAGINATION, AppError};
use tracing::debug;

pub use error::ApiError;
pub use handlers::AppState;

/// Configures the routes for the board.
///
/// # Developer Note
/// We use a scoped configuration to allow the main binary to mount
/// the API under different paths if needed (e.g., /api/v1/).
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            .app_data(web::QueryConfig::default().error_handler(query_error))
            // The ranked front page (e.g., /posts?limit=10&page=2)
            .route("/posts", web::get().to(handlers::list_posts))
            // A single post with its comments
            .route("/posts/{id}", web::get().to(handlers::get_post))
            .route("/health", web::get().to(handlers::health)),
    );
}

/// Unreadable query strings (e.g. a repeated `limit`) get the same JSON 400 as bad numbers.
fn query_error(err: QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    debug!(error = %err, uri = %req.uri(), "rejected query string");
    ApiError(AppError::ValidationError(INVALID_PAGINATION.into())).into()
}
