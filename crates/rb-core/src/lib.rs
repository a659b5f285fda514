//! rusty-board/crates/rb-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Rusty-Board.

pub mod detail;
pub mod error;
pub mod feed;
pub mod models;
pub mod traits;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exporting for easier access in other crates
pub use detail::post_detail;
pub use error::*;
pub use feed::{PageRequest, RankedFeedService};
pub use models::*;
pub use traits::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use uuid::Uuid;

    #[test]
    fn new_post_title_is_trimmed() {
        let author = Uuid::now_v7();
        let post = NewPost::new("  Hello Rust!\n", None, author).unwrap();
        assert_eq!(post.title, "Hello Rust!");
        assert_eq!(post.author_id, author);
    }

    #[test]
    fn blank_title_is_rejected() {
        let err = NewPost::new("   ", Some("body".into()), Uuid::now_v7()).unwrap_err();
        assert!(matches!(err, crate::AppError::ValidationError(_)));
    }

    #[test]
    fn vote_directions_round_trip() {
        assert_eq!(Vote::from_direction(Vote::Up.direction()), Some(Vote::Up));
        assert_eq!(Vote::from_direction(Vote::Down.direction()), Some(Vote::Down));
        assert_eq!(Vote::from_direction(0), None);
    }

    #[test]
    fn page_result_serializes_next_page_as_null() {
        let page = PageResult {
            posts: Vec::new(),
            next_page: None,
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json, serde_json::json!({ "posts": [], "nextPage": null }));
    }
}
