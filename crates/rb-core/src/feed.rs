//! # Ranked Feed
//!
//! Scores every post by a decay-weighted popularity value at query time,
//! sorts the whole set, then cuts the requested page out of it.
//!
//! ```text
//! sort_value = (score + 1) / (age_hours + 1) ^ 1.5
//! ```
//!
//! The value depends on "now", so two identical requests made minutes apart
//! may legitimately return different pages. Nothing is cached.

use std::cmp::Ordering;
use std::num::IntErrorKind;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use tracing::{debug, error};

use crate::error::{AppError, Result};
use crate::models::{Post, PageResult, RankedPost};
use crate::traits::{AuthorDirectory, Clock, PostRepo};

/// Query value used when `limit` is absent.
pub const DEFAULT_LIMIT: &str = "10";
/// Query value used when `page` is absent.
pub const DEFAULT_PAGE: &str = "1";
/// Upper bound on page size unless configured otherwise.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;
/// Recency decay strength. Higher means older posts sink faster.
pub const DECAY_EXPONENT: f64 = 1.5;

pub const INVALID_PAGINATION: &str = "Limit and page has to be valid numbers";
pub const NON_POSITIVE_PAGINATION: &str = "Limit and page have to be positive numbers";

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// A validated `(limit, page)` pair. Both are at least 1; `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    limit: u32,
    page: u32,
}

impl PageRequest {
    pub fn new(limit: u32, page: u32) -> Result<Self> {
        if limit == 0 || page == 0 {
            return Err(AppError::ValidationError(NON_POSITIVE_PAGINATION.into()));
        }
        Ok(Self { limit, page })
    }

    /// Parses raw query-string values, falling back to the defaults when absent.
    pub fn parse(limit: Option<&str>, page: Option<&str>) -> Result<Self> {
        let limit = parse_number(limit.unwrap_or(DEFAULT_LIMIT))?;
        let page = parse_number(page.unwrap_or(DEFAULT_PAGE))?;
        if limit < 1 || page < 1 {
            return Err(AppError::ValidationError(NON_POSITIVE_PAGINATION.into()));
        }
        // Huge values are still numbers: limit gets clamped, page lands past the end.
        let limit = u32::try_from(limit).unwrap_or(u32::MAX);
        let page = u32::try_from(page).unwrap_or(u32::MAX);
        Self::new(limit, page)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Number of ranked entries that precede this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.limit) * u64::from(self.page - 1)
    }

    fn clamped(self, max_limit: u32) -> Self {
        Self {
            limit: self.limit.min(max_limit),
            page: self.page,
        }
    }

    /// The following page number, or `None` if this page is the last one.
    pub fn next_page(&self, total: u64) -> Option<u32> {
        let total_pages = total.div_ceil(u64::from(self.limit));
        let next = self.page.checked_add(1)?;
        (u64::from(next) <= total_pages).then_some(next)
    }
}

/// Integers too wide for `i64` saturate instead of failing.
fn parse_number(raw: &str) -> Result<i64> {
    match raw.trim().parse::<i64>() {
        Ok(n) => Ok(n),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Ok(i64::MAX),
            IntErrorKind::NegOverflow => Ok(i64::MIN),
            _ => Err(AppError::ValidationError(INVALID_PAGINATION.into())),
        },
    }
}

/// Decay-weighted popularity of a post as seen at `now`.
///
/// A post dated after `now` (clock skew between writers) counts as brand new.
pub fn sort_value(score: i64, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_ms = (now - created_at).num_milliseconds().max(0);
    let age_hours = age_ms as f64 / MILLIS_PER_HOUR;
    (score as f64 + 1.0) / (age_hours + 1.0).powf(DECAY_EXPONENT)
}

/// Sorts posts by descending sort value; ties go to the lower post id.
pub fn rank(posts: Vec<Post>, now: DateTime<Utc>) -> Vec<(Post, f64)> {
    let mut scored: Vec<(Post, f64)> = posts
        .into_iter()
        .map(|post| {
            let value = sort_value(post.score, post.created_at, now);
            (post, value)
        })
        .collect();
    scored.sort_by(|(a, va), (b, vb)| match vb.total_cmp(va) {
        Ordering::Equal => a.id.cmp(&b.id),
        ord => ord,
    });
    scored
}

/// The board's front page.
///
/// Holds only shared handles to its collaborators, so one instance can serve
/// any number of concurrent requests.
#[derive(Clone)]
pub struct RankedFeedService {
    posts: Arc<dyn PostRepo>,
    authors: Arc<dyn AuthorDirectory>,
    clock: Arc<dyn Clock>,
    max_page_size: u32,
}

impl RankedFeedService {
    pub fn new(
        posts: Arc<dyn PostRepo>,
        authors: Arc<dyn AuthorDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            posts,
            authors,
            clock,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// Requests asking for more than `max` posts per page are served `max`.
    pub fn with_max_page_size(mut self, max: u32) -> Self {
        self.max_page_size = max.max(1);
        self
    }

    /// Ranks against the service clock.
    pub async fn ranked_page(&self, request: PageRequest) -> Result<PageResult> {
        self.ranked_page_at(request, self.clock.now()).await
    }

    /// Ranks as of `now`. Deterministic for a fixed `now` and unchanged storage.
    pub async fn ranked_page_at(
        &self,
        request: PageRequest,
        now: DateTime<Utc>,
    ) -> Result<PageResult> {
        let request = request.clamped(self.max_page_size);
        debug!(
            limit = request.limit(),
            page = request.page(),
            "building ranked feed page"
        );

        // Scoring needs the full set: the page boundary is only known after sorting.
        let (posts, total) = tokio::try_join!(self.posts.list_posts(), self.posts.count_posts())
            .map_err(|e| {
                error!(error = %e, "failed to load posts for ranked feed");
                AppError::from(e)
            })?;

        let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let selected = rank(posts, now)
            .into_iter()
            .skip(offset)
            .take(request.limit() as usize);

        let posts = try_join_all(selected.map(|(post, value)| self.summarize(post, value))).await?;

        Ok(PageResult {
            posts,
            next_page: request.next_page(total),
        })
    }

    async fn summarize(&self, post: Post, sort_value: f64) -> Result<RankedPost> {
        let author = self
            .authors
            .find_author(post.author_id)
            .await
            .map_err(|e| {
                error!(error = %e, author_id = %post.author_id, "author lookup failed");
                AppError::from(e)
            })?
            .ok_or_else(|| {
                error!(post_id = %post.id, author_id = %post.author_id, "post references a missing author");
                AppError::Internal(format!("author {} of post {} is missing", post.author_id, post.id))
            })?;

        Ok(RankedPost {
            id: post.id,
            title: post.title,
            content: post.content,
            author: author.into(),
            score: post.score,
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            sort_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedClock, InMemoryBoard};
    use crate::traits::{MockAuthorDirectory, MockPostRepo};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn service(board: &Arc<InMemoryBoard>) -> RankedFeedService {
        RankedFeedService::new(board.clone(), board.clone(), Arc::new(FixedClock(now())))
    }

    #[test]
    fn brand_new_post_with_zero_score_is_worth_one() {
        assert_eq!(sort_value(0, now(), now()), 1.0);
    }

    #[test]
    fn hour_old_post_with_score_nine() {
        let value = sort_value(9, now() - Duration::hours(1), now());
        assert!((value - 10.0 / 2f64.powf(1.5)).abs() < 1e-9);
        assert!((value - 3.5355).abs() < 1e-3);
    }

    #[test]
    fn future_posts_count_as_new() {
        let value = sort_value(4, now() + Duration::minutes(5), now());
        assert_eq!(value, 5.0);
    }

    #[test]
    fn negative_scores_stay_rankable() {
        let fresh_downvoted = sort_value(-1, now(), now());
        let buried = sort_value(-3, now(), now());
        assert_eq!(fresh_downvoted, 0.0);
        assert!(buried < fresh_downvoted);
    }

    #[test]
    fn parse_uses_defaults() {
        let req = PageRequest::parse(None, None).unwrap();
        assert_eq!((req.limit(), req.page()), (10, 1));
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn parse_rejects_non_numbers() {
        for (limit, page) in [(Some("abc"), None), (None, Some("x1")), (Some(""), Some("2"))] {
            let err = PageRequest::parse(limit, page).unwrap_err();
            assert!(
                matches!(err, AppError::ValidationError(ref m) if m == INVALID_PAGINATION),
                "{limit:?} {page:?}"
            );
        }
    }

    #[test]
    fn parse_rejects_zero_and_negative() {
        let err = PageRequest::parse(Some("0"), None).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ref m) if m == NON_POSITIVE_PAGINATION));
        assert!(PageRequest::parse(None, Some("-2")).is_err());
        let err = PageRequest::parse(None, Some("-99999999999999999999")).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ref m) if m == NON_POSITIVE_PAGINATION));
    }

    #[test]
    fn parse_saturates_oversized_numbers() {
        let req = PageRequest::parse(Some("99999999999999999999"), Some("4294967296")).unwrap();
        assert_eq!((req.limit(), req.page()), (u32::MAX, u32::MAX));
        assert_eq!(req.next_page(u64::MAX), None);
    }

    #[tokio::test]
    async fn oversized_page_is_an_empty_last_page() {
        let board = Arc::new(InMemoryBoard::new());
        let ada = board.add_author("ada");
        board.add_post(&ada, "only", 0, now());

        let req = PageRequest::parse(Some("99999999999999999999"), Some("4294967296")).unwrap();
        let result = service(&board).ranked_page(req).await.unwrap();
        assert!(result.posts.is_empty());
        assert_eq!(result.next_page, None);
    }

    #[test]
    fn next_page_stops_at_last_page() {
        let req = PageRequest::new(10, 2).unwrap();
        assert_eq!(req.next_page(21), Some(3));
        assert_eq!(req.next_page(20), None);
        assert_eq!(req.next_page(0), None);
        assert_eq!(PageRequest::new(10, 1).unwrap().next_page(11), Some(2));
    }

    #[test]
    fn ties_break_on_post_id() {
        let board = InMemoryBoard::new();
        let author = board.add_author("ada");
        let a = board.add_post(&author, "a", 3, now());
        let b = board.add_post(&author, "b", 3, now());
        let (low, high) = if a.id < b.id { (a, b) } else { (b, a) };
        let ranked = rank(vec![high.clone(), low.clone()], now());
        assert_eq!(ranked[0].0.id, low.id);
        assert_eq!(ranked[1].0.id, high.id);
    }

    #[tokio::test]
    async fn pages_are_sorted_and_bounded() {
        let board = Arc::new(InMemoryBoard::new());
        let ada = board.add_author("ada");
        for i in 0..25i64 {
            board.add_post(&ada, &format!("post {i}"), i % 7, now() - Duration::hours(i));
        }
        let svc = service(&board);

        let mut seen = Vec::new();
        let mut page = 1;
        loop {
            let result = svc.ranked_page(PageRequest::new(10, page).unwrap()).await.unwrap();
            assert!(result.posts.len() <= 10);
            seen.extend(result.posts);
            match result.next_page {
                Some(next) => page = next,
                None => break,
            }
        }

        assert_eq!(page, 3);
        assert_eq!(seen.len(), 25);
        for pair in seen.windows(2) {
            assert!(pair[0].sort_value >= pair[1].sort_value);
        }
    }

    #[tokio::test]
    async fn fresh_post_outranks_stale_popular_one() {
        let board = Arc::new(InMemoryBoard::new());
        let ada = board.add_author("ada");
        board.add_post(&ada, "old but loved", 50, now() - Duration::hours(48));
        board.add_post(&ada, "just in", 2, now());

        let result = service(&board)
            .ranked_page(PageRequest::new(10, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(result.posts[0].title, "just in");
        assert_eq!(result.posts[0].author.username, "ada");
        assert_eq!(result.next_page, None);
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty() {
        let board = Arc::new(InMemoryBoard::new());
        let ada = board.add_author("ada");
        board.add_post(&ada, "only", 0, now());

        let result = service(&board)
            .ranked_page(PageRequest::new(10, 5).unwrap())
            .await
            .unwrap();
        assert!(result.posts.is_empty());
        assert_eq!(result.next_page, None);
    }

    #[tokio::test]
    async fn repeated_calls_at_same_instant_agree() {
        let board = Arc::new(InMemoryBoard::new());
        let ada = board.add_author("ada");
        for i in 0..6i64 {
            board.add_post(&ada, &format!("p{i}"), 2, now() - Duration::minutes(i * 30));
        }
        let svc = service(&board);
        let req = PageRequest::new(4, 1).unwrap();
        let first = svc.ranked_page_at(req, now()).await.unwrap();
        let second = svc.ranked_page_at(req, now()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.next_page, Some(2));
    }

    #[tokio::test]
    async fn oversized_limit_is_clamped() {
        let board = Arc::new(InMemoryBoard::new());
        let ada = board.add_author("ada");
        for i in 0..5 {
            board.add_post(&ada, &format!("p{i}"), 0, now());
        }
        let result = service(&board)
            .with_max_page_size(2)
            .ranked_page(PageRequest::new(50, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(result.posts.len(), 2);
        assert_eq!(result.next_page, Some(2));
    }

    #[tokio::test]
    async fn storage_failure_is_internal() {
        let mut posts = MockPostRepo::new();
        posts
            .expect_list_posts()
            .returning(|| Err(anyhow::anyhow!("database is locked")));
        posts.expect_count_posts().returning(|| Ok(0));
        let authors = MockAuthorDirectory::new();

        let svc = RankedFeedService::new(
            Arc::new(posts),
            Arc::new(authors),
            Arc::new(FixedClock(now())),
        );
        let err = svc.ranked_page(PageRequest::new(10, 1).unwrap()).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn missing_author_fails_the_page() {
        let board = Arc::new(InMemoryBoard::new());
        let ada = board.add_author("ada");
        board.add_post(&ada, "orphan", 0, now());
        board.remove_author(ada.id);

        let err = service(&board)
            .ranked_page(PageRequest::new(10, 1).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
