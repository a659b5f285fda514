//! Fills a fresh database with a handful of users, posts, votes and comments
//! so the ranked feed has something to show.
//!
//! Uses the same settings as the server (`RB__DATABASE__URL`, `.env`, ...).

use chrono::{Duration, Utc};
use rb_config::{init_tracing, Settings};
use rb_core::models::{NewPost, Vote};
use rb_db_sqlite::SqliteBoardRepo;
use tracing::info;

/// (title, content, hours old, author index)
const POSTS: &[(&str, Option<&str>, i64, usize)] = &[
    ("Welcome to the board", Some("Be nice, vote honestly."), 96, 0),
    ("Rust 2024 edition is out", Some("What are you migrating first?"), 20, 1),
    ("Show us your desk setup", None, 6, 2),
    ("Weekly help thread", Some("Ask anything."), 2, 0),
    ("Just joined, hello!", None, 0, 3),
];

/// (post index, voter index, vote)
const VOTES: &[(usize, usize, Vote)] = &[
    (0, 1, Vote::Up),
    (0, 2, Vote::Up),
    (0, 3, Vote::Up),
    (1, 0, Vote::Up),
    (1, 2, Vote::Up),
    (1, 3, Vote::Down),
    (2, 0, Vote::Up),
    (3, 1, Vote::Up),
    (4, 1, Vote::Down),
];

const COMMENTS: &[(usize, usize, &str)] = &[
    (0, 1, "Thanks for setting this up."),
    (1, 0, "Mostly the new let-chains."),
    (1, 3, "Still on 2021 here."),
    (3, 2, "How do I read the feed API?"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log);

    let repo =
        SqliteBoardRepo::new(settings.database.url(), settings.database.max_connections).await?;
    let now = Utc::now();

    let mut users = Vec::new();
    for name in ["ada", "bob", "cy", "dee"] {
        users.push(repo.create_user(name, now - Duration::days(7)).await?);
    }

    let mut posts = Vec::new();
    for (title, content, hours, author) in POSTS {
        let new_post = NewPost::new(title, content.map(str::to_string), users[*author].id)?;
        posts.push(repo.create_post(new_post, now - Duration::hours(*hours)).await?);
    }

    for (post, voter, vote) in VOTES {
        repo.cast_vote(posts[*post].id, users[*voter].id, *vote, now).await?;
    }

    for (post, author, content) in COMMENTS {
        repo.add_comment(posts[*post].id, users[*author].id, content, now)
            .await?;
    }

    info!(
        users = users.len(),
        posts = posts.len(),
        votes = VOTES.len(),
        comments = COMMENTS.len(),
        "seeded board"
    );
    Ok(())
}
