//! # Rusty-Board Binary
//!
//! The entry point that assembles the application based on compile-time features.

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use rb_api::{configure_routes, middleware, AppState};
use rb_config::{init_tracing, Settings};
use rb_core::traits::SystemClock;
use tracing::info;

// Feature-gated imports: storage is chosen at compile time
#[cfg(feature = "db-sqlite")]
use rb_db_sqlite::SqliteBoardRepo;

#[cfg(not(feature = "db-sqlite"))]
compile_error!("rusty-board needs a storage backend; enable the `db-sqlite` feature");

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log);

    // 1. Initialize Database Implementation
    #[cfg(feature = "db-sqlite")]
    let repo = Arc::new(
        SqliteBoardRepo::new(settings.database.url(), settings.database.max_connections).await?,
    );

    // 2. Wrap in AppState (the same store serves posts and authors)
    let state = web::Data::new(AppState::new(
        repo.clone(),
        repo,
        Arc::new(SystemClock),
        settings.feed.max_page_size,
    ));

    let (host, port) = settings.bind_address();
    info!("🚀 Rusty-Board starting on http://{host}:{port}");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::standard_middleware())
            .wrap(middleware::cors_policy())
            .wrap(middleware::security_headers())
            .configure(configure_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    Ok(())
}
