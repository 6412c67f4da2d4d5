#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Database-backed tests share one pool created on a long-lived runtime.
//! When `DATABASE_URL` is unset, [`shared_db`] returns `None` and those tests
//! return early.

#![allow(dead_code)]

use sqlx::PgPool;

use placard_kernel::models::Actor;
use placard_test_utils::{create_website, test_pool, unique_suffix};

/// Shared Tokio runtime that outlives all individual test runtimes.
///
/// Pool connections are bound to the runtime that opened them, so every
/// database test runs on this one via [`run_test`].
pub static SHARED_RT: std::sync::LazyLock<tokio::runtime::Runtime> =
    std::sync::LazyLock::new(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("Failed to build shared test runtime")
    });

static SHARED_DB: std::sync::OnceLock<Option<PgPool>> = std::sync::OnceLock::new();

/// The shared, migrated pool, or `None` without `DATABASE_URL`.
pub fn shared_db() -> Option<&'static PgPool> {
    SHARED_DB
        .get_or_init(|| {
            dotenvy::dotenv().ok();
            let handle = SHARED_RT.handle().clone();
            std::thread::spawn(move || handle.block_on(test_pool()))
                .join()
                .expect("test pool init thread panicked")
        })
        .as_ref()
}

/// Run an async test body on [`SHARED_RT`].
pub fn run_test<F: std::future::Future<Output = ()> + Send>(f: F) {
    SHARED_RT.block_on(f);
}

/// A website of its own plus a category group, so tests never share rows.
pub struct Fixture {
    pub website_id: i64,
    pub group_id: i64,
    pub suffix: String,
}

impl Fixture {
    pub async fn new(pool: &PgPool) -> Self {
        let suffix = unique_suffix();
        let (website_id, group_id) = create_website(
            pool,
            &format!("site-{suffix}.test"),
            &format!("group-{suffix}"),
        )
        .await;
        Self {
            website_id,
            group_id,
            suffix,
        }
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: 0,
            website_id: self.website_id,
        }
    }

    /// A fixture code unique to this test run.
    pub fn code(&self, base: &str) -> String {
        format!("{base}-{}", self.suffix)
    }
}
