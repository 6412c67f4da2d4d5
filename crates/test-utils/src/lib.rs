//! Placard test utilities.
//!
//! Helpers for integration testing: row fixtures, an in-memory
//! [`ListBuilder`], scripted search backends and a database handle for
//! tests that need PostgreSQL.

use std::cmp::Ordering;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use sqlx::PgPool;

use placard_kernel::error::AppResult;
use placard_kernel::listing::{FilterScalar, ListBuilder, OrderDirection, Predicate};
use placard_kernel::search::{
    SearchBridge, SearchError, SearchHit, SearchIndex, SearchRecord, SearchResponse,
};

/// Create a test post with default values.
pub fn test_post(id: i64, title: &str) -> TestPost {
    TestPost {
        id,
        code: format!("post-{id}"),
        title: title.to_string(),
        status: "DRAFT".to_string(),
        category_id: None,
        website_id: 1,
        created_at: id,
    }
}

/// A test post builder for creating fixtures.
#[derive(Debug, Clone)]
pub struct TestPost {
    pub id: i64,
    pub code: String,
    pub title: String,
    pub status: String,
    pub category_id: Option<i64>,
    pub website_id: i64,
    /// Ordering key standing in for the creation timestamp.
    pub created_at: i64,
}

impl TestPost {
    pub fn with_code(mut self, code: &str) -> Self {
        self.code = code.to_string();
        self
    }

    pub fn published(mut self) -> Self {
        self.status = "PUBLISHED".to_string();
        self
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn on_website(mut self, website_id: i64) -> Self {
        self.website_id = website_id;
        self
    }

    pub fn created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Row as seen by [`MemoryListBuilder`], keyed by column name.
    pub fn to_row(&self) -> JsonValue {
        json!({
            "id": self.id,
            "code": self.code,
            "title": self.title,
            "status": self.status,
            "category_id": self.category_id,
            "website_id": self.website_id,
            "created_at": self.created_at,
        })
    }

    /// Insert into the `post` table. The database assigns id and timestamps.
    pub async fn insert(&self, pool: &PgPool) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO post (code, title, status, category_id, website_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(&self.code)
        .bind(&self.title)
        .bind(&self.status)
        .bind(self.category_id)
        .bind(self.website_id)
        .fetch_one(pool)
        .await
        .unwrap_or_else(|e| panic!("failed to insert post {}: {e}", self.code))
    }
}

/// Create a test category with default values.
pub fn test_category(code: &str, name: &str) -> TestCategory {
    TestCategory {
        code: code.to_string(),
        name: name.to_string(),
        parent_id: None,
        category_group_id: 0,
        website_id: 0,
    }
}

/// A test category builder for database fixtures.
#[derive(Debug, Clone)]
pub struct TestCategory {
    pub code: String,
    pub name: String,
    pub parent_id: Option<i64>,
    pub category_group_id: i64,
    pub website_id: i64,
}

impl TestCategory {
    pub fn child_of(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn in_group(mut self, category_group_id: i64) -> Self {
        self.category_group_id = category_group_id;
        self
    }

    pub fn on_website(mut self, website_id: i64) -> Self {
        self.website_id = website_id;
        self
    }

    pub async fn insert(&self, pool: &PgPool) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO category (code, name, parent_id, category_group_id, website_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(&self.code)
        .bind(&self.name)
        .bind(self.parent_id)
        .bind(self.category_group_id)
        .bind(self.website_id)
        .fetch_one(pool)
        .await
        .unwrap_or_else(|e| panic!("failed to insert category {}: {e}", self.code))
    }
}

/// In-memory [`ListBuilder`] over JSON rows.
///
/// Columns are matched by their full path first (`category_group.code`), then
/// with the table alias stripped (`post.website_id` reads `website_id`).
#[derive(Debug, Default)]
pub struct MemoryListBuilder {
    rows: Vec<JsonValue>,
    predicates: Vec<Predicate>,
    order: Vec<(String, OrderDirection)>,
    offset: u64,
    limit: Option<u64>,
}

impl MemoryListBuilder {
    pub fn new(rows: Vec<JsonValue>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn ordering(&self) -> &[(String, OrderDirection)] {
        &self.order
    }

    fn lookup<'a>(row: &'a JsonValue, column: &str) -> &'a JsonValue {
        if let Some(value) = row.get(column) {
            return value;
        }
        let field = column.rsplit_once('.').map_or(column, |(_, field)| field);
        row.get(field).unwrap_or(&JsonValue::Null)
    }

    fn scalar_matches(value: &JsonValue, scalar: &FilterScalar) -> bool {
        match scalar {
            FilterScalar::Int(i) => value.as_i64() == Some(*i),
            FilterScalar::Text(s) => value.as_str() == Some(s.as_str()),
            FilterScalar::Bool(b) => value.as_bool() == Some(*b),
        }
    }

    fn matches(row: &JsonValue, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::Eq { column, value } => {
                Self::scalar_matches(Self::lookup(row, column), value)
            }
            Predicate::In { column, values } => {
                let cell = Self::lookup(row, column);
                values.iter().any(|v| Self::scalar_matches(cell, v))
            }
            Predicate::IsNull { column } => Self::lookup(row, column).is_null(),
            Predicate::Nothing => false,
        }
    }

    /// PostgreSQL puts NULLs last in ascending order.
    fn compare(a: &JsonValue, b: &JsonValue) -> Ordering {
        match (a, b) {
            (JsonValue::Null, JsonValue::Null) => Ordering::Equal,
            (JsonValue::Null, _) => Ordering::Greater,
            (_, JsonValue::Null) => Ordering::Less,
            (JsonValue::Number(x), JsonValue::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
            (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
            _ => Ordering::Equal,
        }
    }
}

#[async_trait]
impl ListBuilder for MemoryListBuilder {
    type Row = JsonValue;

    fn skip(&mut self, offset: u64) {
        self.offset = offset;
    }

    fn take(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    fn and_where(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    fn order_by(&mut self, column: &str, direction: OrderDirection) {
        self.order.push((column.to_string(), direction));
    }

    async fn get_many_and_count(&self) -> AppResult<(Vec<JsonValue>, u64)> {
        let mut matched: Vec<JsonValue> = self
            .rows
            .iter()
            .filter(|row| self.predicates.iter().all(|p| Self::matches(row, p)))
            .cloned()
            .collect();
        let total = matched.len() as u64;

        matched.sort_by(|a, b| {
            self.order
                .iter()
                .map(|(column, direction)| {
                    let ordering = Self::compare(Self::lookup(a, column), Self::lookup(b, column));
                    match direction {
                        OrderDirection::Asc => ordering,
                        OrderDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        let page = matched
            .into_iter()
            .skip(usize::try_from(self.offset).unwrap_or(usize::MAX))
            .take(self.limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX)))
            .collect();

        Ok((page, total))
    }
}

/// Search backend returning fixed hits and recording index writes.
#[derive(Debug, Default)]
pub struct RecordingSearch {
    hits: Vec<String>,
    queries: Mutex<Vec<(String, Vec<String>)>>,
    saved: Mutex<Vec<SearchRecord>>,
    removed: Mutex<Vec<String>>,
}

impl RecordingSearch {
    pub fn with_hits(hits: &[&str]) -> Self {
        Self {
            hits: hits.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    /// `(term, fields)` of every search, in call order.
    pub fn queries(&self) -> Vec<(String, Vec<String>)> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    pub fn saved(&self) -> Vec<SearchRecord> {
        self.saved.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SearchBridge for RecordingSearch {
    async fn search(&self, term: &str, fields: &[String]) -> Result<SearchResponse, SearchError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push((term.to_string(), fields.to_vec()));
        }
        Ok(SearchResponse {
            hits: self
                .hits
                .iter()
                .map(|id| SearchHit {
                    object_id: id.clone(),
                })
                .collect(),
        })
    }
}

#[async_trait]
impl SearchIndex for RecordingSearch {
    async fn save(&self, record: SearchRecord) -> Result<(), SearchError> {
        if let Ok(mut saved) = self.saved.lock() {
            saved.push(record);
        }
        Ok(())
    }

    async fn remove(&self, object_id: &str) -> Result<(), SearchError> {
        if let Ok(mut removed) = self.removed.lock() {
            removed.push(object_id.to_string());
        }
        Ok(())
    }
}

/// Search backend whose every call fails with the given HTTP status.
#[derive(Debug, Clone, Copy)]
pub struct FailingSearch(pub u16);

#[async_trait]
impl SearchBridge for FailingSearch {
    async fn search(&self, _term: &str, _fields: &[String]) -> Result<SearchResponse, SearchError> {
        Err(SearchError::Status(self.0))
    }
}

#[async_trait]
impl SearchIndex for FailingSearch {
    async fn save(&self, _record: SearchRecord) -> Result<(), SearchError> {
        Err(SearchError::Status(self.0))
    }

    async fn remove(&self, _object_id: &str) -> Result<(), SearchError> {
        Err(SearchError::Status(self.0))
    }
}

/// Connect to `DATABASE_URL` and apply migrations.
///
/// Returns `None` when `DATABASE_URL` is unset so database tests can skip.
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to {url}: {e}"));
    placard_kernel::db::run_migrations(&pool)
        .await
        .unwrap_or_else(|e| panic!("failed to migrate test database: {e}"));
    Some(pool)
}

/// Insert a website and a category group for it. Returns `(website_id, group_id)`.
pub async fn create_website(pool: &PgPool, domain: &str, group_code: &str) -> (i64, i64) {
    let website_id: i64 = sqlx::query_scalar(
        "INSERT INTO website (url, name) VALUES ($1, $1) \
         ON CONFLICT (url) DO UPDATE SET name = EXCLUDED.name RETURNING id",
    )
    .bind(domain)
    .fetch_one(pool)
    .await
    .unwrap_or_else(|e| panic!("failed to insert website {domain}: {e}"));

    let group_id: i64 = sqlx::query_scalar(
        "INSERT INTO category_group (code, name, website_id) VALUES ($1, $1, $2) \
         ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name RETURNING id",
    )
    .bind(group_code)
    .bind(website_id)
    .fetch_one(pool)
    .await
    .unwrap_or_else(|e| panic!("failed to insert category group {group_code}: {e}"));

    (website_id, group_id)
}

/// Unique suffix for fixture codes so database tests do not collide.
pub fn unique_suffix() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{nanos}-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Test assertion helpers.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected key '{key}' in JSON: {value}"
        );
    }

    /// Assert the `id` of each item, in order.
    pub fn ids(items: &[Value], expected: &[i64]) {
        let actual: Vec<i64> = items.iter().filter_map(|i| i["id"].as_i64()).collect();
        assert_eq!(actual, expected, "unexpected ids");
    }
}
