//! Post listing and lifecycle.
//!
//! Soft-deleted posts are invisible to every read. Status changes are bulk
//! updates over a [`PostFilter`] and report how many rows they touched.

use sea_query::{
    Alias, Asterisk, Expr, PostgresQueryBuilder, Query, SelectStatement, SimpleExpr,
    UpdateStatement,
};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::db::bind_values;
use crate::error::{AppError, AppResult};
use crate::listing::{
    FilterKey, FilterKind, FilterScalar, ListBuilder, ListQueryError, ListQuerySpec,
    PaginatedResponse, Predicate, RawListQuery, SqlListQuery, paginate, set_filter,
    set_pagination, set_search, set_sorting,
};
use crate::models::{Actor, CreatePost, Post, PostFilter, PostLookup, PostStatus, UpdatePost};
use crate::search::{SearchBridge, SearchHandle};
use crate::services::slug::code_for;

/// Alias of the listed table.
pub const TABLE: &str = "post";

/// Filters accepted by post listings.
pub const FILTER_KEYS: &[FilterKey] = &[
    FilterKey::new("websiteId", FilterKind::Integer),
    FilterKey::new("categoryId", FilterKind::Integer),
    FilterKey::new("categoryIds", FilterKind::Integer),
    FilterKey::new("statuses", FilterKind::OneOf(PostStatus::ALL)),
];

/// Fields post listings may be ordered by.
pub const SORTABLE: &[&str] = &["id", "code", "title", "status", "createdAt", "updatedAt"];

/// Base statement: posts that are not soft-deleted.
pub fn base_select() -> SelectStatement {
    let mut select = Query::select();
    select
        .column((Alias::new(TABLE), Asterisk))
        .from(Alias::new(TABLE))
        .and_where(Expr::col((Alias::new(TABLE), Alias::new("deleted_at"))).is_null());
    select
}

/// Apply a post listing request: filters, search, sorting, pagination.
pub async fn compose<B: ListBuilder>(
    builder: &mut B,
    spec: &ListQuerySpec,
    search: &dyn SearchBridge,
) -> AppResult<()> {
    set_filter(builder, spec, TABLE, "websiteId", &["websiteId"]);
    set_filter(builder, spec, TABLE, "categoryId", &["categoryId"]);
    set_filter(builder, spec, TABLE, "categoryIds", &["categoryId"]);
    set_filter(builder, spec, TABLE, "statuses", &["status"]);

    set_search(builder, spec, search, &["post.code"]).await?;

    spec.ensure_sortable(SORTABLE)?;
    set_sorting(builder, spec, TABLE)?;
    set_pagination(builder, spec);
    Ok(())
}

/// Condition selecting the live posts a bulk filter names.
fn filter_condition(filter: &PostFilter) -> Result<SimpleExpr, ListQueryError> {
    if filter.is_empty() {
        return Err(ListQueryError::EmptyFilter);
    }

    let mut condition = Expr::col(Alias::new("deleted_at")).is_null();
    if !filter.ids.is_empty() {
        condition = condition.and(Expr::col(Alias::new("id")).is_in(filter.ids.iter().copied()));
    }
    if let Some(website_id) = filter.website_id {
        condition = condition.and(Expr::col(Alias::new("website_id")).eq(website_id));
    }
    if let Some(category_id) = filter.category_id {
        condition = condition.and(Expr::col(Alias::new("category_id")).eq(category_id));
    }
    Ok(condition)
}

/// `UPDATE post SET status = ..., updated_at = NOW()` over a filter.
pub fn status_update(
    filter: &PostFilter,
    status: PostStatus,
) -> Result<UpdateStatement, ListQueryError> {
    let mut update = Query::update();
    update
        .table(Alias::new(TABLE))
        .value(Alias::new("status"), status.as_str())
        .value(Alias::new("updated_at"), Expr::cust("NOW()"))
        .and_where(filter_condition(filter)?);
    Ok(update)
}

/// Post service.
#[derive(Clone)]
pub struct PostService {
    pool: PgPool,
    search: SearchHandle,
}

impl PostService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            search: SearchHandle::disabled(),
        }
    }

    /// Search index backing `searchValue`. Without one, searches fail.
    pub fn with_search(mut self, search: SearchHandle) -> Self {
        self.search = search;
        self
    }

    fn query(&self) -> SqlListQuery<Post> {
        SqlListQuery::new(self.pool.clone(), base_select())
    }

    /// Create a draft post on the actor's website.
    pub async fn create(&self, input: CreatePost, actor: &Actor) -> AppResult<Post> {
        if let Some(requested) = input.status {
            debug!(%requested, "ignoring status on create");
        }
        let code = match input.code {
            Some(code) if !code.trim().is_empty() => code,
            _ => code_for(&input.title, "post"),
        };

        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO post (code, title, content, status, category_id, website_id, avatar_image_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&code)
        .bind(&input.title)
        .bind(&input.content)
        .bind(PostStatus::Draft.as_str())
        .bind(input.category_id)
        .bind(actor.website_id)
        .bind(input.avatar_image_id)
        .fetch_one(&self.pool)
        .await?;

        info!(id = post.id, code = %post.code, "post created");
        Ok(post)
    }

    /// Find one live post.
    pub async fn get(&self, lookup: PostLookup) -> AppResult<Post> {
        let mut query = self.query();
        query.and_where(match lookup {
            PostLookup::Id(id) => Predicate::Eq {
                column: format!("{TABLE}.id"),
                value: FilterScalar::Int(id),
            },
            PostLookup::Code(code) => Predicate::Eq {
                column: format!("{TABLE}.code"),
                value: FilterScalar::Text(code),
            },
        });

        query.fetch_optional().await?.ok_or(AppError::NotFound("post"))
    }

    /// List posts for a raw request.
    pub async fn get_all(&self, raw: &RawListQuery) -> AppResult<PaginatedResponse<Post>> {
        let spec = ListQuerySpec::parse(raw, FILTER_KEYS)?;
        self.list(&spec).await
    }

    /// List posts for an already parsed request.
    pub async fn list(&self, spec: &ListQuerySpec) -> AppResult<PaginatedResponse<Post>> {
        let mut query = self.query();
        compose(&mut query, spec, self.search.bridge.as_ref()).await?;
        paginate(&query, spec).await
    }

    /// Mark matching posts PUBLISHED. Returns the number of rows changed.
    pub async fn publish(&self, filter: &PostFilter) -> AppResult<u64> {
        self.set_status(filter, PostStatus::Published).await
    }

    /// Mark matching posts UNPUBLISHED. Returns the number of rows changed.
    pub async fn un_publish(&self, filter: &PostFilter) -> AppResult<u64> {
        self.set_status(filter, PostStatus::Unpublished).await
    }

    async fn set_status(&self, filter: &PostFilter, status: PostStatus) -> AppResult<u64> {
        let (sql, values) = status_update(filter, status)?.build(PostgresQueryBuilder);
        let result = sqlx::query_with(&sql, bind_values(values)?)
            .execute(&self.pool)
            .await?;

        info!(?filter, %status, rows = result.rows_affected(), "post status changed");
        Ok(result.rows_affected())
    }

    /// Move a post to the top of `updatedAt DESC` listings.
    pub async fn up_top_by_id(&self, id: i64) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE post SET updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("post"));
        }
        Ok(())
    }

    /// Apply the fields present in `input`.
    pub async fn update_by_id(&self, id: i64, input: UpdatePost) -> AppResult<Post> {
        if input.is_empty() {
            return self.get(PostLookup::Id(id)).await;
        }

        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE post SET
                code = COALESCE($2, code),
                title = COALESCE($3, title),
                content = COALESCE($4, content),
                category_id = COALESCE($5, category_id),
                avatar_image_id = COALESCE($6, avatar_image_id),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.code)
        .bind(&input.title)
        .bind(&input.content)
        .bind(input.category_id)
        .bind(input.avatar_image_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("post"))?;

        info!(id, "post updated");
        Ok(post)
    }

    /// Soft-delete matching posts. Status is left untouched.
    pub async fn delete(&self, filter: &PostFilter) -> AppResult<u64> {
        let (sql, values) = Query::update()
            .table(Alias::new(TABLE))
            .value(Alias::new("deleted_at"), Expr::cust("NOW()"))
            .and_where(filter_condition(filter)?)
            .build(PostgresQueryBuilder);
        let result = sqlx::query_with(&sql, bind_values(values)?)
            .execute(&self.pool)
            .await?;

        info!(?filter, rows = result.rows_affected(), "posts deleted");
        Ok(result.rows_affected())
    }
}
