//! Category listing, lookup and lifecycle.
//!
//! Every category read returns the parent summary, the direct children and
//! the category group in one statement: the parent and group come from LEFT
//! JOINs and the children from a correlated `json_agg`.

use sea_query::{Alias, Asterisk, Expr, JoinType, Query, SelectStatement};
use sqlx::PgPool;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::listing::{
    FilterKey, FilterKind, FilterScalar, FilterValue, ListBuilder, ListQuerySpec,
    PaginatedResponse, Predicate, RawListQuery, SqlListQuery, paginate, set_filter,
    set_pagination, set_search, set_sorting,
};
use crate::models::{Actor, Category, CategoryLookup, CreateCategory, UpdateCategory};
use crate::search::{
    SearchBridge, SearchHandle, SearchRecord, remove_in_background, save_in_background,
};
use crate::services::slug::code_for;

/// Alias of the listed table.
pub const TABLE: &str = "category";

/// Filters accepted by category listings.
pub const FILTER_KEYS: &[FilterKey] = &[
    FilterKey::new("websiteId", FilterKind::Integer),
    FilterKey::new("categoryGroupCodes", FilterKind::Text),
    FilterKey::new("parentId", FilterKind::NullableInteger),
    FilterKey::new("parentCode", FilterKind::Text),
];

/// Fields category listings may be ordered by.
pub const SORTABLE: &[&str] = &[
    "id",
    "code",
    "name",
    "createdAt",
    "updatedAt",
    "categoryGroupName",
];

const PARENT_JSON: &str = r#"CASE WHEN "parent"."id" IS NULL THEN NULL ELSE json_build_object('id', "parent"."id", 'code', "parent"."code", 'name', "parent"."name", 'parentId', "parent"."parent_id") END"#;

const CHILDREN_JSON: &str = r#"COALESCE((SELECT json_agg(json_build_object('id', "child"."id", 'code', "child"."code", 'name', "child"."name", 'parentId', "child"."parent_id") ORDER BY "child"."id") FROM "category" AS "child" WHERE "child"."parent_id" = "category"."id"), '[]'::json)"#;

const GROUP_JSON: &str = r#"json_build_object('id', "category_group"."id", 'code', "category_group"."code", 'name', "category_group"."name")"#;

/// Base statement: categories with parent, children and group resolved.
pub fn base_select() -> SelectStatement {
    let mut select = Query::select();
    select
        .column((Alias::new(TABLE), Asterisk))
        .expr_as(Expr::cust(PARENT_JSON), Alias::new("parent"))
        .expr_as(Expr::cust(CHILDREN_JSON), Alias::new("children"))
        .expr_as(Expr::cust(GROUP_JSON), Alias::new("category_group"))
        .from(Alias::new(TABLE))
        .join_as(
            JoinType::LeftJoin,
            Alias::new("category"),
            Alias::new("parent"),
            Expr::col((Alias::new("parent"), Alias::new("id")))
                .equals((Alias::new(TABLE), Alias::new("parent_id"))),
        )
        .join_as(
            JoinType::LeftJoin,
            Alias::new("category_group"),
            Alias::new("category_group"),
            Expr::col((Alias::new("category_group"), Alias::new("id")))
                .equals((Alias::new(TABLE), Alias::new("category_group_id"))),
        );
    select
}

/// Apply a category listing request: filters, search, sorting, pagination.
pub async fn compose<B: ListBuilder>(
    builder: &mut B,
    spec: &ListQuerySpec,
    search: &dyn SearchBridge,
) -> AppResult<()> {
    set_filter(builder, spec, TABLE, "websiteId", &["websiteId"]);
    set_filter(builder, spec, TABLE, "categoryGroupCodes", &["categoryGroup.code"]);

    // A non-numeric parentId asks for roots, which equality cannot express.
    match spec.filter("parentId") {
        Some(FilterValue::Null) => builder.and_where(Predicate::IsNull {
            column: format!("{TABLE}.parent_id"),
        }),
        Some(_) => set_filter(builder, spec, TABLE, "parentId", &["parentId"]),
        None => {}
    }

    set_filter(builder, spec, TABLE, "parentCode", &["parent.code"]);

    set_search(builder, spec, search, &["category.code"]).await?;

    spec.ensure_sortable(SORTABLE)?;
    let mut sort = spec.clone();
    if sort.order_by == "categoryGroupName" {
        sort.order_by = "categoryGroup.name".to_string();
    }
    set_sorting(builder, &sort, TABLE)?;

    set_pagination(builder, spec);
    Ok(())
}

/// Search record for a category. The object ID is always the code.
pub fn index_record(category: &Category) -> SearchRecord {
    SearchRecord::new(category.code.clone())
        .with("name", category.name.clone())
        .with("categoryGroupName", category.group_name())
}

/// Category service.
#[derive(Clone)]
pub struct CategoryService {
    pool: PgPool,
    search: SearchHandle,
}

impl CategoryService {
    pub fn new(pool: PgPool, search: SearchHandle) -> Self {
        Self { pool, search }
    }

    fn query(&self) -> SqlListQuery<Category> {
        SqlListQuery::new(self.pool.clone(), base_select())
    }

    /// Find one category.
    pub async fn get(&self, lookup: CategoryLookup) -> AppResult<Category> {
        let mut query = self.query();
        query.and_where(match lookup {
            CategoryLookup::Id(id) => Predicate::Eq {
                column: format!("{TABLE}.id"),
                value: FilterScalar::Int(id),
            },
            CategoryLookup::Code(code) => Predicate::Eq {
                column: format!("{TABLE}.code"),
                value: FilterScalar::Text(code),
            },
        });

        query
            .fetch_optional()
            .await?
            .ok_or(AppError::NotFound("category"))
    }

    /// List categories for a raw request.
    pub async fn get_all(&self, raw: &RawListQuery) -> AppResult<PaginatedResponse<Category>> {
        let spec = ListQuerySpec::parse(raw, FILTER_KEYS)?;
        self.list(&spec).await
    }

    /// List root categories only, whatever `parentId` the request carries.
    pub async fn get_roots(&self, raw: &RawListQuery) -> AppResult<PaginatedResponse<Category>> {
        let mut spec = ListQuerySpec::parse(raw, FILTER_KEYS)?;
        spec.set_filter("parentId", FilterValue::Null);
        self.list(&spec).await
    }

    /// List categories for an already parsed request.
    pub async fn list(&self, spec: &ListQuerySpec) -> AppResult<PaginatedResponse<Category>> {
        let mut query = self.query();
        compose(&mut query, spec, self.search.bridge.as_ref()).await?;
        paginate(&query, spec).await
    }

    /// Create a category and index it in the background.
    pub async fn create(&self, input: CreateCategory, actor: &Actor) -> AppResult<Category> {
        let code = match input.code {
            Some(code) if !code.trim().is_empty() => code,
            _ => code_for(&input.name, "category"),
        };
        let website_id = input.website_id.unwrap_or(actor.website_id);

        sqlx::query(
            r#"
            INSERT INTO category (code, name, parent_id, category_group_id, website_id, thumbnail_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&code)
        .bind(&input.name)
        .bind(input.parent_id)
        .bind(input.category_group_id)
        .bind(website_id)
        .bind(input.thumbnail_id)
        .execute(&self.pool)
        .await?;

        let category = self.get(CategoryLookup::Code(code)).await?;
        info!(id = category.id, code = %category.code, "category created");

        save_in_background(self.search.index.clone(), index_record(&category));
        Ok(category)
    }

    /// Update name, group and thumbnail, then re-index.
    pub async fn update(&self, id: i64, input: UpdateCategory) -> AppResult<Category> {
        if !input.is_empty() {
            let result = sqlx::query(
                r#"
                UPDATE category SET
                    name = COALESCE($2, name),
                    category_group_id = COALESCE($3, category_group_id),
                    thumbnail_id = COALESCE($4, thumbnail_id),
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&input.name)
            .bind(input.category_group_id)
            .bind(input.thumbnail_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::NotFound("category"));
            }
        }

        let category = self.get(CategoryLookup::Id(id)).await?;
        info!(id, "category updated");

        save_in_background(self.search.index.clone(), index_record(&category));
        Ok(category)
    }

    /// Hard-delete a category and drop its search record.
    ///
    /// Children are kept and become roots.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let code: Option<String> =
            sqlx::query_scalar("DELETE FROM category WHERE id = $1 RETURNING code")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(code) = code else {
            return Err(AppError::NotFound("category"));
        };
        info!(id, code = %code, "category deleted");

        remove_in_background(self.search.index.clone(), code);
        Ok(())
    }
}
