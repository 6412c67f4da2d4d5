//! District listing and lookup.

use sea_query::{Alias, Asterisk, Query, SelectStatement};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::listing::{
    FilterKey, FilterKind, FilterScalar, ListBuilder, ListQuerySpec, PaginatedResponse, Predicate,
    RawListQuery, SqlListQuery, paginate, qualify, set_filter, set_pagination,
    spec::DEFAULT_ORDER_BY,
};
use crate::models::District;

pub const TABLE: &str = "district";

pub const FILTER_KEYS: &[FilterKey] = &[FilterKey::new("provinceCode", FilterKind::Text)];

pub const SORTABLE: &[&str] = &["code", "name", "ghnRefId"];

pub fn base_select() -> SelectStatement {
    let mut select = Query::select();
    select
        .column((Alias::new(TABLE), Asterisk))
        .from(Alias::new(TABLE));
    select
}

/// Apply a district listing request. Districts sort by name unless told otherwise.
pub fn compose<B: ListBuilder>(builder: &mut B, spec: &ListQuerySpec) -> AppResult<()> {
    set_filter(builder, spec, TABLE, "provinceCode", &["provinceCode"]);

    let mut sort = spec.clone();
    if sort.order_by == DEFAULT_ORDER_BY {
        sort.order_by = "name".to_string();
    }
    sort.ensure_sortable(SORTABLE)?;

    // Districts are keyed by code, so ties break on code rather than id.
    let column = qualify(TABLE, &sort.order_by);
    builder.order_by(&column, sort.order_direction);
    let tie_break = format!("{TABLE}.code");
    if column != tie_break {
        builder.order_by(&tie_break, sort.order_direction);
    }

    set_pagination(builder, spec);
    Ok(())
}

/// Location service.
#[derive(Clone)]
pub struct LocationService {
    pool: PgPool,
}

impl LocationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_district(&self, code: &str) -> AppResult<District> {
        let mut query = SqlListQuery::<District>::new(self.pool.clone(), base_select());
        query.and_where(Predicate::Eq {
            column: format!("{TABLE}.code"),
            value: FilterScalar::Text(code.to_string()),
        });

        query
            .fetch_optional()
            .await?
            .ok_or(AppError::NotFound("district"))
    }

    pub async fn get_districts(
        &self,
        raw: &RawListQuery,
    ) -> AppResult<PaginatedResponse<District>> {
        let spec = ListQuerySpec::parse(raw, FILTER_KEYS)?;
        let mut query = SqlListQuery::<District>::new(self.pool.clone(), base_select());
        compose(&mut query, &spec)?;
        paginate(&query, &spec).await
    }
}
