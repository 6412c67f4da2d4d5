//! Query-builder handle used by the list composer.
//!
//! [`ListBuilder`] is the minimal capability set the composer depends on.
//! [`SqlListQuery`] implements it over a sea-query `SelectStatement`,
//! executing through sqlx with every value bound as a parameter.

use std::marker::PhantomData;

use async_trait::async_trait;
use sea_query::{
    Alias, Asterisk, ConditionalStatement, Expr, ExprTrait, Order, OrderedStatement,
    PostgresQueryBuilder, Query, QueryStatementWriter, SelectStatement, SimpleExpr, Values,
};
use sqlx::PgPool;
use sqlx::postgres::PgRow;
use tracing::debug;

use super::spec::{FilterScalar, OrderDirection};
use crate::db::bind_values;
use crate::error::AppResult;

/// A row-selection condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Eq {
        column: String,
        value: FilterScalar,
    },
    In {
        column: String,
        values: Vec<FilterScalar>,
    },
    IsNull {
        column: String,
    },
    /// Matches no rows.
    Nothing,
}

/// Mutable query handle: paging, conditions, ordering and execution.
#[async_trait]
pub trait ListBuilder: Send + Sync {
    type Row: Send;

    fn skip(&mut self, offset: u64);

    fn take(&mut self, limit: u64);

    fn and_where(&mut self, predicate: Predicate);

    fn order_by(&mut self, column: &str, direction: OrderDirection);

    /// Fetch the current page and the total count of rows matching the
    /// conditions, ignoring skip/take for the count.
    async fn get_many_and_count(&self) -> AppResult<(Vec<Self::Row>, u64)>;
}

/// Validate a SQL identifier name (table/column names).
/// Allows only `[a-zA-Z_][a-zA-Z0-9_]*` with max 63 chars (PostgreSQL limit).
pub fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
}

/// Validate a column path: `column` or `table.column`.
pub fn is_safe_column(path: &str) -> bool {
    match path.split_once('.') {
        Some((table, column)) => is_safe_identifier(table) && is_safe_identifier(column),
        None => is_safe_identifier(path),
    }
}

fn column_expr(column: &str) -> SimpleExpr {
    match column.split_once('.') {
        Some((table, field)) => Expr::col((Alias::new(table), Alias::new(field))).into(),
        None => Expr::col(Alias::new(column)).into(),
    }
}

fn condition(predicate: Predicate) -> SimpleExpr {
    match predicate {
        Predicate::Eq { column, value } => column_expr(&column).eq(sea_query::Value::from(value)),
        Predicate::In { column, values } => {
            column_expr(&column).is_in(values.into_iter().map(sea_query::Value::from))
        }
        Predicate::IsNull { column } => column_expr(&column).is_null(),
        Predicate::Nothing => Expr::cust("FALSE"),
    }
}

/// Largest LIMIT/OFFSET PostgreSQL accepts.
const MAX_BIGINT: u64 = i64::MAX as u64;

/// PostgreSQL list query.
///
/// Skip and take are held aside and only applied to the page query, so the
/// count always runs against the filtered, unpaginated statement.
pub struct SqlListQuery<T> {
    pool: PgPool,
    select: SelectStatement,
    offset: u64,
    limit: Option<u64>,
    _row: PhantomData<fn() -> T>,
}

impl<T> SqlListQuery<T> {
    /// Wrap a base statement (selected columns, FROM and JOINs).
    pub fn new(pool: PgPool, select: SelectStatement) -> Self {
        Self {
            pool,
            select,
            offset: 0,
            limit: None,
            _row: PhantomData,
        }
    }

    /// SQL and parameters for the current page.
    pub fn page_sql(&self) -> (String, Values) {
        self.paged().build(PostgresQueryBuilder)
    }

    /// SQL and parameters counting every matching row.
    pub fn count_sql(&self) -> (String, Values) {
        let mut inner = self.select.clone();
        inner.clear_order_by();
        Query::select()
            .expr(Expr::col(Asterisk).count())
            .from_subquery(inner, Alias::new("listed"))
            .build(PostgresQueryBuilder)
    }

    /// Page SQL with parameters inlined, for logging and tests.
    pub fn to_debug_string(&self) -> String {
        self.paged().to_string(PostgresQueryBuilder)
    }

    /// The base statement with skip and take applied, clamped to BIGINT.
    fn paged(&self) -> SelectStatement {
        let mut query = self.select.clone();
        if self.offset > 0 {
            query.offset(self.offset.min(MAX_BIGINT));
        }
        if let Some(limit) = self.limit {
            query.limit(limit.min(MAX_BIGINT));
        }
        query
    }
}

impl<T> SqlListQuery<T>
where
    T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
{
    /// Fetch the first row matching the current conditions.
    pub async fn fetch_optional(&self) -> AppResult<Option<T>> {
        let (sql, values) = self.page_sql();
        debug!(sql = %sql, params = values.0.len(), "executing lookup query");

        let row = sqlx::query_as_with(&sql, bind_values(values)?)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl<T> ListBuilder for SqlListQuery<T>
where
    T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
{
    type Row = T;

    fn skip(&mut self, offset: u64) {
        self.offset = offset;
    }

    fn take(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    fn and_where(&mut self, predicate: Predicate) {
        self.select.and_where(condition(predicate));
    }

    fn order_by(&mut self, column: &str, direction: OrderDirection) {
        let order = match direction {
            OrderDirection::Asc => Order::Asc,
            OrderDirection::Desc => Order::Desc,
        };
        match column.split_once('.') {
            Some((table, field)) => {
                self.select
                    .order_by((Alias::new(table), Alias::new(field)), order);
            }
            None => {
                self.select.order_by(Alias::new(column), order);
            }
        }
    }

    async fn get_many_and_count(&self) -> AppResult<(Vec<T>, u64)> {
        let (count_sql, count_values) = self.count_sql();
        let (page_sql, page_values) = self.page_sql();
        debug!(sql = %page_sql, params = page_values.0.len(), "executing list query");

        // Count and page must observe the same snapshot.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;
        sqlx::query("SET LOCAL statement_timeout = '10s'")
            .execute(&mut *tx)
            .await?;

        let total: i64 = sqlx::query_scalar_with(&count_sql, bind_values(count_values)?)
            .fetch_one(&mut *tx)
            .await?;
        let rows: Vec<T> = sqlx::query_as_with(&page_sql, bind_values(page_values)?)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok((rows, u64::try_from(total).unwrap_or(0)))
    }
}
