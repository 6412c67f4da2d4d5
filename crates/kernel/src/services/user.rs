//! User listing and lookup.

use sea_query::{Alias, Asterisk, Query, SelectStatement};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::listing::{
    FilterKey, FilterKind, FilterScalar, ListBuilder, ListQuerySpec, PaginatedResponse, Predicate,
    RawListQuery, SqlListQuery, paginate, set_filter, set_pagination, set_sorting,
};
use crate::models::{Role, User, UserLookup};

/// Alias of the listed table.
pub const TABLE: &str = "users";

/// Filters accepted by user listings.
pub const FILTER_KEYS: &[FilterKey] = &[
    FilterKey::new("websiteId", FilterKind::Integer),
    FilterKey::new("email", FilterKind::Text),
    FilterKey::new("username", FilterKind::Text),
];

/// Fields user listings may be ordered by.
pub const SORTABLE: &[&str] = &[
    "id",
    "email",
    "username",
    "firstName",
    "lastName",
    "createdAt",
    "updatedAt",
];

pub fn base_select() -> SelectStatement {
    let mut select = Query::select();
    select
        .column((Alias::new(TABLE), Asterisk))
        .from(Alias::new(TABLE));
    select
}

/// Apply a user listing request: filters, sorting, pagination.
pub fn compose<B: ListBuilder>(builder: &mut B, spec: &ListQuerySpec) -> AppResult<()> {
    set_filter(builder, spec, TABLE, "websiteId", &["websiteId"]);
    set_filter(builder, spec, TABLE, "email", &["email"]);
    set_filter(builder, spec, TABLE, "username", &["username"]);

    spec.ensure_sortable(SORTABLE)?;
    set_sorting(builder, spec, TABLE)?;
    set_pagination(builder, spec);
    Ok(())
}

/// User service.
#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find one user.
    pub async fn get(&self, lookup: UserLookup) -> AppResult<User> {
        let mut query = SqlListQuery::<User>::new(self.pool.clone(), base_select());
        query.and_where(match lookup {
            UserLookup::Id(id) => Predicate::Eq {
                column: format!("{TABLE}.id"),
                value: FilterScalar::Int(id),
            },
            UserLookup::Email(email) => Predicate::Eq {
                column: format!("{TABLE}.email"),
                value: FilterScalar::Text(email),
            },
        });

        query.fetch_optional().await?.ok_or(AppError::NotFound("user"))
    }

    /// List users for a raw request.
    pub async fn get_all(&self, raw: &RawListQuery) -> AppResult<PaginatedResponse<User>> {
        let spec = ListQuerySpec::parse(raw, FILTER_KEYS)?;
        let mut query = SqlListQuery::<User>::new(self.pool.clone(), base_select());
        compose(&mut query, &spec)?;
        paginate(&query, &spec).await
    }

    /// Roles assigned to a user, by slug.
    pub async fn roles(&self, user_id: i64) -> AppResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.* FROM role r
            INNER JOIN user_role_mapping m ON m.role_id = r.id
            WHERE m.user_id = $1
            ORDER BY r.slug
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }
}
