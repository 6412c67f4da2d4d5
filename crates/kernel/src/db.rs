//! Database connection pool management.

use anyhow::{Context, Result};
use sea_query::{Value, Values};
use sqlx::Arguments;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};

use crate::config::Config;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    Ok(pool)
}

/// Check if the database connection is healthy.
pub async fn check_health(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

/// Apply pending schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to run migrations")?;

    Ok(())
}

/// Convert values collected by sea-query into bound PostgreSQL arguments.
///
/// Only the value types the list engine produces are supported.
pub fn bind_values(values: Values) -> Result<PgArguments> {
    let mut args = PgArguments::default();
    for value in values.0 {
        let added = match value {
            Value::Bool(v) => args.add(v),
            Value::SmallInt(v) => args.add(v),
            Value::Int(v) => args.add(v),
            Value::BigInt(v) => args.add(v),
            // LIMIT and OFFSET arrive unsigned; PostgreSQL only has BIGINT.
            Value::BigUnsigned(v) => {
                let v = v
                    .map(i64::try_from)
                    .transpose()
                    .context("query parameter out of BIGINT range")?;
                args.add(v)
            }
            Value::Double(v) => args.add(v),
            Value::String(v) => args.add(v.as_deref().map(ToString::to_string)),
            other => anyhow::bail!("unsupported query parameter: {other:?}"),
        };
        added.map_err(|e| anyhow::anyhow!("failed to bind query parameter: {e}"))?;
    }
    Ok(args)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn binds_list_engine_values() {
        let values = Values(vec![
            Value::BigInt(Some(7)),
            Value::String(Some(Box::new("lakes".to_string()))),
            Value::Bool(Some(true)),
            Value::String(None),
        ]);
        let args = bind_values(values).unwrap();
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn binds_limit_and_offset() {
        let values = Values(vec![Value::BigUnsigned(Some(10)), Value::BigUnsigned(Some(20))]);
        let args = bind_values(values).unwrap();
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn rejects_unsigned_beyond_bigint() {
        let values = Values(vec![Value::BigUnsigned(Some(u64::MAX))]);
        assert!(bind_values(values).is_err());
    }

    #[test]
    fn rejects_unsupported_values() {
        let values = Values(vec![Value::Char(Some('x'))]);
        assert!(bind_values(values).is_err());
    }
}
