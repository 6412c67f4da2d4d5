//! Bootstrap accounts.
//!
//! The seeder upserts one account per [`SeedUser`] and resets its role
//! mappings. Records are processed concurrently; one failing record does not
//! stop the others.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::user::hash_password;
use crate::models::{Role, Website};

/// An account to create or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedUser {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Matched against `website.url`.
    pub website_domain: String,
    pub role_slugs: Vec<String>,
}

impl SeedUser {
    /// `root@{domain}` with ROOT and ADMIN.
    pub fn root(domain: &str, password: &str) -> Self {
        Self {
            email: format!("root@{domain}"),
            username: format!("root_{}", domain.replace('.', "_")),
            password: password.to_string(),
            first_name: "Root".to_string(),
            last_name: "Account".to_string(),
            website_domain: domain.to_string(),
            role_slugs: vec![Role::ROOT.to_string(), Role::ADMIN.to_string()],
        }
    }

    /// `admin@{domain}` with ADMIN.
    pub fn admin(domain: &str, password: &str) -> Self {
        Self {
            email: format!("admin@{domain}"),
            username: format!("admin_{}", domain.replace('.', "_")),
            password: password.to_string(),
            first_name: "Admin".to_string(),
            last_name: domain.to_string(),
            website_domain: domain.to_string(),
            role_slugs: vec![Role::ADMIN.to_string()],
        }
    }
}

/// Accounts described by the configuration.
///
/// Admin accounts use `SEED_ADMIN_PASSWORD`, falling back to the root
/// password.
pub fn seed_users(config: &Config) -> Result<Vec<SeedUser>> {
    let mut users = Vec::new();

    if let Some(domain) = &config.root_website_domain {
        let password = config
            .root_account_password
            .as_deref()
            .context("ROOT_ACCOUNT_PASSWORD is required to seed the root account")?;
        users.push(SeedUser::root(domain, password));
    }

    if !config.seed_admin_domains.is_empty() {
        let password = config
            .seed_admin_password
            .as_deref()
            .or(config.root_account_password.as_deref())
            .context("SEED_ADMIN_PASSWORD or ROOT_ACCOUNT_PASSWORD is required to seed admins")?;
        for domain in &config.seed_admin_domains {
            users.push(SeedUser::admin(domain, password));
        }
    }

    Ok(users)
}

/// Seeds and drops bootstrap accounts.
#[derive(Clone)]
pub struct UserSeeder {
    pool: PgPool,
}

impl UserSeeder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert every record concurrently. Returns the IDs of the seeded users.
    ///
    /// All records are attempted; if any failed, the first failure is returned
    /// once the rest have finished.
    pub async fn seed(&self, users: Vec<SeedUser>) -> Result<Vec<i64>> {
        let roles: Arc<[Role]> = sqlx::query_as::<_, Role>("SELECT * FROM role")
            .fetch_all(&self.pool)
            .await
            .context("failed to load roles")?
            .into();
        let websites: Arc<[Website]> =
            sqlx::query_as::<_, Website>("SELECT id, url, name FROM website")
                .fetch_all(&self.pool)
                .await
                .context("failed to load websites")?
                .into();

        let mut tasks = JoinSet::new();
        for user in users {
            let pool = self.pool.clone();
            let roles = Arc::clone(&roles);
            let websites = Arc::clone(&websites);
            tasks.spawn(async move {
                let email = user.email.clone();
                let result = upsert_user(&pool, user, &roles, &websites).await;
                (email, result)
            });
        }

        let mut seeded = Vec::new();
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let (email, result) = joined.context("seed task panicked")?;
            match result {
                Ok(id) => {
                    info!(%email, id, "seeded user");
                    seeded.push(id);
                }
                Err(e) => {
                    warn!(%email, error = %e, "failed to seed user");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(seeded),
        }
    }

    /// Delete every user and role mapping.
    pub async fn drop_all(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM user_role_mapping")
            .execute(&mut *tx)
            .await
            .context("failed to delete role mappings")?;
        let deleted = sqlx::query("DELETE FROM users")
            .execute(&mut *tx)
            .await
            .context("failed to delete users")?
            .rows_affected();
        tx.commit().await?;

        info!(deleted, "dropped seeded users");
        Ok(deleted)
    }
}

/// Role IDs whose slug the record asks for. Unknown slugs are skipped.
fn role_ids_for(user: &SeedUser, roles: &[Role]) -> Vec<i64> {
    roles
        .iter()
        .filter(|role| user.role_slugs.contains(&role.slug))
        .map(|role| role.id)
        .collect()
}

async fn upsert_user(
    pool: &PgPool,
    user: SeedUser,
    roles: &[Role],
    websites: &[Website],
) -> Result<i64> {
    let website = websites
        .iter()
        .find(|w| w.url == user.website_domain)
        .with_context(|| format!("website with domain {} not found", user.website_domain))?;
    let password = hash_password(&user.password)?;

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(&user.email)
        .fetch_optional(pool)
        .await
        .context("failed to look up user")?;

    let user_id = match existing {
        Some(id) => {
            sqlx::query(
                r#"
                UPDATE users SET
                    username = $2, password = $3, first_name = $4, last_name = $5,
                    website_id = $6, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&user.username)
            .bind(&password)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(website.id)
            .execute(pool)
            .await
            .context("failed to update user")?;
            id
        }
        None => sqlx::query_scalar(
            r#"
            INSERT INTO users (email, username, password, first_name, last_name, website_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(&password)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(website.id)
        .fetch_one(pool)
        .await
        .context("failed to insert user")?,
    };

    let role_ids = role_ids_for(&user, roles);

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM user_role_mapping WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("failed to clear role mappings")?;
    sqlx::query(
        "INSERT INTO user_role_mapping (user_id, role_id) SELECT $1, UNNEST($2::BIGINT[])",
    )
    .bind(user_id)
    .bind(&role_ids)
    .execute(&mut *tx)
    .await
    .context("failed to insert role mappings")?;
    tx.commit().await?;

    Ok(user_id)
}
