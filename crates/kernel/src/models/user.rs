//! User, role and website models.

use anyhow::Result;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User record.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,

    pub email: String,

    pub username: String,

    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password: String,

    pub first_name: String,

    pub last_name: String,

    pub website_id: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Verify a password against the stored hash.
    pub fn verify_password(&self, password: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.password) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Role record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: i64,
    pub slug: String,
    pub name: String,
}

impl Role {
    pub const ROOT: &'static str = "ROOT";
    pub const ADMIN: &'static str = "ADMIN";
}

/// Assignment of a role to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserRoleMapping {
    pub user_id: i64,
    pub role_id: i64,
}

/// Website record. `url` holds the bare domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Website {
    pub id: i64,
    pub url: String,
    pub name: String,
}

/// The authenticated user on whose behalf a service call runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub website_id: i64,
}

/// How a single user is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    Id(i64),
    Email(String),
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
