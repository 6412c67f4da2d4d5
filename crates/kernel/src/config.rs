//! Configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Algolia credentials. Search is disabled when either is missing.
    pub algolia: Option<AlgoliaConfig>,

    /// Timeout applied to every search request (default: 5s).
    pub search_timeout: Duration,

    /// Domain of the website that owns the root account.
    pub root_website_domain: Option<String>,

    /// Password for the seeded root account.
    pub root_account_password: Option<String>,

    /// Website domains that get a seeded admin account (comma-separated).
    pub seed_admin_domains: Vec<String>,

    /// Password for seeded admin accounts (falls back to the root password).
    pub seed_admin_password: Option<String>,
}

/// Algolia application settings.
#[derive(Debug, Clone)]
pub struct AlgoliaConfig {
    pub app_id: String,
    pub api_key: String,
    /// Index holding category records (default: "categories").
    pub category_index: String,
    /// Index holding post records (default: "posts").
    pub post_index: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let algolia = match (env::var("ALGOLIA_APP_ID"), env::var("ALGOLIA_API_KEY")) {
            (Ok(app_id), Ok(api_key)) if !app_id.is_empty() && !api_key.is_empty() => {
                Some(AlgoliaConfig {
                    app_id,
                    api_key,
                    category_index: env::var("ALGOLIA_CATEGORY_INDEX")
                        .unwrap_or_else(|_| "categories".to_string()),
                    post_index: env::var("ALGOLIA_POST_INDEX")
                        .unwrap_or_else(|_| "posts".to_string()),
                })
            }
            _ => None,
        };

        let search_timeout_secs: u64 = env::var("SEARCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .context("SEARCH_TIMEOUT_SECS must be a valid u64")?;

        let root_website_domain = non_empty_var("ROOT_WEBSITE_DOMAIN");
        let root_account_password = non_empty_var("ROOT_ACCOUNT_PASSWORD");

        let seed_admin_domains = env::var("SEED_ADMIN_DOMAINS")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let seed_admin_password = non_empty_var("SEED_ADMIN_PASSWORD");

        Ok(Self {
            database_url,
            database_max_connections,
            algolia,
            search_timeout: Duration::from_secs(search_timeout_secs),
            root_website_domain,
            root_account_password,
            seed_admin_domains,
            seed_admin_password,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
