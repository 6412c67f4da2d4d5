//! Placard command line.
//!
//! Runs listings against the configured database and manages bootstrap
//! accounts.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use placard_kernel::config::Config;
use placard_kernel::db;
use placard_kernel::listing::RawListQuery;
use placard_kernel::search::{IndexName, SearchHandle};
use placard_kernel::seed::{UserSeeder, seed_users};
use placard_kernel::services::{CategoryService, LocationService, PostService, UserService};

#[derive(Debug, Parser)]
#[command(name = "placard", version, about = "Listing and seeding tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print one page of a resource as JSON.
    List {
        resource: Resource,
        /// URL query string, e.g. `page=2&limit=10&orderBy=name`.
        #[arg(default_value = "")]
        query: String,
    },
    /// Apply pending migrations.
    Migrate,
    /// Create or refresh the configured bootstrap accounts.
    Seed,
    /// Delete all users and role mappings.
    Unseed,
    /// Check the database connection.
    Health,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Resource {
    Categories,
    CategoryRoots,
    Posts,
    Users,
    Districts,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    let pool = db::create_pool(&config).await?;

    match cli.command {
        Command::List { resource, query } => {
            let raw = RawListQuery::from_query_string(query.trim_start_matches('?'));
            list(&config, pool, resource, &raw).await?;
        }
        Command::Migrate => {
            db::run_migrations(&pool).await?;
            info!("migrations applied");
        }
        Command::Seed => {
            let users = seed_users(&config)?;
            let seeded = UserSeeder::new(pool).seed(users).await?;
            info!(count = seeded.len(), "seeding complete");
        }
        Command::Unseed => {
            let deleted = UserSeeder::new(pool).drop_all().await?;
            info!(deleted, "unseeding complete");
        }
        Command::Health => {
            if db::check_health(&pool).await {
                println!("ok");
            } else {
                anyhow::bail!("database health check failed");
            }
        }
    }

    Ok(())
}

async fn list(
    config: &Config,
    pool: sqlx::PgPool,
    resource: Resource,
    raw: &RawListQuery,
) -> Result<()> {
    match resource {
        Resource::Categories | Resource::CategoryRoots => {
            let search = SearchHandle::from_config(config, IndexName::Categories)?;
            let service = CategoryService::new(pool, search);
            let page = if matches!(resource, Resource::CategoryRoots) {
                service.get_roots(raw).await?
            } else {
                service.get_all(raw).await?
            };
            print_json(&page)
        }
        Resource::Posts => {
            let search = SearchHandle::from_config(config, IndexName::Posts)?;
            let service = PostService::new(pool).with_search(search);
            print_json(&service.get_all(raw).await?)
        }
        Resource::Users => print_json(&UserService::new(pool).get_all(raw).await?),
        Resource::Districts => print_json(&LocationService::new(pool).get_districts(raw).await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize response")?;
    println!("{json}");
    Ok(())
}

/// Initialize the tracing subscriber.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    // Logs go to stderr so `list` output stays pipeable.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
