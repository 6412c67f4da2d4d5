//! Category models.
//!
//! Categories form a tree through `parent_id`. A category row always comes
//! back with its parent summary, its direct children and its group, all
//! resolved by the listing query itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// Category record with its resolved relations.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,

    /// Unique slug.
    pub code: String,

    pub name: String,

    /// Parent category (NULL for roots).
    pub parent_id: Option<i64>,

    pub category_group_id: i64,

    pub website_id: i64,

    /// Thumbnail image reference.
    pub thumbnail_id: Option<i64>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub parent: Option<Json<CategorySummary>>,

    /// Direct children ordered by id.
    pub children: Json<Vec<CategorySummary>>,

    pub category_group: Json<CategoryGroupSummary>,
}

impl Category {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn group_name(&self) -> &str {
        &self.category_group.name
    }
}

/// Minimal view of a related category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub parent_id: Option<i64>,
}

/// Minimal view of a category group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryGroupSummary {
    pub id: i64,
    pub code: String,
    pub name: String,
}

/// Input for creating a category.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategory {
    /// Derived from `name` when absent.
    pub code: Option<String>,
    pub name: String,
    pub parent_id: Option<i64>,
    pub category_group_id: i64,
    /// Defaults to the acting user's website.
    pub website_id: Option<i64>,
    pub thumbnail_id: Option<i64>,
}

/// Input for updating a category. Only these fields are ever changed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub category_group_id: Option<i64>,
    pub thumbnail_id: Option<i64>,
}

impl UpdateCategory {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.category_group_id.is_none() && self.thumbnail_id.is_none()
    }
}

/// How a single category is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryLookup {
    Id(i64),
    Code(String),
}
