//! Post model.
//!
//! Posts move between DRAFT, PUBLISHED and UNPUBLISHED. Deleting a post only
//! stamps `deleted_at`; the status is left as it was.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Publication status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
    Unpublished,
}

impl PostStatus {
    /// Values accepted by the `statuses` list filter.
    pub const ALL: &'static [&'static str] = &["DRAFT", "PUBLISHED", "UNPUBLISHED"];

    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "DRAFT",
            PostStatus::Published => "PUBLISHED",
            PostStatus::Unpublished => "UNPUBLISHED",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for PostStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "DRAFT" => Ok(PostStatus::Draft),
            "PUBLISHED" => Ok(PostStatus::Published),
            "UNPUBLISHED" => Ok(PostStatus::Unpublished),
            _ => Err(format!("unknown post status '{value}'")),
        }
    }
}

/// Post record.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,

    /// Unique slug.
    pub code: String,

    pub title: String,

    pub content: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: PostStatus,

    pub category_id: Option<i64>,

    pub website_id: i64,

    /// Avatar image reference.
    pub avatar_image_id: Option<i64>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Set when soft-deleted.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input for creating a post.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePost {
    /// Derived from `title` when absent.
    pub code: Option<String>,
    pub title: String,
    pub content: Option<String>,
    /// Accepted for compatibility and ignored: new posts start as DRAFT.
    pub status: Option<PostStatus>,
    pub category_id: Option<i64>,
    pub avatar_image_id: Option<i64>,
}

/// Input for updating a post. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePost {
    pub code: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<i64>,
    pub avatar_image_id: Option<i64>,
}

impl UpdatePost {
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.title.is_none()
            && self.content.is_none()
            && self.category_id.is_none()
            && self.avatar_image_id.is_none()
    }
}

/// How a single post is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostLookup {
    Id(i64),
    Code(String),
}

/// Selects the posts touched by a bulk status change. Criteria are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFilter {
    #[serde(default)]
    pub ids: Vec<i64>,
    pub website_id: Option<i64>,
    pub category_id: Option<i64>,
}

impl PostFilter {
    pub fn by_id(id: i64) -> Self {
        Self {
            ids: vec![id],
            ..Default::default()
        }
    }

    /// An empty filter would match every post.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.website_id.is_none() && self.category_id.is_none()
    }
}
