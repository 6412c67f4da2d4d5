//! Search bridge.
//!
//! Free-text search is delegated to an external index. The list composer
//! only needs [`SearchBridge`], which maps a term to matching object IDs;
//! services that own indexed records also push changes through
//! [`SearchIndex`].

mod algolia;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use algolia::AlgoliaSearch;

use crate::config::{AlgoliaConfig, Config};

/// Errors from the external search service.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search is not configured")]
    NotConfigured,

    #[error("search request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("search service returned status {0}")]
    Status(u16),

    #[error("invalid search endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// One matching record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "objectID")]
    pub object_id: String,
}

/// Search result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

/// A record pushed to the search index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRecord {
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl SearchRecord {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            attributes: serde_json::Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// Free-text lookup returning matching object IDs.
#[async_trait]
pub trait SearchBridge: Send + Sync {
    /// Search `term`, restricted to `fields` when non-empty.
    async fn search(&self, term: &str, fields: &[String]) -> Result<SearchResponse, SearchError>;
}

/// Write side of the search index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn save(&self, record: SearchRecord) -> Result<(), SearchError>;

    async fn remove(&self, object_id: &str) -> Result<(), SearchError>;
}

/// Stand-in used when no search service is configured.
///
/// Searches fail with [`SearchError::NotConfigured`]; index writes are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSearch;

#[async_trait]
impl SearchBridge for DisabledSearch {
    async fn search(&self, _term: &str, _fields: &[String]) -> Result<SearchResponse, SearchError> {
        Err(SearchError::NotConfigured)
    }
}

#[async_trait]
impl SearchIndex for DisabledSearch {
    async fn save(&self, record: SearchRecord) -> Result<(), SearchError> {
        debug!(object_id = %record.object_id, "search disabled; skipping index save");
        Ok(())
    }

    async fn remove(&self, object_id: &str) -> Result<(), SearchError> {
        debug!(object_id, "search disabled; skipping index removal");
        Ok(())
    }
}

/// Which configured index a service searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexName {
    Categories,
    Posts,
}

impl IndexName {
    fn resolve(self, config: &AlgoliaConfig) -> &str {
        match self {
            IndexName::Categories => &config.category_index,
            IndexName::Posts => &config.post_index,
        }
    }
}

/// Read and write sides of one search index.
#[derive(Clone)]
pub struct SearchHandle {
    pub bridge: Arc<dyn SearchBridge>,
    pub index: Arc<dyn SearchIndex>,
}

impl SearchHandle {
    pub fn disabled() -> Self {
        Self::from_backend(DisabledSearch)
    }

    pub fn from_backend<T>(backend: T) -> Self
    where
        T: SearchBridge + SearchIndex + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            bridge: backend.clone(),
            index: backend,
        }
    }

    /// Algolia when credentials are configured, otherwise disabled.
    pub fn from_config(config: &Config, name: IndexName) -> Result<Self, SearchError> {
        match &config.algolia {
            Some(algolia) => {
                let backend =
                    AlgoliaSearch::new(algolia, name.resolve(algolia), config.search_timeout)?;
                Ok(Self::from_backend(backend))
            }
            None => {
                debug!(?name, "search not configured");
                Ok(Self::disabled())
            }
        }
    }
}

/// Push a record to the index without waiting. Failures are logged.
pub fn save_in_background(index: Arc<dyn SearchIndex>, record: SearchRecord) {
    tokio::spawn(async move {
        let object_id = record.object_id.clone();
        if let Err(e) = index.save(record).await {
            warn!(object_id = %object_id, error = %e, "failed to index record");
        }
    });
}

/// Remove a record from the index without waiting. Failures are logged.
pub fn remove_in_background(index: Arc<dyn SearchIndex>, object_id: String) {
    tokio::spawn(async move {
        if let Err(e) = index.remove(&object_id).await {
            warn!(object_id = %object_id, error = %e, "failed to remove indexed record");
        }
    });
}
