//! Algolia REST client for one index.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::{SearchBridge, SearchError, SearchIndex, SearchRecord, SearchResponse};
use crate::config::AlgoliaConfig;

/// Algolia caps a single page of hits at 1000.
const MAX_HITS: u32 = 1000;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    restrict_searchable_attributes: &'a [String],
    attributes_to_retrieve: [&'static str; 1],
    hits_per_page: u32,
}

/// Search bridge and index writer backed by one Algolia index.
#[derive(Clone)]
pub struct AlgoliaSearch {
    client: reqwest::Client,
    app_id: String,
    api_key: String,
    index: String,
    read_host: String,
    write_host: String,
}

impl AlgoliaSearch {
    pub fn new(config: &AlgoliaConfig, index: &str, timeout: Duration) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let host_id = config.app_id.to_ascii_lowercase();

        Ok(Self {
            client,
            app_id: config.app_id.clone(),
            api_key: config.api_key.clone(),
            index: index.to_string(),
            read_host: format!("https://{host_id}-dsn.algolia.net"),
            write_host: format!("https://{host_id}.algolia.net"),
        })
    }

    /// Point both read and write traffic at `host` (used against local stubs).
    pub fn with_host(mut self, host: &str) -> Self {
        self.read_host = host.trim_end_matches('/').to_string();
        self.write_host = self.read_host.clone();
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn endpoint(&self, host: &str, segments: &[&str]) -> Result<Url, SearchError> {
        let mut url = Url::parse(host)?;
        url.path_segments_mut()
            .map_err(|()| SearchError::Endpoint(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .extend(["1", "indexes", self.index.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("X-Algolia-Application-Id", &self.app_id)
            .header("X-Algolia-API-Key", &self.api_key)
    }

    fn check(response: &reqwest::Response) -> Result<(), SearchError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SearchError::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl SearchBridge for AlgoliaSearch {
    async fn search(&self, term: &str, fields: &[String]) -> Result<SearchResponse, SearchError> {
        let url = self.endpoint(&self.read_host, &["query"])?;
        let body = QueryBody {
            query: term,
            restrict_searchable_attributes: fields,
            attributes_to_retrieve: ["objectID"],
            hits_per_page: MAX_HITS,
        };

        debug!(index = %self.index, term, ?fields, "querying search index");

        let response = self
            .authorize(self.client.post(url))
            .json(&body)
            .send()
            .await?;
        Self::check(&response)?;
        Ok(response.json::<SearchResponse>().await?)
    }
}

#[async_trait]
impl SearchIndex for AlgoliaSearch {
    async fn save(&self, record: SearchRecord) -> Result<(), SearchError> {
        let url = self.endpoint(&self.write_host, &[record.object_id.as_str()])?;
        let response = self
            .authorize(self.client.put(url))
            .json(&record)
            .send()
            .await?;
        Self::check(&response)
    }

    async fn remove(&self, object_id: &str) -> Result<(), SearchError> {
        let url = self.endpoint(&self.write_host, &[object_id])?;
        let response = self.authorize(self.client.delete(url)).send().await?;
        Self::check(&response)
    }
}
