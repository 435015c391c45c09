// [libs/infra/pipeline/src/fetcher.rs]
//! Streaming CT-log producer (a producer/consumer pair feeding a
//! shard's pipeline), plus the `get-sth` lookup the auto-sharding
//! tier table needs when a job leaves `index_end` at zero.

use std::time::Duration;

use async_trait::async_trait;
use certslurp_domain_models::RawLogEntry;
use serde::Deserialize;
use tracing::instrument;

use crate::errors::PipelineError;

/// A CT log's signed tree head, as returned by `get-sth`.
#[derive(Debug, Clone, Copy)]
pub struct TreeHead {
    pub tree_size: u64,
}

/// The per-shard producer contract: fetch a window of entries, or the
/// log's current size. Implementations may be network clients (used
/// in production) or fixtures (used in tests).
#[async_trait]
pub trait CtLogFetcher: Send + Sync {
    async fn get_sth(&self) -> Result<TreeHead, PipelineError>;

    /// Fetches `[start, end)`, inclusive-exclusive like every other
    /// index range in this system; the RFC 6962 API itself is
    /// inclusive-inclusive, so the HTTP implementation subtracts one
    /// from `end` before calling out.
    async fn get_entries(&self, start: u64, end: u64) -> Result<Vec<RawLogEntry>, PipelineError>;
}

/// Talks to a real CT log's `ct/v1/get-entries` and `ct/v1/get-sth`
/// endpoints (RFC 6962).
pub struct HttpCtLogFetcher {
    client: reqwest::Client,
    log_uri: String,
}

impl HttpCtLogFetcher {
    pub fn new(log_uri: impl Into<String>) -> Self {
        HttpCtLogFetcher {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent("certslurp-worker/0.1")
                .build()
                .expect("static reqwest client config must build"),
            log_uri: log_uri.into(),
        }
    }
}

#[derive(Deserialize)]
struct GetSthResponse {
    tree_size: u64,
}

#[derive(Deserialize)]
struct GetEntriesResponse {
    entries: Vec<GetEntriesEntry>,
}

#[derive(Deserialize)]
struct GetEntriesEntry {
    leaf_input: String,
    extra_data: String,
}

#[async_trait]
impl CtLogFetcher for HttpCtLogFetcher {
    #[instrument(skip(self))]
    async fn get_sth(&self) -> Result<TreeHead, PipelineError> {
        let url = format!("{}/ct/v1/get-sth", self.log_uri.trim_end_matches('/'));
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(PipelineError::FetchMalformed(format!(
                "get-sth returned status {}",
                response.status()
            )));
        }
        let body: GetSthResponse = response.json().await?;
        Ok(TreeHead { tree_size: body.tree_size })
    }

    #[instrument(skip(self))]
    async fn get_entries(&self, start: u64, end: u64) -> Result<Vec<RawLogEntry>, PipelineError> {
        if end <= start {
            return Ok(Vec::new());
        }
        let url = format!(
            "{}/ct/v1/get-entries?start={}&end={}",
            self.log_uri.trim_end_matches('/'),
            start,
            end - 1
        );
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(PipelineError::FetchMalformed(format!(
                "get-entries returned status {}",
                response.status()
            )));
        }
        let body: GetEntriesResponse = response.json().await?;

        body.entries
            .into_iter()
            .enumerate()
            .map(|(offset, entry)| {
                use base64::{engine::general_purpose::STANDARD, Engine as _};
                Ok(RawLogEntry {
                    index: start + offset as u64,
                    leaf_input: STANDARD
                        .decode(entry.leaf_input)
                        .map_err(|e| PipelineError::FetchMalformed(e.to_string()))?,
                    extra_data: STANDARD
                        .decode(entry.extra_data)
                        .map_err(|e| PipelineError::FetchMalformed(e.to_string()))?,
                })
            })
            .collect()
    }
}

/// A fixed in-memory log, used by tests and by `raw`/`passthrough`/`null`
/// smoke runs so a shard processor can be exercised without a network.
pub struct InMemoryCtLogFetcher {
    entries: Vec<RawLogEntry>,
    tree_size: u64,
}

impl InMemoryCtLogFetcher {
    pub fn new(entries: Vec<RawLogEntry>) -> Self {
        let tree_size = entries.len() as u64;
        InMemoryCtLogFetcher { entries, tree_size }
    }
}

#[async_trait]
impl CtLogFetcher for InMemoryCtLogFetcher {
    async fn get_sth(&self) -> Result<TreeHead, PipelineError> {
        Ok(TreeHead { tree_size: self.tree_size })
    }

    async fn get_entries(&self, start: u64, end: u64) -> Result<Vec<RawLogEntry>, PipelineError> {
        let start = start as usize;
        let end = (end as usize).min(self.entries.len());
        if start >= end {
            return Ok(Vec::new());
        }
        Ok(self.entries[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: u64) -> RawLogEntry {
        RawLogEntry { index, leaf_input: vec![index as u8], extra_data: vec![] }
    }

    #[tokio::test]
    async fn in_memory_fetcher_reports_tree_size_and_windows() {
        let fetcher = InMemoryCtLogFetcher::new((0..10).map(entry).collect());
        let sth = fetcher.get_sth().await.unwrap();
        assert_eq!(sth.tree_size, 10);

        let window = fetcher.get_entries(2, 5).await.unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].index, 2);
    }

    #[tokio::test]
    async fn in_memory_fetcher_clamps_an_out_of_range_window() {
        let fetcher = InMemoryCtLogFetcher::new((0..4).map(entry).collect());
        let window = fetcher.get_entries(2, 100).await.unwrap();
        assert_eq!(window.len(), 2);
    }
}
