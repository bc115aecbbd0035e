//! Arweave gateway access over HTTP
//!
//! Transactions are served by a gateway at `{gateway}/{id}`. The same
//! client fetches contract pages and the geocoding dataset.

use super::{DatasetSource, DocumentStore, FetchError, FetchResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Default public gateway
pub const DEFAULT_GATEWAY: &str = "https://arweave.net";

/// Document store backed by an Arweave gateway
#[derive(Clone, Debug)]
pub struct ArweaveStore {
    client: reqwest::Client,
    gateway: String,
}

impl ArweaveStore {
    /// Create a store for `gateway`, giving up on a request after `timeout`
    pub fn new(gateway: impl Into<String>, timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(ArweaveStore {
            client,
            gateway: gateway.into().trim_end_matches('/').to_string(),
        })
    }

    /// Gateway base URL
    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    /// URL a transaction is served from
    pub fn url_for(&self, id: &str) -> String {
        format!("{}/{}", self.gateway, id)
    }

    /// Fetch a transaction body as text, in a single attempt
    async fn get_text(&self, id: &str) -> FetchResult<String> {
        let url = self.url_for(id);
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                id: id.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for ArweaveStore {
    async fn fetch(&self, id: &str) -> FetchResult<String> {
        self.get_text(id).await
    }
}

/// Dataset source reading one fixed transaction from a gateway
#[derive(Clone, Debug)]
pub struct HttpDatasetSource {
    store: ArweaveStore,
    transaction: String,
}

impl HttpDatasetSource {
    /// Serve the dataset stored in `transaction`
    pub fn new(store: ArweaveStore, transaction: impl Into<String>) -> Self {
        HttpDatasetSource {
            store,
            transaction: transaction.into(),
        }
    }

    /// URL the dataset is fetched from
    pub fn url(&self) -> String {
        self.store.url_for(&self.transaction)
    }
}

#[async_trait]
impl DatasetSource for HttpDatasetSource {
    async fn fetch_dataset(&self) -> FetchResult<String> {
        self.store.get_text(&self.transaction).await
    }
}
