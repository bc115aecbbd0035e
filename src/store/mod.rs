//! Content-addressed document retrieval
//!
//! Contracts and the reverse-geocoding dataset are both fetched from a
//! content-addressed store by transaction id. This module provides:
//! - The [`DocumentStore`] and [`DatasetSource`] collaborator traits
//! - An Arweave gateway implementation over HTTP
//! - An in-memory store (for testing)
//!
//! Every fetch is a single attempt. Failures are reported, never retried.

use async_trait::async_trait;
use thiserror::Error;

pub mod arweave;
pub use arweave::{ArweaveStore, HttpDatasetSource};

/// Fetch errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not be completed
    #[error("Network error: {0}")]
    Network(String),

    /// The store answered with a non-success status
    #[error("Unexpected status {status} fetching {id}")]
    Status {
        /// Identifier that was requested
        id: String,
        /// HTTP status code
        status: u16,
    },

    /// The response body could not be read
    #[error("Invalid response body: {0}")]
    Body(String),

    /// Nothing is stored under this identifier
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

/// Retrieves raw contract pages by content identifier
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the raw document stored under `id`
    async fn fetch(&self, id: &str) -> FetchResult<String>;
}

/// Retrieves the offline reverse-geocoding dataset
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Fetch the dataset contents
    async fn fetch_dataset(&self) -> FetchResult<String>;
}

/// In-memory store for testing
///
/// Serves documents and a dataset from a map, and counts fetches so tests
/// can assert how often the network would have been hit.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory document store and dataset source
    #[derive(Default)]
    pub struct MemoryStore {
        documents: Mutex<HashMap<String, String>>,
        dataset: Mutex<Option<String>>,
        fetches: AtomicUsize,
    }

    impl MemoryStore {
        /// Create an empty store
        pub fn new() -> Self {
            Self::default()
        }

        /// Store a document under `id`
        pub fn insert(&self, id: impl Into<String>, document: impl Into<String>) {
            if let Ok(mut documents) = self.documents.lock() {
                documents.insert(id.into(), document.into());
            }
        }

        /// Serve `dataset` from [`DatasetSource::fetch_dataset`]
        pub fn with_dataset(self, dataset: impl Into<String>) -> Self {
            if let Ok(mut slot) = self.dataset.lock() {
                *slot = Some(dataset.into());
            }
            self
        }

        /// Number of fetches served or attempted so far
        pub fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentStore for MemoryStore {
        async fn fetch(&self, id: &str) -> FetchResult<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let documents = self
                .documents
                .lock()
                .map_err(|e| FetchError::Network(e.to_string()))?;
            documents
                .get(id)
                .cloned()
                .ok_or_else(|| FetchError::NotFound(id.to_string()))
        }
    }

    #[async_trait]
    impl DatasetSource for MemoryStore {
        async fn fetch_dataset(&self) -> FetchResult<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let dataset = self
                .dataset
                .lock()
                .map_err(|e| FetchError::Network(e.to_string()))?;
            dataset
                .clone()
                .ok_or_else(|| FetchError::Network("dataset unavailable".to_string()))
        }
    }
}
