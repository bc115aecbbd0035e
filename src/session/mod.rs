//! Contract sessions
//!
//! A session fetches one contract from the store, parses it, and holds the
//! result for display and acceptance. Loading is a single attempt: any
//! failure leaves the session in the error state and is reported to the
//! host.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::document::{self, ParseError, ParsedContract};
use crate::gate::{AcceptanceDecision, AcceptanceGate, SigningCallbacks};
use crate::store::{DocumentStore, FetchError};

/// Session errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No content identifier was given
    #[error("Arweave transaction is undefined.")]
    MissingIdentifier,

    /// The document could not be fetched
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The document is not a valid Ricardian contract
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The session has no contract to accept
    #[error("Contract is not loaded")]
    NotLoaded,
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Where a session is in its lifecycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// The contract is being fetched
    Loading,
    /// The contract was fetched and parsed
    Success(ParsedContract),
    /// Fetching or parsing failed with this message
    Error(String),
}

/// One contract, fetched by content identifier
///
/// The status is published on a [`watch`] channel so a presentation layer
/// can render the loading state while the fetch is in flight.
pub struct ContractSession {
    id: String,
    status: watch::Sender<SessionStatus>,
}

impl ContractSession {
    /// Create a session for `id` in the loading state, without fetching
    pub fn new(id: impl Into<String>) -> Self {
        let (status, _) = watch::channel(SessionStatus::Loading);
        ContractSession { id: id.into(), status }
    }

    /// Create a session for `id` and load it
    pub async fn open(
        id: impl Into<String>,
        store: Arc<dyn DocumentStore>,
        callbacks: &dyn SigningCallbacks,
    ) -> Self {
        let session = Self::new(id);
        session.load(store.as_ref(), callbacks).await;
        session
    }

    /// Fetch and parse the contract, returning the resulting status
    ///
    /// Failures are reported through `callbacks.on_error` and leave the
    /// session in [`SessionStatus::Error`].
    pub async fn load(
        &self,
        store: &dyn DocumentStore,
        callbacks: &dyn SigningCallbacks,
    ) -> SessionStatus {
        self.status.send_replace(SessionStatus::Loading);

        let status = match self.fetch(store).await {
            Ok(contract) => {
                info!("Loaded contract {}", self.id);
                SessionStatus::Success(contract)
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Failed to load contract {}: {}", self.id, message);
                callbacks.on_error(&message);
                SessionStatus::Error(message)
            }
        };

        self.status.send_replace(status.clone());
        status
    }

    async fn fetch(&self, store: &dyn DocumentStore) -> SessionResult<ParsedContract> {
        if self.id.trim().is_empty() {
            return Err(SessionError::MissingIdentifier);
        }
        let raw = store.fetch(&self.id).await?;
        Ok(document::parse(&raw)?)
    }

    /// Content identifier of this contract
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current status
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// The loaded contract, if loading succeeded
    pub fn contract(&self) -> Option<ParsedContract> {
        match &*self.status.borrow() {
            SessionStatus::Success(contract) => Some(contract.clone()),
            _ => None,
        }
    }

    /// Attempt to accept the loaded contract through `gate`
    pub async fn accept(
        &self,
        gate: &AcceptanceGate,
        callbacks: &dyn SigningCallbacks,
    ) -> SessionResult<AcceptanceDecision> {
        let contract = self.contract().ok_or(SessionError::NotLoaded)?;
        Ok(gate.accept(&contract, callbacks).await)
    }
}
