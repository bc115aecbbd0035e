//! # Ricardian
//!
//! Integrity checking and acceptance gating for Ricardian contracts.
//!
//! ## Features
//!
//! - **Document parsing** of contract pages into typed terms
//! - **Integrity hashing** with keccak-256 over a fixed canonical field order
//! - **Geo-restriction** against sanction lists, failing closed
//! - **Acceptance gating**: expiry, blocked accounts and prior acceptance are
//!   checked before an acceptance is submitted on chain
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ricardian::chain::memory::MemoryChain;
//! use ricardian::gate::{AcceptanceGate, RecordingCallbacks};
//! use ricardian::session::ContractSession;
//! use ricardian::store::ArweaveStore;
//! use alloy_primitives::Address;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(ArweaveStore::new("https://arweave.net", std::time::Duration::from_secs(30))?);
//! let callbacks = RecordingCallbacks::new();
//!
//! let session = ContractSession::open("transaction-id", store, &callbacks).await;
//! let gate = AcceptanceGate::new(Arc::new(MemoryChain::new(Address::ZERO)));
//! let decision = session.accept(&gate, &callbacks).await?;
//! println!("{:?}", decision);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              HOST APPLICATION               │
//! │      UI  |  CLI  |  SigningCallbacks        │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │               SESSION / GATE                │
//! │  ContractSession | AcceptanceGate           │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │                  CORE                       │
//! │  Document | Integrity (keccak) | Geo        │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │              COLLABORATORS                  │
//! │   DocumentStore | ChainClient | Geolocation │
//! └─────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod config;
pub mod document;
pub mod gate;
pub mod geo;
pub mod integrity;
pub mod session;
pub mod store;

// Re-export main types at crate root
pub use chain::{ChainClient, ChainError};
pub use config::Config;
pub use document::{parse, ContractDocument, ParseError, ParsedContract, SanctionList};
pub use gate::{AcceptanceDecision, AcceptanceGate, SigningCallbacks};
pub use geo::{GeoRecord, GeoResolver, Position};
pub use integrity::{HashScheme, IntegrityHasher};
pub use session::ContractSession;
pub use store::{DocumentStore, FetchError};
