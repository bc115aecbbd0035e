//! On-chain acceptance
//!
//! The acceptance smart contract records which accounts have signed which
//! Ricardian contracts. The RPC transport is supplied by the host through
//! [`ChainClient`]; this module defines the payload and receipt types and an
//! in-memory ledger for testing.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chain errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// No account is connected or the user refused to connect one
    #[error("No account available: {0}")]
    NoAccount(String),

    /// An address could not be parsed
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    /// A read call against the contract failed
    #[error("Call failed: {0}")]
    CallFailed(String),

    /// The transaction was rejected or reverted
    #[error("{0}")]
    Rejected(String),
}

/// Result type for chain operations
pub type ChainResult<T> = Result<T, ChainError>;

/// What gets submitted to record an acceptance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePayload {
    /// Integrity hash of the accepted contract
    pub hash: B256,
    /// Account accepting the contract
    pub signer_address: Address,
    /// Acceptance smart contract
    pub contract_address: Address,
}

/// Confirmation that an acceptance was mined
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Hash of the acceptance transaction
    pub transaction_hash: B256,
}

/// Host-supplied access to the chain
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The account the user is signing with
    async fn current_account(&self) -> ChainResult<Address>;

    /// Whether `account` has already accepted the contract at `contract`
    async fn has_signed(&self, contract: Address, account: Address) -> ChainResult<bool>;

    /// Submit an acceptance and wait for its receipt
    async fn submit(&self, payload: &SignaturePayload) -> ChainResult<Receipt>;
}

/// Parse a hex address, accepting any letter case
pub fn parse_address(raw: &str) -> ChainResult<Address> {
    raw.trim()
        .parse::<Address>()
        .map_err(|_| ChainError::InvalidAddress(raw.to_string()))
}

/// In-memory chain for testing
///
/// Keeps a ledger of (contract, signer) acceptances and records every
/// call so tests can assert that the chain was or was not contacted.
pub mod memory {
    use super::*;
    use alloy_primitives::keccak256;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory acceptance ledger
    pub struct MemoryChain {
        account: ChainResult<Address>,
        signed: Mutex<HashSet<(Address, Address)>>,
        submissions: Mutex<Vec<SignaturePayload>>,
        reject_with: Option<String>,
        calls: AtomicUsize,
    }

    impl MemoryChain {
        /// Create a ledger where the user signs as `account`
        pub fn new(account: Address) -> Self {
            MemoryChain {
                account: Ok(account),
                signed: Mutex::new(HashSet::new()),
                submissions: Mutex::new(Vec::new()),
                reject_with: None,
                calls: AtomicUsize::new(0),
            }
        }

        /// Create a ledger with no connected account
        pub fn disconnected(reason: impl Into<String>) -> Self {
            MemoryChain {
                account: Err(ChainError::NoAccount(reason.into())),
                ..Self::new(Address::ZERO)
            }
        }

        /// Reject every submission with `message`
        pub fn rejecting(mut self, message: impl Into<String>) -> Self {
            self.reject_with = Some(message.into());
            self
        }

        /// Record that `account` already accepted `contract`
        pub fn mark_signed(&self, contract: Address, account: Address) {
            if let Ok(mut signed) = self.signed.lock() {
                signed.insert((contract, account));
            }
        }

        /// Payloads submitted so far
        pub fn submissions(&self) -> Vec<SignaturePayload> {
            self.submissions
                .lock()
                .map(|s| s.clone())
                .unwrap_or_default()
        }

        /// Number of calls made against this chain
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn record_call(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ChainClient for MemoryChain {
        async fn current_account(&self) -> ChainResult<Address> {
            self.record_call();
            self.account.clone()
        }

        async fn has_signed(&self, contract: Address, account: Address) -> ChainResult<bool> {
            self.record_call();
            let signed = self
                .signed
                .lock()
                .map_err(|e| ChainError::CallFailed(e.to_string()))?;
            Ok(signed.contains(&(contract, account)))
        }

        async fn submit(&self, payload: &SignaturePayload) -> ChainResult<Receipt> {
            self.record_call();
            if let Some(message) = &self.reject_with {
                return Err(ChainError::Rejected(message.clone()));
            }

            let mut submissions = self
                .submissions
                .lock()
                .map_err(|e| ChainError::Rejected(e.to_string()))?;
            submissions.push(payload.clone());
            self.mark_signed(payload.contract_address, payload.signer_address);

            let mut preimage = payload.hash.to_vec();
            preimage.extend_from_slice(payload.signer_address.as_slice());
            Ok(Receipt {
                transaction_hash: keccak256(preimage),
            })
        }
    }
}
