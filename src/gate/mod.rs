//! Acceptance gating
//!
//! An acceptance attempt walks a fixed sequence of checks before anything is
//! written on chain:
//!
//! ```text
//! Idle → CheckingGeo → CheckingExpiry → ResolvingAccount
//!      → CheckingAddressBlock → CheckingPriorAcceptance → Submitting
//!      → Accepted | Rejected(reason) | Error(message)
//! ```
//!
//! The geo check only runs when geo-restriction is enabled. Contracts whose
//! network is the storage network have no acceptance contract, so the
//! attempt stops after the expiry check without touching the chain.
//!
//! Every attempt reports to the host through [`SigningCallbacks`] and
//! publishes its progress on a [`watch`] channel.

mod callbacks;
pub mod expiry;

pub use callbacks::{CallbackEvent, FnCallbacks, RecordingCallbacks, SigningCallbacks};
pub use expiry::{did_expire, did_expire_at};

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::chain::{parse_address, ChainClient, ChainError, SignaturePayload};
use crate::document::ParsedContract;
use crate::geo::{GeoResolver, GeolocationProvider};
use crate::integrity::IntegrityHasher;

/// Network identifier of the decentralized storage network
pub const STORAGE_NETWORK: &str = "arweave";

/// Why an attempt was refused before reaching the chain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The user's location is barred, or could not be established
    Unavailable,
    /// The contract has expired
    Expired,
    /// The user's account is barred
    Blocked,
}

impl RejectReason {
    /// Message delivered through [`SigningCallbacks::on_error`]
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::Unavailable => "Unavailable",
            RejectReason::Expired => "Expired!",
            RejectReason::Blocked => "Blocked",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Progress of an acceptance attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateState {
    /// No attempt running
    Idle,
    /// Locating the user and checking sanction lists
    CheckingGeo,
    /// Comparing the expiry against the clock
    CheckingExpiry,
    /// Asking the chain client for the signing account
    ResolvingAccount,
    /// Checking the account against the blocked addresses
    CheckingAddressBlock,
    /// Asking the chain whether the account already accepted
    CheckingPriorAcceptance,
    /// Waiting for the acceptance transaction
    Submitting,
    /// Accepted, now or previously
    Accepted,
    /// Refused before reaching the chain
    Rejected(RejectReason),
    /// The chain reported an error
    Error(String),
}

/// Terminal outcome of one acceptance attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcceptanceDecision {
    /// A new acceptance was recorded on chain
    Accepted,
    /// The account had already accepted this contract
    AlreadyAccepted,
    /// The contract has expired
    RejectedExpired,
    /// The user's location is barred
    RejectedGeoBlocked,
    /// The user's account is barred
    RejectedAddressBlocked,
    /// The chain refused or failed
    RejectedOnChainError(String),
    /// The contract lives only on the storage network; there is nothing to
    /// record on chain
    StorageNative,
}

impl AcceptanceDecision {
    /// Whether the host should treat the contract as accepted
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            AcceptanceDecision::Accepted | AcceptanceDecision::AlreadyAccepted
        )
    }
}

/// Location-based restriction: where the position comes from and how it
/// is resolved
#[derive(Clone)]
pub struct GeoRestriction {
    provider: Arc<dyn GeolocationProvider>,
    resolver: GeoResolver,
}

impl GeoRestriction {
    /// Restrict acceptance using positions from `provider`
    pub fn new(provider: Arc<dyn GeolocationProvider>, resolver: GeoResolver) -> Self {
        GeoRestriction { provider, resolver }
    }
}

/// Sequences the acceptance checks for one contract
///
/// Attempts on the same gate run one at a time.
pub struct AcceptanceGate {
    chain: Arc<dyn ChainClient>,
    geo: Option<GeoRestriction>,
    storage_network: String,
    hasher: IntegrityHasher,
    clock: fn() -> DateTime<Utc>,
    state: watch::Sender<GateState>,
    in_flight: Mutex<()>,
}

impl AcceptanceGate {
    /// Create a gate submitting through `chain`, with geo-restriction off
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        let (state, _) = watch::channel(GateState::Idle);
        AcceptanceGate {
            chain,
            geo: None,
            storage_network: STORAGE_NETWORK.to_string(),
            hasher: IntegrityHasher::default(),
            clock: Utc::now,
            state,
            in_flight: Mutex::new(()),
        }
    }

    /// Enable geo-restriction
    pub fn with_geo_restriction(mut self, geo: GeoRestriction) -> Self {
        self.geo = Some(geo);
        self
    }

    /// Override the storage network identifier
    pub fn with_storage_network(mut self, network: impl Into<String>) -> Self {
        self.storage_network = network.into();
        self
    }

    /// Override the hasher used for the submitted hash
    pub fn with_hasher(mut self, hasher: IntegrityHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Override the clock used for expiry checks
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Whether geo-restriction is enabled
    pub fn geo_restricted(&self) -> bool {
        self.geo.is_some()
    }

    /// Current state
    pub fn state(&self) -> GateState {
        self.state.borrow().clone()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.state.subscribe()
    }

    /// Run one acceptance attempt to completion
    pub async fn accept(
        &self,
        contract: &ParsedContract,
        callbacks: &dyn SigningCallbacks,
    ) -> AcceptanceDecision {
        let _attempt = self.in_flight.lock().await;
        self.transition(GateState::Idle);

        let decision = self.run(contract, callbacks).await;
        info!("Acceptance attempt finished: {:?}", decision);
        decision
    }

    async fn run(
        &self,
        contract: &ParsedContract,
        callbacks: &dyn SigningCallbacks,
    ) -> AcceptanceDecision {
        let doc = &contract.document;

        if let Some(geo) = &self.geo {
            self.transition(GateState::CheckingGeo);

            // A location error is reported but does not end the attempt;
            // the check below then fails closed.
            let position = match geo.provider.current_position().await {
                Ok(position) => Some(position),
                Err(e) => {
                    warn!("Geolocation failed: {}", e);
                    callbacks.on_error(&e.to_string());
                    None
                }
            };

            if geo
                .resolver
                .is_blocked(position, &doc.blocked_country_sanction_lists)
                .await
            {
                return self.reject(RejectReason::Unavailable, callbacks);
            }
        }

        self.transition(GateState::CheckingExpiry);
        if did_expire_at(&doc.expires_at, (self.clock)()) {
            return self.reject(RejectReason::Expired, callbacks);
        }

        if doc.is_storage_native(&self.storage_network) {
            debug!("Contract lives on {}, nothing to accept on chain", self.storage_network);
            self.transition(GateState::Idle);
            return AcceptanceDecision::StorageNative;
        }

        self.transition(GateState::ResolvingAccount);
        let account = match self.chain.current_account().await {
            Ok(account) => account,
            Err(e) => return self.fail(e, callbacks),
        };

        self.transition(GateState::CheckingAddressBlock);
        if is_address_blocked(&doc.blocked_addresses, account) {
            return self.reject(RejectReason::Blocked, callbacks);
        }

        self.transition(GateState::CheckingPriorAcceptance);
        let contract_address = match parse_address(&doc.smart_contract_address) {
            Ok(address) => address,
            Err(e) => return self.fail(e, callbacks),
        };
        match self.chain.has_signed(contract_address, account).await {
            Ok(true) => {
                debug!("{} already accepted {}", account, contract_address);
                callbacks.on_success();
                self.transition(GateState::Accepted);
                return AcceptanceDecision::AlreadyAccepted;
            }
            Ok(false) => {}
            Err(e) => return self.fail(e, callbacks),
        }

        self.transition(GateState::Submitting);
        let payload = SignaturePayload {
            hash: self.hasher.compute_hash(doc, &contract.body_html),
            signer_address: account,
            contract_address,
        };
        match self.chain.submit(&payload).await {
            Ok(receipt) => {
                info!("Acceptance recorded in {}", receipt.transaction_hash);
                callbacks.on_success();
                self.transition(GateState::Accepted);
                AcceptanceDecision::Accepted
            }
            Err(e) => self.fail(e, callbacks),
        }
    }

    fn reject(&self, reason: RejectReason, callbacks: &dyn SigningCallbacks) -> AcceptanceDecision {
        info!("Acceptance rejected: {}", reason);
        callbacks.on_error(reason.message());
        self.transition(GateState::Rejected(reason));
        match reason {
            RejectReason::Unavailable => AcceptanceDecision::RejectedGeoBlocked,
            RejectReason::Expired => AcceptanceDecision::RejectedExpired,
            RejectReason::Blocked => AcceptanceDecision::RejectedAddressBlocked,
        }
    }

    fn fail(&self, error: ChainError, callbacks: &dyn SigningCallbacks) -> AcceptanceDecision {
        let message = error.to_string();
        warn!("Acceptance failed on chain: {}", message);
        callbacks.on_error(&message);
        self.transition(GateState::Error(message.clone()));
        AcceptanceDecision::RejectedOnChainError(message)
    }

    fn transition(&self, state: GateState) {
        debug!("Gate state: {:?}", state);
        self.state.send_replace(state);
    }
}

/// Whether `account` appears among `blocked`
///
/// Entries are compared as addresses, so letter case does not matter.
/// Entries that are not addresses cannot match.
pub fn is_address_blocked(blocked: &[String], account: Address) -> bool {
    blocked.iter().any(|entry| match parse_address(entry) {
        Ok(address) => address == account,
        Err(_) => {
            debug!("Ignoring blocked entry that is not an address: {}", entry);
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::memory::MemoryChain;
    use crate::document::{self, tests::page_with};
    use crate::geo::{FixedPosition, NoGeolocation, Position};
    use crate::integrity::HashScheme;
    use crate::store::memory::MemoryStore;

    const ACCOUNT: &str = "0x4444444444444444444444444444444444444444";
    const BLOCKED: &str = "0x3333333333333333333333333333333333333333";
    const CONTRACT: &str = "0x2222222222222222222222222222222222222222";
    const DATASET: &str = "lat,lon,country_code\n35.6892,51.3890,IR\n40.7128,-74.0060,US\n";

    fn contract(overrides: &[(&str, Option<&str>)]) -> ParsedContract {
        document::parse(&page_with(overrides, "<p>Terms</p>")).unwrap()
    }

    fn account() -> Address {
        parse_address(ACCOUNT).unwrap()
    }

    fn contract_address() -> Address {
        parse_address(CONTRACT).unwrap()
    }

    fn geo(position: Arc<dyn GeolocationProvider>, store: MemoryStore) -> GeoRestriction {
        GeoRestriction::new(position, GeoResolver::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn test_accepts_and_submits_hash() {
        let chain = Arc::new(MemoryChain::new(account()));
        let gate = AcceptanceGate::new(chain.clone());
        let callbacks = RecordingCallbacks::new();
        let parsed = contract(&[]);

        let decision = gate.accept(&parsed, &callbacks).await;

        assert_eq!(decision, AcceptanceDecision::Accepted);
        assert!(decision.is_accepted());
        assert_eq!(callbacks.events(), vec![CallbackEvent::Success]);
        assert_eq!(gate.state(), GateState::Accepted);

        let expected_hash =
            IntegrityHasher::default().compute_hash(&parsed.document, &parsed.body_html);
        assert_eq!(
            chain.submissions(),
            vec![SignaturePayload {
                hash: expected_hash,
                signer_address: account(),
                contract_address: contract_address(),
            }]
        );
    }

    #[tokio::test]
    async fn test_expired_never_contacts_chain() {
        let chain = Arc::new(MemoryChain::new(account()));
        let gate = AcceptanceGate::new(chain.clone());
        let callbacks = RecordingCallbacks::new();

        let decision = gate
            .accept(&contract(&[("expires", Some("2001-01-01T00:00:00.000Z"))]), &callbacks)
            .await;

        assert_eq!(decision, AcceptanceDecision::RejectedExpired);
        assert_eq!(callbacks.errors(), vec!["Expired!".to_string()]);
        assert_eq!(gate.state(), GateState::Rejected(RejectReason::Expired));
        assert_eq!(chain.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_expiry_proceeds_to_chain() {
        let chain = Arc::new(MemoryChain::new(account()));
        let gate = AcceptanceGate::new(chain.clone());
        let callbacks = RecordingCallbacks::new();

        let decision = gate
            .accept(&contract(&[("expires", Some("whenever"))]), &callbacks)
            .await;

        assert_eq!(decision, AcceptanceDecision::Accepted);
        assert!(callbacks.errors().is_empty());
        assert_eq!(chain.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_offset_expiry_in_future_is_accepted() {
        let gate = AcceptanceGate::new(Arc::new(MemoryChain::new(account())));
        let callbacks = RecordingCallbacks::new();

        let decision = gate
            .accept(
                &contract(&[("expires", Some("2999-01-01T00:00:00.000+0000"))]),
                &callbacks,
            )
            .await;

        assert_eq!(decision, AcceptanceDecision::Accepted);
        assert_eq!(callbacks.successes(), 1);
    }

    #[tokio::test]
    async fn test_dataset_failure_blocks() {
        let chain = Arc::new(MemoryChain::new(account()));
        let new_york = Arc::new(FixedPosition(Position::new(40.7, -74.0)));
        let gate = AcceptanceGate::new(chain.clone())
            .with_geo_restriction(geo(new_york, MemoryStore::new()));
        let callbacks = RecordingCallbacks::new();

        let decision = gate.accept(&contract(&[]), &callbacks).await;

        assert_eq!(decision, AcceptanceDecision::RejectedGeoBlocked);
        assert_eq!(callbacks.errors(), vec!["Unavailable".to_string()]);
        assert_eq!(gate.state(), GateState::Rejected(RejectReason::Unavailable));
        assert_eq!(chain.call_count(), 0);
    }

    #[tokio::test]
    async fn test_sanctioned_country_blocks() {
        let chain = Arc::new(MemoryChain::new(account()));
        let tehran = Arc::new(FixedPosition(Position::new(35.7, 51.4)));
        let gate = AcceptanceGate::new(chain.clone())
            .with_geo_restriction(geo(tehran, MemoryStore::new().with_dataset(DATASET)));
        let callbacks = RecordingCallbacks::new();

        let decision = gate.accept(&contract(&[]), &callbacks).await;
        assert_eq!(decision, AcceptanceDecision::RejectedGeoBlocked);
        assert_eq!(chain.call_count(), 0);
    }

    #[tokio::test]
    async fn test_allowed_country_proceeds() {
        let chain = Arc::new(MemoryChain::new(account()));
        let new_york = Arc::new(FixedPosition(Position::new(40.7, -74.0)));
        let gate = AcceptanceGate::new(chain.clone())
            .with_geo_restriction(geo(new_york, MemoryStore::new().with_dataset(DATASET)));
        let callbacks = RecordingCallbacks::new();

        let decision = gate.accept(&contract(&[]), &callbacks).await;
        assert_eq!(decision, AcceptanceDecision::Accepted);
        assert!(gate.geo_restricted());
    }

    #[tokio::test]
    async fn test_geolocation_error_reported_then_fails_closed() {
        let chain = Arc::new(MemoryChain::new(account()));
        let gate = AcceptanceGate::new(chain.clone()).with_geo_restriction(geo(
            Arc::new(NoGeolocation),
            MemoryStore::new().with_dataset(DATASET),
        ));
        let callbacks = RecordingCallbacks::new();

        let decision = gate.accept(&contract(&[]), &callbacks).await;

        assert_eq!(decision, AcceptanceDecision::RejectedGeoBlocked);
        assert_eq!(
            callbacks.errors(),
            vec![
                "Geolocation is unavailable.".to_string(),
                "Unavailable".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_geo_disabled_skips_location() {
        let chain = Arc::new(MemoryChain::new(account()));
        let gate = AcceptanceGate::new(chain.clone());
        let mut states = gate.subscribe();

        gate.accept(&contract(&[]), &RecordingCallbacks::new()).await;

        assert!(!gate.geo_restricted());
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), GateState::Accepted);
    }

    #[tokio::test]
    async fn test_blocked_address() {
        let chain = Arc::new(MemoryChain::new(parse_address(BLOCKED).unwrap()));
        let gate = AcceptanceGate::new(chain.clone());
        let callbacks = RecordingCallbacks::new();

        let decision = gate.accept(&contract(&[]), &callbacks).await;

        assert_eq!(decision, AcceptanceDecision::RejectedAddressBlocked);
        assert_eq!(callbacks.errors(), vec!["Blocked".to_string()]);
        assert_eq!(gate.state(), GateState::Rejected(RejectReason::Blocked));
        assert!(chain.submissions().is_empty());
        // Only the account was resolved
        assert_eq!(chain.call_count(), 1);
    }

    #[tokio::test]
    async fn test_already_signed() {
        let chain = Arc::new(MemoryChain::new(account()));
        chain.mark_signed(contract_address(), account());
        let gate = AcceptanceGate::new(chain.clone());
        let callbacks = RecordingCallbacks::new();

        let decision = gate.accept(&contract(&[]), &callbacks).await;

        assert_eq!(decision, AcceptanceDecision::AlreadyAccepted);
        assert!(decision.is_accepted());
        assert_eq!(callbacks.events(), vec![CallbackEvent::Success]);
        assert!(chain.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_storage_native_never_touches_chain() {
        let chain = Arc::new(MemoryChain::new(parse_address(BLOCKED).unwrap()));
        let gate = AcceptanceGate::new(chain.clone());
        let callbacks = RecordingCallbacks::new();

        let decision = gate
            .accept(
                &contract(&[("network", Some("arweave")), ("smartcontract", Some("garbage"))]),
                &callbacks,
            )
            .await;

        assert_eq!(decision, AcceptanceDecision::StorageNative);
        assert_eq!(chain.call_count(), 0);
        assert!(callbacks.events().is_empty());
        assert_eq!(gate.state(), GateState::Idle);
    }

    #[tokio::test]
    async fn test_custom_storage_network() {
        let chain = Arc::new(MemoryChain::new(account()));
        let gate = AcceptanceGate::new(chain.clone()).with_storage_network("ipfs");

        let decision = gate
            .accept(&contract(&[("network", Some("ipfs"))]), &RecordingCallbacks::new())
            .await;
        assert_eq!(decision, AcceptanceDecision::StorageNative);
        assert_eq!(chain.call_count(), 0);
    }

    #[tokio::test]
    async fn test_on_chain_rejection() {
        let chain = Arc::new(MemoryChain::new(account()).rejecting("User denied transaction"));
        let gate = AcceptanceGate::new(chain.clone());
        let callbacks = RecordingCallbacks::new();

        let decision = gate.accept(&contract(&[]), &callbacks).await;

        assert_eq!(
            decision,
            AcceptanceDecision::RejectedOnChainError("User denied transaction".to_string())
        );
        assert_eq!(callbacks.errors(), vec!["User denied transaction".to_string()]);
        assert_eq!(
            gate.state(),
            GateState::Error("User denied transaction".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_account() {
        let chain = Arc::new(MemoryChain::disconnected("wallet locked"));
        let gate = AcceptanceGate::new(chain.clone());
        let callbacks = RecordingCallbacks::new();

        let decision = gate.accept(&contract(&[]), &callbacks).await;
        assert!(matches!(decision, AcceptanceDecision::RejectedOnChainError(_)));
        assert_eq!(callbacks.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_contract_address() {
        let chain = Arc::new(MemoryChain::new(account()));
        let gate = AcceptanceGate::new(chain.clone());

        let decision = gate
            .accept(&contract(&[("smartcontract", Some("nope"))]), &RecordingCallbacks::new())
            .await;
        assert_eq!(
            decision,
            AcceptanceDecision::RejectedOnChainError("Invalid address 'nope'".to_string())
        );
        assert!(chain.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_attempts_run_one_at_a_time() {
        let chain = Arc::new(MemoryChain::new(account()));
        let gate = AcceptanceGate::new(chain.clone());
        let parsed = contract(&[]);
        let (a, b) = (RecordingCallbacks::new(), RecordingCallbacks::new());

        let (first, second) = tokio::join!(gate.accept(&parsed, &a), gate.accept(&parsed, &b));

        let mut decisions = vec![first, second];
        decisions.sort_by_key(|d| format!("{:?}", d));
        assert_eq!(
            decisions,
            vec![AcceptanceDecision::Accepted, AcceptanceDecision::AlreadyAccepted]
        );
        assert_eq!(chain.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_hash_scheme_is_configurable() {
        let chain = Arc::new(MemoryChain::new(account()));
        let hasher = IntegrityHasher::new(HashScheme::LengthPrefixed);
        let gate = AcceptanceGate::new(chain.clone()).with_hasher(hasher);
        let parsed = contract(&[]);

        gate.accept(&parsed, &RecordingCallbacks::new()).await;

        let submitted = chain.submissions()[0].hash;
        assert_eq!(submitted, hasher.compute_hash(&parsed.document, &parsed.body_html));
        assert_ne!(
            submitted,
            IntegrityHasher::default().compute_hash(&parsed.document, &parsed.body_html)
        );
    }

    #[tokio::test]
    async fn test_injected_clock() {
        fn in_2001() -> DateTime<Utc> {
            DateTime::parse_from_rfc3339("2001-06-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc)
        }

        let chain = Arc::new(MemoryChain::new(account()));
        let gate = AcceptanceGate::new(chain).with_clock(in_2001);
        let decision = gate
            .accept(
                &contract(&[("expires", Some("2002-01-01T00:00:00Z"))]),
                &RecordingCallbacks::new(),
            )
            .await;
        assert_eq!(decision, AcceptanceDecision::Accepted);
    }

    #[test]
    fn test_address_block_ignores_case() {
        let blocked = vec![
            "not-an-address".to_string(),
            "0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD".to_string(),
        ];
        let account = parse_address("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd").unwrap();
        assert!(is_address_blocked(&blocked, account));
        assert!(!is_address_blocked(&blocked, Address::ZERO));
        assert!(!is_address_blocked(&[], account));
    }

    #[test]
    fn test_reject_messages() {
        assert_eq!(RejectReason::Unavailable.message(), "Unavailable");
        assert_eq!(RejectReason::Expired.message(), "Expired!");
        assert_eq!(RejectReason::Blocked.to_string(), "Blocked");
    }
}
