//! Configuration
//!
//! Settings are read from a TOML file. Every key is optional:
//!
//! ```toml
//! gateway_url = "https://arweave.net"
//! geocoding_dataset = "Wl0lmZU2A1D60EqMePwX77PpFpTEIMUdKGSBM-uGlto"
//! storage_network = "arweave"
//! use_reverse_geocoding = true
//! hash_scheme = "legacy"
//! request_timeout_secs = 60
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::chain::ChainClient;
use crate::gate::{AcceptanceGate, GeoRestriction, STORAGE_NETWORK};
use crate::geo::{GeoResolver, GeolocationProvider};
use crate::integrity::{HashScheme, IntegrityHasher};
use crate::store::arweave::DEFAULT_GATEWAY;
use crate::store::{ArweaveStore, FetchResult, HttpDatasetSource};

/// Transaction holding the reverse-geocoding dataset
pub const DEFAULT_GEOCODING_DATASET: &str = "Wl0lmZU2A1D60EqMePwX77PpFpTEIMUdKGSBM-uGlto";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid config: {0}")]
    Validation(String),
}

/// Result type for configuration
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Gateway serving contract pages and the dataset
    pub gateway_url: String,
    /// Transaction id of the reverse-geocoding dataset
    pub geocoding_dataset: String,
    /// Network identifier of storage-native contracts
    pub storage_network: String,
    /// Whether acceptance is restricted by location
    pub use_reverse_geocoding: bool,
    /// Joining scheme for the integrity hash
    pub hash_scheme: HashScheme,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gateway_url: DEFAULT_GATEWAY.to_string(),
            geocoding_dataset: DEFAULT_GEOCODING_DATASET.to_string(),
            storage_network: STORAGE_NETWORK.to_string(),
            use_reverse_geocoding: false,
            hash_scheme: HashScheme::default(),
            request_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn from_file_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.gateway_url.trim().is_empty() {
            return Err(ConfigError::Validation("gateway_url must not be empty".to_string()));
        }
        if self.storage_network.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage_network must not be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Document store for the configured gateway
    pub fn store(&self) -> FetchResult<ArweaveStore> {
        ArweaveStore::new(&self.gateway_url, self.request_timeout())
    }

    /// Geo resolver reading the configured dataset
    pub fn geo_resolver(&self) -> FetchResult<GeoResolver> {
        let source = HttpDatasetSource::new(self.store()?, &self.geocoding_dataset);
        Ok(GeoResolver::new(Arc::new(source)))
    }

    /// Acceptance gate wired according to this configuration
    ///
    /// `geolocation` is only consulted when reverse geocoding is enabled.
    pub fn gate(
        &self,
        chain: Arc<dyn ChainClient>,
        geolocation: Arc<dyn GeolocationProvider>,
    ) -> FetchResult<AcceptanceGate> {
        let mut gate = AcceptanceGate::new(chain)
            .with_storage_network(&self.storage_network)
            .with_hasher(IntegrityHasher::new(self.hash_scheme));

        if self.use_reverse_geocoding {
            gate = gate.with_geo_restriction(GeoRestriction::new(geolocation, self.geo_resolver()?));
        }
        Ok(gate)
    }
}
