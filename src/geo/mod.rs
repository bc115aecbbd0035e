//! Geographic acceptance restrictions
//!
//! Positions are resolved to a country with an offline reverse-geocoding
//! dataset fetched from the content-addressed store, then checked against
//! the contract's sanction lists.
//!
//! The policy is fail-closed: if the dataset cannot be fetched or parsed, if
//! there is no position, or if the position resolves to nothing, the caller
//! is treated as blocked.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::document::SanctionList;
use crate::store::{DatasetSource, FetchError};

pub mod dataset;
pub use dataset::CsvGeocoder;

/// Geolocation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeoError {
    /// The user refused to share their location
    #[error("User denied Geolocation")]
    PermissionDenied,

    /// The platform has no way to locate the user
    #[error("Geolocation is unavailable.")]
    Unsupported,

    /// The position could not be determined
    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    /// The reverse-geocoding dataset could not be fetched
    #[error("Geocoding dataset unavailable: {0}")]
    Dataset(#[from] FetchError),

    /// The reverse-geocoding dataset could not be parsed
    #[error("Malformed geocoding dataset: {0}")]
    MalformedDataset(String),
}

/// Result type for geolocation operations
pub type GeoResult<T> = Result<T, GeoError>;

/// A coordinate pair in decimal degrees
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lon: f64,
}

impl Position {
    /// Create a position
    pub fn new(lat: f64, lon: f64) -> Self {
        Position { lat, lon }
    }
}

/// Result of resolving a position
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoRecord {
    /// ISO 3166-1 alpha-2 country code
    pub country_code: String,
}

/// Supplies the user's current position
///
/// Implementations may prompt for permission and may take arbitrarily long.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// Current position of the user
    async fn current_position(&self) -> GeoResult<Position>;
}

/// Provider that always reports the same position
#[derive(Clone, Copy, Debug)]
pub struct FixedPosition(pub Position);

#[async_trait]
impl GeolocationProvider for FixedPosition {
    async fn current_position(&self) -> GeoResult<Position> {
        Ok(self.0)
    }
}

/// Provider for hosts without geolocation support
#[derive(Clone, Copy, Debug, Default)]
pub struct NoGeolocation;

#[async_trait]
impl GeolocationProvider for NoGeolocation {
    async fn current_position(&self) -> GeoResult<Position> {
        Err(GeoError::Unsupported)
    }
}

/// Maps positions to countries
pub trait ReverseGeocoder {
    /// Country record for `position`, if the dataset has one
    fn lookup(&self, position: Position) -> Option<GeoRecord>;
}

/// Evaluates positions against sanction lists
#[derive(Clone)]
pub struct GeoResolver {
    source: Arc<dyn DatasetSource>,
}

impl GeoResolver {
    /// Create a resolver reading its dataset from `source`
    pub fn new(source: Arc<dyn DatasetSource>) -> Self {
        GeoResolver { source }
    }

    /// Fetch and parse the dataset (one attempt, no caching)
    pub async fn load_geocoder(&self) -> GeoResult<CsvGeocoder> {
        let dataset = self.source.fetch_dataset().await?;
        CsvGeocoder::parse(&dataset)
    }

    /// Resolve a position to a country record
    pub async fn resolve(&self, position: Position) -> GeoResult<Option<GeoRecord>> {
        Ok(self.load_geocoder().await?.lookup(position))
    }

    /// Whether a user at `position` is barred by `sanction_lists`
    pub async fn is_blocked(
        &self,
        position: Option<Position>,
        sanction_lists: &[SanctionList],
    ) -> bool {
        let geocoder = match self.load_geocoder().await {
            Ok(geocoder) => geocoder,
            Err(e) => {
                warn!("Blocking by default, dataset unavailable: {}", e);
                return true;
            }
        };

        let Some(position) = position else {
            debug!("Blocking by default, no position");
            return true;
        };

        match geocoder.lookup(position) {
            Some(record) => is_country_blocked(&record, sanction_lists),
            None => {
                debug!("Blocking by default, no record for position");
                true
            }
        }
    }
}

/// Whether `record` is covered by any of `sanction_lists`
///
/// Every list is evaluated; an empty set of lists blocks nothing.
pub fn is_country_blocked(record: &GeoRecord, sanction_lists: &[SanctionList]) -> bool {
    sanction_lists
        .iter()
        .fold(false, |blocked, list| list.contains(&record.country_code) | blocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    const DATASET: &str = "lat,lon,country_code\n35.6892,51.3890,IR\n40.7128,-74.0060,US\n";

    fn record(code: &str) -> GeoRecord {
        GeoRecord {
            country_code: code.to_string(),
        }
    }

    fn resolver(store: MemoryStore) -> GeoResolver {
        GeoResolver::new(Arc::new(store))
    }

    #[test]
    fn test_ofec_blocks_iran_not_us() {
        assert!(is_country_blocked(&record("IR"), &[SanctionList::Ofec]));
        assert!(!is_country_blocked(&record("US"), &[SanctionList::Ofec]));
    }

    #[test]
    fn test_empty_lists_block_nothing() {
        for code in ["IR", "US", "KP", "RU", "DE"] {
            assert!(!is_country_blocked(&record(code), &[]));
        }
    }

    #[test]
    fn test_union_of_lists() {
        let lists = [SanctionList::Un, SanctionList::country("US")];
        assert!(is_country_blocked(&record("US"), &lists));
        assert!(is_country_blocked(&record("KP"), &lists));
        assert!(!is_country_blocked(&record("RU"), &lists));
    }

    #[tokio::test]
    async fn test_blocked_when_dataset_unavailable() {
        let geo = resolver(MemoryStore::new());
        assert!(geo.is_blocked(Some(Position::new(40.7, -74.0)), &[]).await);
    }

    #[tokio::test]
    async fn test_blocked_when_dataset_malformed() {
        let geo = resolver(MemoryStore::new().with_dataset("garbage"));
        assert!(geo.is_blocked(Some(Position::new(40.7, -74.0)), &[]).await);
    }

    #[tokio::test]
    async fn test_blocked_without_position() {
        let geo = resolver(MemoryStore::new().with_dataset(DATASET));
        assert!(geo.is_blocked(None, &[]).await);
    }

    #[tokio::test]
    async fn test_blocked_without_record() {
        let geo = resolver(MemoryStore::new().with_dataset("lat,lon,country_code\n"));
        assert!(geo.is_blocked(Some(Position::new(40.7, -74.0)), &[]).await);
    }

    #[tokio::test]
    async fn test_blocked_with_invalid_position() {
        let geo = resolver(MemoryStore::new().with_dataset(DATASET));
        assert!(geo.is_blocked(Some(Position::new(f64::NAN, f64::NAN)), &[]).await);
        assert!(geo.is_blocked(Some(Position::new(120.0, 0.0)), &[]).await);
    }

    #[tokio::test]
    async fn test_resolved_position_checked_against_lists() {
        let geo = resolver(MemoryStore::new().with_dataset(DATASET));
        let tehran = Some(Position::new(35.7, 51.4));
        let new_york = Some(Position::new(40.7, -74.0));

        assert!(geo.is_blocked(tehran, &[SanctionList::Ofec]).await);
        assert!(!geo.is_blocked(new_york, &[SanctionList::Ofec]).await);
        assert!(!geo.is_blocked(tehran, &[]).await);
    }

    #[tokio::test]
    async fn test_dataset_fetched_per_check() {
        let store = Arc::new(MemoryStore::new().with_dataset(DATASET));
        let geo = GeoResolver::new(store.clone());
        let pos = Some(Position::new(40.7, -74.0));

        geo.is_blocked(pos, &[]).await;
        geo.is_blocked(pos, &[]).await;
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_resolve() {
        let geo = resolver(MemoryStore::new().with_dataset(DATASET));
        let found = geo.resolve(Position::new(35.0, 51.0)).await.unwrap();
        assert_eq!(found, Some(record("IR")));

        let unavailable = resolver(MemoryStore::new());
        assert!(matches!(
            unavailable.resolve(Position::new(0.0, 0.0)).await,
            Err(GeoError::Dataset(_))
        ));
    }

    #[tokio::test]
    async fn test_providers() {
        let fixed = FixedPosition(Position::new(1.0, 2.0));
        assert_eq!(fixed.current_position().await, Ok(Position::new(1.0, 2.0)));

        let none = NoGeolocation;
        assert_eq!(none.current_position().await, Err(GeoError::Unsupported));
        assert_eq!(GeoError::Unsupported.to_string(), "Geolocation is unavailable.");
    }
}
