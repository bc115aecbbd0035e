//! Offline reverse geocoding over a CSV point dataset
//!
//! The dataset is a headed CSV with one row per reference point. Only three
//! columns matter: latitude, longitude and the ISO alpha-2 country code.
//! A lookup returns the country of the nearest reference point.

use super::{GeoError, GeoRecord, GeoResult, Position, ReverseGeocoder};

const LAT_COLUMNS: &[&str] = &["lat", "latitude"];
const LON_COLUMNS: &[&str] = &["lon", "lng", "long", "longitude"];
const COUNTRY_COLUMNS: &[&str] = &["country_code", "countrycode", "country", "cc"];

/// Mean Earth radius in kilometres
const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Clone, Debug)]
struct Point {
    lat: f64,
    lon: f64,
    country_code: String,
}

/// Nearest-point reverse geocoder
#[derive(Clone, Debug)]
pub struct CsvGeocoder {
    points: Vec<Point>,
}

impl CsvGeocoder {
    /// Parse a dataset
    ///
    /// Fields follow CSV quoting rules, so quoted values may contain commas.
    pub fn parse(dataset: &str) -> GeoResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(dataset.as_bytes());

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| GeoError::MalformedDataset(e.to_string()))?
            .iter()
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let lat_idx = find_column(&columns, LAT_COLUMNS)?;
        let lon_idx = find_column(&columns, LON_COLUMNS)?;
        let cc_idx = find_column(&columns, COUNTRY_COLUMNS)?;

        let mut points = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|e| GeoError::MalformedDataset(e.to_string()))?;
            let line_no = row.position().map(|p| p.line()).unwrap_or_default();
            let field = |idx: usize| {
                row.get(idx).ok_or_else(|| {
                    GeoError::MalformedDataset(format!("row {}: missing column", line_no))
                })
            };

            let lat = parse_coordinate(field(lat_idx)?, line_no, 90.0)?;
            let lon = parse_coordinate(field(lon_idx)?, line_no, 180.0)?;
            let country_code = field(cc_idx)?.to_ascii_uppercase();

            points.push(Point {
                lat,
                lon,
                country_code,
            });
        }

        Ok(CsvGeocoder { points })
    }

    /// Number of reference points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the dataset has no reference points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl ReverseGeocoder for CsvGeocoder {
    fn lookup(&self, position: Position) -> Option<GeoRecord> {
        if !is_on_globe(position.lat, position.lon) {
            return None;
        }

        self.points
            .iter()
            .map(|p| (haversine_km(position, p.lat, p.lon), p))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, p)| GeoRecord {
                country_code: p.country_code.clone(),
            })
    }
}

fn is_on_globe(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && lat.abs() <= 90.0 && lon.abs() <= 180.0
}

fn find_column(columns: &[String], names: &[&str]) -> GeoResult<usize> {
    columns
        .iter()
        .position(|c| names.contains(&c.as_str()))
        .ok_or_else(|| GeoError::MalformedDataset(format!("no column named {}", names.join("/"))))
}

fn parse_coordinate(raw: &str, line_no: u64, limit: f64) -> GeoResult<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() <= limit)
        .ok_or_else(|| {
            GeoError::MalformedDataset(format!("row {}: invalid coordinate '{}'", line_no, raw))
        })
}

/// Great-circle distance between `from` and a reference point
pub fn haversine_km(from: Position, lat: f64, lon: f64) -> f64 {
    let (lat1, lat2) = (from.lat.to_radians(), lat.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (lon - from.lon).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = "\
name,lat,lon,country_code
Tehran,35.6892,51.3890,IR
New York,40.7128,-74.0060,US
Berlin,52.5200,13.4050,DE
Pyongyang,39.0392,125.7625,KP
";

    #[test]
    fn test_parse_dataset() {
        let geocoder = CsvGeocoder::parse(DATASET).unwrap();
        assert_eq!(geocoder.len(), 4);
        assert!(!geocoder.is_empty());
    }

    #[test]
    fn test_nearest_lookup() {
        let geocoder = CsvGeocoder::parse(DATASET).unwrap();

        let isfahan = Position::new(32.6546, 51.6680);
        assert_eq!(geocoder.lookup(isfahan).unwrap().country_code, "IR");

        let boston = Position::new(42.3601, -71.0589);
        assert_eq!(geocoder.lookup(boston).unwrap().country_code, "US");

        let munich = Position::new(48.1351, 11.5820);
        assert_eq!(geocoder.lookup(munich).unwrap().country_code, "DE");
    }

    #[test]
    fn test_header_aliases() {
        let dataset = "Latitude,Longitude,CC\n10.0,20.0,fr\n";
        let geocoder = CsvGeocoder::parse(dataset).unwrap();
        let record = geocoder.lookup(Position::new(10.0, 20.0)).unwrap();
        assert_eq!(record.country_code, "FR");
    }

    #[test]
    fn test_empty_dataset_has_no_records() {
        let geocoder = CsvGeocoder::parse("lat,lon,country_code\n").unwrap();
        assert!(geocoder.is_empty());
        assert_eq!(geocoder.lookup(Position::new(0.0, 0.0)), None);
    }

    #[test]
    fn test_malformed_dataset() {
        assert!(CsvGeocoder::parse("").is_err());
        assert!(CsvGeocoder::parse("a,b,c\n1,2,US\n").is_err());
        assert!(CsvGeocoder::parse("lat,lon,cc\nx,2,US\n").is_err());
        assert!(CsvGeocoder::parse("lat,lon,cc\n1,2\n").is_err());
        assert!(CsvGeocoder::parse("lat,lon,cc\nNaN,2,US\n").is_err());
        assert!(CsvGeocoder::parse("lat,lon,cc\n91,2,US\n").is_err());
    }

    #[test]
    fn test_quoted_fields_with_commas() {
        let dataset = "\
name,lat,lon,country_code
\"Washington, D.C.\",38.9,-77.0,US
\"Tehran, Tehran Province\",35.6892,51.3890,\"IR\"
";
        let geocoder = CsvGeocoder::parse(dataset).unwrap();
        assert_eq!(geocoder.len(), 2);

        let baltimore = Position::new(39.29, -76.61);
        assert_eq!(geocoder.lookup(baltimore).unwrap().country_code, "US");
        let qom = Position::new(34.64, 50.88);
        assert_eq!(geocoder.lookup(qom).unwrap().country_code, "IR");
    }

    #[test]
    fn test_position_off_the_globe_has_no_record() {
        let geocoder = CsvGeocoder::parse(DATASET).unwrap();

        assert_eq!(geocoder.lookup(Position::new(f64::NAN, f64::NAN)), None);
        assert_eq!(geocoder.lookup(Position::new(10.0, f64::INFINITY)), None);
        assert_eq!(geocoder.lookup(Position::new(90.5, 0.0)), None);
        assert_eq!(geocoder.lookup(Position::new(0.0, -180.5)), None);
        assert!(geocoder.lookup(Position::new(-90.0, 180.0)).is_some());
    }

    #[test]
    fn test_haversine() {
        let here = Position::new(0.0, 0.0);
        assert!(haversine_km(here, 0.0, 0.0).abs() < 1e-9);

        // One degree of longitude at the equator is ~111 km
        let d = haversine_km(here, 0.0, 1.0);
        assert!((d - 111.19).abs() < 0.1);

        // Antimeridian neighbours are close, not half a world apart
        let d = haversine_km(Position::new(0.0, 179.9), 0.0, -179.9);
        assert!(d < 25.0);
    }
}
