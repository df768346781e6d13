/// Station registry for the Recife rain-gauge network.
///
/// Maps CEMADEN station codes to display names and geolocation. The
/// registry is an immutable value handed to the pipeline; it is loaded from
/// the `[[station]]` tables of the service configuration, with
/// `StationRegistry::recife()` as the built-in fallback.

use serde::Deserialize;

/// Metadata for a single CEMADEN rain-gauge station.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Station {
    /// CEMADEN station code, e.g. "261160609A".
    pub code: String,
    /// Display name used in reports and for station selection.
    pub name: String,
    #[serde(default)]
    pub municipality: Option<String>,
    #[serde(default)]
    pub uf: Option<String>,
    /// WGS84 latitude, when known.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// WGS84 longitude, when known.
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Read-only lookup over the configured stations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationRegistry {
    stations: Vec<Station>,
}

impl StationRegistry {
    pub fn new(stations: Vec<Station>) -> Self {
        StationRegistry { stations }
    }

    /// The four Recife stations used by the risk diagrams.
    pub fn recife() -> Self {
        let station = |code: &str, name: &str, lat: Option<f64>, lon: Option<f64>| Station {
            code: code.to_string(),
            name: name.to_string(),
            municipality: Some("Recife".to_string()),
            uf: Some("PE".to_string()),
            latitude: lat,
            longitude: lon,
        };
        StationRegistry::new(vec![
            station("261160614A", "Campina do Barreto", Some(-8.0494), Some(-34.897)),
            station("261160609A", "Imbiribeira", Some(-8.1091), Some(-34.914)),
            station("261160623A", "RECIFE - APAC", Some(-8.0542), Some(-34.881)),
            station("261160618A", "Torreão", None, None),
        ])
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn find_by_code(&self, code: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.code == code)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.name == name)
    }

    /// Display name for a code, if registered.
    pub fn name_for(&self, code: &str) -> Option<&str> {
        self.find_by_code(code).map(|s| s.name.as_str())
    }

    pub fn codes(&self) -> Vec<&str> {
        self.stations.iter().map(|s| s.code.as_str()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.stations.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recife_registry_has_four_stations() {
        let registry = StationRegistry::recife();
        assert_eq!(registry.stations().len(), 4);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_station_codes_are_valid_format() {
        // CEMADEN codes: 6-digit IBGE municipality code, 3-digit serial, letter suffix.
        for station in StationRegistry::recife().stations() {
            assert_eq!(station.code.len(), 10, "{} has wrong length", station.code);
            assert!(
                station.code.starts_with("261160"),
                "{} should be in the Recife municipality block",
                station.code
            );
            assert!(station.code[..9].chars().all(|c| c.is_ascii_digit()));
            assert!(station.code.ends_with('A'));
        }
    }

    #[test]
    fn test_name_lookup_by_code() {
        let registry = StationRegistry::recife();
        assert_eq!(registry.name_for("261160609A"), Some("Imbiribeira"));
        assert_eq!(registry.name_for("000000000X"), None);
    }

    #[test]
    fn test_find_by_name_round_trips_code() {
        let registry = StationRegistry::recife();
        let station = registry
            .find_by_name("Campina do Barreto")
            .expect("Campina do Barreto should be registered");
        assert_eq!(station.code, "261160614A");
        assert_eq!(station.latitude, Some(-8.0494));
    }

    #[test]
    fn test_coordinates_are_in_recife_when_present() {
        for station in StationRegistry::recife().stations() {
            if let (Some(lat), Some(lon)) = (station.latitude, station.longitude) {
                assert!(lat > -8.2 && lat < -7.9, "{} latitude out of range", station.name);
                assert!(lon > -35.1 && lon < -34.8, "{} longitude out of range", station.name);
            }
        }
    }
}
