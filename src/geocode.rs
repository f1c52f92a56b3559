//! Site geocoding with a last-known-coordinate fallback.
//!
//! Lookups never fail the caller: a location with no match, a network error
//! and an unreadable response all fall back to the coordinate already stored
//! in the session. The outcome still distinguishes "no match" from "failed"
//! so the two are logged differently.
use crate::config::GeocoderConfig;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::time::Duration;

/// Kuala Lumpur city centre.
pub const DEFAULT_COORDINATES: Coordinates = Coordinates {
    latitude: 3.139,
    longitude: 101.686,
};

pub const MAP_ZOOM: u8 = 14;
pub const SURVEY_RADIUS_M: u32 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for Coordinates {
    fn default() -> Self {
        DEFAULT_COORDINATES
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    Resolved(Coordinates),
    NoMatch,
    Failed(String),
}

pub trait Geocoder {
    fn lookup(&self, location: &str) -> GeocodeOutcome;
}

/// Nominatim search client (`/search?format=json&limit=1`).
pub struct NominatimGeocoder {
    agent: ureq::Agent,
    search_url: String,
    user_agent: String,
    country_suffix: String,
}

#[derive(Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();
        Self {
            agent,
            search_url: format!("{}/search", config.base_url.trim_end_matches('/')),
            user_agent: config.user_agent.clone(),
            country_suffix: config.country_suffix.trim().to_string(),
        }
    }

    fn query_for(&self, location: &str) -> String {
        if self.country_suffix.is_empty() {
            location.to_string()
        } else {
            format!("{location}, {}", self.country_suffix)
        }
    }
}

impl Geocoder for NominatimGeocoder {
    fn lookup(&self, location: &str) -> GeocodeOutcome {
        let location = location.trim();
        if location.is_empty() {
            return GeocodeOutcome::NoMatch;
        }
        let query = self.query_for(location);
        let response = self
            .agent
            .get(&self.search_url)
            .query("q", &query)
            .query("format", "json")
            .query("limit", "1")
            .header("User-Agent", &self.user_agent)
            .call();
        let mut response = match response {
            Ok(response) => response,
            Err(err) => return GeocodeOutcome::Failed(err.to_string()),
        };
        match response.body_mut().read_to_string() {
            Ok(body) => parse_search_response(&body),
            Err(err) => GeocodeOutcome::Failed(err.to_string()),
        }
    }
}

/// Interpret a Nominatim search body; the first place wins.
pub fn parse_search_response(body: &str) -> GeocodeOutcome {
    let places: Vec<NominatimPlace> = match serde_json::from_str(body) {
        Ok(places) => places,
        Err(err) => return GeocodeOutcome::Failed(format!("parse search response: {err}")),
    };
    let Some(place) = places.first() else {
        return GeocodeOutcome::NoMatch;
    };
    match (place.lat.trim().parse::<f64>(), place.lon.trim().parse::<f64>()) {
        (Ok(latitude), Ok(longitude))
            if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) =>
        {
            GeocodeOutcome::Resolved(Coordinates {
                latitude,
                longitude,
            })
        }
        _ => GeocodeOutcome::Failed(format!(
            "invalid coordinates lat={:?} lon={:?}",
            place.lat, place.lon
        )),
    }
}

/// Resolve a location, reusing `last_known` whenever the lookup does not
/// produce coordinates.
pub fn resolve_coordinates(
    geocoder: &dyn Geocoder,
    location: &str,
    last_known: Coordinates,
) -> Coordinates {
    match geocoder.lookup(location) {
        GeocodeOutcome::Resolved(coordinates) => {
            tracing::info!(
                location,
                latitude = coordinates.latitude,
                longitude = coordinates.longitude,
                "location resolved"
            );
            coordinates
        }
        GeocodeOutcome::NoMatch => {
            tracing::info!(location, "no geocoding match; keeping last coordinates");
            last_known
        }
        GeocodeOutcome::Failed(detail) => {
            tracing::warn!(location, %detail, "geocoding failed; keeping last coordinates");
            last_known
        }
    }
}

/// Slippy-map tile containing `coordinates` at `zoom`.
pub fn tile_for(coordinates: Coordinates, zoom: u8) -> (u32, u32) {
    let n = f64::from(1u32 << zoom);
    let lat = coordinates.latitude.clamp(-85.0511, 85.0511).to_radians();
    let x = ((coordinates.longitude + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n).floor();
    let max = n - 1.0;
    (x.clamp(0.0, max) as u32, y.clamp(0.0, max) as u32)
}

pub fn street_map_url(coordinates: Coordinates) -> String {
    format!(
        "https://www.openstreetmap.org/?mlat={lat:.5}&mlon={lon:.5}#map={MAP_ZOOM}/{lat:.5}/{lon:.5}",
        lat = coordinates.latitude,
        lon = coordinates.longitude,
    )
}

pub fn satellite_tile_url(coordinates: Coordinates) -> String {
    let (x, y) = tile_for(coordinates, MAP_ZOOM);
    format!(
        "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{MAP_ZOOM}/{y}/{x}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedGeocoder(GeocodeOutcome);

    impl Geocoder for FixedGeocoder {
        fn lookup(&self, _location: &str) -> GeocodeOutcome {
            self.0.clone()
        }
    }

    const PETALING_JAYA: Coordinates = Coordinates {
        latitude: 3.1073,
        longitude: 101.6067,
    };

    #[test]
    fn resolved_lookup_replaces_coordinates() {
        let geocoder = FixedGeocoder(GeocodeOutcome::Resolved(PETALING_JAYA));
        let coords = resolve_coordinates(&geocoder, "Petaling Jaya", DEFAULT_COORDINATES);
        assert_eq!(coords, PETALING_JAYA);
    }

    #[test]
    fn unresolvable_location_reuses_previous_coordinates() {
        let geocoder = FixedGeocoder(GeocodeOutcome::NoMatch);
        let coords = resolve_coordinates(&geocoder, "zzqx nowhere", PETALING_JAYA);
        assert_eq!(coords, PETALING_JAYA);
    }

    #[test]
    fn failed_lookup_reuses_previous_coordinates() {
        let geocoder = FixedGeocoder(GeocodeOutcome::Failed("connection refused".to_string()));
        let coords = resolve_coordinates(&geocoder, "Cheras, KL", PETALING_JAYA);
        assert_eq!(coords, PETALING_JAYA);
    }

    #[test]
    fn parses_first_search_result() {
        let body = r#"[{"place_id":1,"lat":"3.0851","lon":"101.7434","display_name":"Cheras"},
                       {"place_id":2,"lat":"0","lon":"0"}]"#;
        assert_eq!(
            parse_search_response(body),
            GeocodeOutcome::Resolved(Coordinates {
                latitude: 3.0851,
                longitude: 101.7434
            })
        );
    }

    #[test]
    fn empty_result_is_no_match() {
        assert_eq!(parse_search_response("[]"), GeocodeOutcome::NoMatch);
    }

    #[test]
    fn malformed_bodies_are_failures() {
        assert!(matches!(
            parse_search_response("<html>rate limited</html>"),
            GeocodeOutcome::Failed(_)
        ));
        assert!(matches!(
            parse_search_response(r#"[{"lat":"north","lon":"101.7"}]"#),
            GeocodeOutcome::Failed(_)
        ));
        assert!(matches!(
            parse_search_response(r#"[{"lat":"91.0","lon":"101.7"}]"#),
            GeocodeOutcome::Failed(_)
        ));
    }

    #[test]
    fn unreachable_geocoder_falls_back() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind unused port");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let config = GeocoderConfig {
            base_url: format!("http://127.0.0.1:{port}"),
            timeout_secs: 2,
            ..GeocoderConfig::default()
        };
        let geocoder = NominatimGeocoder::new(&config);
        assert!(matches!(
            geocoder.lookup("Cheras, KL"),
            GeocodeOutcome::Failed(_)
        ));
        assert_eq!(
            resolve_coordinates(&geocoder, "Cheras, KL", PETALING_JAYA),
            PETALING_JAYA
        );
    }

    #[test]
    fn blank_location_is_no_match_without_network() {
        let geocoder = NominatimGeocoder::new(&GeocoderConfig::default());
        assert_eq!(geocoder.lookup("   "), GeocodeOutcome::NoMatch);
    }

    #[test]
    fn query_appends_country_suffix() {
        let geocoder = NominatimGeocoder::new(&GeocoderConfig::default());
        assert_eq!(geocoder.query_for("Cheras, KL"), "Cheras, KL, Malaysia");
        let bare = NominatimGeocoder::new(&GeocoderConfig {
            country_suffix: " ".to_string(),
            ..GeocoderConfig::default()
        });
        assert_eq!(bare.query_for("Cheras, KL"), "Cheras, KL");
    }

    #[test]
    fn kuala_lumpur_tile_at_zoom_14() {
        assert_eq!(tile_for(DEFAULT_COORDINATES, MAP_ZOOM), (12819, 8049));
        assert_eq!(
            satellite_tile_url(DEFAULT_COORDINATES),
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/14/8049/12819"
        );
    }

    #[test]
    fn street_map_url_centres_on_site() {
        assert_eq!(
            street_map_url(DEFAULT_COORDINATES),
            "https://www.openstreetmap.org/?mlat=3.13900&mlon=101.68600#map=14/3.13900/101.68600"
        );
    }
}
