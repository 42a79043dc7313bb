//! # Dashboard Server Client
//!
//! Blocking HTTP client for the local dashboard server that aggregates
//! weather, flight, alert, and Spotify data. Every call degrades gracefully:
//! a failed request yields the cached or default value instead of an error
//! bubbling into the render loop, because a stale panel beats a blank one.

use crate::art::DisplaySettings;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const FAST_TIMEOUT: Duration = Duration::from_secs(5);

/// Half-width in degrees of the flight search bounding box.
const SEARCH_BOX_DEGREES: f64 = 0.5;
/// Radius in km passed to the special-alerts endpoint.
const ALERT_RANGE_KM: u32 = 100;
/// Mean Earth radius in km for haversine distances.
const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] Box<ureq::Error>),
    #[error("failed to read response: {0}")]
    Io(#[from] std::io::Error),
}

/// Observer location, fetched from the server at startup.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for Location {
    fn default() -> Self {
        // Sydney, used until the server answers.
        Self {
            latitude: -33.9117,
            longitude: 151.1552,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Weather {
    #[serde(default)]
    pub temp: Option<f64>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub humidity: Option<f64>,
}

/// The aircraft closest to the observer, derived from an OpenSky state array.
#[derive(Clone, Debug, PartialEq)]
pub struct Flight {
    pub icao24: String,
    pub callsign: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub velocity: Option<f64>,
    /// Great-circle distance to the observer, rounded to 0.1 km.
    pub distance: f64,
    pub typecode: Option<String>,
    pub registration: Option<String>,
}

/// Aircraft alert lists near the observer.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SpecialAlerts {
    #[serde(default)]
    pub military: Vec<Value>,
    #[serde(default)]
    pub emergency: Vec<Value>,
    #[serde(default)]
    pub vip: Vec<Value>,
}

impl SpecialAlerts {
    pub fn is_empty(&self) -> bool {
        self.military.is_empty() && self.emergency.is_empty() && self.vip.is_empty()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NowPlaying {
    #[serde(default)]
    pub playing: bool,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub track: String,
    #[serde(default)]
    pub album: String,
    #[serde(rename = "albumArt", default)]
    pub album_art: Option<String>,
    #[serde(rename = "albumArtSmall", default)]
    pub album_art_small: Option<String>,
}

impl NowPlaying {
    /// Preferred art URL: the full-size image when present, else the small
    /// variant. Music mode resizes down to 180 px, so starting from the
    /// larger source avoids upscaling.
    pub fn art_url(&self) -> Option<&str> {
        self.album_art
            .as_deref()
            .or(self.album_art_small.as_deref())
    }
}

/// Client for the dashboard server. Holds the observer location and the last
/// good weather reading so transient failures do not blank the panel.
pub struct Client {
    base_url: String,
    agent: ureq::Agent,
    fast_agent: ureq::Agent,
    location: Location,
    last_weather: Option<Weather>,
}

impl Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            agent: ureq::AgentBuilder::new().timeout(DEFAULT_TIMEOUT).build(),
            fast_agent: ureq::AgentBuilder::new().timeout(FAST_TIMEOUT).build(),
            location: Location::default(),
            last_weather: None,
        }
    }

    pub fn location(&self) -> Location {
        self.location
    }

    fn get_json<T: for<'de> Deserialize<'de>>(
        agent: &ureq::Agent,
        url: &str,
    ) -> Result<T, FeedError> {
        let response = agent.get(url).call().map_err(Box::new)?;
        Ok(response.into_json()?)
    }

    /// Fetch the configured observer location, keeping the previous (or
    /// default) one on failure.
    pub fn refresh_location(&mut self) {
        let url = format!("{}/api/config/location", self.base_url);
        match Self::get_json::<Location>(&self.agent, &url) {
            Ok(location) => {
                info!(
                    "Observer location {:.4}, {:.4}",
                    location.latitude, location.longitude
                );
                self.location = location;
            }
            Err(err) => warn!("Location fetch failed, using default: {err}"),
        }
    }

    /// Current weather; on failure returns the last successful reading.
    pub fn weather(&mut self) -> Option<Weather> {
        let url = format!("{}/api/weather", self.base_url);
        match Self::get_json::<Weather>(&self.agent, &url) {
            Ok(weather) => {
                self.last_weather = Some(weather.clone());
                Some(weather)
            }
            Err(err) => {
                warn!("Weather fetch failed, keeping last reading: {err}");
                self.last_weather.clone()
            }
        }
    }

    /// The aircraft nearest the observer inside the search box, if any.
    pub fn closest_flight(&self) -> Option<Flight> {
        let Location {
            latitude: lat,
            longitude: lon,
        } = self.location;
        let url = format!(
            "{}/api/opensky?lamin={}&lamax={}&lomin={}&lomax={}",
            self.base_url,
            lat - SEARCH_BOX_DEGREES,
            lat + SEARCH_BOX_DEGREES,
            lon - SEARCH_BOX_DEGREES,
            lon + SEARCH_BOX_DEGREES,
        );

        #[derive(Deserialize)]
        struct OpenSkyResponse {
            #[serde(default)]
            states: Option<Vec<Vec<Value>>>,
        }

        let response: OpenSkyResponse = match Self::get_json(&self.agent, &url) {
            Ok(r) => r,
            Err(err) => {
                warn!("Flight fetch failed: {err}");
                return None;
            }
        };

        let states = response.states?;
        let closest = states
            .iter()
            .filter_map(|state| parse_state(state, lat, lon))
            .min_by(|a, b| a.distance.total_cmp(&b.distance));
        if let Some(flight) = &closest {
            debug!(
                "Closest aircraft {} at {:.1} km",
                flight.callsign, flight.distance
            );
        }
        closest
    }

    /// Military, emergency, and VIP aircraft alerts near the observer.
    /// Failures produce empty lists.
    pub fn special_alerts(&self) -> SpecialAlerts {
        let url = format!(
            "{}/api/special-alerts?lat={}&lon={}&range={}",
            self.base_url, self.location.latitude, self.location.longitude, ALERT_RANGE_KM,
        );
        match Self::get_json(&self.agent, &url) {
            Ok(alerts) => alerts,
            Err(err) => {
                warn!("Alert fetch failed: {err}");
                SpecialAlerts::default()
            }
        }
    }

    /// What Spotify is playing right now; `None` when stopped or on error.
    pub fn now_playing(&self) -> Option<NowPlaying> {
        let url = format!("{}/api/spotify/now-playing", self.base_url);
        match Self::get_json::<NowPlaying>(&self.fast_agent, &url) {
            Ok(np) if np.playing => Some(np),
            Ok(_) => None,
            Err(err) => {
                debug!("Now-playing fetch failed: {err}");
                None
            }
        }
    }

    /// Server-side display preferences for the now-playing area.
    pub fn display_settings(&self) -> Option<DisplaySettings> {
        let url = format!("{}/api/config/spotify-display", self.base_url);
        match Self::get_json(&self.fast_agent, &url) {
            Ok(settings) => Some(settings),
            Err(err) => {
                debug!("Display settings fetch failed: {err}");
                None
            }
        }
    }
}

/// Great-circle distance between two points in km.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Decode one OpenSky state vector. Indices follow the OpenSky REST API:
/// 0 icao24, 1 callsign, 5 longitude, 6 latitude, 7 baro altitude,
/// 9 velocity, 17 typecode, 18 registration (the last two are extensions
/// added by the dashboard server).
fn parse_state(state: &[Value], obs_lat: f64, obs_lon: f64) -> Option<Flight> {
    if state.len() < 7 {
        return None;
    }
    let longitude = state[5].as_f64()?;
    let latitude = state[6].as_f64()?;
    let distance = haversine_km(obs_lat, obs_lon, latitude, longitude);
    Some(Flight {
        icao24: state[0].as_str().unwrap_or_default().trim().to_string(),
        callsign: state
            .get(1)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        latitude,
        longitude,
        altitude: state.get(7).and_then(Value::as_f64),
        velocity: state.get(9).and_then(Value::as_f64),
        distance: (distance * 10.0).round() / 10.0,
        typecode: state
            .get(17)
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|s| !s.is_empty()),
        registration: state
            .get(18)
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|s| !s.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn haversine_matches_a_known_city_pair() {
        // Sydney to Melbourne is roughly 713 km.
        let d = haversine_km(-33.8688, 151.2093, -37.8136, 144.9631);
        assert!((d - 713.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn haversine_of_identical_points_is_zero() {
        assert_eq!(haversine_km(-33.9, 151.1, -33.9, 151.1), 0.0);
    }

    #[test]
    fn state_vectors_parse_with_extensions() {
        let state = json!([
            "7c6b2d", "QFA12  ", null, null, null, 151.2, -33.8, 10972.8, null, 250.5,
            null, null, null, null, null, null, null, "B738", "VH-VXM"
        ]);
        let flight = parse_state(state.as_array().unwrap(), -33.9117, 151.1552).unwrap();
        assert_eq!(flight.icao24, "7c6b2d");
        assert_eq!(flight.callsign, "QFA12");
        assert_eq!(flight.altitude, Some(10972.8));
        assert_eq!(flight.velocity, Some(250.5));
        assert_eq!(flight.typecode.as_deref(), Some("B738"));
        assert_eq!(flight.registration.as_deref(), Some("VH-VXM"));
        assert!(flight.distance > 0.0);
    }

    #[test]
    fn short_or_positionless_states_are_skipped() {
        let short = json!(["abc123", "XYZ"]);
        assert!(parse_state(short.as_array().unwrap(), 0.0, 0.0).is_none());

        let no_position = json!(["abc123", "XYZ", null, null, null, null, null]);
        assert!(parse_state(no_position.as_array().unwrap(), 0.0, 0.0).is_none());
    }

    #[test]
    fn empty_typecode_and_registration_become_none() {
        let state = json!([
            "abc123", "TEST", null, null, null, 151.0, -33.0, null, null, null,
            null, null, null, null, null, null, null, "", ""
        ]);
        let flight = parse_state(state.as_array().unwrap(), -33.0, 151.0).unwrap();
        assert!(flight.typecode.is_none());
        assert!(flight.registration.is_none());
    }

    #[test]
    fn distance_is_rounded_to_tenths() {
        let state = json!([
            "abc123", "TEST", null, null, null, 151.2, -33.8, null
        ]);
        let flight = parse_state(state.as_array().unwrap(), -33.9117, 151.1552).unwrap();
        assert_eq!(flight.distance, (flight.distance * 10.0).round() / 10.0);
    }

    #[test]
    fn art_url_prefers_the_full_size_image() {
        let mut np = NowPlaying {
            album_art: Some("big.jpg".into()),
            album_art_small: Some("small.jpg".into()),
            ..NowPlaying::default()
        };
        assert_eq!(np.art_url(), Some("big.jpg"));
        np.album_art = None;
        assert_eq!(np.art_url(), Some("small.jpg"));
        np.album_art_small = None;
        assert_eq!(np.art_url(), None);
    }

    #[test]
    fn alerts_emptiness_checks_all_three_lists() {
        let mut alerts = SpecialAlerts::default();
        assert!(alerts.is_empty());
        alerts.vip.push(json!({"callsign": "AF1"}));
        assert!(!alerts.is_empty());
    }

    #[test]
    fn alerts_deserialize_with_missing_lists() {
        let alerts: SpecialAlerts =
            serde_json::from_str(r#"{"military": [{"callsign": "HAWK11"}]}"#).unwrap();
        assert_eq!(alerts.military.len(), 1);
        assert!(alerts.emergency.is_empty());
        assert!(!alerts.is_empty());
    }
}
