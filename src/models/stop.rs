// Stop model representing a single waypoint in a route

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// WGS84 coordinates in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance in meters
    pub fn haversine_m(&self, other: &Coordinates) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub display_name: String,
    pub address: String,
    /// Provider place identifier, preferred over the address for identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(flatten)]
    pub coordinates: Coordinates,
}

impl Stop {
    pub fn new(display_name: impl Into<String>, address: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            display_name: display_name.into(),
            address: address.into(),
            place_id: None,
            coordinates: Coordinates::new(lat, lng),
        }
    }

    pub fn with_place_id(mut self, place_id: impl Into<String>) -> Self {
        self.place_id = Some(place_id.into());
        self
    }

    /// Normalized identity of this stop: place id when known, otherwise the
    /// address (falling back to the display name) lowercased with whitespace
    /// collapsed.
    pub fn key(&self) -> String {
        if let Some(id) = self.place_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            return format!("place:{id}");
        }
        let text = if self.address.trim().is_empty() {
            &self.display_name
        } else {
            &self.address
        };
        let normalized = text
            .split_whitespace()
            .map(|word| word.trim_matches(',').to_lowercase())
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        format!("addr:{normalized}")
    }
}
