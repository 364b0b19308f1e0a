// Directions provider interface and offline estimator
// This file defines the collaborator that turns an ordered stop sequence into
// per-leg distance/duration, plus the display formatting for those values
//
// Numan Thabit 2025 Nov

use serde::Deserialize;

use crate::errors::RoutingError;
use crate::models::{Coordinates, Leg, Measure, Stop};

const METERS_PER_MILE: f64 = 1609.344;
const TRAFFIC_FACTOR: f64 = 1.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Imperial,
    Metric,
}

/// "9.9 mi" / "15.9 km"
pub fn format_distance(meters: f64, units: Units) -> String {
    match units {
        Units::Imperial => format!("{:.1} mi", meters / METERS_PER_MILE),
        Units::Metric => format!("{:.1} km", meters / 1000.0),
    }
}

/// "45 min", "1 hr 12 min", "2 hrs"
pub fn format_duration(seconds: f64) -> String {
    let minutes = (seconds.max(0.0) / 60.0).round() as u64;
    let (hours, minutes) = (minutes / 60, minutes % 60);
    let hour_text = match hours {
        0 => return format!("{minutes} min"),
        1 => "1 hr".to_string(),
        h => format!("{h} hrs"),
    };
    if minutes == 0 {
        hour_text
    } else {
        format!("{hour_text} {minutes} min")
    }
}

/// External directions service. Implementations must report one leg per
/// consecutive stop pair, values in meters and seconds.
#[allow(async_fn_in_trait)]
pub trait DirectionsProvider: Send + Sync {
    async fn route(&self, stops: &[Stop], include_traffic: bool) -> Result<Vec<Leg>, RoutingError>;
}

/// Straight-line estimator at a constant average speed. Traffic mode scales
/// durations by a fixed congestion factor.
#[derive(Debug, Clone)]
pub struct GreatCircleEstimator {
    speed_mps: f64,
    units: Units,
}

impl GreatCircleEstimator {
    pub fn new(average_speed_kph: f64, units: Units) -> Self {
        Self {
            speed_mps: average_speed_kph * 1000.0 / 3600.0,
            units,
        }
    }

    pub fn distance_m(&self, from: &Coordinates, to: &Coordinates) -> f64 {
        from.haversine_m(to)
    }

    pub fn duration_s(&self, from: &Coordinates, to: &Coordinates, include_traffic: bool) -> f64 {
        let base = self.distance_m(from, to) / self.speed_mps;
        if include_traffic {
            base * TRAFFIC_FACTOR
        } else {
            base
        }
    }

    fn leg(&self, from: &Stop, to: &Stop, include_traffic: bool) -> Result<Leg, RoutingError> {
        if !from.coordinates.is_valid() || !to.coordinates.is_valid() {
            return Err(RoutingError::NoRoute(format!(
                "invalid coordinates between {} and {}",
                from.display_name, to.display_name
            )));
        }
        let meters = self.distance_m(&from.coordinates, &to.coordinates);
        let seconds = self.duration_s(&from.coordinates, &to.coordinates, include_traffic);
        Ok(Leg {
            distance: Measure {
                value: meters,
                text: format_distance(meters, self.units),
            },
            duration: Measure {
                value: seconds,
                text: format_duration(seconds),
            },
        })
    }
}

impl DirectionsProvider for GreatCircleEstimator {
    async fn route(&self, stops: &[Stop], include_traffic: bool) -> Result<Vec<Leg>, RoutingError> {
        stops
            .windows(2)
            .map(|pair| self.leg(&pair[0], &pair[1], include_traffic))
            .collect()
    }
}
