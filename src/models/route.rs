// Route models: legs, optimized results and saved route records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Stop;
use crate::optimizer::Constraints;

/// A numeric quantity in canonical units (meters or seconds) with its display text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub value: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub distance: Measure,
    pub duration: Measure,
}

/// An ordered route with one leg between each consecutive pair of stops.
///
/// Only the assembler builds these, so the totals always agree with the legs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ResultRecord")]
pub struct OptimizedRouteResult {
    optimized_stops: Vec<Stop>,
    legs: Vec<Leg>,
    total_distance: String,
    estimated_time: String,
}

impl OptimizedRouteResult {
    pub(crate) fn from_parts(
        optimized_stops: Vec<Stop>,
        legs: Vec<Leg>,
        total_distance: String,
        estimated_time: String,
    ) -> Self {
        Self {
            optimized_stops,
            legs,
            total_distance,
            estimated_time,
        }
    }

    pub fn optimized_stops(&self) -> &[Stop] {
        &self.optimized_stops
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn total_distance(&self) -> &str {
        &self.total_distance
    }

    pub fn estimated_time(&self) -> &str {
        &self.estimated_time
    }

    /// Sum of leg distances in meters
    pub fn total_distance_m(&self) -> f64 {
        self.legs.iter().fold(0.0, |acc, leg| acc + leg.distance.value)
    }

    /// Sum of leg durations in seconds
    pub fn total_duration_s(&self) -> f64 {
        self.legs.iter().fold(0.0, |acc, leg| acc + leg.duration.value)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultRecord {
    optimized_stops: Vec<Stop>,
    legs: Vec<Leg>,
    total_distance: String,
    estimated_time: String,
}

impl TryFrom<ResultRecord> for OptimizedRouteResult {
    type Error = String;

    fn try_from(record: ResultRecord) -> Result<Self, Self::Error> {
        let expected = record.optimized_stops.len().saturating_sub(1);
        if record.legs.len() != expected {
            return Err(format!(
                "route has {} stops but {} legs",
                record.optimized_stops.len(),
                record.legs.len()
            ));
        }
        Ok(Self::from_parts(
            record.optimized_stops,
            record.legs,
            record.total_distance,
            record.estimated_time,
        ))
    }
}

/// The user's request before optimization, kept verbatim for replay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalRouteInputs {
    pub stops: Vec<Stop>,
    pub fixed_start: bool,
    pub fixed_end: bool,
    pub round_trip: bool,
    pub include_traffic: bool,
}

impl OriginalRouteInputs {
    pub fn new(stops: Vec<Stop>) -> Self {
        Self {
            stops,
            ..Default::default()
        }
    }

    pub fn constraints(&self) -> Constraints {
        Constraints {
            fixed_start: self.fixed_start,
            fixed_end: self.fixed_end,
            round_trip: self.round_trip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRoute {
    pub id: String,
    pub name: String,
    pub route_result: OptimizedRouteResult,
    pub original_inputs: OriginalRouteInputs,
    pub saved_at: DateTime<Utc>,
    pub is_favorite: bool,
}

impl SavedRoute {
    /// Name derived from the route endpoints, e.g. "Home → Office"
    pub fn default_name(result: &OptimizedRouteResult) -> String {
        match (result.optimized_stops().first(), result.optimized_stops().last()) {
            (Some(first), Some(last)) if result.optimized_stops().len() > 1 => {
                format!("{} → {}", first.display_name, last.display_name)
            }
            (Some(only), _) => only.display_name.clone(),
            _ => "Untitled route".to_string(),
        }
    }
}
