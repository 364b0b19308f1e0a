// Route assembler
// Combines an ordered stop sequence with its legs into an OptimizedRouteResult,
// deriving the formatted totals from the leg values
//
// Numan Thabit 2025 Nov

use crate::directions::{format_distance, format_duration, Units};
use crate::errors::RoutingError;
use crate::models::{Leg, OptimizedRouteResult, Stop};

#[derive(Debug, Clone, Copy, Default)]
pub struct RouteAssembler {
    units: Units,
}

impl RouteAssembler {
    pub fn new(units: Units) -> Self {
        Self { units }
    }

    /// Fails when the provider returned a leg count that does not match the stops.
    pub fn assemble(&self, stops: Vec<Stop>, legs: Vec<Leg>) -> Result<OptimizedRouteResult, RoutingError> {
        let expected = stops.len().saturating_sub(1);
        if legs.len() != expected {
            return Err(RoutingError::InvalidResponse(format!(
                "expected {expected} legs for {} stops, got {}",
                stops.len(),
                legs.len()
            )));
        }
        // fold from +0.0: an empty f64 sum is -0.0 and would print "-0.0 mi"
        let meters = legs.iter().fold(0.0, |acc, leg| acc + leg.distance.value);
        let seconds = legs.iter().fold(0.0, |acc, leg| acc + leg.duration.value);
        Ok(OptimizedRouteResult::from_parts(
            stops,
            legs,
            format_distance(meters, self.units),
            format_duration(seconds),
        ))
    }
}
