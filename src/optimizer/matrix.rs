// Travel cost matrix and the collaborator that supplies it

use crate::directions::GreatCircleEstimator;
use crate::errors::RoutingError;
use crate::models::Stop;

/// Which travel quantity the optimizer minimizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CostMetric {
    /// Meters
    Distance,
    /// Seconds, traffic-aware when the provider supports it
    Duration,
}

impl CostMetric {
    pub fn for_traffic(include_traffic: bool) -> Self {
        if include_traffic {
            CostMetric::Duration
        } else {
            CostMetric::Distance
        }
    }
}

/// Square matrix of pairwise travel costs. `None` marks a pair the provider
/// could not price.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    size: usize,
    entries: Vec<Option<f64>>,
}

impl CostMatrix {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            entries: vec![None; size * size],
        }
    }

    pub fn from_fn(size: usize, mut f: impl FnMut(usize, usize) -> Option<f64>) -> Self {
        let mut matrix = Self::new(size);
        for from in 0..size {
            for to in 0..size {
                matrix.set(from, to, f(from, to));
            }
        }
        matrix
    }

    /// Straight-line distances in meters
    pub fn great_circle(stops: &[Stop]) -> Self {
        Self::from_fn(stops.len(), |from, to| {
            Some(stops[from].coordinates.haversine_m(&stops[to].coordinates))
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn set(&mut self, from: usize, to: usize, cost: Option<f64>) {
        let cost = cost.filter(|c| c.is_finite() && *c >= 0.0);
        self.entries[from * self.size + to] = cost;
    }

    pub fn get(&self, from: usize, to: usize) -> Option<f64> {
        if from == to {
            return Some(0.0);
        }
        self.entries[from * self.size + to]
    }

    /// Number of priced off-diagonal pairs
    pub fn usable_entries(&self) -> usize {
        (0..self.size)
            .flat_map(|from| (0..self.size).map(move |to| (from, to)))
            .filter(|(from, to)| from != to && self.entries[from * self.size + to].is_some())
            .count()
    }

    /// Dense costs with unpriced pairs replaced by a penalty larger than any
    /// route made only of priced pairs.
    pub(crate) fn dense(&self) -> Vec<Vec<f64>> {
        let max = self.entries.iter().flatten().copied().fold(0.0_f64, f64::max);
        let penalty = (max + 1.0) * self.size.max(1) as f64;
        (0..self.size)
            .map(|from| {
                (0..self.size)
                    .map(|to| self.get(from, to).unwrap_or(penalty))
                    .collect()
            })
            .collect()
    }
}

/// Supplies pairwise costs for a stop set.
#[allow(async_fn_in_trait)]
pub trait TravelMatrixProvider: Send + Sync {
    async fn matrix(
        &self,
        stops: &[Stop],
        metric: CostMetric,
        include_traffic: bool,
    ) -> Result<CostMatrix, RoutingError>;
}

impl TravelMatrixProvider for GreatCircleEstimator {
    async fn matrix(
        &self,
        stops: &[Stop],
        metric: CostMetric,
        include_traffic: bool,
    ) -> Result<CostMatrix, RoutingError> {
        Ok(CostMatrix::from_fn(stops.len(), |from, to| {
            let (a, b) = (&stops[from].coordinates, &stops[to].coordinates);
            Some(match metric {
                CostMetric::Distance => self.distance_m(a, b),
                CostMetric::Duration => self.duration_s(a, b, include_traffic),
            })
        }))
    }
}
