// Route optimizer - orders a stop set into a visiting sequence
// This file implements the bounded heuristic front end: constraint handling,
// matrix validation and a bounded cache of orderings for repeated requests
//
// Numan Thabit 2025 Nov

mod heuristic;
pub mod matrix;

pub use matrix::{CostMatrix, CostMetric, TravelMatrixProvider};

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::OptimizerConfig;
use crate::errors::OptimizationError;
use crate::fingerprint::Fingerprint;
use crate::metrics::OPTIMIZE_LATENCY;
use crate::models::Stop;
use heuristic::Pins;

/// Endpoint constraints for one optimization request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Constraints {
    /// First input stop stays first
    pub fixed_start: bool,
    /// Last input stop stays last (ignored for round trips)
    pub fixed_end: bool,
    /// Route returns to the first input stop, which is therefore pinned
    pub round_trip: bool,
}

impl Constraints {
    fn pins(&self) -> Pins {
        Pins {
            start: self.fixed_start || self.round_trip,
            end: self.fixed_end && !self.round_trip,
            closed: self.round_trip,
        }
    }
}

/// A permutation of the input stops
#[derive(Debug, Clone, PartialEq)]
pub struct StopOrder {
    /// `indices[k]` is the input position of the k-th visited stop
    pub indices: Vec<usize>,
    /// Objective value in the metric's unit
    pub cost: f64,
}

impl StopOrder {
    pub fn identity(len: usize) -> Self {
        Self {
            indices: (0..len).collect(),
            cost: 0.0,
        }
    }

    pub fn apply(&self, stops: &[Stop]) -> Vec<Stop> {
        self.indices.iter().map(|i| stops[*i].clone()).collect()
    }
}

/// Identifies one exact request: the same stops in the same input order under
/// the same constraints. Permutations of a stop set are distinct entries, since
/// ties resolve toward the input order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemoKey {
    fingerprint: Fingerprint,
    sequence: Vec<String>,
    constraints: Constraints,
}

impl MemoKey {
    fn new(stops: &[Stop], constraints: Constraints) -> Self {
        Self {
            fingerprint: Fingerprint::of_stops(stops),
            sequence: stops.iter().map(Stop::key).collect(),
            constraints,
        }
    }
}

/// Insertion-ordered cache; the oldest entry goes first once `capacity` is reached.
#[derive(Debug, Default)]
struct Memo {
    entries: HashMap<MemoKey, StopOrder>,
    order: VecDeque<MemoKey>,
}

impl Memo {
    fn get(&self, key: &MemoKey) -> Option<&StopOrder> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: MemoKey, order: StopOrder, capacity: usize) {
        if capacity == 0 {
            return;
        }
        if self.entries.insert(key.clone(), order).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct RouteOptimizer {
    config: OptimizerConfig,
    /// Distance-metric orderings by exact request
    memo: RwLock<Memo>,
}

impl RouteOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            memo: RwLock::new(Memo::default()),
        }
    }

    fn memoizable(&self, metric: CostMetric) -> bool {
        // traffic-aware durations drift between requests
        self.config.memoize && metric == CostMetric::Distance
    }

    /// Ordering previously computed for exactly this input sequence and constraints.
    pub fn lookup(&self, stops: &[Stop], constraints: Constraints, metric: CostMetric) -> Option<StopOrder> {
        if !self.memoizable(metric) {
            return None;
        }
        let memo = self.memo.read().ok()?;
        let order = memo.get(&MemoKey::new(stops, constraints))?.clone();
        debug!(stops = stops.len(), "optimizer memo hit");
        Some(order)
    }

    /// Number of cached orderings
    pub fn cached_orderings(&self) -> usize {
        self.memo.read().map(|memo| memo.len()).unwrap_or(0)
    }

    /// Order `stops` against `matrix`, honoring `constraints`.
    pub fn optimize(
        &self,
        stops: &[Stop],
        constraints: Constraints,
        metric: CostMetric,
        matrix: &CostMatrix,
    ) -> Result<StopOrder, OptimizationError> {
        let n = stops.len();
        if n > self.config.max_stops {
            return Err(OptimizationError::TooManyStops {
                count: n,
                max: self.config.max_stops,
            });
        }
        if n <= 1 {
            return Ok(StopOrder::identity(n));
        }
        if let Some(order) = self.lookup(stops, constraints, metric) {
            return Ok(order);
        }
        if matrix.size() != n {
            return Err(OptimizationError::DimensionMismatch {
                expected: n,
                found: matrix.size(),
            });
        }
        if matrix.usable_entries() == 0 {
            return Err(OptimizationError::EmptyMatrix);
        }

        let started = Instant::now();
        let (indices, cost) = heuristic::solve(&matrix.dense(), constraints.pins(), self.config.max_improvement_passes);
        OPTIMIZE_LATENCY
            .with_label_values(&[metric_label(metric)])
            .observe(started.elapsed().as_secs_f64());
        debug!(
            stops = n,
            cost = cost,
            fixed_start = constraints.fixed_start,
            fixed_end = constraints.fixed_end,
            round_trip = constraints.round_trip,
            "optimized stop order"
        );

        let order = StopOrder { indices, cost };
        if self.memoizable(metric) {
            match self.memo.write() {
                Ok(mut memo) => memo.insert(MemoKey::new(stops, constraints), order.clone(), self.config.memo_capacity),
                Err(_) => warn!("optimizer memo lock poisoned; skipping cache"),
            }
        }

        Ok(order)
    }
}

fn metric_label(metric: CostMetric) -> &'static str {
    match metric {
        CostMetric::Distance => "distance",
        CostMetric::Duration => "duration",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optimizer() -> RouteOptimizer {
        RouteOptimizer::new(OptimizerConfig::default())
    }

    /// Stops spread along a meridian at the given latitudes
    fn stops_at(lats: &[f64]) -> Vec<Stop> {
        lats.iter()
            .enumerate()
            .map(|(i, lat)| Stop::new(format!("S{i}"), format!("{i} Meridian Rd"), *lat, 0.0))
            .collect()
    }

    #[test]
    fn test_fixed_endpoints_are_respected() {
        let stops = stops_at(&[0.0, 0.3, 0.1, 0.2, 0.4]);
        let constraints = Constraints {
            fixed_start: true,
            fixed_end: true,
            round_trip: false,
        };
        for _ in 0..5 {
            let order = optimizer()
                .optimize(&stops, constraints, CostMetric::Distance, &CostMatrix::great_circle(&stops))
                .unwrap();
            assert_eq!(order.indices.first(), Some(&0));
            assert_eq!(order.indices.last(), Some(&4));
            assert_eq!(order.indices, vec![0, 2, 3, 1, 4]);
        }
    }

    #[test]
    fn test_round_trip_ignores_fixed_end() {
        let stops = stops_at(&[0.0, 0.3, 0.1, 0.2]);
        let constraints = Constraints {
            fixed_start: false,
            fixed_end: true,
            round_trip: true,
        };
        let order = optimizer()
            .optimize(&stops, constraints, CostMetric::Distance, &CostMatrix::great_circle(&stops))
            .unwrap();
        assert_eq!(order.indices[0], 0);
        assert_eq!(order.indices.len(), 4);
    }

    #[test]
    fn test_single_stop_needs_no_matrix() {
        let stops = stops_at(&[1.0]);
        let order = optimizer()
            .optimize(&stops, Constraints::default(), CostMetric::Distance, &CostMatrix::new(0))
            .unwrap();
        assert_eq!(order.indices, vec![0]);
    }

    #[test]
    fn test_empty_matrix_fails() {
        let stops = stops_at(&[0.0, 1.0, 2.0]);
        let err = optimizer()
            .optimize(&stops, Constraints::default(), CostMetric::Distance, &CostMatrix::new(3))
            .unwrap_err();
        assert_eq!(err, OptimizationError::EmptyMatrix);
    }

    #[test]
    fn test_dimension_mismatch_fails() {
        let stops = stops_at(&[0.0, 1.0, 2.0]);
        let err = optimizer()
            .optimize(&stops, Constraints::default(), CostMetric::Distance, &CostMatrix::great_circle(&stops[..2]))
            .unwrap_err();
        assert_eq!(err, OptimizationError::DimensionMismatch { expected: 3, found: 2 });
    }

    #[test]
    fn test_too_many_stops() {
        let opt = RouteOptimizer::new(OptimizerConfig {
            max_stops: 2,
            ..Default::default()
        });
        let stops = stops_at(&[0.0, 1.0, 2.0]);
        let err = opt
            .optimize(&stops, Constraints::default(), CostMetric::Distance, &CostMatrix::great_circle(&stops))
            .unwrap_err();
        assert_eq!(err, OptimizationError::TooManyStops { count: 3, max: 2 });
    }

    fn names(order: &StopOrder, stops: &[Stop]) -> Vec<String> {
        order.apply(stops).iter().map(|s| s.display_name.clone()).collect()
    }

    #[test]
    fn test_identical_request_is_served_from_cache() {
        let opt = optimizer();
        let stops = stops_at(&[0.0, 0.3, 0.1, 0.2]);
        let constraints = Constraints {
            fixed_start: true,
            ..Default::default()
        };
        let first = opt
            .optimize(&stops, constraints, CostMetric::Distance, &CostMatrix::great_circle(&stops))
            .unwrap();
        // no usable matrix: only the cache can answer
        let again = opt
            .optimize(&stops, constraints, CostMetric::Distance, &CostMatrix::new(4))
            .unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_permuted_input_is_not_answered_from_cache() {
        // B and C are equidistant from A, so the tie follows input order
        let a = Stop::new("A", "a", 0.0, 0.0);
        let b = Stop::new("B", "b", 0.01, 0.0);
        let c = Stop::new("C", "c", -0.01, 0.0);
        let constraints = Constraints {
            fixed_start: true,
            ..Default::default()
        };
        let acb = vec![a.clone(), c.clone(), b.clone()];
        let abc = vec![a, b, c];

        let fresh = optimizer()
            .optimize(&acb, constraints, CostMetric::Distance, &CostMatrix::great_circle(&acb))
            .unwrap();

        let warmed = optimizer();
        warmed
            .optimize(&abc, constraints, CostMetric::Distance, &CostMatrix::great_circle(&abc))
            .unwrap();
        assert!(warmed.lookup(&acb, constraints, CostMetric::Distance).is_none());
        let after = warmed
            .optimize(&acb, constraints, CostMetric::Distance, &CostMatrix::great_circle(&acb))
            .unwrap();

        assert_eq!(names(&fresh, &acb), names(&after, &acb));
        assert_eq!(names(&fresh, &acb), vec!["A", "C", "B"]);
    }

    #[test]
    fn test_cache_evicts_oldest_beyond_capacity() {
        let opt = RouteOptimizer::new(OptimizerConfig {
            memo_capacity: 2,
            ..Default::default()
        });
        let requests: Vec<Vec<Stop>> = (0..3)
            .map(|r| {
                let base = r as f64;
                [base, base + 0.2, base + 0.1]
                    .iter()
                    .enumerate()
                    .map(|(i, lat)| Stop::new(format!("R{r}S{i}"), format!("{r}-{i} Meridian Rd"), *lat, 0.0))
                    .collect()
            })
            .collect();
        for stops in &requests {
            opt.optimize(stops, Constraints::default(), CostMetric::Distance, &CostMatrix::great_circle(stops))
                .unwrap();
        }
        assert_eq!(opt.cached_orderings(), 2);
        assert!(opt.lookup(&requests[0], Constraints::default(), CostMetric::Distance).is_none());
        assert!(opt.lookup(&requests[2], Constraints::default(), CostMetric::Distance).is_some());
    }

    #[test]
    fn test_duration_metric_is_not_memoized() {
        let opt = optimizer();
        let stops = stops_at(&[0.0, 0.3, 0.1]);
        opt.optimize(&stops, Constraints::default(), CostMetric::Duration, &CostMatrix::great_circle(&stops))
            .unwrap();
        assert!(opt.lookup(&stops, Constraints::default(), CostMetric::Duration).is_none());
    }
}
