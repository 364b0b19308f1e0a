// Stop-set fingerprints and route similarity
// This file derives an order-independent identity from a set of stops and
// scores how closely two stop sets describe the same trip
//
// Numan Thabit 2025 Nov

use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::models::{OptimizedRouteResult, Stop};

/// Hex digest over the sorted, de-duplicated stop keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of_stops(stops: &[Stop]) -> Self {
        let keys: BTreeSet<String> = stops.iter().map(Stop::key).collect();
        let mut hasher = Blake2b512::new();
        for key in &keys {
            // length prefix keeps ("ab","c") and ("a","bc") apart
            hasher.update((key.len() as u64).to_le_bytes());
            hasher.update(key.as_bytes());
        }
        let hash = hasher.finalize();
        Self(hex::encode(&hash[..32]))
    }

    pub fn of_result(result: &OptimizedRouteResult) -> Self {
        Self::of_stops(result.optimized_stops())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Endpoint keys plus the set of interior keys of an ordered route
#[derive(Debug, Clone, PartialEq)]
pub struct StopSetShape {
    start: Option<String>,
    end: Option<String>,
    interior: BTreeSet<String>,
}

impl StopSetShape {
    pub fn of_stops(stops: &[Stop]) -> Self {
        let keys: Vec<String> = stops.iter().map(Stop::key).collect();
        let start = keys.first().cloned();
        let end = keys.last().cloned();
        let interior = if keys.len() > 2 {
            keys[1..keys.len() - 1]
                .iter()
                .filter(|key| Some(*key) != start.as_ref() && Some(*key) != end.as_ref())
                .cloned()
                .collect()
        } else {
            BTreeSet::new()
        };
        Self { start, end, interior }
    }

    /// Interior overlap ratio (shared / union) when both routes share the
    /// same start and end, `None` otherwise. Two routes with no interior
    /// stops and equal endpoints score 1.0.
    pub fn overlap(&self, other: &StopSetShape) -> Option<f64> {
        if self.start.is_none() || self.start != other.start || self.end != other.end {
            return None;
        }
        let union = self.interior.union(&other.interior).count();
        if union == 0 {
            return Some(1.0);
        }
        let shared = self.interior.intersection(&other.interior).count();
        Some(shared as f64 / union as f64)
    }
}

/// Dedup rule: a stored route matches when its fingerprint is equal, or
/// when the interior overlap strictly exceeds `threshold`.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityRule {
    pub threshold: f64,
}

impl SimilarityRule {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Score of `stored` against `candidate`; 1.0 for an exact fingerprint match.
    pub fn score(&self, candidate: &[Stop], stored: &[Stop]) -> Option<f64> {
        if Fingerprint::of_stops(candidate) == Fingerprint::of_stops(stored) {
            return Some(1.0);
        }
        StopSetShape::of_stops(candidate)
            .overlap(&StopSetShape::of_stops(stored))
            .filter(|ratio| *ratio > self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stops(names: &[&str]) -> Vec<Stop> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Stop::new(*n, format!("{n} street"), i as f64, 0.0))
            .collect()
    }

    #[test]
    fn test_permutation_invariant() {
        let base = stops(&["a", "b", "c", "d", "e"]);
        let fp = Fingerprint::of_stops(&base);
        let mut shuffled = base.clone();
        shuffled.reverse();
        assert_eq!(Fingerprint::of_stops(&shuffled), fp);
        shuffled.swap(1, 3);
        assert_eq!(Fingerprint::of_stops(&shuffled), fp);
    }

    #[test]
    fn test_changes_with_membership() {
        let base = stops(&["a", "b", "c"]);
        let fp = Fingerprint::of_stops(&base);
        assert_ne!(Fingerprint::of_stops(&stops(&["a", "b"])), fp);
        assert_ne!(Fingerprint::of_stops(&stops(&["a", "b", "c", "d"])), fp);
        assert_ne!(Fingerprint::of_stops(&stops(&["a", "b", "x"])), fp);
    }

    #[test]
    fn test_ignores_display_name_and_coordinates() {
        let a = vec![Stop::new("Home", "1 Main St", 0.0, 0.0)];
        let b = vec![Stop::new("My place", "1 main st", 0.001, 0.001)];
        assert_eq!(Fingerprint::of_stops(&a), Fingerprint::of_stops(&b));
    }

    #[test]
    fn test_digest_is_hex_of_32_bytes() {
        let fp = Fingerprint::of_stops(&stops(&["a"]));
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_overlap_requires_same_endpoints() {
        let a = StopSetShape::of_stops(&stops(&["s", "x", "y", "e"]));
        let b = StopSetShape::of_stops(&stops(&["e", "x", "y", "s"]));
        assert_eq!(a.overlap(&b), None);
    }

    #[test]
    fn test_overlap_ratio() {
        let a = StopSetShape::of_stops(&stops(&["s", "b", "c", "d", "e"]));
        let b = StopSetShape::of_stops(&stops(&["s", "b", "c", "x", "e"]));
        // shared {b, c}, union {b, c, d, x}
        assert_eq!(a.overlap(&b), Some(0.5));
    }

    #[test]
    fn test_similarity_threshold_is_strict() {
        let rule = SimilarityRule::new(0.5);
        let a = stops(&["s", "b", "c", "d", "e"]);
        let b = stops(&["s", "b", "c", "x", "e"]);
        assert_eq!(rule.score(&a, &b), None);

        let rule = SimilarityRule::new(0.4);
        assert_eq!(rule.score(&a, &b), Some(0.5));
    }

    #[test]
    fn test_exact_match_scores_one() {
        let rule = SimilarityRule::new(0.9);
        let a = stops(&["s", "b", "c", "e"]);
        let mut b = a.clone();
        b.swap(0, 3);
        assert_eq!(rule.score(&a, &b), Some(1.0));
    }
}
