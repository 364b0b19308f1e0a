// Configuration management module
// This file handles loading and validation of planner settings
// from environment variables, with defaults for every field
//
// Numan Thabit 2025 Nov

use anyhow::{ensure, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::directions::Units;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub optimizer: OptimizerConfig,
    pub dedup: DedupConfig,
    pub admin: AdminConfig,
    pub stats: StatsConfig,
    pub directions: DirectionsConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load from `ROUTE_PLANNER__*` environment variables, e.g.
    /// `ROUTE_PLANNER__ADMIN__MAX_ATTEMPTS=5`.
    pub fn load() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("ROUTE_PLANNER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        let cfg: Self = cfg.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.optimizer.max_stops > 0, "optimizer.max_stops must be positive");
        ensure!(
            self.dedup.similarity_threshold > 0.0 && self.dedup.similarity_threshold <= 1.0,
            "dedup.similarity_threshold must be in (0, 1], got {}",
            self.dedup.similarity_threshold
        );
        ensure!(self.admin.max_attempts > 0, "admin.max_attempts must be positive");
        ensure!(
            self.directions.average_speed_kph > 0.0,
            "directions.average_speed_kph must be positive"
        );
        ensure!(self.stats.error_window_days > 0, "stats.error_window_days must be positive");
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Largest stop count accepted by the optimizer
    pub max_stops: usize,
    /// Upper bound on pairwise-swap improvement passes
    pub max_improvement_passes: usize,
    /// Cache orderings of repeated identical requests
    pub memoize: bool,
    /// Most orderings kept; oldest are evicted first
    pub memo_capacity: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_stops: 25,
            max_improvement_passes: 50,
            memoize: true,
            memo_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Overlap ratio a stored route must exceed to count as the same trip
    pub similarity_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl AdminConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Error count at which system health flips to "Warning"
    pub health_error_threshold: u64,
    /// Trailing window (days) over which errors and events are counted
    pub error_window_days: i64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            health_error_threshold: 10,
            error_window_days: 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectionsConfig {
    pub units: Units,
    /// Speed assumed by the offline great-circle estimator
    pub average_speed_kph: f64,
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            units: Units::Imperial,
            average_speed_kph: 50.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON document backing the route store; in-memory when unset
    pub path: Option<PathBuf>,
}
