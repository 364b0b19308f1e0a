// Error types and error handling module
// This file defines the typed failures each subsystem surfaces to its
// immediate caller: optimization, routing, persistence and admin access
//
// Numan Thabit 2025 Nov

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizationError {
    #[error("travel cost matrix unavailable: {0}")]
    MatrixUnavailable(String),
    #[error("travel cost matrix has no usable entries")]
    EmptyMatrix,
    #[error("cost matrix is {found}x{found} but {expected} stops were supplied")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("{count} stops exceeds the configured maximum of {max}")]
    TooManyStops { count: usize, max: usize },
}

/// Failure reported by a directions provider. The core does not retry these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RoutingError {
    #[error("no route found: {0}")]
    NoRoute(String),
    #[error("directions provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("directions provider rate limited")]
    RateLimited,
    #[error("invalid directions response: {0}")]
    InvalidResponse(String),
}

impl RoutingError {
    pub fn kind(&self) -> &'static str {
        match self {
            RoutingError::NoRoute(_) => "no_route",
            RoutingError::ProviderUnavailable(_) => "unavailable",
            RoutingError::RateLimited => "rate_limited",
            RoutingError::InvalidResponse(_) => "invalid_response",
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("saved route not found: {0}")]
    NotFound(String),
    #[error("saved route {0} already exists")]
    Conflict(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    #[error("admin access denied after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Failures of the plan pipeline (ordering, then directions).
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Optimization(#[from] OptimizationError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
}
