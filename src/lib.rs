// Library root module for route-planner
// This file defines the public API and module structure: stop ordering,
// directions assembly, saved-route storage with deduplication, usage
// statistics and the admin access gate
//
// Numan Thabit 2025 Nov

pub mod admin;
pub mod assembler;
pub mod config;
pub mod directions;
pub mod errors;
pub mod fingerprint;
pub mod metrics;
pub mod models;
pub mod optimizer;
pub mod planner;
pub mod stats;
pub mod store;
pub mod telemetry;

pub use assembler::RouteAssembler;
pub use errors::{AuthError, OptimizationError, PersistenceError, PlannerError, RoutingError};
pub use models::{OptimizedRouteResult, OriginalRouteInputs, SavedRoute, Stop};
pub use optimizer::RouteOptimizer;
pub use planner::{PlanOutcome, RoutePlanner};
pub use store::RouteStore;
