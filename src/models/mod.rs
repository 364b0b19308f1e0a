// Domain models shared by the optimizer, assembler and store

pub mod route;
pub mod stop;

pub use route::{Leg, Measure, OptimizedRouteResult, OriginalRouteInputs, SavedRoute};
pub use stop::{Coordinates, Stop};
