// Admin access
// Bounded, sequential re-checks of the caller's admin claim

pub mod gate;
pub mod retry;

pub use gate::{AdminAccessGate, AdminCheckState, DelayFn, IdentityProvider};
pub use retry::{retry_sequential, Attempted, RetryExhausted, RetryPolicy};
