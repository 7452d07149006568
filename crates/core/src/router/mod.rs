//! Conversion routing.
//!
//! The router owns a [`CapabilityMatrix`] built from the registered engines.
//! For each job it looks up the candidates for the `(input, output)` pair and
//! tries them one at a time until one succeeds:
//!
//! - candidates that are not available are skipped without being invoked
//! - each attempt runs on its own task under the engine's timeout
//! - engine progress is mapped into the candidate's slice of the job range
//!
//! When every candidate fails the job fails with the last candidate's message.

mod error;
mod matrix;
mod progress;
mod route;
mod types;

pub use error::RouteError;
pub use matrix::CapabilityMatrix;
pub use progress::{candidate_budget, map_progress};
pub use route::ConversionRouter;
pub use types::{ConversionStrategy, RouteRequest, RouteSuccess, StrategyEntry};
