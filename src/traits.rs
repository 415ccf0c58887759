//! Core seams of the dispatch engine.
//!
//! The engine is written against these traits so the surrounding simulation
//! can plug in its own travel-time model, coordinate matrix source and
//! analytics sink.

use crate::cost::CostError;
use crate::events::SubmissionEvent;
use crate::network::{Arc, TravelMatrix};

/// Simulated time in whole seconds.
pub type Time = i64;

/// Monetary or generalised cost.
pub type Cost = f64;

/// Time-dependent travel time and cost of network arcs.
///
/// Implementations must be deterministic and total over their horizon.
/// Queries outside the horizon fail with [`CostError::OutOfHorizon`].
pub trait CostModel: Send + Sync {
    /// Travel time of `arc` when entering it at `departure`.
    fn time_on_departure(&self, arc: &Arc, departure: Time) -> Result<Time, CostError>;

    /// Travel time of `arc` for a traversal that leaves it at `arrival`.
    fn time_on_arrival(&self, arc: &Arc, arrival: Time) -> Result<Time, CostError>;

    /// Cost of traversing `arc` when entering it at `departure`.
    fn cost_on_departure(&self, arc: &Arc, departure: Time) -> Result<Cost, CostError>;
}

/// Provides travel durations and distances between a set of coordinates.
///
/// The matrix is indexed by the provided location order.
pub trait TravelMatrixProvider {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<TravelMatrix, MatrixError>;
}

/// Receives one event per submitted request, assigned or rejected.
pub trait DispatchObserver {
    fn on_submission(&mut self, event: &SubmissionEvent);
}

#[derive(Debug)]
pub enum MatrixError {
    Http(reqwest::Error),
    /// The provider answered, but not with an `n x n` matrix.
    Malformed(String),
}

impl std::fmt::Display for MatrixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatrixError::Http(err) => write!(f, "travel matrix request failed: {}", err),
            MatrixError::Malformed(msg) => write!(f, "malformed travel matrix: {}", msg),
        }
    }
}

impl std::error::Error for MatrixError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MatrixError::Http(err) => Some(err),
            MatrixError::Malformed(_) => None,
        }
    }
}

impl From<reqwest::Error> for MatrixError {
    fn from(err: reqwest::Error) -> Self {
        MatrixError::Http(err)
    }
}
