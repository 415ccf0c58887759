//! Transport demand submitted to the dispatcher.

use serde::{Deserialize, Serialize};

use crate::network::VertexId;
use crate::traits::Time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req{}", self.0)
    }
}

/// Lifecycle of a request. Only the dispatcher moves a request along it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestState {
    Created,
    Submitted,
    Assigned,
    Rejected,
    Served,
    Cancelled,
}

impl RequestState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_become(self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Created, Submitted)
                | (Submitted, Assigned)
                | (Submitted, Rejected)
                | (Assigned, Served)
                | (Assigned, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Rejected | RequestState::Served | RequestState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// Latest pickup lies before the earliest pickup.
    InvertedWindow { id: RequestId, earliest: Time, latest: Time },
    ZeroLoad(RequestId),
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::InvertedWindow { id, earliest, latest } => write!(
                f,
                "request {} has latest pickup {} before earliest pickup {}",
                id, latest, earliest
            ),
            RequestError::ZeroLoad(id) => write!(f, "request {} has no load", id),
        }
    }
}

impl std::error::Error for RequestError {}

/// A pickup-and-delivery demand. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    id: RequestId,
    traveler: u64,
    origin: VertexId,
    destination: VertexId,
    earliest_pickup: Time,
    latest_pickup: Time,
    load: u32,
    submission_time: Time,
}

impl Request {
    pub fn new(
        id: RequestId,
        traveler: u64,
        origin: VertexId,
        destination: VertexId,
        pickup_window: (Time, Time),
        load: u32,
        submission_time: Time,
    ) -> Result<Self, RequestError> {
        let (earliest, latest) = pickup_window;
        if latest < earliest {
            return Err(RequestError::InvertedWindow { id, earliest, latest });
        }
        if load == 0 {
            return Err(RequestError::ZeroLoad(id));
        }

        Ok(Self {
            id,
            traveler,
            origin,
            destination,
            earliest_pickup: earliest,
            latest_pickup: latest,
            load,
            submission_time,
        })
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn traveler(&self) -> u64 {
        self.traveler
    }

    pub fn origin(&self) -> VertexId {
        self.origin
    }

    pub fn destination(&self) -> VertexId {
        self.destination
    }

    pub fn earliest_pickup(&self) -> Time {
        self.earliest_pickup
    }

    pub fn latest_pickup(&self) -> Time {
        self.latest_pickup
    }

    pub fn load(&self) -> u32 {
        self.load
    }

    pub fn submission_time(&self) -> Time {
        self.submission_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_window_rejected() {
        let err = Request::new(RequestId(1), 1, VertexId(0), VertexId(1), (100, 50), 1, 0).unwrap_err();
        assert!(matches!(err, RequestError::InvertedWindow { .. }));
    }

    #[test]
    fn test_zero_load_rejected() {
        let err = Request::new(RequestId(1), 1, VertexId(0), VertexId(1), (0, 50), 0, 0).unwrap_err();
        assert_eq!(err, RequestError::ZeroLoad(RequestId(1)));
    }

    #[test]
    fn test_point_window_allowed() {
        let request = Request::new(RequestId(3), 9, VertexId(0), VertexId(1), (50, 50), 2, 10).unwrap();
        assert_eq!(request.earliest_pickup(), request.latest_pickup());
        assert_eq!(request.load(), 2);
    }

    #[test]
    fn test_lifecycle_transitions() {
        use RequestState::*;
        assert!(Created.can_become(Submitted));
        assert!(Submitted.can_become(Rejected));
        assert!(Assigned.can_become(Served));
        assert!(!Rejected.can_become(Assigned));
        assert!(!Created.can_become(Assigned));
        assert!(Rejected.is_terminal());
        assert!(!Assigned.is_terminal());
    }
}
