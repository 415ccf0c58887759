//! Observability stream of request submissions.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::network::VertexId;
use crate::request::RequestId;
use crate::traits::{DispatchObserver, Time};
use crate::vehicle::VehicleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionOutcome {
    Assigned { vehicle: VehicleId, pickup_begin: Time },
    Rejected,
}

/// Emitted once per submitted request, whatever the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionEvent {
    pub time: Time,
    pub request: RequestId,
    pub traveler: u64,
    pub origin: VertexId,
    pub destination: VertexId,
    /// Unshared travel time from origin to destination, if routable.
    pub direct_travel_time: Option<Time>,
    pub outcome: SubmissionOutcome,
}

/// Collects every event it observes.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<SubmissionEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SubmissionEvent] {
        &self.events
    }

    pub fn rejected(&self) -> impl Iterator<Item = &SubmissionEvent> {
        self.events
            .iter()
            .filter(|event| event.outcome == SubmissionOutcome::Rejected)
    }
}

impl DispatchObserver for EventLog {
    fn on_submission(&mut self, event: &SubmissionEvent) {
        self.events.push(event.clone());
    }
}

/// Shares one log between the dispatcher and whoever reads it.
impl DispatchObserver for std::sync::Arc<std::sync::Mutex<EventLog>> {
    fn on_submission(&mut self, event: &SubmissionEvent) {
        let mut log = self.lock().unwrap_or_else(|poisoned| {
            warn!(request = %event.request, "event log lock poisoned, recording anyway");
            poisoned.into_inner()
        });
        log.on_submission(event);
    }
}
