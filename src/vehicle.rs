//! Fleet vehicles and their depots.

use serde::{Deserialize, Serialize};

use crate::network::VertexId;
use crate::schedule::{Schedule, ScheduleLimits};
use crate::traits::Time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DepotId(pub u32);

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "veh{}", self.0)
    }
}

/// Home base of one or more vehicles. Reference data only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depot {
    pub id: DepotId,
    pub vertex: VertexId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleError {
    ZeroCapacity(VehicleId),
    /// Operating window with `end <= start`.
    EmptyWindow { id: VehicleId, start: Time, end: Time },
    NonPositiveMaxTimeAway(VehicleId),
}

impl std::fmt::Display for VehicleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VehicleError::ZeroCapacity(id) => write!(f, "vehicle {} has zero capacity", id),
            VehicleError::EmptyWindow { id, start, end } => {
                write!(f, "vehicle {} has an empty operating window [{}, {}]", id, start, end)
            }
            VehicleError::NonPositiveMaxTimeAway(id) => {
                write!(f, "vehicle {} has a non-positive maximum time away from depot", id)
            }
        }
    }
}

impl std::error::Error for VehicleError {}

/// A capacity-limited vehicle with an operating window. Owns its schedule.
#[derive(Debug, Clone)]
pub struct Vehicle {
    id: VehicleId,
    name: String,
    depot: Depot,
    capacity: u32,
    window: (Time, Time),
    max_time_away: Time,
    cost_per_second: f64,
    schedule: Schedule,
}

impl Vehicle {
    /// Creates a vehicle allowed to stay away from its depot for its whole window.
    pub fn new(id: VehicleId, depot: Depot, capacity: u32, window: (Time, Time)) -> Result<Self, VehicleError> {
        let (start, end) = window;
        if capacity == 0 {
            return Err(VehicleError::ZeroCapacity(id));
        }
        if end <= start {
            return Err(VehicleError::EmptyWindow { id, start, end });
        }

        let mut vehicle = Self {
            id,
            name: format!("vehicle-{}", id.0),
            depot,
            capacity,
            window,
            max_time_away: end - start,
            cost_per_second: 0.0,
            schedule: Schedule::new(ScheduleLimits::default()),
        };
        vehicle.schedule = Schedule::new(vehicle.limits());
        Ok(vehicle)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_time_away(mut self, max_time_away: Time) -> Result<Self, VehicleError> {
        if max_time_away <= 0 {
            return Err(VehicleError::NonPositiveMaxTimeAway(self.id));
        }
        self.max_time_away = max_time_away;
        self.schedule = Schedule::new(self.limits());
        Ok(self)
    }

    /// Operating cost per driven second, added to the arc costs when
    /// comparing insertions across vehicles.
    pub fn with_cost_per_second(mut self, cost_per_second: f64) -> Self {
        self.cost_per_second = cost_per_second;
        self
    }

    pub fn limits(&self) -> ScheduleLimits {
        ScheduleLimits {
            capacity: self.capacity,
            start: self.window.0,
            end: self.window.1,
            max_time_away: self.max_time_away,
            depot: self.depot.vertex,
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn depot(&self) -> Depot {
        self.depot
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn window(&self) -> (Time, Time) {
        self.window
    }

    pub fn max_time_away(&self) -> Time {
        self.max_time_away
    }

    pub fn cost_per_second(&self) -> f64 {
        self.cost_per_second
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub(crate) fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }
}
