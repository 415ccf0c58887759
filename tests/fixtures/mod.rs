//! Test fixtures for fleet-dispatch.
//!
//! Provides:
//! - Real Las Vegas / Henderson locations (from OpenStreetMap)
//! - Small synthetic road networks
//! - Builders for vehicles and requests
//! - A minimal event-driven simulation that drives a dispatcher

#![allow(dead_code)]

pub mod las_vegas_locations;

use fleet_dispatch::dispatcher::{Dispatcher, NextTask};
use fleet_dispatch::network::{Network, VertexId};
use fleet_dispatch::request::{Request, RequestId};
use fleet_dispatch::schedule::ScheduleStatus;
use fleet_dispatch::task::Task;
use fleet_dispatch::traits::{CostModel, Time};
use fleet_dispatch::vehicle::{Depot, DepotId, Vehicle, VehicleId};

// ============================================================================
// Networks
// ============================================================================

/// Vertices `0 <-> 1 <-> ... <-> n-1`, every arc `seconds` long.
pub fn line_network(n: usize, seconds: Time) -> Network {
    let mut network = Network::new();
    let vertices: Vec<VertexId> = (0..n).map(|i| network.add_vertex((0.0, i as f64))).collect();
    for pair in vertices.windows(2) {
        network.add_arc(pair[0], pair[1], 100.0, seconds).unwrap();
        network.add_arc(pair[1], pair[0], 100.0, seconds).unwrap();
    }
    network
}

/// `width x height` grid with two-way streets; vertex `y * width + x`.
pub fn grid_network(width: usize, height: usize, seconds: Time) -> Network {
    let mut network = Network::new();
    for y in 0..height {
        for x in 0..width {
            network.add_vertex((y as f64, x as f64));
        }
    }
    let id = |x: usize, y: usize| VertexId(y * width + x);
    for y in 0..height {
        for x in 0..width {
            if x + 1 < width {
                network.add_arc(id(x, y), id(x + 1, y), 100.0, seconds).unwrap();
                network.add_arc(id(x + 1, y), id(x, y), 100.0, seconds).unwrap();
            }
            if y + 1 < height {
                network.add_arc(id(x, y), id(x, y + 1), 100.0, seconds).unwrap();
                network.add_arc(id(x, y + 1), id(x, y), 100.0, seconds).unwrap();
            }
        }
    }
    network
}

pub fn depot(id: u32, vertex: usize) -> Depot {
    Depot {
        id: DepotId(id),
        vertex: VertexId(vertex),
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Builder for test vehicles with sensible defaults.
#[derive(Clone, Debug)]
pub struct TestVehicle {
    id: u32,
    depot: Depot,
    capacity: u32,
    window: (Time, Time),
    max_time_away: Option<Time>,
    cost_per_second: f64,
}

impl TestVehicle {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            depot: depot(0, 0),
            capacity: 4,
            window: (0, 1000),
            max_time_away: None,
            cost_per_second: 0.0,
        }
    }

    pub fn depot(mut self, depot: Depot) -> Self {
        self.depot = depot;
        self
    }

    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn window(mut self, start: Time, end: Time) -> Self {
        self.window = (start, end);
        self
    }

    pub fn max_time_away(mut self, seconds: Time) -> Self {
        self.max_time_away = Some(seconds);
        self
    }

    pub fn cost_per_second(mut self, cost: f64) -> Self {
        self.cost_per_second = cost;
        self
    }

    pub fn build(self) -> Vehicle {
        let vehicle = Vehicle::new(VehicleId(self.id), self.depot, self.capacity, self.window)
            .unwrap()
            .with_cost_per_second(self.cost_per_second);
        match self.max_time_away {
            Some(seconds) => vehicle.with_max_time_away(seconds).unwrap(),
            None => vehicle,
        }
    }
}

/// Builder for test requests with sensible defaults.
#[derive(Clone, Debug)]
pub struct TestRequest {
    id: u64,
    origin: usize,
    destination: usize,
    window: (Time, Time),
    load: u32,
    submitted_at: Time,
}

impl TestRequest {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            origin: 1,
            destination: 2,
            window: (0, 500),
            load: 1,
            submitted_at: 0,
        }
    }

    pub fn from_to(mut self, origin: usize, destination: usize) -> Self {
        self.origin = origin;
        self.destination = destination;
        self
    }

    pub fn pickup_window(mut self, earliest: Time, latest: Time) -> Self {
        self.window = (earliest, latest);
        self
    }

    pub fn load(mut self, load: u32) -> Self {
        self.load = load;
        self
    }

    pub fn submitted_at(mut self, time: Time) -> Self {
        self.submitted_at = time;
        self
    }

    pub fn build(self) -> Request {
        Request::new(
            RequestId(self.id),
            1000 + self.id,
            VertexId(self.origin),
            VertexId(self.destination),
            self.window,
            self.load,
            self.submitted_at,
        )
        .unwrap()
    }
}

// ============================================================================
// Simulation
// ============================================================================

/// One task handed to a vehicle.
#[derive(Clone, Debug)]
pub struct Dispatched {
    pub time: Time,
    pub vehicle: VehicleId,
    pub task: Task,
}

/// Replays `requests` against an initialized dispatcher. Vehicles finish
/// every task on its planned end, drives `delay` seconds after their planned
/// arrival, and nothing after the horizon end. Returns every task handed
/// out, in order.
pub fn simulate<C: CostModel>(dispatcher: &mut Dispatcher<C>, requests: Vec<Request>, delay: Time) -> Vec<Dispatched> {
    let mut requests = requests;
    requests.sort_by_key(|request| (request.submission_time(), request.id()));
    let mut pending = requests.into_iter().peekable();
    let ids: Vec<VehicleId> = dispatcher.vehicles().iter().map(Vehicle::id).collect();
    let (start, end) = dispatcher.horizon();
    let mut dispatched = Vec::new();

    for &id in &ids {
        assert_eq!(dispatcher.next_task(id, start).unwrap(), NextTask::Idle);
    }

    loop {
        let vehicle_event = ids
            .iter()
            .filter_map(|&id| {
                let task = dispatcher.schedule(id)?.current_task()?;
                let finish = task.drive_path().map_or(task.end, |path| path.arrival + delay);
                Some((finish.min(end), id))
            })
            .min();
        let request_time = pending.peek().map(Request::submission_time);

        // Vehicle events win ties with submissions.
        let vehicle_due = vehicle_event.filter(|&(time, _)| request_time.is_none_or(|next| time <= next));

        match (vehicle_due, request_time) {
            (Some((time, vehicle)), _) => {
                if let NextTask::Task(task) = dispatcher.next_task(vehicle, time).unwrap() {
                    dispatched.push(Dispatched { time, vehicle, task });
                }
            }
            (None, Some(now)) => {
                let request = pending.next().unwrap();
                dispatcher.request_submitted(request).unwrap();
                // Idle vehicles that just got work start right away.
                for &id in &ids {
                    let schedule = dispatcher.schedule(id).unwrap();
                    if schedule.status() == ScheduleStatus::Unplanned && !schedule.is_empty() {
                        if let NextTask::Task(task) = dispatcher.next_task(id, now).unwrap() {
                            dispatched.push(Dispatched { time: now, vehicle: id, task });
                        }
                    }
                }
            }
            (None, None) => break,
        }
    }
    dispatched
}
