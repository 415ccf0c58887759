//! The dispatcher: entry point for the surrounding simulation.
//!
//! Requests come in through [`Dispatcher::request_submitted`] and are
//! inserted into exactly one vehicle schedule or rejected. Vehicles report
//! progress through [`Dispatcher::next_task`] and receive what to do next.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::{SubmissionEvent, SubmissionOutcome};
use crate::network::{Network, VertexId};
use crate::pickup_delivery::{self, InsertionParams};
use crate::request::{Request, RequestId, RequestState};
use crate::router::Router;
use crate::schedule::{Schedule, ScheduleError, ScheduleStatus};
use crate::task::{Task, TaskKind};
use crate::traits::{CostModel, DispatchObserver, Time};
use crate::vehicle::{Depot, DepotId, Vehicle, VehicleId};

/// Bound on the in-vehicle detour: the delivery must begin no later than
/// `earliest pickup + alpha * direct travel time + beta`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RideTimeLimit {
    pub alpha: f64,
    pub beta: Time,
}

impl Default for RideTimeLimit {
    fn default() -> Self {
        Self {
            alpha: 1.5,
            beta: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchOptions {
    /// Duration of every pickup and delivery stop, in seconds.
    pub stop_duration: Time,
    /// Cost per second of pickup delay past the earliest pickup time.
    pub pickup_delay_weight: f64,
    pub ride_time_limit: Option<RideTimeLimit>,
    /// Search vehicles on the rayon thread pool.
    pub parallel_search: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            stop_duration: 60,
            pickup_delay_weight: 0.0,
            ride_time_limit: None,
            parallel_search: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatcherState {
    Uninitialized,
    Ready,
    Finalized,
}

/// What a vehicle should do after finishing its current task.
#[derive(Debug, Clone, PartialEq)]
pub enum NextTask {
    Task(Task),
    /// Nothing planned; the vehicle stays where it is.
    Idle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    AlreadyInitialized,
    NotInitialized,
    HorizonEnded { now: Time, end: Time },
    DuplicateRequest(RequestId),
    DuplicateVehicle(VehicleId),
    UnknownVehicle(VehicleId),
    UnknownDepot(DepotId),
    UnknownVertex(VertexId),
    OutOfService(VehicleId),
    ScheduleNotEmpty(VehicleId),
    Schedule { vehicle: VehicleId, source: ScheduleError },
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::AlreadyInitialized => write!(f, "dispatcher is already initialized"),
            DispatchError::NotInitialized => write!(f, "dispatcher is not initialized"),
            DispatchError::HorizonEnded { now, end } => {
                write!(f, "called at {} after the operating horizon ended at {}", now, end)
            }
            DispatchError::DuplicateRequest(id) => write!(f, "request {} was already submitted", id),
            DispatchError::DuplicateVehicle(id) => write!(f, "vehicle {} is listed twice", id),
            DispatchError::UnknownVehicle(id) => write!(f, "unknown vehicle {}", id),
            DispatchError::UnknownDepot(id) => write!(f, "unknown depot {}", id.0),
            DispatchError::UnknownVertex(v) => write!(f, "vertex {} is not in the network", v),
            DispatchError::OutOfService(id) => write!(f, "vehicle {} is out of service", id),
            DispatchError::ScheduleNotEmpty(id) => write!(f, "vehicle {} starts with a non-empty schedule", id),
            DispatchError::Schedule { vehicle, source } => write!(f, "vehicle {}: {}", vehicle, source),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Schedule { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct RequestEntry {
    request: Request,
    state: RequestState,
    vehicle: Option<VehicleId>,
}

/// Online pickup-and-delivery dispatcher for one fleet.
pub struct Dispatcher<C> {
    router: Router<C>,
    depots: Vec<Depot>,
    fleet: Vec<Vehicle>,
    in_service: Vec<bool>,
    fleet_index: HashMap<VehicleId, usize>,
    requests: Vec<RequestEntry>,
    request_index: HashMap<RequestId, usize>,
    observers: Vec<Box<dyn DispatchObserver + Send>>,
    options: DispatchOptions,
    state: DispatcherState,
    horizon: (Time, Time),
}

impl<C: CostModel> Dispatcher<C> {
    pub fn new(
        network: Network,
        cost_model: C,
        depots: Vec<Depot>,
        vehicles: Vec<Vehicle>,
        options: DispatchOptions,
    ) -> Result<Self, DispatchError> {
        for depot in &depots {
            if !network.contains(depot.vertex) {
                return Err(DispatchError::UnknownVertex(depot.vertex));
            }
        }

        let mut fleet = vehicles;
        fleet.sort_by_key(Vehicle::id);
        let mut fleet_index = HashMap::with_capacity(fleet.len());
        for (index, vehicle) in fleet.iter().enumerate() {
            if !depots.contains(&vehicle.depot()) {
                return Err(DispatchError::UnknownDepot(vehicle.depot().id));
            }
            if fleet_index.insert(vehicle.id(), index).is_some() {
                return Err(DispatchError::DuplicateVehicle(vehicle.id()));
            }
        }

        let horizon = (
            fleet.iter().map(|v| v.window().0).min().unwrap_or(0),
            fleet.iter().map(|v| v.window().1).max().unwrap_or(0),
        );

        Ok(Self {
            router: Router::new(network, cost_model),
            depots,
            in_service: vec![true; fleet.len()],
            fleet,
            fleet_index,
            requests: Vec::new(),
            request_index: HashMap::new(),
            observers: Vec::new(),
            options,
            state: DispatcherState::Uninitialized,
            horizon,
        })
    }

    pub fn add_observer(&mut self, observer: Box<dyn DispatchObserver + Send>) {
        self.observers.push(observer);
    }

    /// One-time setup; every vehicle must start with an empty schedule.
    pub fn init(&mut self) -> Result<(), DispatchError> {
        if self.state != DispatcherState::Uninitialized {
            return Err(DispatchError::AlreadyInitialized);
        }
        for vehicle in &self.fleet {
            let schedule = vehicle.schedule();
            if !schedule.is_empty() || schedule.status() != ScheduleStatus::Unplanned {
                return Err(DispatchError::ScheduleNotEmpty(vehicle.id()));
            }
        }

        self.state = DispatcherState::Ready;
        info!(
            vehicles = self.fleet.len(),
            depots = self.depots.len(),
            start = self.horizon.0,
            end = self.horizon.1,
            "dispatcher ready"
        );
        Ok(())
    }

    fn check_clock(&mut self, now: Time) -> Result<(), DispatchError> {
        match self.state {
            DispatcherState::Uninitialized => Err(DispatchError::NotInitialized),
            DispatcherState::Finalized => Err(DispatchError::HorizonEnded {
                now,
                end: self.horizon.1,
            }),
            DispatcherState::Ready if now > self.horizon.1 => {
                self.state = DispatcherState::Finalized;
                info!(now, end = self.horizon.1, "operating horizon ended");
                Err(DispatchError::HorizonEnded {
                    now,
                    end: self.horizon.1,
                })
            }
            DispatcherState::Ready => Ok(()),
        }
    }

    /// Assigns `request` to the vehicle with the cheapest feasible insertion,
    /// or rejects it. Returns the resulting lifecycle state.
    pub fn request_submitted(&mut self, request: Request) -> Result<RequestState, DispatchError> {
        let now = request.submission_time();
        self.check_clock(now)?;
        if self.request_index.contains_key(&request.id()) {
            return Err(DispatchError::DuplicateRequest(request.id()));
        }
        for vertex in [request.origin(), request.destination()] {
            if !self.router.network().contains(vertex) {
                return Err(DispatchError::UnknownVertex(vertex));
            }
        }

        let entry = self.requests.len();
        self.request_index.insert(request.id(), entry);
        self.requests.push(RequestEntry {
            request,
            state: RequestState::Created,
            vehicle: None,
        });
        self.transition(entry, RequestState::Submitted);

        let request = &self.requests[entry].request;
        let direct_travel_time = self
            .router
            .route_on_departure(request.origin(), request.destination(), request.earliest_pickup().max(now))
            .map(|path| path.travel_time())
            .ok();
        let latest_delivery = match (self.options.ride_time_limit, direct_travel_time) {
            (Some(limit), Some(direct)) => {
                Some(request.earliest_pickup() + (limit.alpha * direct as f64).ceil() as Time + limit.beta)
            }
            _ => None,
        };
        let params = InsertionParams {
            stop_duration: self.options.stop_duration,
            pickup_delay_weight: self.options.pickup_delay_weight,
            latest_delivery,
            parallel: self.options.parallel_search,
        };

        let candidates: Vec<&Vehicle> = self
            .fleet
            .iter()
            .zip(&self.in_service)
            .filter_map(|(vehicle, &active)| active.then_some(vehicle))
            .collect();
        let best = pickup_delivery::best_insertion(&candidates, request, now, &self.router, &params);

        let outcome = match best.and_then(|insertion| self.commit(entry, &insertion, &params, now).then_some(insertion)) {
            Some(insertion) => {
                self.requests[entry].vehicle = Some(insertion.vehicle);
                self.transition(entry, RequestState::Assigned);
                SubmissionOutcome::Assigned {
                    vehicle: insertion.vehicle,
                    pickup_begin: insertion.pickup_begin,
                }
            }
            None => {
                self.transition(entry, RequestState::Rejected);
                SubmissionOutcome::Rejected
            }
        };

        let request = &self.requests[entry].request;
        let event = SubmissionEvent {
            time: now,
            request: request.id(),
            traveler: request.traveler(),
            origin: request.origin(),
            destination: request.destination(),
            direct_travel_time,
            outcome,
        };
        match outcome {
            SubmissionOutcome::Assigned { vehicle, pickup_begin } => {
                info!(request = %event.request, %vehicle, pickup_begin, "request assigned")
            }
            SubmissionOutcome::Rejected => info!(request = %event.request, "request rejected"),
        }
        for observer in &mut self.observers {
            observer.on_submission(&event);
        }

        Ok(self.requests[entry].state)
    }

    /// Applies the winning insertion on the live schedule, re-validating it.
    fn commit(
        &mut self,
        entry: usize,
        insertion: &pickup_delivery::Insertion,
        params: &InsertionParams,
        now: Time,
    ) -> bool {
        let Some(&index) = self.fleet_index.get(&insertion.vehicle) else {
            return false;
        };
        let (pickup, delivery) = pickup_delivery::stop_pair(&self.requests[entry].request, params);
        let schedule = self.fleet[index].schedule_mut();

        match schedule.insert_pair(
            insertion.pickup_slot,
            insertion.delivery_slot,
            &pickup,
            &delivery,
            now,
            &self.router,
        ) {
            Ok(()) => {
                debug_assert!(schedule.validate().is_ok());
                true
            }
            Err(err) => {
                warn!(vehicle = %insertion.vehicle, %err, "winning insertion failed re-validation");
                false
            }
        }
    }

    fn transition(&mut self, entry: usize, next: RequestState) {
        let current = &mut self.requests[entry].state;
        debug_assert!(current.can_become(next), "{:?} -> {:?}", current, next);
        *current = next;
    }

    /// Called when `vehicle` finished its current task at `now`. Starts and
    /// returns the following task, extending an exhausted schedule with a
    /// WAIT through the end of the vehicle's operating window.
    pub fn next_task(&mut self, vehicle: VehicleId, now: Time) -> Result<NextTask, DispatchError> {
        self.check_clock(now)?;
        let index = *self
            .fleet_index
            .get(&vehicle)
            .ok_or(DispatchError::UnknownVehicle(vehicle))?;
        let schedule_error = |source: ScheduleError| DispatchError::Schedule { vehicle, source };

        let schedule = self.fleet[index].schedule_mut();
        let started = match schedule.status() {
            ScheduleStatus::Unplanned if schedule.is_empty() => {
                debug!(%vehicle, "no plan, idle at depot");
                return Ok(NextTask::Idle);
            }
            ScheduleStatus::Unplanned => schedule.start_next().cloned(),
            ScheduleStatus::Completed => {
                if schedule.extend_idle() {
                    schedule.start_next().cloned()
                } else {
                    None
                }
            }
            ScheduleStatus::Started => {
                let finished = schedule
                    .current_task()
                    .map(|task| task.kind.clone())
                    .ok_or_else(|| schedule_error(ScheduleError::NoStartedTask))?;
                let next = schedule
                    .perform_current(now, &self.router)
                    .map_err(schedule_error)?
                    .cloned();
                let next = match next {
                    Some(task) => Some(task),
                    None if schedule.extend_idle() => schedule.start_next().cloned(),
                    None => None,
                };
                debug_assert!(schedule.validate().is_ok());
                self.task_performed(vehicle, &finished);
                next
            }
        };

        Ok(match started {
            Some(task) => {
                debug!(%vehicle, %task, "next task");
                NextTask::Task(task)
            }
            None => {
                info!(%vehicle, now, "operating window used up, vehicle idle");
                NextTask::Idle
            }
        })
    }

    fn task_performed(&mut self, vehicle: VehicleId, kind: &TaskKind) {
        match *kind {
            TaskKind::Pickup { request, .. } => debug!(%vehicle, %request, "picked up"),
            TaskKind::Delivery { request, .. } => {
                if let Some(&entry) = self.request_index.get(&request) {
                    self.transition(entry, RequestState::Served);
                    debug!(%vehicle, %request, "served");
                }
            }
            TaskKind::Drive(_) | TaskKind::Wait => {}
        }
    }

    /// Withdraws a vehicle whose schedule is not running. Its assigned
    /// requests are cancelled and returned.
    pub fn take_out_of_service(&mut self, vehicle: VehicleId) -> Result<Vec<RequestId>, DispatchError> {
        let index = *self
            .fleet_index
            .get(&vehicle)
            .ok_or(DispatchError::UnknownVehicle(vehicle))?;
        if !self.in_service[index] {
            return Err(DispatchError::OutOfService(vehicle));
        }
        self.fleet[index]
            .schedule_mut()
            .reset()
            .map_err(|source| DispatchError::Schedule { vehicle, source })?;
        self.in_service[index] = false;

        let affected: Vec<usize> = self
            .requests
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.vehicle == Some(vehicle) && entry.state == RequestState::Assigned)
            .map(|(entry, _)| entry)
            .collect();
        let mut cancelled = Vec::with_capacity(affected.len());
        for entry in affected {
            self.transition(entry, RequestState::Cancelled);
            cancelled.push(self.requests[entry].request.id());
        }
        warn!(%vehicle, cancelled = cancelled.len(), "vehicle taken out of service");
        Ok(cancelled)
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    pub fn horizon(&self) -> (Time, Time) {
        self.horizon
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    pub fn router(&self) -> &Router<C> {
        &self.router
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.fleet
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.fleet_index.get(&id).map(|&index| &self.fleet[index])
    }

    pub fn schedule(&self, id: VehicleId) -> Option<&Schedule> {
        self.vehicle(id).map(Vehicle::schedule)
    }

    pub fn is_in_service(&self, id: VehicleId) -> bool {
        self.fleet_index
            .get(&id)
            .is_some_and(|&index| self.in_service[index])
    }

    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.request_index.get(&id).map(|&entry| &self.requests[entry].request)
    }

    pub fn request_state(&self, id: RequestId) -> Option<RequestState> {
        self.request_index.get(&id).map(|&entry| self.requests[entry].state)
    }

    pub fn assigned_vehicle(&self, id: RequestId) -> Option<VehicleId> {
        self.request_index
            .get(&id)
            .and_then(|&entry| self.requests[entry].vehicle)
    }
}
