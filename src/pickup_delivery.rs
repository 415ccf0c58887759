//! Pickup-delivery pairing and the cheapest feasible insertion search.
//!
//! For a new request every vehicle's planned stop sequence is scanned for all
//! `(pickup_slot, delivery_slot)` pairs with `pickup_slot <= delivery_slot`.
//! Each pair is planned on a read-only snapshot; infeasible pairs are
//! dropped, and the cheapest remaining one wins with ties going to the lowest
//! vehicle id, then the earliest pickup slot, then the earliest delivery slot.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;

use crate::request::{Request, RequestId};
use crate::router::Router;
use crate::schedule::{Plan, Schedule};
use crate::task::{Task, TaskKind, TimeWindow};
use crate::traits::{Cost, CostModel, Time};
use crate::vehicle::{Vehicle, VehicleId};

/// Knobs of a single insertion search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertionParams {
    pub stop_duration: Time,
    /// Cost per second the pickup begins after the earliest pickup time.
    pub pickup_delay_weight: f64,
    pub latest_delivery: Option<Time>,
    pub parallel: bool,
}

/// Best feasible insertion found for a request.
#[derive(Debug, Clone)]
pub struct Insertion {
    pub vehicle: VehicleId,
    pub pickup_slot: usize,
    pub delivery_slot: usize,
    pub marginal_cost: Cost,
    pub pickup_begin: Time,
}

impl Insertion {
    fn rank(&self, other: &Insertion) -> Ordering {
        self.marginal_cost
            .total_cmp(&other.marginal_cost)
            .then(self.vehicle.cmp(&other.vehicle))
            .then(self.pickup_slot.cmp(&other.pickup_slot))
            .then(self.delivery_slot.cmp(&other.delivery_slot))
    }
}

/// The two stops serving `request`.
pub fn stop_pair(request: &Request, params: &InsertionParams) -> (Task, Task) {
    let pickup = Task::pickup(
        request.id(),
        request.origin(),
        request.load(),
        TimeWindow::new(request.earliest_pickup(), request.latest_pickup()),
        params.stop_duration,
    );
    let delivery_window = match params.latest_delivery {
        Some(latest) => TimeWindow::new(request.earliest_pickup(), latest),
        None => TimeWindow::open_from(request.earliest_pickup()),
    };
    let delivery = Task::delivery(
        request.id(),
        request.destination(),
        request.load(),
        delivery_window,
        params.stop_duration,
    );
    (pickup, delivery)
}

/// Searches the whole fleet for the cheapest feasible insertion.
pub fn best_insertion<C: CostModel>(
    vehicles: &[&Vehicle],
    request: &Request,
    now: Time,
    router: &Router<C>,
    params: &InsertionParams,
) -> Option<Insertion> {
    let (pickup, delivery) = stop_pair(request, params);
    let search = |vehicle: &&Vehicle| best_for_vehicle(vehicle, request, &pickup, &delivery, now, router, params);

    let per_vehicle: Vec<Option<Insertion>> = if params.parallel {
        vehicles.par_iter().map(search).collect()
    } else {
        vehicles.iter().map(search).collect()
    };

    per_vehicle
        .into_iter()
        .flatten()
        .min_by(|a, b| a.rank(b))
}

fn best_for_vehicle<C: CostModel>(
    vehicle: &Vehicle,
    request: &Request,
    pickup: &Task,
    delivery: &Task,
    now: Time,
    router: &Router<C>,
    params: &InsertionParams,
) -> Option<Insertion> {
    let schedule = vehicle.schedule();
    if request.load() > vehicle.capacity() {
        return None;
    }
    let baseline = match schedule.plan_current(now, router) {
        Ok(plan) => plan,
        Err(reason) => {
            debug!(vehicle = %vehicle.id(), %reason, "vehicle cannot re-plan its own stops");
            return None;
        }
    };

    let stops = schedule.stops().count();
    let mut best: Option<Insertion> = None;

    for pickup_slot in 0..=stops {
        for delivery_slot in pickup_slot..=stops {
            let Ok(plan) = schedule.plan_pair(pickup_slot, delivery_slot, pickup, delivery, now, router) else {
                continue;
            };

            let candidate = price(vehicle, request, &baseline, &plan, pickup_slot, delivery_slot, params);
            if best.as_ref().is_none_or(|current| candidate.rank(current) == Ordering::Less) {
                best = Some(candidate);
            }
        }
    }

    if let Some(found) = &best {
        debug!(
            vehicle = %vehicle.id(),
            request = %request.id(),
            pickup_slot = found.pickup_slot,
            delivery_slot = found.delivery_slot,
            cost = found.marginal_cost,
            "best insertion on vehicle"
        );
    }
    best
}

fn price(
    vehicle: &Vehicle,
    request: &Request,
    baseline: &Plan,
    plan: &Plan,
    pickup_slot: usize,
    delivery_slot: usize,
    params: &InsertionParams,
) -> Insertion {
    let pickup_begin = plan.pickup_begin(request.id()).unwrap_or(request.earliest_pickup());
    let added_drive_time = (plan.drive_time() - baseline.drive_time()) as f64;
    let delay = (pickup_begin - request.earliest_pickup()).max(0) as f64;
    let marginal_cost = (plan.cost() - baseline.cost())
        + vehicle.cost_per_second() * added_drive_time
        + params.pickup_delay_weight * delay;

    Insertion {
        vehicle: vehicle.id(),
        pickup_slot,
        delivery_slot,
        marginal_cost,
        pickup_begin,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingError {
    MissingPickup(RequestId),
    MissingDelivery(RequestId),
    DeliveryBeforePickup(RequestId),
    LoadMismatch(RequestId),
}

impl std::fmt::Display for PairingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairingError::MissingPickup(id) => write!(f, "delivery of {} has no pickup", id),
            PairingError::MissingDelivery(id) => write!(f, "pickup of {} has no delivery", id),
            PairingError::DeliveryBeforePickup(id) => write!(f, "{} is delivered before it is picked up", id),
            PairingError::LoadMismatch(id) => write!(f, "pickup and delivery of {} carry different loads", id),
        }
    }
}

impl std::error::Error for PairingError {}

/// Checks that every request on `schedule` is picked up once and delivered
/// later on the same schedule with the same load.
pub fn check_pairing(schedule: &Schedule) -> Result<(), PairingError> {
    let mut pickups: BTreeMap<RequestId, (usize, u32)> = BTreeMap::new();
    let mut deliveries: BTreeMap<RequestId, (usize, u32)> = BTreeMap::new();

    for (index, task) in schedule.tasks().iter().enumerate() {
        match task.kind {
            TaskKind::Pickup { request, load } => {
                pickups.insert(request, (index, load));
            }
            TaskKind::Delivery { request, load } => {
                deliveries.insert(request, (index, load));
            }
            TaskKind::Drive(_) | TaskKind::Wait => {}
        }
    }

    for (request, (delivered_at, delivered)) in &deliveries {
        let Some((picked_at, picked)) = pickups.get(request) else {
            return Err(PairingError::MissingPickup(*request));
        };
        if picked_at >= delivered_at {
            return Err(PairingError::DeliveryBeforePickup(*request));
        }
        if picked != delivered {
            return Err(PairingError::LoadMismatch(*request));
        }
    }

    match pickups.keys().find(|request| !deliveries.contains_key(request)) {
        Some(request) => Err(PairingError::MissingDelivery(*request)),
        None => Ok(()),
    }
}
