//! Per-vehicle task sequences.
//!
//! A schedule is a gap-free, time-ordered list of tasks. Tasks before the
//! first PLANNED one are history (or the task in progress) and are never
//! rewritten; everything after is re-planned from the stop sequence whenever
//! a stop is inserted or the vehicle runs early or late.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::network::VertexId;
use crate::request::RequestId;
use crate::router::{RouteError, Router};
use crate::task::{Task, TaskKind, TaskStatus};
use crate::traits::{Cost, CostModel, Time};

/// Vehicle constraints a schedule is validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleLimits {
    pub capacity: u32,
    pub start: Time,
    pub end: Time,
    pub max_time_away: Time,
    pub depot: VertexId,
}

impl Default for ScheduleLimits {
    fn default() -> Self {
        Self {
            capacity: 1,
            start: 0,
            end: 1,
            max_time_away: 1,
            depot: VertexId(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleStatus {
    Unplanned,
    Started,
    Completed,
}

/// Why a re-planned suffix was rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Infeasibility {
    TimeWindow { request: RequestId, begin: Time, latest: Time },
    Capacity { load: u32, capacity: u32 },
    HorizonEnd { end: Time, horizon: Time },
    MaxTimeAway { latest_departure: Time, ready: Time },
    /// A trip ends back at the depot after its time-away deadline.
    ReturnTooLate { back: Time, deadline: Time },
    Route(RouteError),
}

impl std::fmt::Display for Infeasibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Infeasibility::TimeWindow { request, begin, latest } => {
                write!(f, "stop of {} would begin at {}, after {}", request, begin, latest)
            }
            Infeasibility::Capacity { load, capacity } => {
                write!(f, "onboard load {} exceeds capacity {}", load, capacity)
            }
            Infeasibility::HorizonEnd { end, horizon } => {
                write!(f, "last stop ends at {}, after the operating window end {}", end, horizon)
            }
            Infeasibility::MaxTimeAway { latest_departure, ready } => write!(
                f,
                "vehicle is ready at {} but must head back to the depot by {}",
                ready, latest_departure
            ),
            Infeasibility::ReturnTooLate { back, deadline } => {
                write!(f, "vehicle is back at the depot at {}, after {}", back, deadline)
            }
            Infeasibility::Route(err) => write!(f, "{}", err),
        }
    }
}

impl From<RouteError> for Infeasibility {
    fn from(err: RouteError) -> Self {
        Infeasibility::Route(err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleError {
    CapacityViolation { index: usize, load: u32, capacity: u32 },
    TimeOrderViolation { index: usize, begin: Time, expected: Time },
    /// A task does not start where its predecessor ends.
    Discontinuous { index: usize, at: VertexId, expected: VertexId },
    InfeasibleInsertion(Infeasibility),
    OutOfHorizon { time: Time, start: Time, end: Time },
    NotAStop,
    NoNextTask,
    NoStartedTask,
    ScheduleRunning,
    /// More than one task is STARTED, or statuses are out of order.
    StatusOrder { index: usize },
}

impl std::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::CapacityViolation { index, load, capacity } => {
                write!(f, "load {} exceeds capacity {} at task {}", load, capacity, index)
            }
            ScheduleError::TimeOrderViolation { index, begin, expected } => {
                write!(f, "task {} begins at {} but must begin at {}", index, begin, expected)
            }
            ScheduleError::Discontinuous { index, at, expected } => {
                write!(f, "task {} starts at {} but its predecessor ends at {}", index, at, expected)
            }
            ScheduleError::InfeasibleInsertion(reason) => write!(f, "infeasible insertion: {}", reason),
            ScheduleError::OutOfHorizon { time, start, end } => {
                write!(f, "time {} is outside the operating window [{}, {}]", time, start, end)
            }
            ScheduleError::NotAStop => write!(f, "only pickup and delivery stops can be inserted"),
            ScheduleError::NoNextTask => write!(f, "schedule has no next task"),
            ScheduleError::NoStartedTask => write!(f, "schedule has no started task"),
            ScheduleError::ScheduleRunning => write!(f, "cannot reset a schedule with a started task"),
            ScheduleError::StatusOrder { index } => write!(f, "task {} has an out-of-order status", index),
        }
    }
}

impl std::error::Error for ScheduleError {}

impl From<Infeasibility> for ScheduleError {
    fn from(reason: Infeasibility) -> Self {
        ScheduleError::InfeasibleInsertion(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Every constraint must hold.
    Strict,
    /// Re-timing after delays: late stops are logged, not refused.
    Lenient,
}

/// Where re-planning picks up: the first point the vehicle is free to change.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    keep: usize,
    vertex: VertexId,
    time: Time,
    /// Idle time since this point is filled with a WAIT.
    gap_from: Option<Time>,
    /// Index of a STARTED wait whose end moves with the plan.
    retime_wait: Option<usize>,
    /// Index of a STARTED task running past its planned end.
    overrun: Option<usize>,
    load: u32,
    /// Departure from the depot on the trip in progress, if away.
    away_since: Option<Time>,
}

/// A re-planned suffix, ready to be applied to the schedule it came from.
#[derive(Debug, Clone)]
pub struct Plan {
    anchor: Anchor,
    tasks: Vec<Task>,
    cost: Cost,
    drive_time: Time,
}

impl Plan {
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Sum of drive costs in the re-planned suffix.
    pub fn cost(&self) -> Cost {
        self.cost
    }

    pub fn drive_time(&self) -> Time {
        self.drive_time
    }

    /// Planned begin of the pickup of `request`, if part of this plan.
    pub fn pickup_begin(&self, request: RequestId) -> Option<Time> {
        self.tasks
            .iter()
            .find(|task| task.request() == Some(request) && task.load_delta() > 0)
            .map(|task| task.begin)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    limits: ScheduleLimits,
    tasks: Vec<Task>,
    /// Index of the first task that is not PERFORMED.
    cursor: usize,
}

impl Schedule {
    pub fn new(limits: ScheduleLimits) -> Self {
        Self {
            limits,
            tasks: Vec::new(),
            cursor: 0,
        }
    }

    pub fn limits(&self) -> ScheduleLimits {
        self.limits
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn status(&self) -> ScheduleStatus {
        if self.tasks.iter().all(Task::is_planned) {
            ScheduleStatus::Unplanned
        } else if self.cursor >= self.tasks.len() {
            ScheduleStatus::Completed
        } else {
            ScheduleStatus::Started
        }
    }

    pub fn end_time(&self) -> Option<Time> {
        self.tasks.last().map(|task| task.end)
    }

    /// Where the vehicle is once every task has been performed.
    pub fn end_vertex(&self) -> VertexId {
        self.tasks.last().map_or(self.limits.depot, |task| task.to)
    }

    /// Index of the first PLANNED task, or `len()` if there is none.
    pub fn first_planned(&self) -> usize {
        self.tasks[self.cursor..]
            .iter()
            .position(Task::is_planned)
            .map_or(self.tasks.len(), |offset| self.cursor + offset)
    }

    /// Planned pickup and delivery stops, in order.
    pub fn stops(&self) -> impl Iterator<Item = &Task> {
        self.tasks[self.first_planned()..].iter().filter(|task| task.is_stop())
    }

    /// Onboard load once tasks `0..=index` are performed.
    pub fn onboard_load_after(&self, index: usize) -> u32 {
        let end = (index + 1).min(self.tasks.len());
        self.tasks[..end].iter().map(Task::load_delta).sum::<i64>().max(0) as u32
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.tasks
            .get(self.cursor)
            .filter(|task| task.status == TaskStatus::Started)
    }

    /// The task that follows the current one.
    pub fn next_task(&self) -> Result<&Task, ScheduleError> {
        let index = match self.current_task() {
            Some(_) => self.cursor + 1,
            None => self.cursor,
        };
        self.tasks.get(index).ok_or(ScheduleError::NoNextTask)
    }

    pub fn append(&mut self, task: Task) -> Result<(), ScheduleError> {
        let index = self.tasks.len();
        let expected = self.end_time().unwrap_or(self.limits.start);
        let at = self.end_vertex();

        if task.begin < expected {
            return Err(ScheduleError::TimeOrderViolation {
                index,
                begin: task.begin,
                expected,
            });
        }
        if task.end > self.limits.end {
            return Err(ScheduleError::OutOfHorizon {
                time: task.end,
                start: self.limits.start,
                end: self.limits.end,
            });
        }
        if task.from != at {
            return Err(ScheduleError::Discontinuous {
                index,
                at: task.from,
                expected: at,
            });
        }

        let load = self.onboard_load_after(index) as i64 + task.load_delta();
        if load > self.limits.capacity as i64 {
            return Err(ScheduleError::CapacityViolation {
                index,
                load: load as u32,
                capacity: self.limits.capacity,
            });
        }

        if task.begin > expected {
            self.tasks.push(Task::wait(at, expected, task.begin));
        }
        let mut task = task;
        task.status = TaskStatus::Planned;
        self.tasks.push(task);
        Ok(())
    }

    /// Inserts a stop in front of task `index` and re-plans every planned
    /// task after it. The schedule is unchanged if the result is infeasible.
    pub fn insert_at<C: CostModel>(
        &mut self,
        index: usize,
        task: Task,
        now: Time,
        router: &Router<C>,
    ) -> Result<(), ScheduleError> {
        if !task.is_stop() {
            return Err(ScheduleError::NotAStop);
        }
        let anchor = self.anchor(now);
        if index < anchor.keep || index > self.tasks.len() {
            let expected = self.tasks.get(anchor.keep).map_or(anchor.time, |t| t.begin);
            return Err(ScheduleError::TimeOrderViolation {
                index,
                begin: task.begin,
                expected,
            });
        }

        let slot = self.tasks[anchor.keep..index].iter().filter(|t| t.is_stop()).count();
        let mut stops: Vec<Task> = self.stops().cloned().collect();
        stops.insert(slot, task);

        let plan = self.plan(anchor, &stops, router, Mode::Strict)?;
        self.apply(plan);
        Ok(())
    }

    /// Evaluates inserting a pickup at stop slot `pickup_slot` and its
    /// delivery at `delivery_slot` (both counted in the current stop
    /// sequence, `pickup_slot <= delivery_slot`) without mutating anything.
    pub fn plan_pair<C: CostModel>(
        &self,
        pickup_slot: usize,
        delivery_slot: usize,
        pickup: &Task,
        delivery: &Task,
        now: Time,
        router: &Router<C>,
    ) -> Result<Plan, Infeasibility> {
        let existing = self.stops().count();
        let mut stops: Vec<Task> = Vec::with_capacity(existing + 2);
        for (slot, stop) in self.stops().enumerate() {
            if slot == pickup_slot {
                stops.push(pickup.clone());
            }
            if slot == delivery_slot {
                stops.push(delivery.clone());
            }
            stops.push(stop.clone());
        }
        if pickup_slot >= existing {
            stops.push(pickup.clone());
        }
        if delivery_slot >= existing {
            stops.push(delivery.clone());
        }

        self.plan(self.anchor(now), &stops, router, Mode::Strict)
    }

    /// Re-plans the current stop sequence as is, without enforcing windows.
    pub fn plan_current<C: CostModel>(&self, now: Time, router: &Router<C>) -> Result<Plan, Infeasibility> {
        let stops: Vec<Task> = self.stops().cloned().collect();
        self.plan(self.anchor(now), &stops, router, Mode::Lenient)
    }

    /// Inserts a pickup-delivery pair; see [`Schedule::plan_pair`].
    pub fn insert_pair<C: CostModel>(
        &mut self,
        pickup_slot: usize,
        delivery_slot: usize,
        pickup: &Task,
        delivery: &Task,
        now: Time,
        router: &Router<C>,
    ) -> Result<(), ScheduleError> {
        let plan = self.plan_pair(pickup_slot, delivery_slot, pickup, delivery, now, router)?;
        self.apply(plan);
        Ok(())
    }

    /// Moves tasks along as the clock passes their boundaries. Returns the
    /// transitions made, in order.
    pub fn advance(&mut self, now: Time) -> Vec<(usize, TaskStatus)> {
        let mut transitions = Vec::new();
        while let Some(task) = self.tasks.get_mut(self.cursor) {
            match task.status {
                TaskStatus::Planned if task.begin <= now => {
                    task.status = TaskStatus::Started;
                    transitions.push((self.cursor, TaskStatus::Started));
                }
                TaskStatus::Started if task.end <= now => {
                    task.status = TaskStatus::Performed;
                    transitions.push((self.cursor, TaskStatus::Performed));
                    self.cursor += 1;
                }
                _ => break,
            }
        }
        transitions
    }

    /// Marks the STARTED task PERFORMED at `now`, re-times the remaining
    /// plan from the actual completion time and starts the next task.
    /// Returns `None` when nothing is left to start.
    pub fn perform_current<C: CostModel>(&mut self, now: Time, router: &Router<C>) -> Result<Option<&Task>, ScheduleError> {
        let index = self.cursor;
        let task = self
            .tasks
            .get_mut(index)
            .filter(|task| task.status == TaskStatus::Started)
            .ok_or(ScheduleError::NoStartedTask)?;
        task.status = TaskStatus::Performed;
        task.end = now.max(task.begin);
        let finished = task.end;
        self.cursor += 1;

        if let Some(next) = self.tasks.get(self.cursor) {
            if next.begin != finished {
                self.retime(finished, router);
            }
        }
        Ok(self.start_next())
    }

    /// Starts the task at the cursor if it is still PLANNED.
    pub fn start_next(&mut self) -> Option<&Task> {
        let task = self.tasks.get_mut(self.cursor)?;
        if task.status == TaskStatus::Planned {
            task.status = TaskStatus::Started;
        }
        Some(&*task)
    }

    /// Appends a WAIT at the last location through the end of the operating
    /// window. Returns `false` if the window is already used up.
    pub fn extend_idle(&mut self) -> bool {
        let begin = self.end_time().unwrap_or(self.limits.start);
        if begin >= self.limits.end {
            return false;
        }
        self.tasks.push(Task::wait(self.end_vertex(), begin, self.limits.end));
        true
    }

    pub fn reset(&mut self) -> Result<(), ScheduleError> {
        if self.tasks.iter().any(|task| task.status == TaskStatus::Started) {
            return Err(ScheduleError::ScheduleRunning);
        }
        self.tasks.clear();
        self.cursor = 0;
        Ok(())
    }

    /// Checks time ordering, location continuity, status order and capacity.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        let mut load: i64 = 0;
        let mut seen_planned = false;
        let mut started = 0;

        for (index, task) in self.tasks.iter().enumerate() {
            if let Some(prev) = index.checked_sub(1).map(|i| &self.tasks[i]) {
                if task.begin != prev.end {
                    return Err(ScheduleError::TimeOrderViolation {
                        index,
                        begin: task.begin,
                        expected: prev.end,
                    });
                }
                if task.from != prev.to {
                    return Err(ScheduleError::Discontinuous {
                        index,
                        at: task.from,
                        expected: prev.to,
                    });
                }
            }
            if task.end < task.begin {
                return Err(ScheduleError::TimeOrderViolation {
                    index,
                    begin: task.end,
                    expected: task.begin,
                });
            }

            match task.status {
                TaskStatus::Planned => seen_planned = true,
                TaskStatus::Started => {
                    started += 1;
                    if seen_planned || started > 1 {
                        return Err(ScheduleError::StatusOrder { index });
                    }
                }
                TaskStatus::Performed => {
                    if seen_planned || started > 0 {
                        return Err(ScheduleError::StatusOrder { index });
                    }
                }
            }

            load += task.load_delta();
            if load < 0 || load > self.limits.capacity as i64 {
                return Err(ScheduleError::CapacityViolation {
                    index,
                    load: load.max(0) as u32,
                    capacity: self.limits.capacity,
                });
            }
        }
        Ok(())
    }

    fn anchor(&self, now: Time) -> Anchor {
        let keep = self.first_planned();
        if keep == 0 {
            return Anchor {
                keep: 0,
                vertex: self.limits.depot,
                time: now.max(self.limits.start),
                gap_from: Some(self.limits.start),
                retime_wait: None,
                overrun: None,
                load: 0,
                away_since: None,
            };
        }

        let last = &self.tasks[keep - 1];
        let load = self.onboard_load_after(keep - 1);
        let away_since = self.tasks[..keep].iter().fold(None, |since, task| {
            if task.to == self.limits.depot {
                None
            } else {
                since.or_else(|| task.drive_path().map(|path| path.departure))
            }
        });
        let (time, gap_from, retime_wait, overrun) = match last.status {
            TaskStatus::Started if last.is_wait() => (now.max(last.begin), None, Some(keep - 1), None),
            TaskStatus::Started if now > last.end => (now, None, None, Some(keep - 1)),
            TaskStatus::Started => (last.end, None, None, None),
            TaskStatus::Performed | TaskStatus::Planned => (now.max(last.end), Some(last.end), None, None),
        };

        Anchor {
            keep,
            vertex: last.to,
            time,
            gap_from,
            retime_wait,
            overrun,
            load,
            away_since,
        }
    }

    /// Lays out drives, waits and stops from `anchor` through the end of the
    /// operating window.
    fn plan<C: CostModel>(
        &self,
        anchor: Anchor,
        stops: &[Task],
        router: &Router<C>,
        mode: Mode,
    ) -> Result<Plan, Infeasibility> {
        let limits = self.limits;
        let mut tasks = Vec::with_capacity(stops.len() * 3 + 2);
        let mut at = anchor.vertex;
        let mut clock = anchor.time;
        let mut load = anchor.load;
        let mut away_since = anchor.away_since;
        let mut cost = 0.0;
        let mut drive_time = 0;

        if let Some(from) = anchor.gap_from {
            push_wait(&mut tasks, at, from, clock);
        }

        for stop in stops {
            if stop.to != at {
                let path = router.route_on_departure(at, stop.to, clock)?;
                if away_since.is_none() {
                    away_since = Some(path.departure);
                }
                cost += path.cost;
                drive_time += path.travel_time();
                clock = path.arrival;
                at = stop.to;
                tasks.push(Task::drive(path));

                if at == limits.depot {
                    if let Some(since) = away_since.take() {
                        let deadline = since + limits.max_time_away;
                        if mode == Mode::Strict && clock > deadline {
                            return Err(Infeasibility::ReturnTooLate { back: clock, deadline });
                        }
                    }
                }
            }

            if let Some(window) = stop.window {
                if clock < window.earliest {
                    push_wait(&mut tasks, at, clock, window.earliest);
                    clock = window.earliest;
                }
                if clock > window.latest {
                    let request = stop.request().unwrap_or(RequestId(0));
                    match mode {
                        Mode::Strict => {
                            return Err(Infeasibility::TimeWindow {
                                request,
                                begin: clock,
                                latest: window.latest,
                            });
                        }
                        Mode::Lenient => warn!(%request, begin = clock, latest = window.latest, "stop runs late"),
                    }
                }
            }

            let next_load = load as i64 + stop.load_delta();
            if next_load > limits.capacity as i64 {
                return Err(Infeasibility::Capacity {
                    load: next_load as u32,
                    capacity: limits.capacity,
                });
            }
            load = next_load.max(0) as u32;

            let task = stop.shifted_to(clock);
            clock = task.end;
            tasks.push(task);
        }

        if mode == Mode::Strict {
            if clock > limits.end {
                return Err(Infeasibility::HorizonEnd {
                    end: clock,
                    horizon: limits.end,
                });
            }
            if at != limits.depot {
                let deadline = away_since.map_or(limits.end, |since| (since + limits.max_time_away).min(limits.end));
                let latest_departure = router.latest_departure(at, limits.depot, deadline)?;
                if clock > latest_departure {
                    return Err(Infeasibility::MaxTimeAway {
                        latest_departure,
                        ready: clock,
                    });
                }
            }
        }

        push_wait(&mut tasks, at, clock, limits.end);

        Ok(Plan {
            anchor,
            tasks,
            cost,
            drive_time,
        })
    }

    /// Replaces the planned suffix with `plan`. The plan must have been made
    /// from this schedule's current state.
    pub fn apply(&mut self, plan: Plan) {
        let Plan { anchor, tasks, .. } = plan;
        self.tasks.truncate(anchor.keep);
        let mut tasks = tasks.into_iter().peekable();

        // The task in progress is now expected to finish no earlier than the plan starts.
        if let Some(index) = anchor.overrun {
            self.tasks[index].end = anchor.time;
        }

        if let Some(index) = anchor.retime_wait {
            let at = self.tasks[index].to;
            self.tasks[index].end = anchor.time;
            if let Some(first) = tasks.next_if(|t| t.is_wait() && t.to == at && t.begin == anchor.time) {
                self.tasks[index].end = first.end;
            }
        }
        self.tasks.extend(tasks);
        debug!(tasks = self.tasks.len(), "schedule re-planned");
    }

    /// Re-times the planned suffix after the vehicle finished at `finished`.
    fn retime<C: CostModel>(&mut self, finished: Time, router: &Router<C>) {
        match self.plan_current(finished, router) {
            Ok(plan) => self.apply(plan),
            Err(reason) => {
                warn!(%reason, "re-planning after a delay failed, shifting tasks instead");
                let mut clock = finished;
                for task in &mut self.tasks[self.cursor..] {
                    let duration = task.duration();
                    let original_end = task.end;
                    task.begin = clock;
                    // Waits absorb the shift where they can.
                    task.end = if task.is_wait() {
                        original_end.max(clock)
                    } else {
                        clock + duration
                    };
                    if let TaskKind::Drive(path) = &mut task.kind {
                        path.departure = task.begin;
                        path.arrival = task.end;
                    }
                    clock = task.end;
                }
            }
        }
    }
}

/// Appends a WAIT, merging it into a directly preceding WAIT at `at`.
fn push_wait(tasks: &mut Vec<Task>, at: VertexId, begin: Time, end: Time) {
    if end <= begin {
        return;
    }
    if let Some(last) = tasks.last_mut() {
        if last.is_wait() && last.to == at && last.end == begin {
            last.end = end;
            return;
        }
    }
    tasks.push(Task::wait(at, begin, end));
}
