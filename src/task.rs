//! Scheduled units of vehicle activity.

use serde::{Deserialize, Serialize};

use crate::network::VertexId;
use crate::request::RequestId;
use crate::router::Path;
use crate::traits::Time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Planned,
    Started,
    Performed,
}

/// Bounds on when a stop may begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub earliest: Time,
    pub latest: Time,
}

impl TimeWindow {
    pub fn new(earliest: Time, latest: Time) -> Self {
        Self { earliest, latest }
    }

    /// Open at `earliest` with no deadline.
    pub fn open_from(earliest: Time) -> Self {
        Self {
            earliest,
            latest: Time::MAX,
        }
    }

    pub fn contains(&self, time: Time) -> bool {
        self.earliest <= time && time <= self.latest
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskKind {
    Drive(Path),
    Wait,
    Pickup { request: RequestId, load: u32 },
    Delivery { request: RequestId, load: u32 },
}

/// Shared envelope of every task variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub begin: Time,
    pub end: Time,
    pub from: VertexId,
    pub to: VertexId,
    /// Constraint on `begin`; stops only.
    pub window: Option<TimeWindow>,
}

impl Task {
    pub fn drive(path: Path) -> Self {
        Self {
            status: TaskStatus::Planned,
            begin: path.departure,
            end: path.arrival,
            from: path.from,
            to: path.to,
            window: None,
            kind: TaskKind::Drive(path),
        }
    }

    pub fn wait(at: VertexId, begin: Time, end: Time) -> Self {
        Self {
            kind: TaskKind::Wait,
            status: TaskStatus::Planned,
            begin,
            end,
            from: at,
            to: at,
            window: None,
        }
    }

    pub fn pickup(request: RequestId, at: VertexId, load: u32, window: TimeWindow, duration: Time) -> Self {
        Self::stop(TaskKind::Pickup { request, load }, at, window, duration)
    }

    pub fn delivery(request: RequestId, at: VertexId, load: u32, window: TimeWindow, duration: Time) -> Self {
        Self::stop(TaskKind::Delivery { request, load }, at, window, duration)
    }

    /// Stops are created at the opening of their window; planning moves them.
    fn stop(kind: TaskKind, at: VertexId, window: TimeWindow, duration: Time) -> Self {
        Self {
            kind,
            status: TaskStatus::Planned,
            begin: window.earliest,
            end: window.earliest + duration,
            from: at,
            to: at,
            window: Some(window),
        }
    }

    pub fn duration(&self) -> Time {
        self.end - self.begin
    }

    pub fn is_stop(&self) -> bool {
        matches!(self.kind, TaskKind::Pickup { .. } | TaskKind::Delivery { .. })
    }

    pub fn is_wait(&self) -> bool {
        matches!(self.kind, TaskKind::Wait)
    }

    pub fn is_planned(&self) -> bool {
        self.status == TaskStatus::Planned
    }

    pub fn request(&self) -> Option<RequestId> {
        match self.kind {
            TaskKind::Pickup { request, .. } | TaskKind::Delivery { request, .. } => Some(request),
            TaskKind::Drive(_) | TaskKind::Wait => None,
        }
    }

    /// Change in onboard load once this task is performed.
    pub fn load_delta(&self) -> i64 {
        match self.kind {
            TaskKind::Pickup { load, .. } => load as i64,
            TaskKind::Delivery { load, .. } => -(load as i64),
            TaskKind::Drive(_) | TaskKind::Wait => 0,
        }
    }

    pub fn drive_path(&self) -> Option<&Path> {
        match &self.kind {
            TaskKind::Drive(path) => Some(path),
            _ => None,
        }
    }

    /// Moves the task to start at `begin`, keeping its duration.
    pub(crate) fn shifted_to(&self, begin: Time) -> Self {
        let mut task = self.clone();
        task.end = begin + self.duration();
        task.begin = begin;
        task
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TaskKind::Drive(_) => write!(f, "DRIVE({}->{}, {}..{})", self.from, self.to, self.begin, self.end),
            TaskKind::Wait => write!(f, "WAIT({}, {}..{})", self.to, self.begin, self.end),
            TaskKind::Pickup { request, .. } => write!(f, "PICKUP({}, {}..{})", request, self.begin, self.end),
            TaskKind::Delivery { request, .. } => write!(f, "DELIVERY({}, {}..{})", request, self.begin, self.end),
        }
    }
}
