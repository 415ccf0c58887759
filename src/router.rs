//! Time-dependent shortest paths over the network.
//!
//! Forward searches answer "when do I arrive if I leave at `t`"; backward
//! searches answer "when must I leave to arrive by `t`". Both run Dijkstra on
//! labels produced by the injected cost model and never cache results.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::cost::CostError;
use crate::network::{ArcId, Network, VertexId};
use crate::traits::{Cost, CostModel, Time};

/// A timed route between two vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub from: VertexId,
    pub to: VertexId,
    pub arcs: Vec<ArcId>,
    pub departure: Time,
    pub arrival: Time,
    pub cost: Cost,
}

impl Path {
    pub fn travel_time(&self) -> Time {
        self.arrival - self.departure
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteError {
    UnknownVertex(VertexId),
    Unreachable { from: VertexId, to: VertexId },
    Cost(CostError),
}

impl std::fmt::Display for RouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteError::UnknownVertex(v) => write!(f, "unknown vertex {}", v),
            RouteError::Unreachable { from, to } => write!(f, "{} is unreachable from {}", to, from),
            RouteError::Cost(err) => write!(f, "cost query failed: {}", err),
        }
    }
}

impl std::error::Error for RouteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RouteError::Cost(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CostError> for RouteError {
    fn from(err: CostError) -> Self {
        RouteError::Cost(err)
    }
}

/// Network plus the cost model used to time it.
#[derive(Debug, Clone)]
pub struct Router<C> {
    network: Network,
    cost_model: C,
}

impl<C: CostModel> Router<C> {
    pub fn new(network: Network, cost_model: C) -> Self {
        Self { network, cost_model }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn cost_model(&self) -> &C {
        &self.cost_model
    }

    fn check_vertex(&self, vertex: VertexId) -> Result<(), RouteError> {
        if self.network.contains(vertex) {
            Ok(())
        } else {
            Err(RouteError::UnknownVertex(vertex))
        }
    }

    /// Earliest-arrival path leaving `from` at `departure`.
    pub fn route_on_departure(&self, from: VertexId, to: VertexId, departure: Time) -> Result<Path, RouteError> {
        self.check_vertex(from)?;
        self.check_vertex(to)?;
        if from == to {
            return Ok(Path {
                from,
                to,
                arcs: Vec::new(),
                departure,
                arrival: departure,
                cost: 0.0,
            });
        }

        let n = self.network.vertices().len();
        let mut arrival: Vec<Option<Time>> = vec![None; n];
        let mut via: Vec<Option<ArcId>> = vec![None; n];
        let mut settled = vec![false; n];
        let mut last_error = None;
        let mut heap = BinaryHeap::new();

        arrival[from.0] = Some(departure);
        heap.push(Reverse((departure, from.0)));

        while let Some(Reverse((time, vertex))) = heap.pop() {
            if settled[vertex] {
                continue;
            }
            settled[vertex] = true;
            if vertex == to.0 {
                break;
            }

            for arc in self.network.outgoing(VertexId(vertex)) {
                let travel = match self.cost_model.time_on_departure(arc, time) {
                    Ok(travel) => travel,
                    Err(err) => {
                        last_error = Some(err);
                        continue;
                    }
                };
                let candidate = time + travel;
                let next = arc.to.0;
                if !settled[next] && arrival[next].is_none_or(|best| candidate < best) {
                    arrival[next] = Some(candidate);
                    via[next] = Some(arc.id);
                    heap.push(Reverse((candidate, next)));
                }
            }
        }

        let Some(arrival_time) = arrival[to.0] else {
            return Err(last_error.map_or(RouteError::Unreachable { from, to }, RouteError::Cost));
        };

        let mut arcs = Vec::new();
        let mut cursor = to.0;
        while let Some(arc_id) = via[cursor] {
            arcs.push(arc_id);
            cursor = self.network.arcs()[arc_id.0].from.0;
            if cursor == from.0 {
                break;
            }
        }
        arcs.reverse();

        let mut cost = 0.0;
        let mut clock = departure;
        for arc_id in &arcs {
            let arc = &self.network.arcs()[arc_id.0];
            cost += self.cost_model.cost_on_departure(arc, clock)?;
            clock += self.cost_model.time_on_departure(arc, clock)?;
        }

        Ok(Path {
            from,
            to,
            arcs,
            departure,
            arrival: arrival_time,
            cost,
        })
    }

    /// Latest time to leave `from` and still reach `to` by `arrival`.
    pub fn latest_departure(&self, from: VertexId, to: VertexId, arrival: Time) -> Result<Time, RouteError> {
        self.check_vertex(from)?;
        self.check_vertex(to)?;
        if from == to {
            return Ok(arrival);
        }

        let n = self.network.vertices().len();
        let mut latest: Vec<Option<Time>> = vec![None; n];
        let mut settled = vec![false; n];
        let mut last_error = None;
        let mut heap = BinaryHeap::new();

        latest[to.0] = Some(arrival);
        heap.push((arrival, Reverse(to.0)));

        while let Some((time, Reverse(vertex))) = heap.pop() {
            if settled[vertex] {
                continue;
            }
            settled[vertex] = true;
            if vertex == from.0 {
                return Ok(time);
            }

            for arc in self.network.incoming(VertexId(vertex)) {
                let travel = match self.cost_model.time_on_arrival(arc, time) {
                    Ok(travel) => travel,
                    Err(err) => {
                        last_error = Some(err);
                        continue;
                    }
                };
                let candidate = time - travel;
                let prev = arc.from.0;
                if !settled[prev] && latest[prev].is_none_or(|best| candidate > best) {
                    latest[prev] = Some(candidate);
                    heap.push((candidate, Reverse(prev)));
                }
            }
        }

        Err(last_error.map_or(RouteError::Unreachable { from, to }, RouteError::Cost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{BinnedCost, FreeFlowCost};

    /// a -> b -> d (10 + 10), a -> c -> d (5 + 30), a -> d (50)
    fn diamond() -> Network {
        let mut network = Network::new();
        let a = network.add_vertex((0.0, 0.0));
        let b = network.add_vertex((0.0, 1.0));
        let c = network.add_vertex((1.0, 0.0));
        let d = network.add_vertex((1.0, 1.0));
        network.add_arc(a, b, 100.0, 10).unwrap();
        network.add_arc(b, d, 100.0, 10).unwrap();
        network.add_arc(a, c, 100.0, 5).unwrap();
        network.add_arc(c, d, 100.0, 30).unwrap();
        network.add_arc(a, d, 100.0, 50).unwrap();
        network
    }

    #[test]
    fn test_route_takes_fastest_path() {
        let router = Router::new(diamond(), FreeFlowCost::new(0, 1000));
        let path = router.route_on_departure(VertexId(0), VertexId(3), 100).unwrap();
        assert_eq!(path.arcs, vec![ArcId(0), ArcId(1)]);
        assert_eq!(path.arrival, 120);
        assert_eq!(path.travel_time(), 20);
        assert_eq!(path.cost, 20.0);
    }

    #[test]
    fn test_route_same_vertex_is_empty() {
        let router = Router::new(diamond(), FreeFlowCost::new(0, 1000));
        let path = router.route_on_departure(VertexId(2), VertexId(2), 7).unwrap();
        assert!(path.arcs.is_empty());
        assert_eq!(path.arrival, 7);
    }

    #[test]
    fn test_route_unreachable() {
        let router = Router::new(diamond(), FreeFlowCost::new(0, 1000));
        let err = router.route_on_departure(VertexId(3), VertexId(0), 0).unwrap_err();
        assert_eq!(err, RouteError::Unreachable { from: VertexId(3), to: VertexId(0) });
    }

    #[test]
    fn test_route_out_of_horizon() {
        let router = Router::new(diamond(), FreeFlowCost::new(0, 1000));
        let err = router.route_on_departure(VertexId(0), VertexId(3), 2000).unwrap_err();
        assert!(matches!(err, RouteError::Cost(CostError::OutOfHorizon { .. })));
    }

    #[test]
    fn test_route_unknown_vertex() {
        let router = Router::new(diamond(), FreeFlowCost::new(0, 1000));
        let err = router.route_on_departure(VertexId(0), VertexId(9), 0).unwrap_err();
        assert_eq!(err, RouteError::UnknownVertex(VertexId(9)));
    }

    #[test]
    fn test_congestion_changes_route() {
        // The b -> d arc is five times slower during the first bin.
        let cost = BinnedCost::new(0, 100, vec![1.0; 10]).with_arc_factors(ArcId(1), vec![5.0]);
        let router = Router::new(diamond(), cost);

        let congested = router.route_on_departure(VertexId(0), VertexId(3), 0).unwrap();
        assert_eq!(congested.arcs, vec![ArcId(2), ArcId(3)]);
        assert_eq!(congested.arrival, 35);

        let free = router.route_on_departure(VertexId(0), VertexId(3), 200).unwrap();
        assert_eq!(free.arcs, vec![ArcId(0), ArcId(1)]);
        assert_eq!(free.arrival, 220);
    }

    #[test]
    fn test_latest_departure_matches_forward() {
        let router = Router::new(diamond(), FreeFlowCost::new(0, 1000));
        let latest = router.latest_departure(VertexId(0), VertexId(3), 500).unwrap();
        assert_eq!(latest, 480);
        let forward = router.route_on_departure(VertexId(0), VertexId(3), latest).unwrap();
        assert_eq!(forward.arrival, 500);
    }

    #[test]
    fn test_latest_departure_unreachable() {
        let router = Router::new(diamond(), FreeFlowCost::new(0, 1000));
        assert!(router.latest_departure(VertexId(3), VertexId(0), 500).is_err());
    }
}
