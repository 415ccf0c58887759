//! Routing network used by the dispatcher's travel queries.

use serde::{Deserialize, Serialize};

use crate::traits::{MatrixError, Time, TravelMatrixProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArcId(pub usize);

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl std::fmt::Display for ArcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: VertexId,
    /// Location coordinates (lat, lng).
    pub coord: (f64, f64),
}

/// Directed network edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Arc {
    pub id: ArcId,
    pub from: VertexId,
    pub to: VertexId,
    /// Length in metres.
    pub length: f64,
    /// Uncongested traversal time in seconds.
    pub free_travel_time: Time,
}

/// Travel durations (seconds) and distances (metres) between locations.
#[derive(Debug, Clone, PartialEq)]
pub struct TravelMatrix {
    pub durations: Vec<Vec<Time>>,
    pub distances: Vec<Vec<f64>>,
}

impl TravelMatrix {
    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    UnknownVertex(VertexId),
    /// Arcs must take at least one second to traverse.
    NonPositiveTravelTime { from: VertexId, to: VertexId },
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::UnknownVertex(v) => write!(f, "unknown vertex {}", v),
            NetworkError::NonPositiveTravelTime { from, to } => {
                write!(f, "arc {} -> {} has a non-positive travel time", from, to)
            }
        }
    }
}

impl std::error::Error for NetworkError {}

/// Directed graph with adjacency lists in both directions.
#[derive(Debug, Clone, Default)]
pub struct Network {
    vertices: Vec<Vertex>,
    arcs: Vec<Arc>,
    outgoing: Vec<Vec<ArcId>>,
    incoming: Vec<Vec<ArcId>>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, coord: (f64, f64)) -> VertexId {
        let id = VertexId(self.vertices.len());
        self.vertices.push(Vertex { id, coord });
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        id
    }

    pub fn add_arc(
        &mut self,
        from: VertexId,
        to: VertexId,
        length: f64,
        free_travel_time: Time,
    ) -> Result<ArcId, NetworkError> {
        for v in [from, to] {
            if !self.contains(v) {
                return Err(NetworkError::UnknownVertex(v));
            }
        }
        if free_travel_time <= 0 {
            return Err(NetworkError::NonPositiveTravelTime { from, to });
        }

        let id = ArcId(self.arcs.len());
        self.arcs.push(Arc {
            id,
            from,
            to,
            length,
            free_travel_time,
        });
        self.outgoing[from.0].push(id);
        self.incoming[to.0].push(id);
        Ok(id)
    }

    /// Builds a complete directed network over `locations`, one arc per
    /// ordered pair, timed by the given matrix provider.
    pub fn complete_from_matrix<M>(locations: &[(f64, f64)], provider: &M) -> Result<Self, MatrixError>
    where
        M: TravelMatrixProvider,
    {
        let matrix = provider.matrix_for(locations)?;
        let n = locations.len();
        if matrix.len() != n
            || matrix.durations.iter().any(|row| row.len() != n)
            || matrix.distances.len() != n
            || matrix.distances.iter().any(|row| row.len() != n)
        {
            return Err(MatrixError::Malformed(format!(
                "expected a {}x{} matrix, got {} rows",
                n,
                n,
                matrix.len()
            )));
        }

        let mut network = Network::new();
        for location in locations {
            network.add_vertex(*location);
        }
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                // Co-located points still need a traversable arc.
                let travel = matrix.durations[i][j].max(1);
                network
                    .add_arc(VertexId(i), VertexId(j), matrix.distances[i][j], travel)
                    .map_err(|err| MatrixError::Malformed(err.to_string()))?;
            }
        }
        Ok(network)
    }

    pub fn contains(&self, vertex: VertexId) -> bool {
        vertex.0 < self.vertices.len()
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id.0)
    }

    pub fn arc(&self, id: ArcId) -> Option<&Arc> {
        self.arcs.get(id.0)
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    pub fn outgoing(&self, vertex: VertexId) -> impl Iterator<Item = &Arc> {
        self.outgoing
            .get(vertex.0)
            .into_iter()
            .flatten()
            .map(|id| &self.arcs[id.0])
    }

    pub fn incoming(&self, vertex: VertexId) -> impl Iterator<Item = &Arc> {
        self.incoming
            .get(vertex.0)
            .into_iter()
            .flatten()
            .map(|id| &self.arcs[id.0])
    }
}
