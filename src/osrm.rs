//! OSRM HTTP adapter for travel matrices.

use serde::Deserialize;
use tracing::debug;

use crate::network::TravelMatrix;
use crate::traits::{MatrixError, Time, TravelMatrixProvider};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn table_url(&self, locations: &[(f64, f64)]) -> String {
        let coords = locations
            .iter()
            .map(|(lat, lng)| format!("{:.6},{:.6}", lng, lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=duration,distance",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            coords
        )
    }
}

impl TravelMatrixProvider for OsrmClient {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<TravelMatrix, MatrixError> {
        if locations.is_empty() {
            return Ok(TravelMatrix {
                durations: Vec::new(),
                distances: Vec::new(),
            });
        }

        let url = self.table_url(locations);
        debug!(locations = locations.len(), "requesting OSRM table");
        let body = self
            .client
            .get(url)
            .send()?
            .error_for_status()?
            .json::<OsrmTableResponse>()?;

        body.into_matrix(locations.len())
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    durations: Option<Vec<Vec<Option<f64>>>>,
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl OsrmTableResponse {
    fn into_matrix(self, n: usize) -> Result<TravelMatrix, MatrixError> {
        if self.code != "Ok" {
            return Err(MatrixError::Malformed(format!("OSRM answered with code {}", self.code)));
        }
        let durations = self
            .durations
            .ok_or_else(|| MatrixError::Malformed("missing durations".to_string()))?;
        let distances = self
            .distances
            .ok_or_else(|| MatrixError::Malformed("missing distances".to_string()))?;

        Ok(TravelMatrix {
            durations: square(durations, n, "duration")?
                .into_iter()
                .map(|row| row.into_iter().map(|value| value.round() as Time).collect())
                .collect(),
            distances: square(distances, n, "distance")?,
        })
    }
}

/// Checks the table is `n x n` and every pair is routable.
fn square(rows: Vec<Vec<Option<f64>>>, n: usize, what: &str) -> Result<Vec<Vec<f64>>, MatrixError> {
    if rows.len() != n || rows.iter().any(|row| row.len() != n) {
        return Err(MatrixError::Malformed(format!("expected {}x{} {} table", n, n, what)));
    }
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            row.into_iter()
                .enumerate()
                .map(|(j, value)| {
                    value.ok_or_else(|| MatrixError::Malformed(format!("no {} from {} to {}", what, i, j)))
                })
                .collect()
        })
        .collect()
}
