//! Haversine travel matrix provider (fallback when OSRM is unavailable).
//!
//! Uses great-circle distance and an assumed speed to estimate travel time.
//! Less accurate than OSRM (ignores roads) but always available.

use crate::network::TravelMatrix;
use crate::traits::{MatrixError, Time, TravelMatrixProvider};

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineMatrix {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Great-circle distance between two `(lat, lng)` points in kilometers.
    fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
        let (lat1, lng1) = from;
        let (lat2, lng2) = to;

        let delta_lat = (lat2 - lat1).to_radians();
        let delta_lng = (lng2 - lng1).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.to_radians().cos() * lat2.to_radians().cos() * (delta_lng / 2.0).sin().powi(2);

        EARTH_RADIUS_KM * 2.0 * a.sqrt().asin()
    }

    fn km_to_seconds(&self, km: f64) -> Time {
        (km / self.speed_kmh * 3600.0).round() as Time
    }
}

impl TravelMatrixProvider for HaversineMatrix {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<TravelMatrix, MatrixError> {
        if self.speed_kmh.is_nan() || self.speed_kmh <= 0.0 {
            return Err(MatrixError::Malformed(format!("speed must be positive, got {}", self.speed_kmh)));
        }

        let n = locations.len();
        let mut durations = vec![vec![0; n]; n];
        let mut distances = vec![vec![0.0; n]; n];

        for (i, from) in locations.iter().enumerate() {
            for (j, to) in locations.iter().enumerate() {
                if i != j {
                    let km = Self::haversine_km(*from, *to);
                    durations[i][j] = self.km_to_seconds(km);
                    distances[i][j] = km * 1000.0;
                }
            }
        }

        Ok(TravelMatrix { durations, distances })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let dist = HaversineMatrix::haversine_km((36.1, -115.1), (36.1, -115.1));
        assert!(dist < 0.001, "Same point should have ~0 distance");
    }

    #[test]
    fn test_haversine_known_distance() {
        // Las Vegas to Los Angeles is roughly 370 km.
        let dist = HaversineMatrix::haversine_km((36.17, -115.14), (34.05, -118.24));
        assert!(dist > 350.0 && dist < 400.0, "LV to LA should be ~370km, got {}", dist);
    }

    #[test]
    fn test_matrix_diagonal_is_zero() {
        let provider = HaversineMatrix::default();
        let locations = vec![(36.1, -115.1), (36.2, -115.2), (36.3, -115.3)];
        let matrix = provider.matrix_for(&locations).unwrap();

        assert_eq!(matrix.len(), 3);
        for i in 0..locations.len() {
            assert_eq!(matrix.durations[i][i], 0);
            assert_eq!(matrix.distances[i][i], 0.0);
        }
    }

    #[test]
    fn test_matrix_symmetric() {
        let provider = HaversineMatrix::default();
        let matrix = provider.matrix_for(&[(36.1, -115.1), (36.2, -115.2)]).unwrap();
        assert_eq!(matrix.durations[0][1], matrix.durations[1][0]);
        assert!(matrix.distances[0][1] > 10_000.0);
    }

    #[test]
    fn test_reasonable_travel_time() {
        // 10 km at 40 km/h is a quarter of an hour.
        assert_eq!(HaversineMatrix::new(40.0).km_to_seconds(10.0), 900);
    }

    #[test]
    fn test_zero_speed_is_rejected() {
        let err = HaversineMatrix::new(0.0).matrix_for(&[(36.1, -115.1)]).unwrap_err();
        assert!(matches!(err, MatrixError::Malformed(_)));
    }
}
