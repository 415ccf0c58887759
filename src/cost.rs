//! Arc cost models.
//!
//! Two implementations of [`CostModel`]: constant free-flow times, and
//! piecewise-constant congestion factors over fixed time bins.

use std::collections::HashMap;

use crate::network::{Arc, ArcId};
use crate::traits::{Cost, CostModel, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostError {
    /// The queried time lies outside `[start, end)` of the model.
    OutOfHorizon { time: Time, start: Time, end: Time },
    UnknownArc(ArcId),
}

impl std::fmt::Display for CostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CostError::OutOfHorizon { time, start, end } => {
                write!(f, "time {} is outside the cost horizon [{}, {})", time, start, end)
            }
            CostError::UnknownArc(arc) => write!(f, "no cost data for arc {}", arc),
        }
    }
}

impl std::error::Error for CostError {}

/// Monetary weights applied to a traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostRates {
    pub per_second: f64,
    pub per_metre: f64,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            per_second: 1.0,
            per_metre: 0.0,
        }
    }
}

impl CostRates {
    fn apply(&self, arc: &Arc, travel_time: Time) -> Cost {
        travel_time as f64 * self.per_second + arc.length * self.per_metre
    }
}

/// Uncongested travel times, identical at every time of day.
#[derive(Debug, Clone)]
pub struct FreeFlowCost {
    start: Time,
    end: Time,
    rates: CostRates,
}

impl FreeFlowCost {
    pub fn new(start: Time, end: Time) -> Self {
        Self {
            start,
            end,
            rates: CostRates::default(),
        }
    }

    pub fn with_rates(mut self, rates: CostRates) -> Self {
        self.rates = rates;
        self
    }

    fn check(&self, time: Time) -> Result<(), CostError> {
        if time < self.start || time >= self.end {
            return Err(CostError::OutOfHorizon {
                time,
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

impl CostModel for FreeFlowCost {
    fn time_on_departure(&self, arc: &Arc, departure: Time) -> Result<Time, CostError> {
        self.check(departure)?;
        Ok(arc.free_travel_time)
    }

    fn time_on_arrival(&self, arc: &Arc, arrival: Time) -> Result<Time, CostError> {
        self.check(arrival - arc.free_travel_time)?;
        Ok(arc.free_travel_time)
    }

    fn cost_on_departure(&self, arc: &Arc, departure: Time) -> Result<Cost, CostError> {
        self.check(departure)?;
        Ok(self.rates.apply(arc, arc.free_travel_time))
    }
}

/// Time-dependent travel times: the free-flow time scaled by a congestion
/// factor of the bin the traversal departs in.
///
/// Arrival-indexed queries scan bins backwards for the latest departure that
/// still arrives in time; no inverse of the departure function is assumed.
#[derive(Debug, Clone)]
pub struct BinnedCost {
    start: Time,
    bin_size: Time,
    default_factors: Vec<f64>,
    arc_factors: HashMap<ArcId, Vec<f64>>,
    rates: CostRates,
}

impl BinnedCost {
    /// `factors[b]` applies to departures in `[start + b * bin_size, start + (b + 1) * bin_size)`.
    pub fn new(start: Time, bin_size: Time, factors: Vec<f64>) -> Self {
        Self {
            start,
            bin_size: bin_size.max(1),
            default_factors: factors,
            arc_factors: HashMap::new(),
            rates: CostRates::default(),
        }
    }

    /// Overrides the congestion profile of a single arc. Missing trailing
    /// bins fall back to a factor of 1.
    pub fn with_arc_factors(mut self, arc: ArcId, factors: Vec<f64>) -> Self {
        self.arc_factors.insert(arc, factors);
        self
    }

    pub fn with_rates(mut self, rates: CostRates) -> Self {
        self.rates = rates;
        self
    }

    pub fn end(&self) -> Time {
        self.start + self.bin_size * self.default_factors.len() as Time
    }

    fn out_of_horizon(&self, time: Time) -> CostError {
        CostError::OutOfHorizon {
            time,
            start: self.start,
            end: self.end(),
        }
    }

    fn bin_of(&self, time: Time) -> Result<usize, CostError> {
        if time < self.start || time >= self.end() {
            return Err(self.out_of_horizon(time));
        }
        Ok(((time - self.start) / self.bin_size) as usize)
    }

    fn factor(&self, arc: &Arc, bin: usize) -> f64 {
        self.arc_factors
            .get(&arc.id)
            .and_then(|factors| factors.get(bin))
            .or_else(|| self.default_factors.get(bin))
            .copied()
            .unwrap_or(1.0)
    }

    fn time_in_bin(&self, arc: &Arc, bin: usize) -> Time {
        let scaled = (arc.free_travel_time as f64 * self.factor(arc, bin)).ceil() as Time;
        scaled.max(1)
    }
}

impl CostModel for BinnedCost {
    fn time_on_departure(&self, arc: &Arc, departure: Time) -> Result<Time, CostError> {
        let bin = self.bin_of(departure)?;
        Ok(self.time_in_bin(arc, bin))
    }

    fn time_on_arrival(&self, arc: &Arc, arrival: Time) -> Result<Time, CostError> {
        if arrival <= self.start || self.default_factors.is_empty() {
            return Err(self.out_of_horizon(arrival));
        }
        let last_bin = self.default_factors.len() - 1;
        let top = (((arrival - self.start) / self.bin_size) as usize).min(last_bin);

        for bin in (0..=top).rev() {
            let bin_start = self.start + bin as Time * self.bin_size;
            let bin_last = bin_start + self.bin_size - 1;
            let departure = (arrival - self.time_in_bin(arc, bin)).min(bin_last);
            if departure >= bin_start {
                return Ok(arrival - departure);
            }
        }
        Err(self.out_of_horizon(arrival))
    }

    fn cost_on_departure(&self, arc: &Arc, departure: Time) -> Result<Cost, CostError> {
        let travel = self.time_on_departure(arc, departure)?;
        Ok(self.rates.apply(arc, travel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::VertexId;

    fn arc(free_travel_time: Time) -> Arc {
        Arc {
            id: ArcId(0),
            from: VertexId(0),
            to: VertexId(1),
            length: 1000.0,
            free_travel_time,
        }
    }

    #[test]
    fn test_free_flow_is_constant() {
        let model = FreeFlowCost::new(0, 1000);
        let a = arc(40);
        assert_eq!(model.time_on_departure(&a, 0).unwrap(), 40);
        assert_eq!(model.time_on_departure(&a, 900).unwrap(), 40);
        assert_eq!(model.time_on_arrival(&a, 500).unwrap(), 40);
        assert_eq!(model.cost_on_departure(&a, 10).unwrap(), 40.0);
    }

    #[test]
    fn test_free_flow_rates() {
        let model = FreeFlowCost::new(0, 1000).with_rates(CostRates {
            per_second: 0.5,
            per_metre: 0.01,
        });
        assert_eq!(model.cost_on_departure(&arc(40), 0).unwrap(), 30.0);
    }

    #[test]
    fn test_free_flow_out_of_horizon() {
        let model = FreeFlowCost::new(0, 1000);
        let err = model.time_on_departure(&arc(40), 1000).unwrap_err();
        assert!(matches!(err, CostError::OutOfHorizon { time: 1000, .. }));
        assert!(model.time_on_departure(&arc(40), -1).is_err());
    }

    #[test]
    fn test_binned_departure_uses_bin_factor() {
        let model = BinnedCost::new(0, 100, vec![1.0, 2.0, 1.5]);
        let a = arc(30);
        assert_eq!(model.time_on_departure(&a, 50).unwrap(), 30);
        assert_eq!(model.time_on_departure(&a, 150).unwrap(), 60);
        assert_eq!(model.time_on_departure(&a, 299).unwrap(), 45);
        assert!(model.time_on_departure(&a, 300).is_err());
    }

    #[test]
    fn test_binned_arrival_consistent_with_departure() {
        let model = BinnedCost::new(0, 100, vec![1.0, 2.0, 1.5]);
        let a = arc(30);
        for departure in [0, 20, 69, 100, 140, 199, 230] {
            let travel = model.time_on_departure(&a, departure).unwrap();
            let arrival = departure + travel;
            let back = model.time_on_arrival(&a, arrival).unwrap();
            // The latest departure reaching `arrival` is never earlier.
            assert!(arrival - back >= departure, "departure {}", departure);
            assert!(back >= 1);
        }
    }

    #[test]
    fn test_binned_arrival_exact_within_bin() {
        let model = BinnedCost::new(0, 100, vec![1.0, 2.0]);
        let a = arc(30);
        // Departing at 150 takes 60 seconds.
        assert_eq!(model.time_on_arrival(&a, 210).unwrap(), 60);
        // Arriving at 120 is only possible from the first bin.
        assert_eq!(model.time_on_arrival(&a, 120).unwrap(), 30);
    }

    #[test]
    fn test_binned_arc_override() {
        let model = BinnedCost::new(0, 100, vec![1.0, 1.0]).with_arc_factors(ArcId(0), vec![3.0]);
        let a = arc(10);
        assert_eq!(model.time_on_departure(&a, 10).unwrap(), 30);
        // Bin 1 is missing from the override and falls back to the default.
        assert_eq!(model.time_on_departure(&a, 110).unwrap(), 10);
    }

    #[test]
    fn test_binned_arrival_before_start() {
        let model = BinnedCost::new(100, 100, vec![1.0]);
        assert!(model.time_on_arrival(&arc(10), 105).is_err());
    }
}
