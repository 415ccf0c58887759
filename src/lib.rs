//! fleet-dispatch: online pickup-and-delivery dispatching
//!
//! Ride requests arrive one at a time during a simulated day and are
//! inserted into the schedule of the vehicle where they cost least, or
//! rejected. Travel times come from a time-dependent cost model over a
//! road network.

pub mod traits;
pub mod network;
pub mod cost;
pub mod router;
pub mod request;
pub mod vehicle;
pub mod task;
pub mod schedule;
pub mod pickup_delivery;
pub mod events;
pub mod dispatcher;
pub mod osrm;
pub mod haversine;
