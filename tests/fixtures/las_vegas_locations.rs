//! Real Las Vegas / Henderson coordinates for realistic dispatch fixtures.
//!
//! Coordinates sourced from OpenStreetMap. They are routable with the OSRM
//! Nevada extract.

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

// ============================================================================
// Depots (fleet garages next to the big resorts)
// ============================================================================

pub const DEPOTS: &[Location] = &[
    Location::new("Wynn Las Vegas", 36.1263781, -115.1658180),
    Location::new("MGM Grand", 36.1023654, -115.1688720),
    Location::new("Longhorn Casino", 36.1070664, -115.0591256),
];

// ============================================================================
// Ride origins and destinations
// ============================================================================

pub const RIDE_POINTS: &[Location] = &[
    Location::new("Bellagio", 36.1126, -115.1767),
    Location::new("Caesars Palace", 36.1162, -115.1745),
    Location::new("Brooklyn Bowl", 36.1175388, -115.1695094),
    Location::new("Gordon Ramsay BurGR", 36.1107195, -115.1720818),
    Location::new("Bacchanal Buffet", 36.1159581, -115.1762929),
    Location::new("Strip Steak", 36.0908722, -115.1776176),
    Location::new("Beers and Bets", 36.1428945, -115.1573836),
    Location::new("Rivas Mexican Grill North", 36.1450055, -115.0482587),
    Location::new("Bootlegger Bistro", 36.0492047, -115.1715744),
    Location::new("Budget Suites South", 36.0366259, -115.1713361),
    Location::new("Green Valley Ranch Area", 36.0308, -115.0825),
    Location::new("Sunset Station Area", 36.0614, -115.0631),
    Location::new("Pei Wei Town Square", 36.0810469, -115.1472694),
    Location::new("Hello Tokyo", 36.1161627, -115.0902096),
    Location::new("Tomo Sushi", 36.0992464, -115.1142123),
    Location::new("Original Lindo Michoacan", 36.1294005, -115.1135106),
];

/// Depots first, then ride points; vertex ids follow this order.
pub fn service_area() -> Vec<Location> {
    let mut all = Vec::with_capacity(DEPOTS.len() + RIDE_POINTS.len());
    all.extend_from_slice(DEPOTS);
    all.extend_from_slice(RIDE_POINTS);
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_in_vegas_area() {
        for loc in service_area() {
            assert!(loc.lat > 35.9 && loc.lat < 36.3, "{} lat out of range: {}", loc.name, loc.lat);
            assert!(loc.lng > -115.4 && loc.lng < -114.8, "{} lng out of range: {}", loc.name, loc.lng);
        }
    }
}
