use geo::{HaversineDistance, Point};

/// Static coordinates (latitude, longitude) of the known transplant sites
pub const SITE_COORDINATES: [(&str, (f64, f64)); 5] = [
    ("USA-California", (37.8, -122.4)),
    ("USA-New York", (40.7, -74.0)),
    ("Europe-UK", (51.5, -0.1)),
    ("Asia-India", (28.6, 77.2)),
    ("Africa-South Africa", (-33.9, 18.4)),
];

/// Fallback for locations missing from the site table
pub const UNKNOWN_SITE: (f64, f64) = (0.0, 0.0);

/// Resolve a categorical location to (latitude, longitude) in degrees
pub fn site_coordinates(location: &str) -> (f64, f64) {
    SITE_COORDINATES
        .iter()
        .find(|(name, _)| *name == location)
        .map(|(_, coords)| *coords)
        .unwrap_or(UNKNOWN_SITE)
}

/// Whether the location is in the site table
pub fn is_known_site(location: &str) -> bool {
    SITE_COORDINATES.iter().any(|(name, _)| *name == location)
}

/// Great-circle distance between two categorical locations in kilometers
///
/// # Arguments
/// * `from` - Location identifier, e.g. "USA-New York"
/// * `to` - Location identifier
///
/// # Returns
/// Distance in kilometers; exactly 0 for identical locations
pub fn distance_km(from: &str, to: &str) -> f64 {
    if from == to {
        return 0.0;
    }

    let (lat1, lon1) = site_coordinates(from);
    let (lat2, lon2) = site_coordinates(to);

    // geo points are (x = longitude, y = latitude); result is in meters
    let a = Point::new(lon1, lat1);
    let b = Point::new(lon2, lat2);

    a.haversine_distance(&b) / 1000.0
}
