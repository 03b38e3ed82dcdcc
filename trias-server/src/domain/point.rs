//! Geographic coordinate types.

use std::fmt;

/// Mean Earth radius in metres, used by the haversine distance.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Error returned when constructing an invalid coordinate pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid coordinate: {reason}")]
pub struct InvalidCoordinate {
    reason: &'static str,
}

/// A validated WGS84 position in decimal degrees.
///
/// Latitude is within [-90, 90], longitude within [-180, 180], and both
/// components are finite. Code that receives a `GeoPoint` can rely on
/// those bounds without re-checking.
///
/// # Examples
///
/// ```
/// use trias_server::domain::GeoPoint;
///
/// let hauptplatz = GeoPoint::new(47.0707, 15.4395).unwrap();
/// assert_eq!(hauptplatz.latitude(), 47.0707);
///
/// // Out-of-range values are rejected
/// assert!(GeoPoint::new(91.0, 0.0).is_err());
/// assert!(GeoPoint::new(0.0, -180.5).is_err());
/// ```
#[derive(Clone, Copy, PartialEq)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    /// Construct a point from latitude and longitude in degrees.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinate> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(InvalidCoordinate {
                reason: "coordinates must be finite",
            });
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(InvalidCoordinate {
                reason: "latitude must be within [-90, 90]",
            });
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(InvalidCoordinate {
                reason: "longitude must be within [-180, 180]",
            });
        }

        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in degrees.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Great-circle distance to another point in metres (haversine).
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        // Rounding can push `a` past 1 for near-antipodal points.
        let c = 2.0 * a.sqrt().min(1.0).asin();

        EARTH_RADIUS_M * c
    }
}

impl fmt::Debug for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GeoPoint({}, {})", self.latitude, self.longitude)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn valid_point() -> impl Strategy<Value = GeoPoint> {
        (-90.0f64..=90.0, -180.0f64..=180.0)
            .prop_map(|(lat, lon)| GeoPoint::new(lat, lon).unwrap())
    }

    proptest! {
        /// Distance is never negative.
        #[test]
        fn distance_non_negative(a in valid_point(), b in valid_point()) {
            prop_assert!(a.distance_m(&b) >= 0.0);
        }

        /// Distance is symmetric.
        #[test]
        fn distance_symmetric(a in valid_point(), b in valid_point()) {
            let ab = a.distance_m(&b);
            let ba = b.distance_m(&a);
            prop_assert!((ab - ba).abs() < 1e-6);
        }

        /// Distance never exceeds half the Earth's circumference.
        #[test]
        fn distance_bounded(a in valid_point(), b in valid_point()) {
            let half_circumference = std::f64::consts::PI * 6_371_000.0;
            prop_assert!(a.distance_m(&b) <= half_circumference + 1.0);
        }
    }
}
