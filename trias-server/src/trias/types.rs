//! Data shapes produced by the TRIAS gateway.

use crate::domain::{GeoPoint, Stop, StopId};

/// A stop location returned by a location information request.
///
/// TRIAS reports one `LocationResult` per platform, so a station with
/// several platforms appears several times under the same stop reference.
/// The parser collapses those into a single candidate and counts the
/// platform entries it absorbed.
#[derive(Debug, Clone, PartialEq)]
pub struct StopCandidate {
    pub stop_id: String,
    pub stop_name: Option<String>,
    pub locality: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub platform_count: u32,
}

impl StopCandidate {
    /// Convert to a domain [`Stop`], if the candidate is fully geocoded.
    ///
    /// Candidates with a missing or out-of-range position, or an
    /// unusable stop reference, yield `None` and are skipped by callers
    /// that feed the cache.
    pub fn to_stop(&self) -> Option<Stop> {
        let id = StopId::parse(&self.stop_id).ok()?;
        let position = GeoPoint::new(self.latitude?, self.longitude?).ok()?;
        Some(Stop {
            id,
            name: self.stop_name.clone().unwrap_or_else(|| self.stop_id.clone()),
            locality: self.locality.clone(),
            position,
            platform_count: self.platform_count,
        })
    }
}

/// A ranked match from the free-text location resolver.
///
/// Unlike [`StopCandidate`] this covers addresses and points of interest
/// as well as stops, and always carries a usable position.
#[derive(Debug, Clone)]
pub struct LocationCandidate {
    pub display: String,
    pub stop_ref: Option<StopId>,
    pub position: GeoPoint,
    pub probability: f64,
}

/// One end of a trip request: either a known stop or a raw coordinate.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceRef {
    Stop(StopId),
    Position(GeoPoint),
}

/// A single departure from a stop event request.
///
/// All fields are optional because the upstream omits elements freely;
/// `actual_time` is the estimated time when realtime data is present and
/// the timetabled time otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub line: Option<String>,
    pub destination: Option<String>,
    pub mode: Option<String>,
    pub planned_time: Option<String>,
    pub estimated_time: Option<String>,
    pub actual_time: Option<String>,
    pub delay_minutes: Option<i64>,
    pub has_realtime: bool,
}

/// A door-to-door connection from a trip request.
#[derive(Debug, Clone, PartialEq)]
pub struct TripConnection {
    pub start_time: String,
    pub end_time: String,
    pub legs: Vec<TripLeg>,
}

/// One leg of a trip: a timetabled service or a continuous movement
/// such as a walk.
#[derive(Debug, Clone, PartialEq)]
pub enum TripLeg {
    Timed(TimedLeg),
    Continuous(WalkLeg),
}

/// A leg on a timetabled service.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedLeg {
    pub mode: String,
    pub line: String,
    pub headsign: Option<String>,
    pub from: String,
    pub to: String,
    pub departure: String,
    pub arrival: String,
}

/// A continuous leg, typically a walk between stops or to an address.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkLeg {
    pub from: String,
    pub to: String,
    pub departure: String,
    pub arrival: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> StopCandidate {
        StopCandidate {
            stop_id: "at:46:7960".into(),
            stop_name: Some("Graz Hauptbahnhof".into()),
            locality: Some("Graz".into()),
            latitude: Some(47.0727),
            longitude: Some(15.4162),
            platform_count: 3,
        }
    }

    #[test]
    fn geocoded_candidate_converts() {
        let stop = candidate().to_stop().unwrap();
        assert_eq!(stop.id.as_str(), "at:46:7960");
        assert_eq!(stop.name, "Graz Hauptbahnhof");
        assert_eq!(stop.locality.as_deref(), Some("Graz"));
        assert_eq!(stop.platform_count, 3);
    }

    #[test]
    fn candidate_without_position_is_dropped() {
        let mut c = candidate();
        c.latitude = None;
        assert!(c.to_stop().is_none());

        let mut c = candidate();
        c.longitude = None;
        assert!(c.to_stop().is_none());
    }

    #[test]
    fn candidate_with_out_of_range_position_is_dropped() {
        let mut c = candidate();
        c.latitude = Some(95.0);
        assert!(c.to_stop().is_none());
    }

    #[test]
    fn unnamed_candidate_falls_back_to_reference() {
        let mut c = candidate();
        c.stop_name = None;
        let stop = c.to_stop().unwrap();
        assert_eq!(stop.name, "at:46:7960");
    }
}
