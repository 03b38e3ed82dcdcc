//! Stop identifier and record types.

use std::fmt;

use super::point::GeoPoint;

/// Error returned when parsing an invalid stop identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid stop id: {reason}")]
pub struct InvalidStopId {
    reason: &'static str,
}

/// A TRIAS stop-point reference, e.g. `at:46:7960`.
///
/// Identifiers are opaque strings assigned by the upstream network; this
/// type only guarantees they are non-empty and contain no whitespace.
/// `Ord` follows plain byte order, which is what the nearby query uses to
/// break distance ties deterministically.
///
/// # Examples
///
/// ```
/// use trias_server::domain::StopId;
///
/// let id = StopId::parse("at:46:7960").unwrap();
/// assert_eq!(id.as_str(), "at:46:7960");
///
/// assert!(StopId::parse("").is_err());
/// assert!(StopId::parse("at:46 7960").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StopId(String);

impl StopId {
    /// Parse a stop identifier from a string.
    ///
    /// The input must be non-empty and must not contain whitespace.
    pub fn parse(s: &str) -> Result<Self, InvalidStopId> {
        if s.is_empty() {
            return Err(InvalidStopId {
                reason: "must not be empty",
            });
        }
        if s.chars().any(char::is_whitespace) {
            return Err(InvalidStopId {
                reason: "must not contain whitespace",
            });
        }

        Ok(StopId(s.to_string()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StopId({})", self.0)
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A geocoded stop record as held by the stop cache.
///
/// Created when a search result or a cache build observes a stop with
/// coordinates; records without coordinates never become a `Stop`.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    /// Upstream stop-point reference.
    pub id: StopId,

    /// Display name, e.g. "Graz Hauptplatz".
    pub name: String,

    /// Locality (city or area) the stop belongs to, when reported.
    pub locality: Option<String>,

    /// Geographic position.
    pub position: GeoPoint,

    /// Number of platform-level entries observed for this stop (at least 1).
    pub platform_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_ids() {
        assert!(StopId::parse("at:46:7960").is_ok());
        assert!(StopId::parse("at:46:7960:0:1").is_ok());
        assert!(StopId::parse("X").is_ok());
    }

    #[test]
    fn reject_empty() {
        assert!(StopId::parse("").is_err());
    }

    #[test]
    fn reject_whitespace() {
        assert!(StopId::parse("at:46 7960").is_err());
        assert!(StopId::parse(" at:46:7960").is_err());
        assert!(StopId::parse("at:46:7960\n").is_err());
    }

    #[test]
    fn as_str_roundtrip() {
        let id = StopId::parse("at:46:7960").unwrap();
        assert_eq!(id.as_str(), "at:46:7960");
    }

    #[test]
    fn display_and_debug() {
        let id = StopId::parse("at:46:7960").unwrap();
        assert_eq!(format!("{}", id), "at:46:7960");
        assert_eq!(format!("{:?}", id), "StopId(at:46:7960)");
    }

    #[test]
    fn ordering_is_byte_order() {
        let a = StopId::parse("at:46:1000").unwrap();
        let b = StopId::parse("at:46:2000").unwrap();
        assert!(a < b);
    }

    #[test]
    fn hash_consistent_with_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(StopId::parse("at:46:7960").unwrap());
        assert!(set.contains(&StopId::parse("at:46:7960").unwrap()));
        assert!(!set.contains(&StopId::parse("at:46:7961").unwrap()));
    }
}
