//! TRIAS response document parsing.
//!
//! The upstream wraps every response in a `Trias`/`ServiceDelivery`
//! envelope; elements live in the TRIAS default namespace with SIRI
//! elements mixed in. Matching is by local name, which is unambiguous
//! for the elements read here. Results that are missing required
//! elements are skipped rather than failing the whole response.

use std::collections::HashMap;

use chrono::DateTime;
use roxmltree::{Document, Node};

use crate::domain::{GeoPoint, StopId};
use crate::trias::error::TriasError;
use crate::trias::types::{
    Departure, LocationCandidate, StopCandidate, TimedLeg, TripConnection, TripLeg, WalkLeg,
};

fn parse_document(xml: &str) -> Result<Document<'_>, TriasError> {
    Document::parse(xml).map_err(|e| TriasError::Xml {
        message: e.to_string(),
    })
}

fn find_child<'a, 'input>(scope: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    scope
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn find_descendant<'a, 'input>(scope: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    scope
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn nonempty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn child_text<'a>(scope: Node<'a, '_>, name: &str) -> Option<&'a str> {
    find_child(scope, name).and_then(|n| n.text()).and_then(nonempty)
}

fn descendant_text<'a>(scope: Node<'a, '_>, name: &str) -> Option<&'a str> {
    find_descendant(scope, name)
        .and_then(|n| n.text())
        .and_then(nonempty)
}

/// Text of `outer`'s first `inner` descendant, e.g. `StopPointName/Text`.
fn nested_text<'a>(scope: Node<'a, '_>, outer: &str, inner: &str) -> Option<&'a str> {
    descendant_text(find_descendant(scope, outer)?, inner)
}

/// Parse a `LocationInformationResponse` into stop candidates.
///
/// The upstream reports one `LocationResult` per platform; entries that
/// share a stop reference are collapsed into one candidate, keeping the
/// first occurrence and counting the platforms absorbed.
pub fn location_results(xml: &str) -> Result<Vec<StopCandidate>, TriasError> {
    let doc = parse_document(xml)?;
    let mut candidates: Vec<StopCandidate> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();

    for result in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "LocationResult")
    {
        let Some(stop_id) = descendant_text(result, "StopPointRef") else {
            continue;
        };

        if let Some(&i) = by_id.get(stop_id) {
            candidates[i].platform_count += 1;
            continue;
        }

        by_id.insert(stop_id.to_string(), candidates.len());
        candidates.push(StopCandidate {
            stop_id: stop_id.to_string(),
            stop_name: nested_text(result, "StopPointName", "Text").map(str::to_string),
            locality: nested_text(result, "LocalityName", "Text").map(str::to_string),
            latitude: descendant_text(result, "Latitude").and_then(|s| s.parse().ok()),
            longitude: descendant_text(result, "Longitude").and_then(|s| s.parse().ok()),
            platform_count: 1,
        });
    }

    Ok(candidates)
}

/// Parse a `LocationInformationResponse` into ranked location
/// candidates for the trip planner, best match first.
///
/// Candidates without a usable position are dropped; a stop reference
/// is optional (addresses and points of interest have none).
pub fn location_candidates(xml: &str) -> Result<Vec<LocationCandidate>, TriasError> {
    let doc = parse_document(xml)?;
    let mut candidates = Vec::new();

    for result in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "LocationResult")
    {
        let probability = child_text(result, "Probability")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0);
        let Some(location) = find_child(result, "Location") else {
            continue;
        };

        let stop_point = find_child(location, "StopPoint");
        let stop_ref = stop_point
            .and_then(|sp| child_text(sp, "StopPointRef"))
            .and_then(|s| StopId::parse(s).ok());
        let stop_name = stop_point.and_then(|sp| nested_text(sp, "StopPointName", "Text"));
        let display = stop_name
            .or_else(|| nested_text(location, "LocationName", "Text"))
            .unwrap_or("(unknown)")
            .to_string();

        let Some(geo) = find_child(location, "GeoPosition") else {
            continue;
        };
        let latitude = child_text(geo, "Latitude").and_then(|s| s.parse::<f64>().ok());
        let longitude = child_text(geo, "Longitude").and_then(|s| s.parse::<f64>().ok());
        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            continue;
        };
        let Ok(position) = GeoPoint::new(latitude, longitude) else {
            continue;
        };

        candidates.push(LocationCandidate {
            display,
            stop_ref,
            position,
            probability,
        });
    }

    candidates.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    Ok(candidates)
}

/// Parse a `StopEventResponse` into departures, in upstream order.
pub fn departures(xml: &str) -> Result<Vec<Departure>, TriasError> {
    let doc = parse_document(xml)?;
    let mut departures = Vec::new();

    for result in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "StopEventResult")
    {
        let Some(stop_event) = find_child(result, "StopEvent") else {
            continue;
        };
        let Some(this_call) = find_descendant(stop_event, "ThisCall") else {
            continue;
        };
        let Some(service_departure) = find_descendant(this_call, "ServiceDeparture") else {
            continue;
        };

        let planned = child_text(service_departure, "TimetabledTime");
        let estimated = child_text(service_departure, "EstimatedTime");
        let delay_minutes = match (planned, estimated) {
            (Some(p), Some(e)) => delay_between(p, e),
            _ => None,
        };

        let service = find_descendant(stop_event, "Service");
        departures.push(Departure {
            line: service
                .and_then(|s| nested_text(s, "PublishedLineName", "Text"))
                .map(str::to_string),
            destination: service
                .and_then(|s| nested_text(s, "DestinationText", "Text"))
                .map(str::to_string),
            mode: service
                .and_then(|s| nested_text(s, "Mode", "PtMode"))
                .map(str::to_string),
            planned_time: planned.map(str::to_string),
            estimated_time: estimated.map(str::to_string),
            actual_time: estimated.or(planned).map(str::to_string),
            delay_minutes,
            has_realtime: estimated.is_some(),
        });
    }

    Ok(departures)
}

/// Signed delay in whole minutes, rounded to the nearest minute.
fn delay_between(planned: &str, estimated: &str) -> Option<i64> {
    let planned = DateTime::parse_from_rfc3339(planned).ok()?;
    let estimated = DateTime::parse_from_rfc3339(estimated).ok()?;
    let seconds = (estimated - planned).num_seconds() as f64;
    Some((seconds / 60.0).round() as i64)
}

/// Parse a `TripResponse` into connections.
pub fn trips(xml: &str) -> Result<Vec<TripConnection>, TriasError> {
    let doc = parse_document(xml)?;
    let mut trips = Vec::new();

    for result in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "TripResult")
    {
        let Some(trip) = find_child(result, "Trip") else {
            continue;
        };

        let legs = trip
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "TripLeg")
            .filter_map(|leg| trip_leg(leg))
            .collect();

        trips.push(TripConnection {
            start_time: child_text(trip, "StartTime")
                .map(format_hms)
                .unwrap_or_else(|| "-".into()),
            end_time: child_text(trip, "EndTime")
                .map(format_hms)
                .unwrap_or_else(|| "-".into()),
            legs,
        });
    }

    Ok(trips)
}

/// `HH:MM:SS` out of an ISO timestamp; anything unrecognised passes
/// through unchanged.
fn format_hms(iso: &str) -> String {
    match iso.split_once('T') {
        Some((_, time)) => time.trim_end_matches('Z').chars().take(8).collect(),
        None => iso.to_string(),
    }
}

fn trip_leg(leg: Node) -> Option<TripLeg> {
    if let Some(cont) = find_child(leg, "ContinuousLeg") {
        return Some(TripLeg::Continuous(continuous_leg(cont)));
    }
    if let Some(timed) = find_child(leg, "TimedLeg") {
        return Some(TripLeg::Timed(timed_leg(timed)));
    }
    // Other leg kinds (interchanges) carry no information we render.
    None
}

/// Stop or location name at a leg endpoint, e.g. `LegStart` or `LegBoard`.
fn leg_endpoint_name(scope: Node, endpoint: &str) -> Option<String> {
    let node = find_descendant(scope, endpoint)?;
    nested_text(node, "StopPointName", "Text")
        .or_else(|| nested_text(node, "LocationName", "Text"))
        .map(str::to_string)
}

/// First available time at a leg endpoint, tried in `order`.
fn leg_endpoint_time(scope: Node, endpoint: &str, order: &[&str]) -> Option<String> {
    let node = find_descendant(scope, endpoint)?;
    order
        .iter()
        .find_map(|name| descendant_text(node, name))
        .map(format_hms)
}

/// Raw coordinates as display text when an endpoint has no name.
fn endpoint_position(scope: Node, endpoint: &str) -> String {
    let Some(node) = find_descendant(scope, endpoint) else {
        return "?".into();
    };
    match (
        descendant_text(node, "Latitude"),
        descendant_text(node, "Longitude"),
    ) {
        (Some(lat), Some(lon)) => format!("({lat},{lon})"),
        _ => "?".into(),
    }
}

fn continuous_leg(cont: Node) -> WalkLeg {
    WalkLeg {
        from: leg_endpoint_name(cont, "LegStart")
            .unwrap_or_else(|| endpoint_position(cont, "LegStart")),
        to: leg_endpoint_name(cont, "LegEnd").unwrap_or_else(|| endpoint_position(cont, "LegEnd")),
        departure: leg_endpoint_time(cont, "LegStart", &["Time", "EstimatedTime", "TimetabledTime"])
            .unwrap_or_else(|| "-".into()),
        arrival: leg_endpoint_time(cont, "LegEnd", &["Time", "EstimatedTime", "TimetabledTime"])
            .unwrap_or_else(|| "-".into()),
    }
}

fn timed_leg(timed: Node) -> TimedLeg {
    let service = find_descendant(timed, "Service");
    TimedLeg {
        mode: service
            .and_then(|s| nested_text(s, "Mode", "PtMode"))
            .or_else(|| nested_text(timed, "Mode", "PtMode"))
            .unwrap_or("-")
            .to_string(),
        line: service
            .and_then(|s| nested_text(s, "PublishedLineName", "Text"))
            .or_else(|| nested_text(timed, "PublishedLineName", "Text"))
            .unwrap_or("-")
            .to_string(),
        headsign: service
            .and_then(|s| nested_text(s, "DestinationText", "Text"))
            .or_else(|| nested_text(timed, "DestinationText", "Text"))
            .map(str::to_string),
        from: leg_endpoint_name(timed, "LegBoard")
            .or_else(|| leg_endpoint_name(timed, "LegStart"))
            .unwrap_or_else(|| endpoint_position(timed, "LegStart")),
        to: leg_endpoint_name(timed, "LegAlight")
            .or_else(|| leg_endpoint_name(timed, "LegEnd"))
            .unwrap_or_else(|| endpoint_position(timed, "LegEnd")),
        departure: leg_endpoint_time(timed, "LegBoard", &["EstimatedTime", "TimetabledTime"])
            .or_else(|| {
                leg_endpoint_time(timed, "LegStart", &["EstimatedTime", "TimetabledTime", "Time"])
            })
            .unwrap_or_else(|| "-".into()),
        arrival: leg_endpoint_time(timed, "LegAlight", &["EstimatedTime", "TimetabledTime"])
            .or_else(|| {
                leg_endpoint_time(timed, "LegEnd", &["EstimatedTime", "TimetabledTime", "Time"])
            })
            .unwrap_or_else(|| "-".into()),
    }
}
