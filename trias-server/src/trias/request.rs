//! TRIAS request document builders.
//!
//! Requests follow the VDV-431 TRIAS 1.2 schema: a `Trias` envelope
//! carrying a SIRI request timestamp and requestor reference, with one
//! payload element per service. Documents are assembled from literal
//! templates with all caller-supplied text escaped.

use chrono::{DateTime, Utc};

use crate::domain::{GeoPoint, StopId};
use crate::trias::types::PlaceRef;

pub const TRIAS_NS: &str = "http://www.vdv.de/trias";
pub const SIRI_NS: &str = "http://www.siri.org.uk/siri";

/// Search language for location name matching.
const LANGUAGE: &str = "de";

/// Escape the five XML metacharacters in a text node.
fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// ISO-8601 UTC timestamp with a `Z` suffix, to whole seconds.
fn iso_z(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Wrap a request payload in the `Trias`/`ServiceRequest` envelope.
fn envelope(requestor_ref: &str, payload: &str, now: DateTime<Utc>) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Trias xmlns="{TRIAS_NS}" xmlns:siri="{SIRI_NS}" version="1.2">
  <ServiceRequest>
    <siri:RequestTimestamp>{timestamp}</siri:RequestTimestamp>
    <siri:RequestorRef>{requestor}</siri:RequestorRef>
    <RequestPayload>
      {payload}
    </RequestPayload>
  </ServiceRequest>
</Trias>"#,
        timestamp = iso_z(now),
        requestor = escape_xml(requestor_ref),
    )
}

/// Location search by name, restricted to stops.
pub fn location_search(
    requestor_ref: &str,
    query: &str,
    max_results: u32,
    now: DateTime<Utc>,
) -> String {
    let payload = format!(
        r#"<LocationInformationRequest>
        <InitialInput>
          <LocationName><Text>{query}</Text><Language>{LANGUAGE}</Language></LocationName>
        </InitialInput>
        <Restrictions>
          <Type>stop</Type>
          <NumberOfResults>{max_results}</NumberOfResults>
        </Restrictions>
      </LocationInformationRequest>"#,
        query = escape_xml(query),
    );
    envelope(requestor_ref, &payload, now)
}

/// Free-text location resolution without a type restriction, so that
/// addresses and points of interest match as well as stops.
pub fn location_resolve(
    requestor_ref: &str,
    query: &str,
    max_results: u32,
    now: DateTime<Utc>,
) -> String {
    let payload = format!(
        r#"<LocationInformationRequest>
        <InitialInput>
          <LocationName><Text>{query}</Text><Language>{LANGUAGE}</Language></LocationName>
        </InitialInput>
        <Restrictions>
          <NumberOfResults>{max_results}</NumberOfResults>
        </Restrictions>
      </LocationInformationRequest>"#,
        query = escape_xml(query),
    );
    envelope(requestor_ref, &payload, now)
}

/// Location search for stops inside a circle around `center`.
pub fn stops_near(
    requestor_ref: &str,
    center: &GeoPoint,
    radius_m: u32,
    max_results: u32,
    now: DateTime<Utc>,
) -> String {
    let payload = format!(
        r#"<LocationInformationRequest>
        <Restrictions>
          <Type>stop</Type>
          <NumberOfResults>{max_results}</NumberOfResults>
        </Restrictions>
        <GeoRestriction>
          <Circle>
            <Center>
              <Longitude>{longitude}</Longitude>
              <Latitude>{latitude}</Latitude>
            </Center>
            <Radius>{radius_m}</Radius>
          </Circle>
        </GeoRestriction>
      </LocationInformationRequest>"#,
        longitude = center.longitude(),
        latitude = center.latitude(),
    );
    envelope(requestor_ref, &payload, now)
}

/// Departure board request for a single stop.
pub fn stop_events(
    requestor_ref: &str,
    stop: &StopId,
    max_results: u32,
    window_minutes: u32,
    include_realtime: bool,
    now: DateTime<Utc>,
) -> String {
    let payload = format!(
        r#"<StopEventRequest>
        <Location>
          <LocationRef>
            <StopPointRef>{stop_ref}</StopPointRef>
          </LocationRef>
        </Location>
        <Params>
          <NumberOfResults>{max_results}</NumberOfResults>
          <StopEventType>departure</StopEventType>
          <IncludeRealtimeData>{realtime}</IncludeRealtimeData>
        </Params>
        <DepartureWindow>{window_minutes}</DepartureWindow>
      </StopEventRequest>"#,
        stop_ref = escape_xml(stop.as_str()),
        realtime = include_realtime,
    );
    envelope(requestor_ref, &payload, now)
}

fn place_ref_block(place: &PlaceRef) -> String {
    match place {
        PlaceRef::Stop(id) => format!("<StopPointRef>{}</StopPointRef>", escape_xml(id.as_str())),
        PlaceRef::Position(p) => format!(
            "<GeoPosition><Longitude>{:.6}</Longitude><Latitude>{:.6}</Latitude></GeoPosition>",
            p.longitude(),
            p.latitude(),
        ),
    }
}

/// Trip planning request between two places.
pub fn trip(
    requestor_ref: &str,
    origin: &PlaceRef,
    destination: &PlaceRef,
    max_results: u32,
    include_realtime: bool,
    departure: DateTime<Utc>,
    now: DateTime<Utc>,
) -> String {
    let payload = format!(
        r#"<TripRequest>
        <Origin>
          <LocationRef>
            {origin}
          </LocationRef>
        </Origin>
        <Destination>
          <LocationRef>
            {destination}
          </LocationRef>
        </Destination>
        <DepArrTime>{departure}</DepArrTime>
        <Params>
          <NumberOfResults>{max_results}</NumberOfResults>
          <IncludeRealtimeData>{realtime}</IncludeRealtimeData>
          <IncludeTrackSections>false</IncludeTrackSections>
        </Params>
      </TripRequest>"#,
        origin = place_ref_block(origin),
        destination = place_ref_block(destination),
        departure = iso_z(departure),
        realtime = include_realtime,
    );
    envelope(requestor_ref, &payload, now)
}
