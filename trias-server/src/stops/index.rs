//! In-memory geographic stop index.

use std::collections::HashMap;

use crate::domain::{GeoPoint, Stop, StopId};

/// A stop paired with its distance from a query point.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyStop {
    pub stop: Stop,
    pub distance_m: f64,
}

/// Index of stops keyed by identifier.
///
/// Nearest-neighbour queries are a linear scan over all entries. A
/// regional network holds a few thousand stops, well below the point
/// where a spatial structure would pay for its upkeep.
#[derive(Debug, Default)]
pub struct GeoIndex {
    stops: HashMap<StopId, Stop>,
}

impl GeoIndex {
    pub fn new() -> Self {
        Self {
            stops: HashMap::new(),
        }
    }

    /// Insert or replace a stop. The last write for an identifier wins.
    pub fn upsert(&mut self, stop: Stop) {
        self.stops.insert(stop.id.clone(), stop);
    }

    pub fn get(&self, id: &StopId) -> Option<&Stop> {
        self.stops.get(id)
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Stops within `radius_m` metres of `center`, closest first.
    ///
    /// At most `limit` entries are returned. Stops at equal distance
    /// are ordered by identifier, so the result is stable across calls
    /// and across rebuilds of the index.
    pub fn nearest_within(
        &self,
        center: &GeoPoint,
        radius_m: f64,
        limit: usize,
    ) -> Vec<NearbyStop> {
        let mut matches: Vec<NearbyStop> = self
            .stops
            .values()
            .filter_map(|stop| {
                let distance_m = center.distance_m(&stop.position);
                (distance_m <= radius_m).then(|| NearbyStop {
                    stop: stop.clone(),
                    distance_m,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then_with(|| a.stop.id.cmp(&b.stop.id))
        });
        matches.truncate(limit);
        matches
    }
}
