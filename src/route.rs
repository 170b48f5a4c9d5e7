//! Route derivation
//!
//! This module turns chronological route points into derived series:
//! - Speed between consecutive points (km/h)
//! - Altitude per point
//! - Merging of route chunks with a minimum sampling gap
//! - Distance and elevation gain summaries

use crate::types::{GeoPoint, SampleEntry, SampleSeries};
use chrono::Duration;

/// Mean Earth radius (meters)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Conversion factor from m/s to km/h
const MPS_TO_KMH: f64 = 3.6;

/// Series derived from one route
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedRoute {
    pub speed: SampleSeries,
    pub altitude: SampleSeries,
}

/// Derives speed and altitude series from route points
pub struct RouteDeriver;

impl RouteDeriver {
    /// Derive speed and altitude from a chronologically sorted route.
    ///
    /// Routes with fewer than two points yield empty series. Pairs whose
    /// timestamps do not advance are skipped rather than producing an
    /// infinite speed, so the speed series may be shorter than `len - 1`.
    pub fn derive(route: &[GeoPoint]) -> DerivedRoute {
        if route.len() < 2 {
            return DerivedRoute::default();
        }

        DerivedRoute {
            speed: derive_speed(route),
            altitude: derive_altitude(route),
        }
    }
}

fn derive_speed(route: &[GeoPoint]) -> SampleSeries {
    let entries = route
        .windows(2)
        .filter_map(|pair| {
            let (from, to) = (&pair[0], &pair[1]);
            let elapsed_secs = (to.timestamp - from.timestamp).num_milliseconds() as f64 / 1000.0;
            if elapsed_secs <= 0.0 {
                return None;
            }
            let meters = haversine_distance(from, to);
            Some(SampleEntry::new(from.timestamp, meters / elapsed_secs * MPS_TO_KMH))
        })
        .collect();

    SampleSeries::from_ordered(entries)
}

fn derive_altitude(route: &[GeoPoint]) -> SampleSeries {
    let entries = route
        .iter()
        .filter_map(|p| p.altitude.map(|alt| SampleEntry::new(p.timestamp, alt)))
        .collect();

    SampleSeries::from_ordered(entries)
}

/// Great-circle distance between two points (meters)
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Total path length of a route (meters)
pub fn total_distance(route: &[GeoPoint]) -> f64 {
    route.windows(2).map(|pair| haversine_distance(&pair[0], &pair[1])).sum()
}

/// Sum of positive altitude changes (meters)
pub fn altitude_gain(altitude: &SampleSeries) -> f64 {
    altitude
        .entries()
        .windows(2)
        .map(|pair| pair[1].value - pair[0].value)
        .filter(|delta| *delta > 0.0)
        .sum()
}

/// Join route chunks into one chronological route.
///
/// Points are sorted by timestamp, then a point is dropped when it lies
/// within `min_gap` of the previously accepted point.
pub fn merge_segments(segments: Vec<Vec<GeoPoint>>, min_gap: Duration) -> Vec<GeoPoint> {
    let mut points: Vec<GeoPoint> = segments.into_iter().flatten().collect();
    points.sort_by_key(|p| p.timestamp);

    let mut merged: Vec<GeoPoint> = Vec::with_capacity(points.len());
    for point in points {
        match merged.last() {
            Some(last) if point.timestamp - last.timestamp < min_gap => continue,
            Some(last) if point.timestamp == last.timestamp => continue,
            _ => merged.push(point),
        }
    }
    merged
}
