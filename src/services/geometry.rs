// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Track geometry: parsing GPX/FIT tracks into GeoJSON and the transforms
//! applied before routes are stored or rendered.
//!
//! Coordinates are `[longitude, latitude, ...]` in degrees, as in GeoJSON.
//! Positions may carry extra dimensions (elevation); transforms keep them.

use geo::{Coord, Distance, HaversineMeasure, Point};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Position, Value};
use std::collections::HashSet;
use std::io::Cursor;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// FIT semicircle to degree factor (180 / 2^31).
const SEMICIRCLE_TO_DEGREES: f64 = 180.0 / 2_147_483_648.0;

/// Supported track encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFormat {
    Gpx,
    Fit,
}

impl TrackFormat {
    /// Detect the format from a file name, looking through a `.gz` suffix.
    pub fn from_path(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let lower = lower.strip_suffix(".gz").unwrap_or(&lower);
        if lower.ends_with(".gpx") {
            Some(TrackFormat::Gpx)
        } else if lower.ends_with(".fit") {
            Some(TrackFormat::Fit)
        } else {
            None
        }
    }
}

/// Errors from track parsing.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("Failed to parse GPX: {0}")]
    Gpx(String),

    #[error("Failed to parse FIT: {0}")]
    Fit(String),

    #[error("Unsupported track format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to encode polyline: {0}")]
    Polyline(String),
}

// ─── Parsing ─────────────────────────────────────────────────

/// Parse a track file into a feature collection.
pub fn parse_track(bytes: &[u8], format: TrackFormat) -> Result<FeatureCollection, GeometryError> {
    match format {
        TrackFormat::Gpx => parse_gpx(bytes),
        TrackFormat::Fit => parse_fit(bytes),
    }
}

fn feature(value: Value, name: Option<&str>) -> Feature {
    let properties = name.map(|n| {
        let mut props = JsonObject::new();
        props.insert("name".to_string(), serde_json::Value::from(n));
        props
    });
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties,
        foreign_members: None,
    }
}

/// Wrap features in a collection.
pub fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn gpx_position(point: &gpx::Waypoint) -> Position {
    let p = point.point();
    match point.elevation {
        Some(ele) => vec![p.x(), p.y(), ele],
        None => vec![p.x(), p.y()],
    }
}

/// GPX to GeoJSON: one feature per track (LineString, or MultiLineString
/// when it has several segments), one per route, one Point per waypoint.
fn parse_gpx(bytes: &[u8]) -> Result<FeatureCollection, GeometryError> {
    let gpx = gpx::read(Cursor::new(bytes)).map_err(|e| GeometryError::Gpx(e.to_string()))?;
    let mut features = Vec::new();

    for track in &gpx.tracks {
        let mut lines: Vec<Vec<Position>> = track
            .segments
            .iter()
            .map(|seg| seg.points.iter().map(gpx_position).collect::<Vec<_>>())
            .filter(|line: &Vec<Position>| !line.is_empty())
            .collect();

        let value = match lines.len() {
            0 => continue,
            1 => Value::LineString(lines.remove(0)),
            _ => Value::MultiLineString(lines),
        };
        features.push(feature(value, track.name.as_deref()));
    }

    for route in &gpx.routes {
        let line: Vec<Position> = route.points.iter().map(gpx_position).collect();
        if !line.is_empty() {
            features.push(feature(Value::LineString(line), route.name.as_deref()));
        }
    }

    for waypoint in &gpx.waypoints {
        features.push(feature(
            Value::Point(gpx_position(waypoint)),
            waypoint.name.as_deref(),
        ));
    }

    Ok(collection(features))
}

fn fit_value_to_f64(value: &fitparser::Value) -> Option<f64> {
    match value {
        fitparser::Value::Float32(v) => Some(*v as f64),
        fitparser::Value::Float64(v) => Some(*v),
        fitparser::Value::SInt8(v) => Some(*v as f64),
        fitparser::Value::SInt16(v) => Some(*v as f64),
        fitparser::Value::SInt32(v) => Some(*v as f64),
        fitparser::Value::SInt64(v) => Some(*v as f64),
        fitparser::Value::UInt8(v) => Some(*v as f64),
        fitparser::Value::UInt16(v) => Some(*v as f64),
        fitparser::Value::UInt32(v) => Some(*v as f64),
        fitparser::Value::UInt64(v) => Some(*v as f64),
        _ => None,
    }
}

/// FIT to a single LineString built from every `record` message.
///
/// The decoder yields a flat message stream, so records belonging to
/// sessions or laps are already part of it, in file order.
fn parse_fit(bytes: &[u8]) -> Result<FeatureCollection, GeometryError> {
    use fitparser::profile::MesgNum;

    let messages = fitparser::de::from_bytes(bytes).map_err(|e| GeometryError::Fit(e.to_string()))?;
    let mut line = Vec::new();

    for message in messages.iter().filter(|m| m.kind() == MesgNum::Record) {
        let mut lat = None;
        let mut lon = None;
        for field in message.fields() {
            match field.name() {
                "position_lat" => lat = fit_value_to_f64(field.value()),
                "position_long" => lon = fit_value_to_f64(field.value()),
                _ => {}
            }
        }

        let lat = lat.and_then(|v| normalize_coordinate(v, true));
        let lon = lon.and_then(|v| normalize_coordinate(v, false));
        if let (Some(lat), Some(lon)) = (lat, lon) {
            line.push(vec![lon, lat]);
        }
    }

    Ok(collection(vec![feature(Value::LineString(line), None)]))
}

/// Bring a raw latitude/longitude into degrees.
///
/// Values already in range are returned as is. Larger magnitudes are read
/// as FIT semicircles; if that still does not fit, the point is dropped.
pub fn normalize_coordinate(value: f64, is_latitude: bool) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    let limit = if is_latitude { 90.0 } else { 180.0 };
    if value.abs() <= limit {
        return Some(value);
    }
    let degrees = value * SEMICIRCLE_TO_DEGREES;
    (degrees.abs() <= limit).then_some(degrees)
}

// ─── Distances ───────────────────────────────────────────────

fn coord(p: &Position) -> Coord<f64> {
    Coord { x: p[0], y: p[1] }
}

fn haversine(a: Coord<f64>, b: Coord<f64>, radius: f64) -> f64 {
    HaversineMeasure::new(radius).distance(Point::from(a), Point::from(b))
}

/// Great-circle distance in meters.
pub fn haversine_m(a: Coord<f64>, b: Coord<f64>) -> f64 {
    haversine(a, b, EARTH_RADIUS_M)
}

/// Great-circle distance in kilometers.
pub fn haversine_km(a: Coord<f64>, b: Coord<f64>) -> f64 {
    haversine(a, b, EARTH_RADIUS_KM)
}

/// Distance from `p` to the infinite line through `a` and `b`, in
/// coordinate units. Falls back to point distance when `a == b`.
///
/// Unlike `geo::Simplify`, which measures to the segment, a point beyond
/// either endpoint is measured to the extended chord.
fn perpendicular_distance(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let d = b - a;
    let len = d.x.hypot(d.y);
    if len == 0.0 {
        return (p.x - a.x).hypot(p.y - a.y);
    }
    (d.y * p.x - d.x * p.y + b.x * a.y - b.y * a.x).abs() / len
}

// ─── Transforms ──────────────────────────────────────────────

/// Apply `f` to every line and ring of a geometry value.
fn map_lines(value: &mut Value, f: &mut impl FnMut(&[Position]) -> Vec<Position>) {
    match value {
        Value::LineString(line) => *line = f(line),
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            for line in lines.iter_mut() {
                *line = f(line);
            }
        }
        Value::MultiPolygon(polygons) => {
            for ring in polygons.iter_mut().flatten() {
                *ring = f(ring);
            }
        }
        Value::GeometryCollection(geometries) => {
            for geometry in geometries.iter_mut() {
                map_lines(&mut geometry.value, f);
            }
        }
        Value::Point(_) | Value::MultiPoint(_) => {}
    }
}

fn map_collection(
    input: &FeatureCollection,
    mut f: impl FnMut(&[Position]) -> Vec<Position>,
) -> FeatureCollection {
    let mut output = input.clone();
    for feature in &mut output.features {
        if let Some(geometry) = feature.geometry.as_mut() {
            map_lines(&mut geometry.value, &mut f);
        }
    }
    output
}

/// Douglas-Peucker on one line.
pub fn douglas_peucker(points: &[Position], tolerance: f64) -> Vec<Position> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let first = coord(&points[0]);
    let last = coord(&points[points.len() - 1]);

    let (index, max_distance) = points[1..points.len() - 1]
        .iter()
        .enumerate()
        .map(|(i, p)| (i + 1, perpendicular_distance(coord(p), first, last)))
        .fold((0, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });

    if max_distance > tolerance {
        let mut left = douglas_peucker(&points[..=index], tolerance);
        let right = douglas_peucker(&points[index..], tolerance);
        left.pop();
        left.extend(right);
        left
    } else {
        vec![points[0].clone(), points[points.len() - 1].clone()]
    }
}

/// Simplify every line and ring with Douglas-Peucker.
pub fn simplify(input: &FeatureCollection, tolerance: f64) -> FeatureCollection {
    map_collection(input, |line| douglas_peucker(line, tolerance))
}

/// Drop isolated points from one line: those whose nearest neighbour in
/// the line is farther than `threshold_km`.
pub fn remove_outliers(points: &[Position], threshold_km: f64) -> Vec<Position> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let coords: Vec<Coord<f64>> = points.iter().map(coord).collect();

    let is_isolated = |i: usize| {
        // Adjacent points are the likely close ones; check them first
        let near = [i.checked_sub(1), Some(i + 1)];
        let adjacent_close = near
            .into_iter()
            .flatten()
            .filter(|&j| j < coords.len())
            .any(|j| haversine_km(coords[i], coords[j]) <= threshold_km);
        if adjacent_close {
            return false;
        }
        !coords
            .iter()
            .enumerate()
            .any(|(j, c)| j != i && haversine_km(coords[i], *c) <= threshold_km)
    };

    points
        .iter()
        .enumerate()
        .filter(|(i, _)| !is_isolated(*i))
        .map(|(_, p)| p.clone())
        .collect()
}

/// Remove GPS glitches from every line and ring.
pub fn clean(input: &FeatureCollection, threshold_km: f64) -> FeatureCollection {
    map_collection(input, |line| remove_outliers(line, threshold_km))
}

/// Replace each point by the mean of a centered window of neighbours,
/// clipped at the ends of the line.
pub fn smooth_line(points: &[Position], window: usize) -> Vec<Position> {
    if window <= 1 || points.len() < 3 {
        return points.to_vec();
    }
    let before = (window - 1) / 2;
    let after = window - 1 - before;

    (0..points.len())
        .map(|i| {
            let start = i.saturating_sub(before);
            let end = (i + after).min(points.len() - 1);
            let span = &points[start..=end];
            let n = span.len() as f64;
            let (sx, sy) = span
                .iter()
                .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));

            let mut smoothed = points[i].clone();
            smoothed[0] = sx / n;
            smoothed[1] = sy / n;
            smoothed
        })
        .collect()
}

/// Smooth every line and ring.
pub fn smooth(input: &FeatureCollection, window: usize) -> FeatureCollection {
    map_collection(input, |line| smooth_line(line, window))
}

// ─── Point extraction ────────────────────────────────────────

/// Insertion-ordered set of `[lon, lat]` pairs.
#[derive(Debug, Default, Clone)]
pub struct PointSet {
    seen: HashSet<(u64, u64)>,
    points: Vec<[f64; 2]>,
}

impl PointSet {
    pub fn insert(&mut self, p: &Position) -> bool {
        if p.len() < 2 || !p[0].is_finite() || !p[1].is_finite() {
            return false;
        }
        // +0.0 and -0.0 are the same point
        let (x, y) = (p[0] + 0.0, p[1] + 0.0);
        if self.seen.insert((x.to_bits(), y.to_bits())) {
            self.points.push([x, y]);
            true
        } else {
            false
        }
    }

    /// Add every point of a collection. Unsupported geometry types are
    /// skipped with a warning.
    pub fn extend_from(&mut self, input: &FeatureCollection) {
        for geometry in input.features.iter().filter_map(|f| f.geometry.as_ref()) {
            match &geometry.value {
                Value::Point(p) => {
                    self.insert(p);
                }
                Value::MultiPoint(ps) | Value::LineString(ps) => {
                    ps.iter().for_each(|p| {
                        self.insert(p);
                    });
                }
                Value::MultiLineString(lines) | Value::Polygon(lines) => {
                    lines.iter().flatten().for_each(|p| {
                        self.insert(p);
                    });
                }
                Value::MultiPolygon(polygons) => {
                    polygons.iter().flatten().flatten().for_each(|p| {
                        self.insert(p);
                    });
                }
                Value::GeometryCollection(_) => {
                    tracing::warn!("Skipping unsupported geometry type GeometryCollection");
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_points(self) -> Vec<[f64; 2]> {
        self.points
    }
}

/// Deduplicated `[lon, lat]` pairs of a collection, in first-seen order.
pub fn extract_points(input: &FeatureCollection) -> Vec<[f64; 2]> {
    let mut set = PointSet::default();
    set.extend_from(input);
    set.into_points()
}

/// All lines of a collection, for renderers and encoders.
pub fn lines(input: &FeatureCollection) -> Vec<Vec<Coord<f64>>> {
    let mut out = Vec::new();
    for geometry in input.features.iter().filter_map(|f| f.geometry.as_ref()) {
        collect_lines(&geometry.value, &mut out);
    }
    out
}

fn collect_lines(value: &Value, out: &mut Vec<Vec<Coord<f64>>>) {
    let to_coords = |line: &Vec<Position>| line.iter().map(coord).collect::<Vec<_>>();
    match value {
        Value::LineString(line) => out.push(to_coords(line)),
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            out.extend(lines.iter().map(to_coords))
        }
        Value::MultiPolygon(polygons) => out.extend(polygons.iter().flatten().map(to_coords)),
        Value::GeometryCollection(geometries) => {
            for geometry in geometries {
                collect_lines(&geometry.value, out);
            }
        }
        Value::Point(_) | Value::MultiPoint(_) => {}
    }
}

/// Encode the collection's lines, joined end to end, as a precision-5 polyline.
pub fn encode_polyline(input: &FeatureCollection) -> Result<String, GeometryError> {
    let coords: Vec<Coord<f64>> = lines(input).into_iter().flatten().collect();
    polyline::encode_coordinates(coords, 5).map_err(|e| GeometryError::Polyline(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(coords: &[(f64, f64)]) -> Vec<Position> {
        coords.iter().map(|(x, y)| vec![*x, *y]).collect()
    }

    fn line_collection(coords: &[(f64, f64)]) -> FeatureCollection {
        collection(vec![feature(Value::LineString(line(coords)), None)])
    }

    fn first_line(fc: &FeatureCollection) -> Vec<Position> {
        match &fc.features[0].geometry.as_ref().unwrap().value {
            Value::LineString(l) => l.clone(),
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn normalize_passes_degrees_through() {
        assert_eq!(normalize_coordinate(37.42, true), Some(37.42));
        assert_eq!(normalize_coordinate(-122.08, false), Some(-122.08));
        assert_eq!(normalize_coordinate(90.0, true), Some(90.0));
    }

    #[test]
    fn normalize_converts_semicircles() {
        let semis = 37.42 * 2_147_483_648.0 / 180.0;
        let deg = normalize_coordinate(semis, true).unwrap();
        assert!((deg - 37.42).abs() < 1e-9);

        let semis = -122.08 * 2_147_483_648.0 / 180.0;
        let deg = normalize_coordinate(semis, false).unwrap();
        assert!((deg + 122.08).abs() < 1e-9);
    }

    #[test]
    fn normalize_drops_impossible_values() {
        assert_eq!(normalize_coordinate(f64::NAN, true), None);
        assert_eq!(normalize_coordinate(f64::INFINITY, false), None);
        // Out of range even as semicircles
        assert_eq!(normalize_coordinate(3.0e9, true), None);
    }

    #[test]
    fn haversine_known_distance() {
        let london = Coord { x: -0.1278, y: 51.5074 };
        let paris = Coord { x: 2.3522, y: 48.8566 };
        let km = haversine_km(london, paris);
        assert!((km - 343.5).abs() < 1.0, "got {}", km);
        assert!((haversine_m(london, paris) / 1000.0 - km).abs() < 1e-6);
    }

    #[test]
    fn dp_keeps_two_point_lines() {
        let l = line(&[(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(douglas_peucker(&l, 10.0), l);
        assert_eq!(douglas_peucker(&l[..1], 10.0), l[..1].to_vec());
    }

    #[test]
    fn dp_collapses_near_straight_line() {
        let l = line(&[(0.0, 0.0), (1.0, 0.01), (2.0, -0.01), (3.0, 0.0)]);
        assert_eq!(douglas_peucker(&l, 0.1), line(&[(0.0, 0.0), (3.0, 0.0)]));
    }

    #[test]
    fn dp_keeps_corner() {
        let l = line(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 1.0), (2.0, 2.0)]);
        assert_eq!(
            douglas_peucker(&l, 0.1),
            line(&[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0)])
        );
    }

    #[test]
    fn dp_measures_to_extended_chord() {
        // The middle point overshoots the end but sits close to the chord line
        let input = line(&[(0.0, 0.0), (2.0, 0.05), (1.0, 0.0)]);
        assert_eq!(douglas_peucker(&input, 0.1), line(&[(0.0, 0.0), (1.0, 0.0)]));
        assert_eq!(douglas_peucker(&input, 0.01), input);
    }

    #[test]
    fn simplify_is_idempotent() {
        let coords: Vec<(f64, f64)> = (0..200)
            .map(|i| {
                let t = i as f64 * 0.05;
                (t, (t * 3.0).sin() * 0.3 + (t * 0.7).cos() * 0.1)
            })
            .collect();
        let fc = line_collection(&coords);
        for tolerance in [0.0, 0.001, 0.01, 0.1] {
            let once = simplify(&fc, tolerance);
            let twice = simplify(&once, tolerance);
            assert_eq!(once, twice, "tolerance {}", tolerance);
        }
    }

    #[test]
    fn simplify_keeps_extra_dimensions() {
        let l = vec![vec![0.0, 0.0, 10.0], vec![1.0, 0.0, 11.0], vec![2.0, 0.0, 12.0]];
        let out = douglas_peucker(&l, 0.1);
        assert_eq!(out, vec![vec![0.0, 0.0, 10.0], vec![2.0, 0.0, 12.0]]);
    }

    #[test]
    fn clean_drops_teleport() {
        let fc = line_collection(&[
            (-122.0, 37.0),
            (-122.001, 37.001),
            (10.0, 50.0), // GPS glitch across the world
            (-122.002, 37.002),
        ]);
        let cleaned = first_line(&clean(&fc, 80.0));
        assert_eq!(cleaned.len(), 3);
        assert!(cleaned.iter().all(|p| p[0] < -121.0));
    }

    #[test]
    fn clean_keeps_short_lines() {
        let fc = line_collection(&[(-122.0, 37.0), (10.0, 50.0)]);
        assert_eq!(first_line(&clean(&fc, 80.0)).len(), 2);
    }

    #[test]
    fn smooth_averages_centered_window() {
        let fc = line_collection(&[(0.0, 0.0), (3.0, 3.0), (0.0, 0.0), (3.0, 3.0)]);
        let out = first_line(&smooth(&fc, 3));
        assert_eq!(out[0], vec![1.5, 1.5]);
        assert_eq!(out[1], vec![1.0, 1.0]);
        assert_eq!(out[2], vec![2.0, 2.0]);
        assert_eq!(out[3], vec![1.5, 1.5]);
    }

    #[test]
    fn smooth_window_one_is_identity() {
        let fc = line_collection(&[(0.0, 0.0), (3.0, 3.0), (0.0, 1.0)]);
        assert_eq!(smooth(&fc, 1), fc);
    }

    #[test]
    fn extract_points_dedupes_across_geometries() {
        let fc = collection(vec![
            feature(Value::LineString(line(&[(1.0, 2.0), (3.0, 4.0)])), None),
            feature(Value::Point(vec![1.0, 2.0]), None),
            feature(
                Value::Polygon(vec![line(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (0.0, 0.0)])]),
                None,
            ),
            feature(Value::GeometryCollection(vec![]), None),
        ]);
        let points = extract_points(&fc);
        assert_eq!(
            points,
            vec![[1.0, 2.0], [3.0, 4.0], [0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]
        );
    }

    #[test]
    fn gpx_tracks_become_lines() {
        let gpx = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <wpt lat="37.5" lon="-122.5"><name>Start</name></wpt>
  <trk>
    <name>Morning Ride</name>
    <trkseg>
      <trkpt lat="37.0" lon="-122.0"><ele>10</ele></trkpt>
      <trkpt lat="37.1" lon="-122.1"><ele>12</ele></trkpt>
    </trkseg>
  </trk>
</gpx>"#;
        let fc = parse_track(gpx.as_bytes(), TrackFormat::Gpx).unwrap();
        assert_eq!(fc.features.len(), 2);
        assert_eq!(
            first_line(&fc),
            vec![vec![-122.0, 37.0, 10.0], vec![-122.1, 37.1, 12.0]]
        );
        assert_eq!(
            fc.features[0].property("name").and_then(|v| v.as_str()),
            Some("Morning Ride")
        );
    }

    #[test]
    fn garbage_fit_is_an_error() {
        assert!(matches!(
            parse_track(b"definitely not fit", TrackFormat::Fit),
            Err(GeometryError::Fit(_))
        ));
    }

    #[test]
    fn format_detection() {
        assert_eq!(TrackFormat::from_path("a.GPX"), Some(TrackFormat::Gpx));
        assert_eq!(TrackFormat::from_path("a.fit.gz"), Some(TrackFormat::Fit));
        assert_eq!(TrackFormat::from_path("a.tcx"), None);
    }

    #[test]
    fn polyline_round_trip() {
        let fc = line_collection(&[(-120.2, 38.5), (-120.95, 40.7), (-126.453, 43.252)]);
        let encoded = encode_polyline(&fc).unwrap();
        assert_eq!(encoded, "_p~iF~ps|U_ulLnnqC_mqNvxq`@");
    }
}
