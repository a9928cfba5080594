//! Parcel positions from polygon geometry.
//!
//! The centroid is the plain mean of every vertex in every ring. It is not
//! area-weighted and closing vertices are counted twice; downstream cell
//! assignments depend on reproducing exactly this value.

use serde_json::Value;

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

/// Mean of `(x, y)` points as `(lat, lng)`, rounded to 6 decimals.
fn mean_position(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    Some((round6(sum_y / n), round6(sum_x / n)))
}

fn point(value: &Value) -> Option<(f64, f64)> {
    let coords = value.as_array()?;
    Some((coords.first()?.as_f64()?, coords.get(1)?.as_f64()?))
}

/// Vertices of a list of rings: `[[[x, y], ...], ...]`.
fn ring_points(rings: &Value, out: &mut Vec<(f64, f64)>) {
    for ring in rings.as_array().into_iter().flatten() {
        out.extend(ring.as_array().into_iter().flatten().filter_map(point));
    }
}

/// Centroid of Esri JSON `rings`.
pub fn centroid_from_rings(rings: &Value) -> Option<(f64, f64)> {
    let mut points = Vec::new();
    ring_points(rings, &mut points);
    mean_position(&points)
}

/// Centroid of a GeoJSON geometry. Points pass through unrounded; other
/// geometry types have no position.
pub fn centroid_from_geojson(geometry: &Value) -> Option<(f64, f64)> {
    let coords = geometry.get("coordinates")?;
    let mut points = Vec::new();
    match geometry.get("type").and_then(Value::as_str)? {
        "Point" => return point(coords).map(|(x, y)| (y, x)),
        "Polygon" => ring_points(coords, &mut points),
        "MultiPolygon" => {
            for polygon in coords.as_array().into_iter().flatten() {
                ring_points(polygon, &mut points);
            }
        }
        _ => return None,
    }
    mean_position(&points)
}
