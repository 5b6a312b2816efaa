//! Approximate geodesic length and area for WGS84 geometries.
//!
//! Length uses a mean-radius sphere with latitudes adjusted for the earth's
//! flattening. Area uses the spherical-excess approximation of Chamberlain &
//! Duquette, "Some Algorithms for Polygons on a Sphere" (JPL 07-03), with a
//! latitude-dependent flattening correction. For typical map features the
//! relative error of either is below 0.1%.

use geo::{BoundingRect, Geometry, LineString, Polygon};

const EARTH_RADIUS_MEAN: f64 = 6_371_000.0;
const EARTH_RADIUS_EQUATOR: f64 = 6_378_137.0;
const EARTH_INVERSE_FLATTENING: f64 = 298.257_223_563;

/// Complement of the WGS84 flattening, `1 - 1/f`.
fn flattening_complement() -> f64 {
    1.0 - 1.0 / EARTH_INVERSE_FLATTENING
}

/// Approximate geodesic length of a geometry in meters.
///
/// Zero for non-linear geometries such as points or polygons.
pub fn length_of(geometry: &Geometry<f64>) -> f64 {
    match geometry {
        Geometry::LineString(line) => line_length(line),
        Geometry::MultiLineString(lines) => lines.0.iter().map(line_length).sum(),
        _ => 0.0,
    }
}

fn line_length(line: &LineString<f64>) -> f64 {
    let coords = &line.0;
    if coords.len() < 2 {
        return 0.0;
    }
    // wgs84 latitudes are not spherical latitudes
    let sphere_fact = flattening_complement().powf(1.5);
    let mut dist = 0.0;
    let mut prev_lon = coords[0].x.to_radians();
    let mut prev_lat = (sphere_fact * coords[0].y.to_radians().tan()).atan();
    for c in &coords[1..] {
        let lon = c.x.to_radians();
        let lat = (sphere_fact * c.y.to_radians().tan()).atan();
        let mut delta_lon = lon - prev_lon;
        let delta_lat = lat - prev_lat;
        delta_lon *= ((lat + prev_lat) / 2.0).cos();
        dist += (delta_lon * delta_lon + delta_lat * delta_lat).sqrt();
        prev_lon = lon;
        prev_lat = lat;
    }
    dist * EARTH_RADIUS_MEAN
}

/// Approximate geodesic area of a geometry in square meters.
///
/// Zero for non-areal geometries. Never negative: a polygon whose holes
/// outmeasure its shell yields zero.
pub fn area_of(geometry: &Geometry<f64>) -> f64 {
    match geometry {
        Geometry::Polygon(polygon) => polygon_area(polygon),
        Geometry::MultiPolygon(mp) => mp.0.iter().map(polygon_area).sum(),
        _ => 0.0,
    }
}

fn polygon_area(polygon: &Polygon<f64>) -> f64 {
    let mut area = ring_area(polygon.exterior()).abs();
    for ring in polygon.interiors() {
        area -= ring_area(ring).abs();
    }
    area.max(0.0)
}

/// Signed spherical-excess area of one closed ring.
fn ring_area(ring: &LineString<f64>) -> f64 {
    let coords = &ring.0;
    let n = coords.len();
    if n <= 2 {
        return 0.0;
    }
    let f = flattening_complement();
    let mut area = 0.0;
    for i in 0..n {
        let (lower, middle, upper) = if i == n - 2 {
            (n - 2, n - 1, 0)
        } else if i == n - 1 {
            (n - 1, 0, 1)
        } else {
            (i, i + 1, i + 2)
        };
        let p1 = coords[lower];
        let p2 = coords[middle];
        let p3 = coords[upper];
        let x = f * p2.y.to_radians().tan();
        let sin_lat = x / (x * x + 1.0).sqrt();
        area += (p3.x - p1.x).to_radians() * sin_lat;
    }
    let mid_lat = ring
        .bounding_rect()
        .map_or(0.0, |r| (r.min().y + r.max().y) / 2.0);
    area * 0.5
        * EARTH_RADIUS_EQUATOR
        * EARTH_RADIUS_EQUATOR
        * (1.0 - (1.0 / EARTH_INVERSE_FLATTENING) * mid_lat.to_radians().cos().powi(2))
}
