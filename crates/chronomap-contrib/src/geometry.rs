//! Geometry derivation for contributions.
//!
//! Every contribution can be turned into a geometry: points become points,
//! chains become lines or polygons, groups become multipolygons (via ring
//! assembly) or geometry collections. Derived geometries are memoized on the
//! contribution under the [`GEOMETRY`] key, so a member shared by many
//! parents is computed once.
//!
//! Degradation over failure: malformed coordinates, unresolved members and
//! ring-assembly errors all yield empty geometry, never an error. `None`
//! means "no geometry at all"; empty containers (an empty multipolygon after
//! a failed assembly) count as empty too.

use std::rc::Rc;

use chronomap_geometry::{AssemblyMode, assemble_multipolygon};
use chronomap_types::ObjectKind;
use geo::{
    Coord, CoordsIter, Geometry, GeometryCollection, LineString, MultiPolygon, Point, Polygon,
    Validation,
};

use crate::contribution::{Contribution, ResolvedMember};
use crate::features::AreaTable;

/// Derived-data key under which geometries are memoized.
pub const GEOMETRY: &str = "geometry";

/// Groups with more declared members than this never get ring assembly and
/// derive as plain collections instead.
const MEMBER_LIMIT: usize = 500;

/// Derive (and memoize) the geometry of a contribution.
pub fn geometry(contribution: &Contribution) -> Rc<Option<Geometry<f64>>> {
    contribution.derived(GEOMETRY, derive)
}

fn derive(contribution: &Contribution) -> Option<Geometry<f64>> {
    match contribution.entity.kind() {
        ObjectKind::Point => point_geometry(contribution),
        ObjectKind::Chain => chain_geometry(contribution),
        ObjectKind::Group => group_geometry(contribution),
    }
}

fn point_geometry(c: &Contribution) -> Option<Geometry<f64>> {
    let (lon, lat) = c.entity.coordinate()?;
    if !c.visible() || out_of_range(lon, lat) {
        return None;
    }
    Some(Point::new(lon, lat).into())
}

fn out_of_range(lon: f64, lat: f64) -> bool {
    !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat)
}

fn chain_geometry(c: &Contribution) -> Option<Geometry<f64>> {
    let coords: Vec<Coord<f64>> = c
        .members
        .iter()
        .filter_map(|m| m.contrib.as_deref())
        .filter(|member| member.visible())
        .filter_map(|member| member.entity.coordinate())
        .filter(|&(lon, lat)| !out_of_range(lon, lat))
        .map(|(lon, lat)| Coord { x: lon, y: lat })
        .collect();

    if is_area(c) && is_closed_ring(&coords) {
        return Some(Polygon::new(LineString::from(coords), Vec::new()).into());
    }
    match coords.len() {
        0 => None,
        1 => Some(Point::from(coords[0]).into()),
        _ => Some(LineString::from(coords).into()),
    }
}

/// A valid polygon ring: at least four coordinates and closed.
fn is_closed_ring(coords: &[Coord<f64>]) -> bool {
    coords.len() >= 4 && coords[0] == coords[coords.len() - 1]
}

/// Whether a chain contribution is an area: closed by reference (first
/// member id equals last), not explicitly `area=no`, and at least one tag
/// pair matching the classification table.
pub fn is_area(c: &Contribution) -> bool {
    if c.entity.tag("area").is_some_and(|v| v.eq_ignore_ascii_case("no")) {
        return false;
    }
    let members = &c.members;
    members.len() > 2
        && members.first().map(|m| m.id) == members.last().map(|m| m.id)
        && c.entity
            .tags
            .iter()
            .any(|(key, value)| AreaTable::builtin().matches(key, value))
}

/// Whether a group contribution is an area composite worth assembling.
pub fn is_area_group(c: &Contribution) -> bool {
    if c.entity.kind() != ObjectKind::Group || c.members.len() > MEMBER_LIMIT {
        return false;
    }
    c.entity
        .tag("type")
        .is_some_and(|t| t.eq_ignore_ascii_case("multipolygon") || t.eq_ignore_ascii_case("boundary"))
}

fn group_geometry(c: &Contribution) -> Option<Geometry<f64>> {
    if is_area_group(c) {
        Some(group_multipolygon(c).into())
    } else {
        Some(Geometry::GeometryCollection(group_collection(c)))
    }
}

/// Assemble an area composite from its chain members' geometries, degrading
/// to an empty multipolygon on any ring-construction failure.
fn group_multipolygon(c: &Contribution) -> MultiPolygon<f64> {
    let chains: Vec<&ResolvedMember> = c
        .members
        .iter()
        .filter(|m| m.kind == ObjectKind::Chain && m.contrib.is_some())
        .collect();
    let outer = boundary_coords(&chains, |role| role == "outer" || role.is_empty());
    let inner = boundary_coords(&chains, |role| role == "inner");

    match assemble_multipolygon(&outer, &inner, AssemblyMode::Strict) {
        Ok(mp) if mp.is_valid() => mp,
        Ok(_) => {
            tracing::debug!(group = c.entity.id.id, "assembled area geometry is invalid");
            MultiPolygon::new(Vec::new())
        }
        Err(err) => {
            tracing::debug!(group = c.entity.id.id, %err, "ring assembly failed");
            MultiPolygon::new(Vec::new())
        }
    }
}

fn boundary_coords(
    chains: &[&ResolvedMember],
    role_filter: impl Fn(&str) -> bool,
) -> Vec<Vec<Coord<f64>>> {
    chains
        .iter()
        .filter(|m| role_filter(&m.role))
        .filter_map(|m| m.contrib.as_deref())
        .map(|member| {
            geometry(member)
                .as_ref()
                .as_ref()
                .map(|g| g.coords_iter().collect())
                .unwrap_or_default()
        })
        .collect()
}

/// A plain (non-area) group: the collection of every resolved member's
/// geometry, empties dropped.
fn group_collection(c: &Contribution) -> GeometryCollection<f64> {
    let geometries: Vec<Geometry<f64>> = c
        .members
        .iter()
        .filter_map(|m| m.contrib.as_deref())
        .filter_map(|member| geometry(member).as_ref().clone())
        .filter(|g| !is_empty_geometry(g))
        .collect();
    GeometryCollection::from(geometries)
}

/// "No geometry" in the member-dropping sense: empty containers included.
pub fn is_empty_geometry(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::MultiPolygon(mp) => mp.0.is_empty(),
        Geometry::GeometryCollection(gc) => gc.0.is_empty(),
        Geometry::LineString(line) => line.0.is_empty(),
        Geometry::MultiLineString(lines) => lines.0.is_empty(),
        Geometry::MultiPoint(points) => points.0.is_empty(),
        _ => false,
    }
}
