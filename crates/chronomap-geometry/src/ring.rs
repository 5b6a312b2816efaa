//! Multipolygon assembly from boundary fragments.

use std::cmp::Ordering;
use std::collections::HashSet;

use geo::orient::{Direction, Orient};
use geo::{Area, BooleanOps, Contains, Coord, Intersects, LineString, MultiPolygon, Polygon, Validation};

use crate::error::RingError;
use crate::graph::SegmentGraph;
use crate::segment::{CoordKey, EdgeKey, Segment, coord_key, edge_key, split_chains};

/// How strictly to treat repairable input defects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AssemblyMode {
    /// Reject mismatched parity and outer rings sharing a boundary segment.
    #[default]
    Strict,
    /// Drop one mismatched segment per offending chain, and merge outer
    /// rings that share a boundary segment.
    Permissive,
}

/// Assemble nested polygons from outer and inner boundary candidates.
///
/// Each input chain is one member's point sequence, not necessarily closed
/// and drawn in no particular direction. Roles are hints only: classification
/// into shells and holes is purely geometric (sorted by area, grouped by
/// containment), so a mistagged chain still lands where it belongs.
pub fn assemble_multipolygon(
    outer: &[Vec<Coord<f64>>],
    inner: &[Vec<Coord<f64>>],
    mode: AssemblyMode,
) -> Result<MultiPolygon<f64>, RingError> {
    let mut chains = Vec::with_capacity(outer.len() + inner.len());
    chains.extend_from_slice(outer);
    chains.extend_from_slice(inner);

    let rings = build_rings(&chains, mode)?;
    let candidates = candidate_polygons(rings)?;
    group_polygons(candidates, mode)
}

/// Segment splitting, parity repair, contraction, junction walk.
fn build_rings(
    chains: &[Vec<Coord<f64>>],
    mode: AssemblyMode,
) -> Result<Vec<Vec<Segment>>, RingError> {
    let mut graph = SegmentGraph::from_segments(split_chains(chains));
    graph.discard_redundant_duplicates();

    let mut rings = graph.contract();

    if !graph.parity_ok() {
        match mode {
            AssemblyMode::Strict => {
                return Err(RingError::SegmentParity(graph.odd_endpoints()));
            }
            AssemblyMode::Permissive => {
                if graph.remove_mismatched_segments() {
                    rings.extend(graph.contract());
                }
            }
        }
    }

    rings.extend(graph.walk()?);
    Ok(rings)
}

/// Stitch each ring's segments into a closed coordinate sequence and build a
/// candidate simple polygon. Any invalid candidate fails the whole assembly.
fn candidate_polygons(rings: Vec<Vec<Segment>>) -> Result<Vec<Polygon<f64>>, RingError> {
    let mut polygons = Vec::with_capacity(rings.len());
    for ring in rings {
        let mut coords = stitch(&ring);
        if coords.len() < 3 {
            return Err(RingError::InvalidRing);
        }
        coords.push(coords[0]);
        let polygon = Polygon::new(LineString::from(coords), Vec::new());
        if !polygon.is_valid() {
            return Err(RingError::InvalidRing);
        }
        polygons.push(polygon);
    }
    Ok(polygons)
}

/// Concatenate ring segments, dropping collinear backtracks (spurs) left by
/// overlapping fragments.
fn stitch(segments: &[Segment]) -> Vec<Coord<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::new();
    for segment in segments {
        coords.extend_from_slice(&segment.coords[..segment.coords.len() - 1]);
    }

    let mut changed = true;
    while changed && coords.len() >= 3 {
        changed = false;
        let n = coords.len();
        for i in 0..n {
            let a = coords[(i + n - 1) % n];
            let b = coords[i];
            let c = coords[(i + 1) % n];
            if b == a || is_backtrack(a, b, c) {
                coords.remove(i);
                changed = true;
                break;
            }
        }
    }
    coords
}

/// `b` is a spur vertex: the path reverses onto its own line at `b`.
fn is_backtrack(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> bool {
    let (abx, aby) = (b.x - a.x, b.y - a.y);
    let (bcx, bcy) = (c.x - b.x, c.y - b.y);
    abx * bcy - aby * bcx == 0.0 && abx * bcx + aby * bcy < 0.0
}

/// Classify candidates into shells and holes, resolve anomalies, and emit the
/// final multipolygon.
fn group_polygons(
    mut candidates: Vec<Polygon<f64>>,
    mode: AssemblyMode,
) -> Result<MultiPolygon<f64>, RingError> {
    loop {
        candidates.sort_by(|a, b| {
            b.unsigned_area()
                .partial_cmp(&a.unsigned_area())
                .unwrap_or(Ordering::Equal)
        });

        // Largest-first containment scan: a candidate inside the nearest
        // containing candidate is a hole of it, unless that container is
        // itself a hole, which makes the candidate a shell again (an island
        // inside a hole).
        let n = candidates.len();
        let mut is_inner = vec![false; n];
        let mut inner_of: Vec<Option<usize>> = vec![None; n];
        for i in 0..n {
            for j in (0..i).rev() {
                if candidates[j].contains(&candidates[i]) {
                    if !is_inner[j] {
                        is_inner[i] = true;
                        inner_of[i] = Some(j);
                    }
                    break;
                }
            }
        }
        let shells: Vec<usize> = (0..n).filter(|&i| !is_inner[i]).collect();

        // Outer-pair anomalies: shared vertices are pinch points and fine; a
        // shared boundary segment needs a merge; boundaries crossing or
        // touching away from any shared vertex are unresolvable.
        let mut merge_pair = None;
        'pairs: for (pos, &i) in shells.iter().enumerate() {
            for &j in &shells[pos + 1..] {
                match outer_pair_anomaly(&candidates[i], &candidates[j])? {
                    Anomaly::None => {}
                    Anomaly::SharedBoundary => match mode {
                        AssemblyMode::Strict => return Err(RingError::SharedOuterBoundary),
                        AssemblyMode::Permissive => {
                            merge_pair = Some((i, j));
                            break 'pairs;
                        }
                    },
                }
            }
        }

        if let Some((i, j)) = merge_pair {
            let union = candidates[i].union(&candidates[j]);
            // redo the grouping with the merged shell in place of the pair
            candidates.remove(j.max(i));
            candidates.remove(j.min(i));
            candidates.extend(union.0);
            continue;
        }

        let mut polygons = Vec::new();
        for &shell in &shells {
            let holes: Vec<Polygon<f64>> = (0..n)
                .filter(|&i| inner_of[i] == Some(shell))
                .map(|i| candidates[i].clone())
                .collect();
            polygons.extend(finalize_group(candidates[shell].clone(), holes));
        }
        return Ok(MultiPolygon::new(polygons));
    }
}

enum Anomaly {
    None,
    SharedBoundary,
}

/// Inspect how two shell candidates interact.
///
/// Disjoint boundaries are always fine, including one shell sitting inside
/// the other, which legitimately happens for an island inside a hole. Shells
/// meeting only at shared vertices are pinch points and accepted. A shared
/// boundary segment is reported for merging; anything else (crossing rings,
/// touching away from a common vertex) is a hard error.
fn outer_pair_anomaly(a: &Polygon<f64>, b: &Polygon<f64>) -> Result<Anomaly, RingError> {
    if !a.exterior().intersects(b.exterior()) {
        return Ok(Anomaly::None);
    }
    if shares_boundary_segment(a, b) {
        return Ok(Anomaly::SharedBoundary);
    }
    let vertices_a: HashSet<CoordKey> = a.exterior().0.iter().map(|&c| coord_key(c)).collect();
    if !b.exterior().0.iter().any(|&c| vertices_a.contains(&coord_key(c))) {
        // touching without a common node
        return Err(RingError::OverlappingOuterRings);
    }
    if !a.contains(b) && !b.contains(a) && interiors_overlap(a, b) {
        return Err(RingError::OverlappingOuterRings);
    }
    Ok(Anomaly::None)
}

/// Two polygons share at least one undirected exterior edge.
fn shares_boundary_segment(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    let edges_a: HashSet<EdgeKey> = exterior_edges(a).collect();
    exterior_edges(b).any(|e| edges_a.contains(&e))
}

fn exterior_edges(p: &Polygon<f64>) -> impl Iterator<Item = EdgeKey> + '_ {
    p.exterior()
        .0
        .windows(2)
        .map(|w| edge_key(coord_key(w[0]), coord_key(w[1])))
}

/// The interiors of two polygons overlap with positive area.
fn interiors_overlap(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    a.intersection(b).unsigned_area() > 0.0
}

/// A hole is cleanly contained when it sits inside the shell without touching
/// or crossing the shell's boundary.
fn cleanly_contained(shell: &Polygon<f64>, hole: &Polygon<f64>) -> bool {
    shell.contains(hole) && !shell.exterior().intersects(hole.exterior())
}

/// Turn one shell and its hole candidates into finished polygons.
///
/// Holes that share a boundary segment or overlap are unioned first. A hole
/// that touches or crosses the shell boundary is subtracted from the shell;
/// the remaining holes are re-partitioned among the resulting fragments by
/// containment and the process repeats.
fn finalize_group(shell: Polygon<f64>, mut holes: Vec<Polygon<f64>>) -> Vec<Polygon<f64>> {
    let mut merged = true;
    while merged {
        merged = false;
        'pairs: for i in 0..holes.len() {
            for j in i + 1..holes.len() {
                if shares_boundary_segment(&holes[i], &holes[j])
                    || interiors_overlap(&holes[i], &holes[j])
                {
                    let union = holes[i].union(&holes[j]);
                    holes.swap_remove(j);
                    holes.swap_remove(i);
                    holes.extend(union.0);
                    merged = true;
                    break 'pairs;
                }
            }
        }
    }

    let mut work = vec![(shell, holes)];
    let mut done = Vec::new();
    while let Some((shell, mut holes)) = work.pop() {
        match holes.iter().position(|h| !cleanly_contained(&shell, h)) {
            None => {
                let mut rings: Vec<LineString<f64>> = shell.interiors().to_vec();
                rings.extend(holes.into_iter().map(|h| h.exterior().clone()));
                let polygon = Polygon::new(shell.exterior().clone(), rings);
                // canonical winding: exterior counter-clockwise, holes clockwise
                done.push(polygon.orient(Direction::Default));
            }
            Some(ix) => {
                let hole = holes.remove(ix);
                let fragments = shell.difference(&hole);
                let mut buckets: Vec<Vec<Polygon<f64>>> = vec![Vec::new(); fragments.0.len()];
                for h in holes {
                    match fragments.0.iter().position(|f| f.contains(&h)) {
                        Some(fi) => buckets[fi].push(h),
                        None => {
                            tracing::debug!("dropping hole contained by no fragment after subtraction");
                        }
                    }
                }
                for (fragment, bucket) in fragments.0.into_iter().zip(buckets) {
                    work.push((fragment, bucket));
                }
            }
        }
    }
    done
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Coord<f64>> {
        vec![
            coord! { x: x0, y: y0 },
            coord! { x: x0 + size, y: y0 },
            coord! { x: x0 + size, y: y0 + size },
            coord! { x: x0, y: y0 + size },
            coord! { x: x0, y: y0 },
        ]
    }

    fn assemble(
        outer: &[Vec<Coord<f64>>],
        inner: &[Vec<Coord<f64>>],
    ) -> Result<MultiPolygon<f64>, RingError> {
        assemble_multipolygon(outer, inner, AssemblyMode::Strict)
    }

    #[test]
    fn test_single_closed_ring() {
        let mp = assemble(&[square(0., 0., 4.)], &[]).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.unsigned_area(), 16.0);
        assert!(mp.0[0].interiors().is_empty());
    }

    #[test]
    fn test_split_ring_equals_unsplit_ring() {
        // the same square supplied as two open touching fragments
        let upper = vec![
            coord! { x: 0., y: 0. },
            coord! { x: 4., y: 0. },
            coord! { x: 4., y: 4. },
        ];
        let lower = vec![
            coord! { x: 4., y: 4. },
            coord! { x: 0., y: 4. },
            coord! { x: 0., y: 0. },
        ];
        let split = assemble(&[upper, lower], &[]).unwrap();
        let whole = assemble(&[square(0., 0., 4.)], &[]).unwrap();
        assert_eq!(split.0.len(), 1);
        assert_eq!(split.unsigned_area(), whole.unsigned_area());
        let split_pts: HashSet<EdgeKey> = exterior_edges(&split.0[0]).collect();
        let whole_pts: HashSet<EdgeKey> = exterior_edges(&whole.0[0]).collect();
        assert_eq!(split_pts, whole_pts);
    }

    #[test]
    fn test_fragment_direction_does_not_matter() {
        // second fragment drawn in the same rotational direction as seen
        // from its own start; assembly must reverse it
        let upper = vec![
            coord! { x: 0., y: 0. },
            coord! { x: 4., y: 0. },
            coord! { x: 4., y: 4. },
        ];
        let lower_reversed = vec![
            coord! { x: 0., y: 0. },
            coord! { x: 0., y: 4. },
            coord! { x: 4., y: 4. },
        ];
        let mp = assemble(&[upper, lower_reversed], &[]).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.unsigned_area(), 16.0);
    }

    #[test]
    fn test_hole_nesting() {
        let mp = assemble(&[square(0., 0., 10.)], &[square(2., 2., 2.)]).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert_eq!(mp.unsigned_area(), 100.0 - 4.0);
    }

    #[test]
    fn test_island_inside_hole_is_a_shell() {
        let mp = assemble(
            &[square(0., 0., 10.), square(4., 4., 1.)],
            &[square(2., 2., 6.)],
        )
        .unwrap();
        assert_eq!(mp.0.len(), 2);
        let areas: Vec<f64> = mp.0.iter().map(Area::unsigned_area).collect();
        assert!(areas.contains(&1.0));
        assert_eq!(mp.unsigned_area(), (100.0 - 36.0) + 1.0);
    }

    #[test]
    fn test_roles_are_hints_only() {
        // hole supplied in the outer list still classifies as a hole
        let mp = assemble(&[square(0., 0., 10.), square(2., 2., 2.)], &[]).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
    }

    #[test]
    fn test_two_disjoint_shells() {
        let mp = assemble(&[square(0., 0., 2.), square(5., 5., 3.)], &[]).unwrap();
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.unsigned_area(), 4.0 + 9.0);
    }

    #[test]
    fn test_duplicate_chain_is_discarded() {
        let mp = assemble(&[square(0., 0., 4.), square(0., 0., 4.)], &[]).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.unsigned_area(), 16.0);
    }

    #[test]
    fn test_open_boundary_is_a_parity_error() {
        let open = vec![
            coord! { x: 0., y: 0. },
            coord! { x: 4., y: 0. },
            coord! { x: 4., y: 4. },
        ];
        assert_eq!(
            assemble(&[open], &[]).unwrap_err(),
            RingError::SegmentParity(2)
        );
    }

    #[test]
    fn test_permissive_drops_mismatched_chain_segment() {
        // a closed square plus a stray spur from a second chain
        let spur = vec![coord! { x: 0., y: 0. }, coord! { x: -1., y: -1. }];
        let outer = [square(0., 0., 4.), spur];
        assert!(matches!(
            assemble(&outer, &[]),
            Err(RingError::SegmentParity(_))
        ));
        let mp = assemble_multipolygon(&outer, &[], AssemblyMode::Permissive).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.unsigned_area(), 16.0);
    }

    #[test]
    fn test_shared_border_squares_union_via_duplicate_discard() {
        // two squares drawn fully, sharing one border: the shared edge
        // collapses as a duplicate and is then discarded for parity,
        // leaving the outline of the union
        let left = square(0., 0., 2.);
        let right = square(2., 0., 2.);
        let mp = assemble(&[left, right], &[]).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.unsigned_area(), 8.0);
    }

    #[test]
    fn test_pinch_point_shells_are_accepted() {
        // two squares touching at exactly one corner
        let mp = assemble(&[square(0., 0., 2.), square(2., 2., 2.)], &[]).unwrap();
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.unsigned_area(), 8.0);
    }

    #[test]
    fn test_hole_touching_shell_is_subtracted() {
        // hole flush against the shell's left edge: not cleanly contained,
        // so it is subtracted instead of kept as an interior ring
        let mp = assemble(&[square(0., 0., 10.)], &[square(0., 4., 2.)]).unwrap();
        assert_eq!(mp.unsigned_area(), 100.0 - 4.0);
        assert!(mp.0.iter().all(|p| p.interiors().is_empty()));
    }

    #[test]
    fn test_spur_removal_in_stitch() {
        let coords = stitch(&[Segment {
            coords: vec![
                coord! { x: 0., y: 0. },
                coord! { x: 2., y: 0. },
                coord! { x: 3., y: 0. },
                coord! { x: 2., y: 0. },
                coord! { x: 2., y: 2. },
                coord! { x: 0., y: 2. },
                coord! { x: 0., y: 0. },
            ],
            chain: 0,
        }]);
        assert!(!coords.contains(&coord! { x: 3., y: 0. }));
    }

    #[test]
    fn test_empty_input_is_empty_multipolygon() {
        let mp = assemble(&[], &[]).unwrap();
        assert!(mp.0.is_empty());
    }
}
