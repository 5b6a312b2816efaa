//! Endpoint adjacency over boundary segments.
//!
//! Segments live in a slab; the adjacency map lists the attached segment ids
//! per endpoint. Insertion order is preserved (IndexMap) so "pick an
//! arbitrary segment" is deterministic across runs.

use indexmap::IndexMap;

use crate::error::RingError;
use crate::segment::{CoordKey, Segment, edge_key, key_coord};

/// A remembered duplicate edge, collapsed at insert time.
struct DupEdge {
    a: CoordKey,
    b: CoordKey,
    used: bool,
}

pub(crate) struct SegmentGraph {
    slab: Vec<Segment>,
    /// Attached = currently present in the adjacency map.
    attached: Vec<bool>,
    adj: IndexMap<CoordKey, Vec<usize>>,
    dups: Vec<DupEdge>,
}

impl SegmentGraph {
    /// Index segments by endpoint. A segment equal to an already-indexed one
    /// (same undirected edge) collapses into it and is remembered as a
    /// duplicate for the parity-repair pass.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        let mut graph = Self {
            slab: Vec::with_capacity(segments.len()),
            attached: Vec::with_capacity(segments.len()),
            adj: IndexMap::new(),
            dups: Vec::new(),
        };
        for segment in segments {
            let (a, b) = (segment.first_key(), segment.last_key());
            if graph.find_edge(a, b).is_some() {
                graph.dups.push(DupEdge { a, b, used: false });
            } else {
                let id = graph.slab.len();
                graph.slab.push(segment);
                graph.attached.push(false);
                graph.attach(id);
            }
        }
        graph
    }

    fn attach(&mut self, id: usize) {
        debug_assert!(!self.attached[id]);
        let (a, b) = (self.slab[id].first_key(), self.slab[id].last_key());
        self.adj.entry(a).or_default().push(id);
        self.adj.entry(b).or_default().push(id);
        self.attached[id] = true;
    }

    fn detach(&mut self, id: usize) {
        debug_assert!(self.attached[id]);
        let (a, b) = (self.slab[id].first_key(), self.slab[id].last_key());
        for k in [a, b] {
            if let Some(list) = self.adj.get_mut(&k) {
                list.retain(|&s| s != id);
            }
        }
        self.attached[id] = false;
    }

    fn degree(&self, k: CoordKey) -> usize {
        self.adj.get(&k).map_or(0, Vec::len)
    }

    /// Find an attached two-point segment spanning exactly this edge.
    fn find_edge(&self, a: CoordKey, b: CoordKey) -> Option<usize> {
        let wanted = edge_key(a, b);
        self.adj.get(&a)?.iter().copied().find(|&id| {
            let s = &self.slab[id];
            s.coords.len() == 2 && s.edge() == wanted
        })
    }

    pub fn odd_endpoints(&self) -> usize {
        self.adj.values().filter(|list| list.len() % 2 == 1).count()
    }

    pub fn parity_ok(&self) -> bool {
        self.odd_endpoints() == 0
    }

    /// Drop collapsed duplicate edges that restore even parity.
    ///
    /// A boundary drawn by two chains collapses to one counted edge and
    /// leaves both its endpoints odd; removing the edge entirely repairs
    /// them. Duplicates whose far endpoint is also odd are preferred, fixing
    /// two violations at once.
    pub fn discard_redundant_duplicates(&mut self) {
        loop {
            let pick = self
                .dup_fixing(|graph, d| {
                    graph.degree(d.a) % 2 == 1 && graph.degree(d.b) % 2 == 1
                })
                .or_else(|| {
                    self.dup_fixing(|graph, d| {
                        graph.degree(d.a) % 2 == 1 || graph.degree(d.b) % 2 == 1
                    })
                });
            let Some(ix) = pick else { break };
            self.dups[ix].used = true;
            let (a, b) = (self.dups[ix].a, self.dups[ix].b);
            if let Some(id) = self.find_edge(a, b) {
                self.detach(id);
            }
        }
    }

    fn dup_fixing(&self, test: impl Fn(&Self, &DupEdge) -> bool) -> Option<usize> {
        self.dups
            .iter()
            .enumerate()
            .find(|(_, d)| !d.used && test(self, d))
            .map(|(ix, _)| ix)
    }

    /// Permissive-mode repair: at every odd endpoint, if exactly one chain
    /// contributes an unpaired segment, that segment is mismatched: drop it.
    /// Returns whether anything was removed.
    pub fn remove_mismatched_segments(&mut self) -> bool {
        let mut mismatched: Vec<usize> = Vec::new();
        for list in self.adj.values() {
            if list.len() % 2 == 0 {
                continue;
            }
            let mut unpaired: IndexMap<usize, usize> = IndexMap::new();
            for &id in list {
                if mismatched.contains(&id) {
                    continue;
                }
                let chain = self.slab[id].chain;
                if unpaired.shift_remove(&chain).is_none() {
                    unpaired.insert(chain, id);
                }
            }
            if unpaired.len() == 1 {
                let (_, &id) = unpaired.iter().next().expect("len checked");
                mismatched.push(id);
            }
        }
        if mismatched.is_empty() {
            return false;
        }
        for id in mismatched {
            if self.attached[id] {
                self.detach(id);
            }
        }
        true
    }

    /// Contract degree-2 endpoints into longer paths. Any path that closes
    /// back on its start with more than two distinct points is a completed
    /// ring and is collected immediately; closing paths of three or fewer
    /// coordinates are degenerate and discarded.
    pub fn contract(&mut self) -> Vec<Vec<Segment>> {
        let mut rings = Vec::new();
        let starts: Vec<CoordKey> = self.adj.keys().copied().collect();

        for start in starts {
            let seg_ids: Vec<usize> = match self.adj.get(&start) {
                Some(list) => list.clone(),
                None => continue,
            };
            for id in seg_ids {
                if !self.attached[id] {
                    continue;
                }
                self.slab[id].orient_from(start);
                let mut end = self.slab[id].last_key();
                if end == start {
                    continue;
                }
                self.detach(id);
                loop {
                    let continuation = match self.adj.get(&end) {
                        Some(list) if list.len() == 1 => Some(list[0]),
                        _ => None,
                    };
                    let Some(next) = continuation else {
                        // junction or dead end: keep the merged path around
                        self.attach(id);
                        break;
                    };
                    self.detach(next);
                    self.slab[next].orient_from(end);
                    let tail: Vec<_> = self.slab[next].coords[1..].to_vec();
                    self.slab[id].coords.extend(tail);
                    end = self.slab[id].last_key();
                    if end == start {
                        if self.slab[id].coords.len() > 3 {
                            rings.push(vec![self.slab[id].clone()]);
                        }
                        break;
                    }
                }
            }
        }

        rings
    }

    /// Walk the remaining branching topology into rings.
    ///
    /// Starting from an arbitrary unclosed segment, each junction prefers the
    /// continuation belonging to the same originating chain; a walk that
    /// cannot return to its start point is a hard error.
    pub fn walk(&mut self) -> Result<Vec<Vec<Segment>>, RingError> {
        let mut rings = Vec::new();

        while let Some(start) = self.first_active_endpoint() {
            let id = self.adj[&start][0];
            self.slab[id].orient_from(start);
            self.detach(id);
            let mut cur = self.slab[id].last_key();
            if self.degree(cur) == 0 {
                // dangling fragment, nothing to continue into
                continue;
            }
            let mut chain = self.slab[id].chain;
            let mut path = vec![self.slab[id].clone()];
            let budget = self.slab.iter().enumerate().filter(|&(i, _)| self.attached[i]).count();
            let mut steps = 0;

            while cur != start {
                steps += 1;
                let candidates = self.adj.get(&cur).cloned().unwrap_or_default();
                if candidates.is_empty() || steps > budget {
                    let c = key_coord(start);
                    return Err(RingError::UnclosedRing { x: c.x, y: c.y });
                }
                let pick = candidates
                    .iter()
                    .copied()
                    .find(|&s| self.slab[s].chain == chain && self.slab[s].other_key(cur) == start)
                    .or_else(|| {
                        candidates.iter().copied().find(|&s| self.slab[s].chain == chain)
                    })
                    .or_else(|| {
                        candidates.iter().copied().find(|&s| self.slab[s].other_key(cur) == start)
                    })
                    .unwrap_or(candidates[0]);
                self.slab[pick].orient_from(cur);
                self.detach(pick);
                cur = self.slab[pick].last_key();
                chain = self.slab[pick].chain;
                path.push(self.slab[pick].clone());
            }
            rings.push(path);
        }

        Ok(rings)
    }

    fn first_active_endpoint(&self) -> Option<CoordKey> {
        self.adj
            .iter()
            .find(|(_, list)| !list.is_empty())
            .map(|(&k, _)| k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{coord_key, split_chains};
    use geo::Coord;

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    fn graph_of(chains: &[Vec<Coord<f64>>]) -> SegmentGraph {
        SegmentGraph::from_segments(split_chains(chains))
    }

    #[test]
    fn test_closed_square_contracts_to_one_ring() {
        let square = vec![c(0., 0.), c(1., 0.), c(1., 1.), c(0., 1.), c(0., 0.)];
        let mut graph = graph_of(&[square]);
        assert!(graph.parity_ok());
        let rings = graph.contract();
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0][0].coords.len(), 5);
        assert!(graph.first_active_endpoint().is_none());
    }

    #[test]
    fn test_two_fragments_contract_to_one_ring() {
        let upper = vec![c(0., 0.), c(1., 0.), c(1., 1.)];
        let lower = vec![c(1., 1.), c(0., 1.), c(0., 0.)];
        let mut graph = graph_of(&[upper, lower]);
        assert!(graph.parity_ok());
        let rings = graph.contract();
        assert_eq!(rings.len(), 1);
    }

    #[test]
    fn test_open_chain_fails_parity() {
        let open = vec![c(0., 0.), c(1., 0.), c(1., 1.)];
        let graph = graph_of(&[open]);
        assert_eq!(graph.odd_endpoints(), 2);
    }

    #[test]
    fn test_duplicate_edge_repair_restores_parity() {
        // two squares sharing one border, both drawn fully: the shared edge
        // collapses to one counted edge, leaving both its endpoints at
        // degree 3; discarding the duplicated edge repairs parity
        let left = vec![c(0., 0.), c(1., 0.), c(1., 1.), c(0., 1.), c(0., 0.)];
        let right = vec![c(1., 0.), c(2., 0.), c(2., 1.), c(1., 1.), c(1., 0.)];
        let mut graph = graph_of(&[left, right]);
        assert_eq!(graph.odd_endpoints(), 2);
        graph.discard_redundant_duplicates();
        assert!(graph.parity_ok());
        // what remains contracts into the outline of the union
        let rings = graph.contract();
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0][0].coords.len(), 7);
    }

    #[test]
    fn test_collapsed_duplicate_with_even_parity_is_left_alone() {
        // a closed square plus a stray duplicate of one side: the duplicate
        // collapses at insert and parity never breaks, so repair is a no-op
        let square = vec![c(0., 0.), c(1., 0.), c(1., 1.), c(0., 1.), c(0., 0.)];
        let dup_side = vec![c(0., 0.), c(1., 0.)];
        let mut graph = graph_of(&[square, dup_side]);
        assert!(graph.parity_ok());
        graph.discard_redundant_duplicates();
        assert!(graph.parity_ok());
        let rings = graph.contract();
        assert_eq!(rings.len(), 1);
    }

    #[test]
    fn test_junction_walk_closes_parallel_paths() {
        // two endpoints joined by two distinct paths: every endpoint has even
        // degree but the shared endpoints have degree 2 + 2 after contraction.
        let upper = vec![c(0., 0.), c(1., 1.), c(2., 0.)];
        let lower = vec![c(0., 0.), c(1., -1.), c(2., 0.)];
        let mut graph = graph_of(&[upper, lower]);
        assert!(graph.parity_ok());
        let mut rings = graph.contract();
        rings.extend(graph.walk().unwrap());
        assert_eq!(rings.len(), 1);
        let total: usize = rings[0].iter().map(|s| s.coords.len() - 1).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_walk_reports_unclosed() {
        // an open two-segment path can start a walk but never return
        let mut graph = graph_of(&[vec![c(0., 0.), c(1., 0.), c(2., 0.)]]);
        let err = graph.walk().unwrap_err();
        assert_eq!(err, RingError::UnclosedRing { x: 0., y: 0. });
    }

    #[test]
    fn test_lone_dangling_segment_is_discarded() {
        let mut graph = graph_of(&[vec![c(0., 0.), c(1., 0.)]]);
        assert!(graph.walk().unwrap().is_empty());
    }

    #[test]
    fn test_orient_preserved_in_keys() {
        let mut s = Segment::pair(c(3., 4.), c(5., 6.), 0);
        s.orient_from(coord_key(c(5., 6.)));
        assert_eq!(s.coords[0], c(5., 6.));
    }
}
