//! The forward-only contribution cursor.

use std::rc::Rc;

use chronomap_types::{EntityVersion, ObjectId, ObjectKind};

use crate::composite::CompositeSource;
use crate::contribution::Contribution;
use crate::resolver::MemberResolver;

/// A single-pass cursor over the effective timeline of one map object.
///
/// Timelines come in three closed variants: *leaf* (one contribution per
/// stored point version), *composite* (the merged timeline of a chain or
/// group, including member-caused minor steps), and *empty* (unknown
/// objects). All three share this one cursor; variant dispatch is internal.
///
/// Contributions come out in non-decreasing `(timestamp, changeset)` order.
/// A timeline is exclusively owned by its creator and never rewound.
///
/// `next()` on an exhausted timeline and `prev()` on an unstarted one are
/// programming errors and panic; `peek()` and [`Timeline::last`] are the
/// non-panicking lookahead/lookbehind used by the merge engine.
pub struct Timeline {
    id: ObjectId,
    next: Option<Rc<Contribution>>,
    prev: Option<Rc<Contribution>>,
    source: Source,
}

enum Source {
    Leaf(LeafSource),
    Composite(Box<CompositeSource>),
    Empty,
}

impl Timeline {
    /// Timeline of a point object: one contribution per stored version.
    ///
    /// Versions must be ordered as stored; the list must not be empty.
    pub fn leaf(versions: Vec<EntityVersion>) -> Self {
        let Some(first) = versions.first() else {
            panic!("leaf timeline requires at least one version");
        };
        Self {
            id: first.id,
            next: None,
            prev: None,
            source: Source::Leaf(LeafSource { versions: versions.into_iter() }),
        }
    }

    /// Timeline of a composite (chain or group) object.
    ///
    /// Versions must be ordered as stored; the list must not be empty. The
    /// resolver supplies member timelines and must answer every id (with an
    /// empty timeline for unknown objects).
    pub fn composite(versions: Vec<EntityVersion>, resolver: Rc<dyn MemberResolver>) -> Self {
        let Some(first) = versions.first() else {
            panic!("composite timeline requires at least one version");
        };
        let id = first.id;
        Self {
            id,
            next: None,
            prev: None,
            source: Source::Composite(Box::new(CompositeSource::new(versions, resolver))),
        }
    }

    /// Timeline of an unknown object: yields nothing.
    pub fn empty(id: ObjectId) -> Self {
        Self { id, next: None, prev: None, source: Source::Empty }
    }

    pub fn object_id(&self) -> ObjectId {
        self.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.id.kind
    }

    pub fn id(&self) -> i64 {
        self.id.id
    }

    /// Whether another contribution is available. May advance internal
    /// member timelines to find out.
    pub fn has_next(&mut self) -> bool {
        if self.next.is_none() {
            self.next = match &mut self.source {
                Source::Leaf(source) => source.compute_next(),
                Source::Composite(source) => source.compute_next(),
                Source::Empty => None,
            };
        }
        self.next.is_some()
    }

    /// Advance and return the next contribution.
    ///
    /// # Panics
    /// When the timeline is exhausted.
    pub fn next(&mut self) -> Rc<Contribution> {
        if !self.has_next() {
            panic!("next() on exhausted timeline {}", self.id);
        }
        let contrib = self.next.take().expect("pending contribution after has_next");
        self.prev = Some(Rc::clone(&contrib));
        contrib
    }

    /// Look at the next contribution without advancing.
    pub fn peek(&mut self) -> Option<&Rc<Contribution>> {
        self.has_next();
        self.next.as_ref()
    }

    /// The most recently returned contribution.
    ///
    /// # Panics
    /// Before the first `next()`.
    pub fn prev(&self) -> Rc<Contribution> {
        match &self.prev {
            Some(contrib) => Rc::clone(contrib),
            None => panic!("prev() before the first next() on timeline {}", self.id),
        }
    }

    /// Non-panicking [`Timeline::prev`]: `None` before the first `next()`.
    pub fn last(&self) -> Option<&Rc<Contribution>> {
        self.prev.as_ref()
    }
}

/// Trivial per-point source: stored versions become contributions verbatim.
struct LeafSource {
    versions: std::vec::IntoIter<EntityVersion>,
}

impl LeafSource {
    fn compute_next(&mut self) -> Option<Rc<Contribution>> {
        self.versions
            .next()
            .map(|version| Rc::new(Contribution::from_version(Rc::new(version))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use chronomap_types::TagMap;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn point(id: i64, version: u32, secs: i64, changeset: u64) -> EntityVersion {
        EntityVersion::point(id, version, ts(secs), changeset, 1, "", true, TagMap::new(), 0.0, 0.0)
    }

    #[test]
    fn test_leaf_yields_one_contribution_per_version() {
        let mut timeline = Timeline::leaf(vec![point(1, 1, 1, 1), point(1, 2, 2, 2)]);

        assert!(timeline.has_next());
        let c = timeline.next();
        assert_eq!(c.entity.version, 1);

        assert!(timeline.has_next());
        let c = timeline.next();
        assert_eq!(c.entity.version, 2);

        assert!(!timeline.has_next());
    }

    #[test]
    fn test_peek_is_stable_and_does_not_advance() {
        let mut timeline = Timeline::leaf(vec![point(1, 1, 1, 1), point(1, 2, 2, 2)]);
        let first = timeline.peek().map(|c| Rc::clone(c)).unwrap();
        let second = timeline.peek().map(|c| Rc::clone(c)).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert!(Rc::ptr_eq(&first, &timeline.next()));
    }

    #[test]
    fn test_prev_returns_the_last_returned_contribution() {
        let mut timeline = Timeline::leaf(vec![point(1, 1, 1, 1), point(1, 2, 2, 2)]);
        let c1 = timeline.next();
        assert!(Rc::ptr_eq(&c1, &timeline.prev()));
        let c2 = timeline.next();
        assert!(Rc::ptr_eq(&c2, &timeline.prev()));
        // prev is unaffected by exhaustion
        assert!(!timeline.has_next());
        assert!(Rc::ptr_eq(&c2, &timeline.prev()));
    }

    #[test]
    #[should_panic(expected = "exhausted timeline")]
    fn test_next_past_the_end_panics() {
        let mut timeline = Timeline::leaf(vec![point(1, 1, 1, 1)]);
        timeline.next();
        timeline.next();
    }

    #[test]
    #[should_panic(expected = "before the first next()")]
    fn test_prev_before_next_panics() {
        let timeline = Timeline::leaf(vec![point(1, 1, 1, 1)]);
        timeline.prev();
    }

    #[test]
    fn test_empty_timeline_has_identity_but_no_contributions() {
        let mut timeline = Timeline::empty(ObjectId::point(9));
        assert_eq!(timeline.kind(), ObjectKind::Point);
        assert_eq!(timeline.id(), 9);
        assert!(!timeline.has_next());
        assert!(timeline.peek().is_none());
        assert!(timeline.last().is_none());
    }

    #[test]
    fn test_leaf_ordering_is_non_decreasing() {
        let mut timeline = Timeline::leaf(vec![
            point(1, 1, 1, 3),
            point(1, 2, 5, 4),
            point(1, 3, 5, 9),
            point(1, 4, 8, 2),
        ]);
        let mut last = None;
        while timeline.has_next() {
            let c = timeline.next();
            let key = (c.timestamp, c.changeset);
            if let Some(prev) = last {
                assert!(key >= prev);
            }
            last = Some(key);
        }
    }
}
