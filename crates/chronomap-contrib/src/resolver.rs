//! Member resolution: who supplies a timeline for a referenced object.

use std::collections::HashMap;
use std::rc::Rc;

use chronomap_types::{EntityVersion, ObjectId, ObjectKind};

use crate::timeline::Timeline;

/// Supplies a timeline for any referenced object id.
///
/// Implementations must answer every id: unknown objects get
/// [`Timeline::empty`], never a panic. Storage-backed implementations own
/// their retries; by the time a timeline reaches the merge engine, lookup
/// failures are over.
pub trait MemberResolver {
    fn timeline(&self, id: ObjectId) -> Timeline;
}

/// Any closure mapping ids to timelines is a resolver.
impl<F> MemberResolver for F
where
    F: Fn(ObjectId) -> Timeline,
{
    fn timeline(&self, id: ObjectId) -> Timeline {
        self(id)
    }
}

/// In-memory resolver over per-kind version lists: the small-input and test
/// implementation of the resolver contract.
///
/// Point members resolve to leaf timelines, chain members to composite
/// timelines (re-entering this resolver for their own points). Group-typed
/// members resolve empty: nested groups are looked up by id at a layer above
/// this engine, which also keeps reference cycles out of geometry recursion.
#[derive(Clone, Default)]
pub struct InMemoryResolver {
    inner: Rc<Inner>,
}

#[derive(Default)]
struct Inner {
    points: HashMap<i64, Vec<EntityVersion>>,
    chains: HashMap<i64, Vec<EntityVersion>>,
}

impl InMemoryResolver {
    /// Build from version lists, keyed by each list's first version.
    /// Empty lists are ignored. Lists must be ordered as stored.
    pub fn new(points: Vec<Vec<EntityVersion>>, chains: Vec<Vec<EntityVersion>>) -> Self {
        let mut inner = Inner::default();
        for versions in points {
            if let Some(first) = versions.first() {
                inner.points.insert(first.id.id, versions);
            }
        }
        for versions in chains {
            if let Some(first) = versions.first() {
                inner.chains.insert(first.id.id, versions);
            }
        }
        Self { inner: Rc::new(inner) }
    }

    /// Resolver over points only (sufficient for chain subjects).
    pub fn points(points: Vec<Vec<EntityVersion>>) -> Self {
        Self::new(points, Vec::new())
    }
}

impl MemberResolver for InMemoryResolver {
    fn timeline(&self, id: ObjectId) -> Timeline {
        match id.kind {
            ObjectKind::Point => match self.inner.points.get(&id.id) {
                Some(versions) => Timeline::leaf(versions.clone()),
                None => Timeline::empty(id),
            },
            ObjectKind::Chain => match self.inner.chains.get(&id.id) {
                Some(versions) => {
                    Timeline::composite(versions.clone(), Rc::new(self.clone()))
                }
                None => Timeline::empty(id),
            },
            ObjectKind::Group => Timeline::empty(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use chronomap_types::TagMap;

    fn point(id: i64, secs: i64) -> EntityVersion {
        EntityVersion::point(
            id,
            1,
            Utc.timestamp_opt(secs, 0).unwrap(),
            1,
            1,
            "",
            true,
            TagMap::new(),
            0.0,
            0.0,
        )
    }

    #[test]
    fn test_unknown_ids_resolve_empty() {
        let resolver = InMemoryResolver::default();
        for id in [ObjectId::point(1), ObjectId::chain(1), ObjectId::group(1)] {
            let mut timeline = resolver.timeline(id);
            assert_eq!(timeline.object_id(), id);
            assert!(!timeline.has_next());
        }
    }

    #[test]
    fn test_known_point_resolves_to_leaf() {
        let resolver = InMemoryResolver::points(vec![vec![point(5, 1)]]);
        let mut timeline = resolver.timeline(ObjectId::point(5));
        assert!(timeline.has_next());
        assert_eq!(timeline.next().entity.id, ObjectId::point(5));
        assert!(!timeline.has_next());
    }

    #[test]
    fn test_closures_are_resolvers() {
        let resolver = |id: ObjectId| Timeline::empty(id);
        assert!(!resolver.timeline(ObjectId::point(1)).has_next());
    }
}
