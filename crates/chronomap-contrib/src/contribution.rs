//! Contributions: effective, time-bounded states of one map object.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use chronomap_types::{EntityVersion, ObjectKind};

/// One resolved member reference inside a contribution: the declared
/// reference plus the member's own contribution at the resolution instant.
///
/// `contrib` is `None` when the member is unknown to the resolver or has no
/// state yet at this point in time: a normally-absent reference, not an
/// error.
#[derive(Clone, Debug)]
pub struct ResolvedMember {
    pub kind: ObjectKind,
    pub id: i64,
    pub role: String,
    pub contrib: Option<Rc<Contribution>>,
}

impl ResolvedMember {
    pub fn new(
        kind: ObjectKind,
        id: i64,
        role: impl Into<String>,
        contrib: Option<Rc<Contribution>>,
    ) -> Self {
        Self { kind, id, role: role.into(), contrib }
    }
}

/// One effective state of a map object, the unit produced by a timeline.
///
/// Timestamp, changeset and editor identify the *edit that caused* this
/// state, which for minor steps is an edit to a member rather than to the
/// governing entity version itself. `minor` counts synthesized steps since
/// the governing version appeared: 0 on the version's own contribution,
/// incremented per member-caused step, reset at the next version.
#[derive(Debug)]
pub struct Contribution {
    pub timestamp: DateTime<Utc>,
    pub changeset: u64,
    pub editor_id: u32,
    pub editor: String,
    pub minor: u32,
    /// The governing entity version. Shared across every minor step it
    /// governs.
    pub entity: Rc<EntityVersion>,
    pub members: Vec<ResolvedMember>,
    derived: DerivedData,
}

impl Contribution {
    pub fn new(
        timestamp: DateTime<Utc>,
        changeset: u64,
        editor_id: u32,
        editor: impl Into<String>,
        minor: u32,
        entity: Rc<EntityVersion>,
        members: Vec<ResolvedMember>,
    ) -> Self {
        Self {
            timestamp,
            changeset,
            editor_id,
            editor: editor.into(),
            minor,
            entity,
            members,
            derived: DerivedData::default(),
        }
    }

    /// A leaf contribution: one point version, verbatim, no members.
    pub fn from_version(entity: Rc<EntityVersion>) -> Self {
        Self::new(
            entity.timestamp,
            entity.changeset,
            entity.editor_id,
            entity.editor.clone(),
            0,
            Rc::clone(&entity),
            Vec::new(),
        )
    }

    /// Visibility of this state, derived from the governing version.
    pub fn visible(&self) -> bool {
        self.entity.visible
    }

    /// Fetch or compute a derived value, memoized under `key`.
    ///
    /// The first call computes and stores; later calls return the stored
    /// value. Values are shared via `Rc` and must not cross threads; one
    /// contribution belongs to one worker.
    pub fn derived<T: 'static>(
        &self,
        key: &'static str,
        build: impl FnOnce(&Contribution) -> T,
    ) -> Rc<T> {
        if let Some(value) = self.derived.get::<T>(key) {
            return value;
        }
        // not held across the build call: building may recurse into members
        let value = Rc::new(build(self));
        self.derived.put(key, Rc::clone(&value) as Rc<dyn Any>);
        value
    }
}

/// Write-once-per-key memo map for values derived from a contribution
/// ("geometry", "encoded-geometry", ...). Single-threaded by design.
#[derive(Default)]
struct DerivedData {
    values: RefCell<HashMap<&'static str, Rc<dyn Any>>>,
}

impl std::fmt::Debug for DerivedData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.values.borrow().keys()).finish()
    }
}

impl DerivedData {
    fn get<T: 'static>(&self, key: &'static str) -> Option<Rc<T>> {
        self.values
            .borrow()
            .get(key)
            .and_then(|value| Rc::clone(value).downcast::<T>().ok())
    }

    fn put(&self, key: &'static str, value: Rc<dyn Any>) {
        self.values.borrow_mut().entry(key).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chronomap_types::TagMap;

    fn version() -> Rc<EntityVersion> {
        Rc::new(EntityVersion::point(
            1,
            1,
            Utc.timestamp_opt(1, 0).unwrap(),
            1,
            7,
            "amy",
            true,
            TagMap::new(),
            8.0,
            49.0,
        ))
    }

    #[test]
    fn test_leaf_contribution_copies_version_identity() {
        let v = version();
        let c = Contribution::from_version(Rc::clone(&v));
        assert_eq!(c.timestamp, v.timestamp);
        assert_eq!(c.changeset, 1);
        assert_eq!(c.editor, "amy");
        assert_eq!(c.minor, 0);
        assert!(c.members.is_empty());
        assert!(c.visible());
    }

    #[test]
    fn test_derived_computes_once() {
        let c = Contribution::from_version(version());
        let mut calls = 0;
        let first = c.derived("answer", |_| {
            calls += 1;
            42_u32
        });
        let second = c.derived("answer", |_| {
            calls += 1;
            7_u32
        });
        assert_eq!(*first, 42);
        assert_eq!(*second, 42);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_derived_keys_are_independent() {
        let c = Contribution::from_version(version());
        let a = c.derived("a", |_| 1_u32);
        let b = c.derived("b", |_| 2_u32);
        assert_eq!((*a, *b), (1, 2));
    }
}
