//! Typed identifiers for map objects and member references.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The three object kinds of the map model.
///
/// `Point` is the only located kind; `Chain` and `Group` are composites whose
/// effective state depends on the objects they reference.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Point,
    Chain,
    Group,
}

/// Unique identity of one map object: kind plus numeric id.
///
/// Ids are only unique within a kind (point 7 and chain 7 are distinct
/// objects), so the kind is part of the identity. Hashable and totally
/// ordered; used as arena and adjacency keys throughout the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    pub kind: ObjectKind,
    pub id: i64,
}

impl ObjectId {
    pub fn new(kind: ObjectKind, id: i64) -> Self {
        Self { kind, id }
    }

    pub fn point(id: i64) -> Self {
        Self::new(ObjectKind::Point, id)
    }

    pub fn chain(id: i64) -> Self {
        Self::new(ObjectKind::Chain, id)
    }

    pub fn group(id: i64) -> Self {
        Self::new(ObjectKind::Group, id)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// One declared member reference of a composite object.
///
/// Chains declare point members with blank roles; groups declare arbitrary
/// members with free-form roles ("outer", "inner", "admin_centre", ...).
/// The role is carried verbatim; interpretation belongs to the geometry
/// layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    pub id: ObjectId,
    pub role: String,
}

impl MemberRef {
    pub fn new(id: ObjectId, role: impl Into<String>) -> Self {
        Self { id, role: role.into() }
    }

    pub fn kind(&self) -> ObjectKind {
        self.id.kind
    }

    /// Numeric id of the referenced object.
    pub fn num(&self) -> i64 {
        self.id.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_strings() {
        for kind in [ObjectKind::Point, ObjectKind::Chain, ObjectKind::Group] {
            let s = kind.to_string();
            assert_eq!(s.parse::<ObjectKind>().unwrap(), kind);
        }
        assert_eq!("CHAIN".parse::<ObjectKind>().unwrap(), ObjectKind::Chain);
    }

    #[test]
    fn test_object_id_ordering_is_total() {
        let mut ids = vec![
            ObjectId::group(1),
            ObjectId::point(2),
            ObjectId::chain(9),
            ObjectId::point(1),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                ObjectId::point(1),
                ObjectId::point(2),
                ObjectId::chain(9),
                ObjectId::group(1),
            ]
        );
    }

    #[test]
    fn test_display_format() {
        assert_eq!(ObjectId::chain(42).to_string(), "chain/42");
    }
}
