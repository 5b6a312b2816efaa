//! Immutable entity versions: one stored revision of a map object.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{MemberRef, ObjectId, ObjectKind};

/// Tag map of one entity version. BTreeMap keeps serialized output and
/// iteration order stable.
pub type TagMap = BTreeMap<String, String>;

/// Kind-specific payload of an entity version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    /// A located point. Coordinates are WGS84 degrees; range validation is a
    /// geometry-derivation concern, not a construction-time one.
    Point { lon: f64, lat: f64 },
    /// Ordered point ids forming a chain.
    Chain { points: Vec<i64> },
    /// Ordered member references with roles.
    Group { members: Vec<MemberRef> },
}

/// One stored version of a map object, as decoded from the history input.
///
/// Created by the upstream decoder and never mutated. Several contributions
/// may share one version: the version governs every synthesized (minor) state
/// between this revision and the next one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityVersion {
    pub id: ObjectId,
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub changeset: u64,
    pub editor_id: u32,
    pub editor: String,
    pub visible: bool,
    pub tags: TagMap,
    pub payload: Payload,
}

impl EntityVersion {
    /// Construct a point version.
    #[allow(clippy::too_many_arguments)]
    pub fn point(
        id: i64,
        version: u32,
        timestamp: DateTime<Utc>,
        changeset: u64,
        editor_id: u32,
        editor: impl Into<String>,
        visible: bool,
        tags: TagMap,
        lon: f64,
        lat: f64,
    ) -> Self {
        Self {
            id: ObjectId::point(id),
            version,
            timestamp,
            changeset,
            editor_id,
            editor: editor.into(),
            visible,
            tags,
            payload: Payload::Point { lon, lat },
        }
    }

    /// Construct a chain version from ordered point ids.
    #[allow(clippy::too_many_arguments)]
    pub fn chain(
        id: i64,
        version: u32,
        timestamp: DateTime<Utc>,
        changeset: u64,
        editor_id: u32,
        editor: impl Into<String>,
        visible: bool,
        tags: TagMap,
        points: Vec<i64>,
    ) -> Self {
        Self {
            id: ObjectId::chain(id),
            version,
            timestamp,
            changeset,
            editor_id,
            editor: editor.into(),
            visible,
            tags,
            payload: Payload::Chain { points },
        }
    }

    /// Construct a group version from member references.
    #[allow(clippy::too_many_arguments)]
    pub fn group(
        id: i64,
        version: u32,
        timestamp: DateTime<Utc>,
        changeset: u64,
        editor_id: u32,
        editor: impl Into<String>,
        visible: bool,
        tags: TagMap,
        members: Vec<MemberRef>,
    ) -> Self {
        Self {
            id: ObjectId::group(id),
            version,
            timestamp,
            changeset,
            editor_id,
            editor: editor.into(),
            visible,
            tags,
            payload: Payload::Group { members },
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.id.kind
    }

    /// The declared member list of this version.
    ///
    /// Points have none; chains synthesize blank-role point references from
    /// their ordered id list; groups return their stored references.
    pub fn members(&self) -> Vec<MemberRef> {
        match &self.payload {
            Payload::Point { .. } => Vec::new(),
            Payload::Chain { points } => points
                .iter()
                .map(|&p| MemberRef::new(ObjectId::point(p), ""))
                .collect(),
            Payload::Group { members } => members.clone(),
        }
    }

    /// Point coordinates, if this is a point version.
    pub fn coordinate(&self) -> Option<(f64, f64)> {
        match self.payload {
            Payload::Point { lon, lat } => Some((lon, lat)),
            _ => None,
        }
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}
