//! Shared map-object identity and version types for chronomap.
//!
//! This crate is the value-type foundation: object ids, member references,
//! and immutable entity versions as produced by an upstream decoder. It has
//! **no internal chronomap dependencies**: a pure leaf crate that the
//! contribution engine and geometry layers build on.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! ObjectId (kind + numeric id) ← identity of one map object
//!     └── Point    : a single located node
//!     └── Chain    : an ordered list of Point references
//!     └── Group    : an ordered list of (ObjectId, role) member references
//!
//! EntityVersion ← one stored revision of an object
//!     └── identity   (ObjectId, version number)
//!     └── provenance (timestamp, changeset, editor)
//!     └── payload    (coordinates | point ids | member refs)
//! ```
//!
//! Versions are created once by the decoder and never mutated; everything
//! downstream (timelines, contributions, geometry) treats them as shared
//! immutable snapshots.

pub mod id;
pub mod version;

pub use id::{MemberRef, ObjectId, ObjectKind};
pub use version::{EntityVersion, Payload, TagMap};
