//! Planar ring assembly for chronomap area composites.
//!
//! Area-like composite objects reference their boundary as an unordered pile
//! of line fragments: individually open chains, drawn in either direction,
//! sometimes duplicated where two areas share a border. This crate
//! reconstructs correctly nested polygons-with-holes from that pile:
//!
//! ```text
//! chains ──split──▶ 2-point segments ──index──▶ endpoint adjacency
//!    parity repair ──contract──▶ closed rings + leftover branching paths
//!    junction walk ──▶ remaining rings
//!    candidates ──sort by area──▶ outer/inner grouping ──▶ MultiPolygon
//! ```
//!
//! Assembly is all-or-nothing per composite: any unresolved parity, unclosed
//! walk, invalid candidate ring, or ambiguous outer-ring overlap is a
//! [`RingError`]. Callers treat that as "no valid area geometry"; it is
//! never fatal to timeline iteration.
//!
//! [`AssemblyMode::Permissive`] additionally repairs one mismatched segment
//! per offending chain and merges outer rings that share a boundary segment,
//! for inputs drawn before stricter editor validation existed.
//!
//! The [`measure`] module carries the geodesic length/area approximations
//! used by downstream converters.

mod error;
mod graph;
pub mod measure;
mod ring;
mod segment;

pub use error::RingError;
pub use measure::{area_of, length_of};
pub use ring::{AssemblyMode, assemble_multipolygon};
