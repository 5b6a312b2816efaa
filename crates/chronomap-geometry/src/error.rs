//! Ring-construction failures.

use thiserror::Error;

/// Errors raised while assembling boundary fragments into polygons.
///
/// Every variant means "this composite has no valid area geometry right
/// now"; callers degrade to an empty multipolygon rather than propagating.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum RingError {
    /// One or more endpoints touch an odd number of segments, so the
    /// fragments cannot form a consistent union of closed curves.
    #[error("{0} endpoint(s) with mismatched segment parity")]
    SegmentParity(usize),

    /// A walk over branching topology never returned to its start point.
    #[error("failed to close ring starting at ({x}, {y})")]
    UnclosedRing { x: f64, y: f64 },

    /// An assembled ring does not form a valid simple polygon.
    #[error("assembled ring is not a valid polygon")]
    InvalidRing,

    /// Two outer rings share a boundary segment (only resolvable by merging).
    #[error("outer rings share a boundary segment")]
    SharedOuterBoundary,

    /// Two outer rings overlap in their interiors.
    #[error("outer rings overlap")]
    OverlappingOuterRings,
}
