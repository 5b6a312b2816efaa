//! Contribution timelines for chronomap.
//!
//! A map object's stored history is just its own versions. Its *effective*
//! history is richer: a chain changes shape whenever one of its points moves,
//! even though no chain version was written. This crate reconstructs that
//! effective history as a stream of [`Contribution`]s per object, via a
//! forward-only cursor ([`Timeline`]) backed by a multi-stream temporal
//! merge.
//!
//! ```text
//! MemberResolver ──▶ member Timelines (leaf / composite / empty)
//!        │                      │
//!        ▼                      ▼
//!   own versions ──merge──▶ Timeline ──▶ Contribution stream
//!   (major states)   ▲                        │
//!                    └── pending-edit queue   ▼
//!                        (minor states)   geometry derivation
//! ```
//!
//! # Key Types
//!
//! | Type               | Purpose                                         |
//! |--------------------|-------------------------------------------------|
//! | [`Timeline`]       | forward-only cursor over one object's states    |
//! | [`Contribution`]   | one effective, time-bounded state               |
//! | [`ResolvedMember`] | declared member + its state at that instant     |
//! | [`MemberResolver`] | supplies timelines for referenced objects       |
//! | [`AreaTable`]      | tag rules deciding what counts as an area       |
//!
//! # Concurrency model
//!
//! Single-threaded and pull-based: everything happens inside `next()` /
//! `peek()`. One timeline (with its member timelines and every `Rc`-shared
//! contribution) belongs to one logical worker; parallelism across subject
//! objects lives above this crate, one timeline per worker. `Rc`/`RefCell`
//! encode that boundary by construction.

mod composite;
pub mod contribution;
pub mod features;
pub mod geometry;
pub mod resolver;
pub mod timeline;

pub use contribution::{Contribution, ResolvedMember};
pub use features::{AreaRule, AreaTable, TableError};
pub use geometry::{GEOMETRY, geometry, is_area, is_area_group, is_empty_geometry};
pub use resolver::{InMemoryResolver, MemberResolver};
pub use timeline::Timeline;
