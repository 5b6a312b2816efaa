//! The merge engine behind composite timelines.
//!
//! A chain or group changes whenever one of its own versions lands *or* one
//! of its members changes in between. The engine merges the subject's own
//! version list with every member's timeline via a pending-edit min-queue,
//! synthesizing a minor contribution per member-caused step and batching all
//! member edits that belong to one shared changeset into a single step.
//!
//! Two folding policies coexist deliberately; they are observably different
//! and both show up in recorded histories:
//!
//! - at **major activation**, a member's pending contribution folds into the
//!   major state when its timestamp is at or before the major's, *or* when it
//!   was made in the major's own changeset (co-edit);
//! - at a **minor step**, members advance only while their pending
//!   contribution is at or before the adopted timestamp *and* in the adopted
//!   changeset.
//!
//! The queue stores `(timestamp, changeset)` snapshots taken at push time;
//! minor-step rebuilds can advance members while queued, so a popped head is
//! verified against the member's live state and lazily re-keyed when stale.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::iter::Peekable;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use chronomap_types::{EntityVersion, ObjectId};

use crate::contribution::{Contribution, ResolvedMember};
use crate::resolver::MemberResolver;
use crate::timeline::Timeline;

/// Editor sentinel for "no pending member edit".
const NO_EDITOR: u32 = u32::MAX;

fn timestamp_max() -> DateTime<Utc> {
    DateTime::<Utc>::MAX_UTC
}

/// One queued member edit, keyed by the member's pending contribution at
/// push time. Ordering: timestamp, then changeset, then member id as the
/// total-order tie break the heap requires.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord)]
struct PendingEdit {
    timestamp: DateTime<Utc>,
    changeset: u64,
    member: ObjectId,
}

pub(crate) struct CompositeSource {
    majors: Peekable<std::vec::IntoIter<Rc<EntityVersion>>>,
    resolver: Rc<dyn MemberResolver>,
    /// Member timelines, created once per id and kept for the composite's
    /// lifetime: never recreated, never rewound.
    arena: HashMap<ObjectId, Timeline>,
    /// Distinct member ids declared by the current major version.
    active: Vec<ObjectId>,
    queue: BinaryHeap<Reverse<PendingEdit>>,
    major: Option<Rc<EntityVersion>>,
    timestamp: DateTime<Utc>,
    changeset: u64,
    editor_id: u32,
    editor: String,
    members: Vec<ResolvedMember>,
    minor: u32,
}

impl CompositeSource {
    pub fn new(versions: Vec<EntityVersion>, resolver: Rc<dyn MemberResolver>) -> Self {
        let majors: Vec<Rc<EntityVersion>> = versions.into_iter().map(Rc::new).collect();
        let mut source = Self {
            majors: majors.into_iter().peekable(),
            resolver,
            arena: HashMap::new(),
            active: Vec::new(),
            queue: BinaryHeap::new(),
            major: None,
            timestamp: timestamp_max(),
            changeset: u64::MAX,
            editor_id: NO_EDITOR,
            editor: String::new(),
            members: Vec::new(),
            minor: 0,
        };
        source.activate_next_major();
        source
    }

    /// Emit the current effective state, then advance to the next one.
    pub fn compute_next(&mut self) -> Option<Rc<Contribution>> {
        let major = self.major.clone()?;
        let contrib = Rc::new(Contribution::new(
            self.timestamp,
            self.changeset,
            self.editor_id,
            self.editor.clone(),
            self.minor,
            major,
            self.members.clone(),
        ));
        self.advance();
        Some(contrib)
    }

    fn advance(&mut self) {
        let next_major_at = self.majors.peek().map_or_else(timestamp_max, |m| m.timestamp);

        // adopt the pending identity of the earliest member edit
        match self.refresh_head() {
            Some(head) => {
                self.timestamp = head.timestamp;
                self.changeset = head.changeset;
                let (editor_id, editor) = self.pending_editor(head.member);
                self.editor_id = editor_id;
                self.editor = editor;
            }
            None => {
                self.timestamp = timestamp_max();
                self.changeset = u64::MAX;
                self.editor_id = NO_EDITOR;
                self.editor = String::new();
            }
        }

        // batch every member edit in the adopted changeset that lands before
        // the subject's next own version
        while let Some(head) = self.refresh_head() {
            if head.changeset != self.changeset || head.timestamp >= next_major_at {
                break;
            }
            self.queue.pop();
            self.timestamp = head.timestamp;
            let timeline = self
                .arena
                .get_mut(&head.member)
                .expect("queued member has a timeline");
            if timeline.has_next() {
                timeline.next();
            }
            if let Some(pending) = timeline.peek() {
                let entry = PendingEdit {
                    timestamp: pending.timestamp,
                    changeset: pending.changeset,
                    member: head.member,
                };
                self.queue.push(Reverse(entry));
            }
        }

        if self.timestamp < next_major_at {
            self.minor_step();
        } else {
            self.activate_next_major();
        }
    }

    /// The queue head, verified against its member's live pending state.
    /// Stale entries (member advanced while queued) are re-keyed; entries of
    /// exhausted members are dropped.
    fn refresh_head(&mut self) -> Option<PendingEdit> {
        loop {
            let entry = self.queue.peek()?.0.clone();
            let Some(timeline) = self.arena.get_mut(&entry.member) else {
                self.queue.pop();
                continue;
            };
            match timeline.peek().map(|c| (c.timestamp, c.changeset)) {
                Some((ts, cs)) if ts == entry.timestamp && cs == entry.changeset => {
                    return Some(entry);
                }
                Some((ts, cs)) => {
                    self.queue.pop();
                    self.queue.push(Reverse(PendingEdit {
                        timestamp: ts,
                        changeset: cs,
                        member: entry.member,
                    }));
                }
                None => {
                    self.queue.pop();
                }
            }
        }
    }

    fn pending_editor(&mut self, member: ObjectId) -> (u32, String) {
        self.arena
            .get_mut(&member)
            .and_then(|timeline| timeline.peek())
            .map_or((NO_EDITOR, String::new()), |c| (c.editor_id, c.editor.clone()))
    }

    /// A member edit landed between two own versions: rebuild the resolved
    /// member list at the adopted instant.
    fn minor_step(&mut self) {
        self.minor += 1;
        let major = self.major.clone().expect("minor step with an active major");
        let mut members = Vec::with_capacity(self.members.len());
        for member in major.members() {
            let timeline = self
                .arena
                .get_mut(&member.id)
                .expect("declared member has a timeline");
            while timeline
                .peek()
                .is_some_and(|c| c.timestamp <= self.timestamp && c.changeset == self.changeset)
            {
                timeline.next();
            }
            members.push(ResolvedMember::new(
                member.kind(),
                member.num(),
                member.role.clone(),
                timeline.last().cloned(),
            ));
        }
        self.members = members;
    }

    /// Step onto the subject's next own version (or exhaust the timeline):
    /// resolve every declared member at the version's instant and queue the
    /// pending member edits.
    fn activate_next_major(&mut self) {
        let Some(major) = self.majors.next() else {
            self.major = None;
            return;
        };
        self.timestamp = major.timestamp;
        self.changeset = major.changeset;
        self.editor_id = major.editor_id;
        self.editor = major.editor.clone();
        self.minor = 0;
        self.active.clear();
        self.queue.clear();

        let resolver = Rc::clone(&self.resolver);
        let mut members = Vec::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        for member in major.members() {
            let timeline = self
                .arena
                .entry(member.id)
                .or_insert_with(|| resolver.timeline(member.id));
            // fold in everything at or before this version, plus co-edits
            // made in this version's own changeset even if timestamped later
            while timeline
                .peek()
                .is_some_and(|c| c.timestamp <= major.timestamp || c.changeset == major.changeset)
            {
                timeline.next();
            }
            members.push(ResolvedMember::new(
                member.kind(),
                member.num(),
                member.role.clone(),
                timeline.last().cloned(),
            ));
            if seen.insert(member.id) {
                self.active.push(member.id);
            }
        }
        for id in &self.active {
            let timeline = self.arena.get_mut(id).expect("member was just resolved");
            if let Some(pending) = timeline.peek() {
                self.queue.push(Reverse(PendingEdit {
                    timestamp: pending.timestamp,
                    changeset: pending.changeset,
                    member: *id,
                }));
            }
        }
        self.members = members;
        self.major = Some(major);
    }
}
