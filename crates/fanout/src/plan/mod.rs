//! # Fan-out Planning
//!
//! A [`FanoutPlan`] is the dependency graph a distribution executes. Each [`PlanEntry`] is one
//! provider call: a copy, a share or a folder creation, aimed at a [`Recipient`] and derived
//! from a [`Parent`].
//!
//! ## Two-phase plans
//!
//! Entries whose parent is the source document are *roots* and may run immediately. Entries
//! hanging off another entry (a member share of a group copy, a student copy inside a group
//! folder) are *deferred*: their parent document does not exist until the parent entry has
//! succeeded, so they are only bound and dispatched once it has. If the parent fails, the
//! deferred subtree is never issued.
//!
//! ## Topologies
//!
//! | mode | roots | deferred |
//! |---|---|---|
//! | `std_copy` | copy per student | |
//! | `dist_share_same` | one share to every student | |
//! | `group_copy` | copy per group | share of the group copy per member |
//! | `grouping_copy` | copy per grouping | share per group, then per member of that group |
//! | `std_copy_group[ing]` | folder per container | copy into the folder per member |
//! | `dist_share_same_group[ing]` | share per non-empty container | |
//!
//! Combined modes plan their group and grouping halves on separate [`Lane`]s so completion can
//! be tracked per half.

use std::collections::{BTreeMap, HashSet};
use std::fmt::{self, Write};

use thiserror::Error;

use crate::mode::{ContainerStrategy, Topology};
use crate::roster::{GroupRoster, GroupingRoster};
use crate::{CourseId, DistributionMode, DocumentId, Principal, PrincipalId, Roster, SourceDocument};


//================================================================================================
// Types
//================================================================================================

/// Errors raised while planning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// The roster resolved to nobody who would receive the document.
    #[error("no recipients resolved for a `{0}` distribution")]
    NoRecipients(DistributionMode),
}

/// The position of an entry in its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// The provider call an entry performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Copy the source document, into the parent folder if the parent is one.
    Copy,
    /// Grant access to the parent document.
    Share,
    /// Create a folder for later copies.
    CreateFolder,
}

/// What an entry derives from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parent {
    /// Only the source document, which already exists.
    Source,
    /// The document produced by another entry.
    Node(NodeId),
}

/// An independently tracked half of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lane {
    /// Course-wide distribution.
    Course,
    /// Distribution through groups.
    Groups,
    /// Distribution through groupings.
    Groupings,
}

/// Who an entry delivers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// One student, group or grouping.
    Principal(Principal),
    /// Every member of the course or of a container, reached through a single share.
    Audience {
        /// Whose members these are.
        scope: Scope,
        /// The members covered.
        members: Vec<Principal>,
    },
}

/// The owner of an [`Recipient::Audience`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every enrolled student of a course.
    Course(CourseId),
    /// The members of a group or grouping.
    Container(Principal),
}

/// One provider call in a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    id: NodeId,
    lane: Lane,
    operation: Operation,
    recipient: Recipient,
    parent: Parent,
    container: Option<PrincipalId>,
    children: Vec<NodeId>,
}

/// The dependency graph of provider calls for one distribution.
#[derive(Debug, Clone)]
pub struct FanoutPlan {
    mode: DistributionMode,
    source: DocumentId,
    entries: Vec<PlanEntry>,
    roots: Vec<NodeId>,
}

struct Builder {
    entries: Vec<PlanEntry>,
    roots: Vec<NodeId>,
    seen: HashSet<(String, Parent)>,
}

//================================================================================================
// Impls
//================================================================================================

impl NodeId {
    /// The index of the entry in plan order.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Copy => "copy",
            Operation::Share => "share",
            Operation::CreateFolder => "folder",
        })
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lane::Course => "course",
            Lane::Groups => "groups",
            Lane::Groupings => "groupings",
        })
    }
}

impl Recipient {
    /// The name copies for this recipient are suffixed with.
    pub fn name(&self) -> &str {
        match self {
            Recipient::Principal(p) => &p.name,
            Recipient::Audience {
                scope: Scope::Course(course),
                ..
            } => course.as_str(),
            Recipient::Audience {
                scope: Scope::Container(p),
                ..
            } => &p.name,
        }
    }

    /// Every principal the provider grants access to.
    pub fn grantees(&self) -> Vec<Principal> {
        match self {
            Recipient::Principal(p) => vec![p.clone()],
            Recipient::Audience { members, .. } => members.clone(),
        }
    }

    /// How many students this recipient accounts for.
    pub fn leaf_count(&self) -> usize {
        match self {
            Recipient::Principal(p) if p.kind == crate::PrincipalKind::Student => 1,
            Recipient::Principal(_) => 0,
            Recipient::Audience { members, .. } => members.len(),
        }
    }

    fn key(&self) -> String {
        match self {
            Recipient::Principal(p) => format!("{}:{}", p.kind, p.id),
            Recipient::Audience {
                scope: Scope::Course(c),
                ..
            } => format!("course:{c}"),
            Recipient::Audience {
                scope: Scope::Container(p),
                ..
            } => format!("audience:{}:{}", p.kind, p.id),
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Principal(p) => write!(f, "{p}"),
            Recipient::Audience {
                scope: Scope::Course(c),
                members,
            } => write!(f, "course {c} ({} members)", members.len()),
            Recipient::Audience {
                scope: Scope::Container(p),
                members,
            } => write!(f, "{} {} ({}, {} members)", p.kind, p.id, p.name, members.len()),
        }
    }
}

impl PlanEntry {
    /// This entry's id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The lane this entry is counted on.
    pub fn lane(&self) -> Lane {
        self.lane
    }

    /// The provider call performed.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Who the entry delivers to.
    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    /// What the entry derives from.
    pub fn parent(&self) -> Parent {
        self.parent
    }

    /// The group or grouping the delivery was made through, if any.
    pub fn container(&self) -> Option<&PrincipalId> {
        self.container.as_ref()
    }

    /// Entries deferred until this one succeeds.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The document made redundant once this entry succeeds.
    ///
    /// A copy taken from the source supersedes it; shares and folders supersede nothing.
    pub fn supersedes(&self) -> Option<Parent> {
        match self.operation {
            Operation::Copy => Some(Parent::Source),
            Operation::Share | Operation::CreateFolder => None,
        }
    }
}

impl FanoutPlan {
    /// The mode this plan was built for.
    pub fn mode(&self) -> DistributionMode {
        self.mode
    }

    /// The source document the plan distributes.
    pub fn source(&self) -> &DocumentId {
        &self.source
    }

    /// Every entry, roots and deferred, in plan order.
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Looks up an entry.
    pub fn entry(&self, id: NodeId) -> Option<&PlanEntry> {
        self.entries.get(id.0)
    }

    /// Entries that can be dispatched immediately.
    pub fn roots(&self) -> impl Iterator<Item = &PlanEntry> {
        self.roots.iter().filter_map(|id| self.entry(*id))
    }

    /// The number of roots counted on each lane.
    ///
    /// Every lane the mode uses is present, even when it has no roots.
    pub fn lanes(&self) -> BTreeMap<Lane, usize> {
        let mut lanes: BTreeMap<Lane, usize> = lanes_of(self.mode).map(|l| (l, 0)).collect();
        for root in self.roots() {
            *lanes.entry(root.lane).or_default() += 1;
        }
        lanes
    }

    /// How many students the plan reaches, counting one per student delivery.
    pub fn leaf_count(&self) -> usize {
        self.entries.iter().map(|e| e.recipient.leaf_count()).sum()
    }

    /// Renders the plan as an indented tree.
    pub fn render(&self) -> String {
        let mut out = format!("{} from {}\n", self.mode, self.source);
        for root in &self.roots {
            self.render_node(*root, 0, &mut out);
        }
        out
    }

    fn render_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(entry) = self.entry(id) else {
            return;
        };
        let _ = writeln!(
            out,
            "{:indent$}{} {} -> {}",
            "",
            entry.id,
            entry.operation,
            entry.recipient,
            indent = depth * 2
        );
        for child in &entry.children {
            self.render_node(*child, depth + 1, out);
        }
    }
}

impl Builder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            roots: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Adds an entry, returning `None` if an entry for the same recipient and parent exists.
    fn push(
        &mut self,
        lane: Lane,
        operation: Operation,
        recipient: Recipient,
        parent: Parent,
        container: Option<&PrincipalId>,
    ) -> Option<NodeId> {
        if !self.seen.insert((recipient.key(), parent)) {
            tracing::debug!(recipient = %recipient, "skipping duplicate plan entry");
            return None;
        }
        let id = NodeId(self.entries.len());
        self.entries.push(PlanEntry {
            id,
            lane,
            operation,
            recipient,
            parent,
            container: container.cloned(),
            children: Vec::new(),
        });
        match parent {
            Parent::Source => self.roots.push(id),
            Parent::Node(p) => self.entries[p.0].children.push(id),
        }
        Some(id)
    }

    fn students(&mut self, course: &CourseId, students: &[Principal], shared: bool) {
        if shared {
            if !students.is_empty() {
                let audience = Recipient::Audience {
                    scope: Scope::Course(course.clone()),
                    members: students.to_vec(),
                };
                self.push(Lane::Course, Operation::Share, audience, Parent::Source, None);
            }
            return;
        }
        for student in students {
            let recipient = Recipient::Principal(student.clone());
            self.push(Lane::Course, Operation::Copy, recipient, Parent::Source, None);
        }
    }

    fn group(&mut self, group: &GroupRoster, strategy: ContainerStrategy) {
        self.container(Lane::Groups, &group.group, &group.members, strategy);
    }

    fn grouping(&mut self, grouping: &GroupingRoster, strategy: ContainerStrategy) {
        let lane = Lane::Groupings;
        let id = &grouping.grouping.id;
        match strategy {
            ContainerStrategy::Copy => {
                let recipient = Recipient::Principal(grouping.grouping.clone());
                let Some(copy) = self.push(lane, Operation::Copy, recipient, Parent::Source, Some(id))
                else {
                    return;
                };
                for group in &grouping.groups {
                    let recipient = Recipient::Principal(group.group.clone());
                    let Some(share) =
                        self.push(lane, Operation::Share, recipient, Parent::Node(copy), Some(id))
                    else {
                        continue;
                    };
                    for member in &group.members {
                        let recipient = Recipient::Principal(member.clone());
                        self.push(lane, Operation::Share, recipient, Parent::Node(share), Some(id));
                    }
                }
            },
            ContainerStrategy::Folder | ContainerStrategy::SharedInPlace => {
                self.container(lane, &grouping.grouping, &grouping.members, strategy)
            },
        }
    }

    /// Plans a single-level container: one root for the container, members underneath.
    fn container(
        &mut self,
        lane: Lane,
        container: &Principal,
        members: &[Principal],
        strategy: ContainerStrategy,
    ) {
        let id = &container.id;
        let (operation, child) = match strategy {
            ContainerStrategy::Copy => (Operation::Copy, Operation::Share),
            ContainerStrategy::Folder => (Operation::CreateFolder, Operation::Copy),
            ContainerStrategy::SharedInPlace => {
                if !members.is_empty() {
                    let audience = Recipient::Audience {
                        scope: Scope::Container(container.clone()),
                        members: members.to_vec(),
                    };
                    self.push(lane, Operation::Share, audience, Parent::Source, Some(id));
                }
                return;
            },
        };
        let recipient = Recipient::Principal(container.clone());
        let Some(node) = self.push(lane, operation, recipient, Parent::Source, Some(id)) else {
            return;
        };
        for member in members {
            let recipient = Recipient::Principal(member.clone());
            self.push(lane, child, recipient, Parent::Node(node), Some(id));
        }
    }

    fn finish(self, mode: DistributionMode, source: &SourceDocument) -> FanoutPlan {
        FanoutPlan {
            mode,
            source: source.id.clone(),
            entries: self.entries,
            roots: self.roots,
        }
    }
}

//================================================================================================
// Functions
//================================================================================================

/// Computes the fan-out plan for distributing `source` to `roster` under `mode`.
///
/// Entries follow the roster's enumeration order. Containers are planned even when empty, but a
/// plan that reaches no student at all is rejected with [`PlanError::NoRecipients`].
pub fn plan(
    mode: DistributionMode,
    source: &SourceDocument,
    roster: &Roster,
) -> Result<FanoutPlan, PlanError> {
    let mut builder = Builder::new();

    match mode.topology() {
        Topology::Individual { shared } => {
            builder.students(roster.course(), roster.students(), shared)
        },
        Topology::Containers { scope, strategy } => {
            if scope.groups() {
                for group in roster.groups() {
                    builder.group(group, strategy);
                }
            }
            if scope.groupings() {
                for grouping in roster.groupings() {
                    builder.grouping(grouping, strategy);
                }
            }
        },
    }

    let plan = builder.finish(mode, source);
    if plan.leaf_count() == 0 {
        return Err(PlanError::NoRecipients(mode));
    }

    tracing::debug!(
        %mode,
        plan.entries = plan.entries.len(),
        plan.roots = plan.roots.len(),
        plan.leaves = plan.leaf_count(),
    );

    Ok(plan)
}

fn lanes_of(mode: DistributionMode) -> impl Iterator<Item = Lane> {
    let lanes: &[Lane] = match mode.topology() {
        Topology::Individual { .. } => &[Lane::Course],
        Topology::Containers { scope, .. } => match (scope.groups(), scope.groupings()) {
            (true, true) => &[Lane::Groups, Lane::Groupings],
            (true, false) => &[Lane::Groups],
            _ => &[Lane::Groupings],
        },
    };
    lanes.iter().copied()
}
