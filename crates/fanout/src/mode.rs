//! # Distribution Modes
//!
//! A distribution mode is fixed when an activity is created and decides the shape of every
//! fan-out performed for it. Modes are a closed set: the planner matches on a mode's
//! [`Topology`] exhaustively, so a new mode cannot be added without deciding how it plans.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

//================================================================================================
// Types
//================================================================================================

/// The policy deciding who receives what when a source document is distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionMode {
    /// Each student receives their own copy.
    StdCopy,
    /// Every student shares the source document itself.
    DistShareSame,
    /// One copy per group, shared with each member of the group.
    GroupCopy,
    /// One copy per grouping, shared with every group in it and their members.
    GroupingCopy,
    /// A folder per group, holding an individual copy for each member.
    StdCopyGroup,
    /// A folder per grouping, holding an individual copy for each member.
    StdCopyGrouping,
    /// [`GroupCopy`](Self::GroupCopy) and [`GroupingCopy`](Self::GroupingCopy) together.
    GroupGroupingCopy,
    /// [`StdCopyGroup`](Self::StdCopyGroup) and [`StdCopyGrouping`](Self::StdCopyGrouping)
    /// together.
    StdCopyGroupGrouping,
    /// The source document is shared with the members of each group.
    DistShareSameGroup,
    /// The source document is shared with the members of each grouping.
    DistShareSameGrouping,
    /// The source document is shared with the members of each group and grouping.
    DistShareSameGroupGrouping,
}

/// Which containers a container-based mode distributes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The course's groups.
    Groups,
    /// The course's groupings.
    Groupings,
    /// Groups and groupings, planned independently.
    Both,
}

/// What a container-based mode does for each container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStrategy {
    /// Copy the source once per container, then share that copy downwards.
    Copy,
    /// Create a folder per container, then copy the source into it once per member.
    Folder,
    /// Share the source itself with the container's members.
    SharedInPlace,
}

/// The fan-out shape of a [`DistributionMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Course-wide distribution directly to students.
    Individual {
        /// Whether students share the source rather than receiving copies.
        shared: bool,
    },
    /// Distribution through groups and/or groupings.
    Containers {
        /// Which containers are involved.
        scope: Scope,
        /// What happens per container.
        strategy: ContainerStrategy,
    },
}

/// The error returned when a string does not name a known mode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown distribution mode `{0}`")]
pub struct UnknownMode(String);

//================================================================================================
// Impls
//================================================================================================

impl DistributionMode {
    /// Every mode, in declaration order.
    pub const ALL: [DistributionMode; 11] = [
        DistributionMode::StdCopy,
        DistributionMode::DistShareSame,
        DistributionMode::GroupCopy,
        DistributionMode::GroupingCopy,
        DistributionMode::StdCopyGroup,
        DistributionMode::StdCopyGrouping,
        DistributionMode::GroupGroupingCopy,
        DistributionMode::StdCopyGroupGrouping,
        DistributionMode::DistShareSameGroup,
        DistributionMode::DistShareSameGrouping,
        DistributionMode::DistShareSameGroupGrouping,
    ];

    /// The wire name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            DistributionMode::StdCopy => "std_copy",
            DistributionMode::DistShareSame => "dist_share_same",
            DistributionMode::GroupCopy => "group_copy",
            DistributionMode::GroupingCopy => "grouping_copy",
            DistributionMode::StdCopyGroup => "std_copy_group",
            DistributionMode::StdCopyGrouping => "std_copy_grouping",
            DistributionMode::GroupGroupingCopy => "group_grouping_copy",
            DistributionMode::StdCopyGroupGrouping => "std_copy_group_grouping",
            DistributionMode::DistShareSameGroup => "dist_share_same_group",
            DistributionMode::DistShareSameGrouping => "dist_share_same_grouping",
            DistributionMode::DistShareSameGroupGrouping => "dist_share_same_group_grouping",
        }
    }

    /// The fan-out shape this mode plans.
    pub fn topology(self) -> Topology {
        use ContainerStrategy::*;
        use Scope::*;
        let containers = |scope, strategy| Topology::Containers { scope, strategy };
        match self {
            DistributionMode::StdCopy => Topology::Individual { shared: false },
            DistributionMode::DistShareSame => Topology::Individual { shared: true },
            DistributionMode::GroupCopy => containers(Groups, Copy),
            DistributionMode::GroupingCopy => containers(Groupings, Copy),
            DistributionMode::StdCopyGroup => containers(Groups, Folder),
            DistributionMode::StdCopyGrouping => containers(Groupings, Folder),
            DistributionMode::GroupGroupingCopy => containers(Both, Copy),
            DistributionMode::StdCopyGroupGrouping => containers(Both, Folder),
            DistributionMode::DistShareSameGroup => containers(Groups, SharedInPlace),
            DistributionMode::DistShareSameGrouping => containers(Groupings, SharedInPlace),
            DistributionMode::DistShareSameGroupGrouping => containers(Both, SharedInPlace),
        }
    }

    /// Whether planning needs every enrolled student of the course.
    pub fn requires_students(self) -> bool {
        matches!(self.topology(), Topology::Individual { .. })
    }

    /// Whether planning needs the course's groups.
    pub fn requires_groups(self) -> bool {
        matches!(
            self.topology(),
            Topology::Containers {
                scope: Scope::Groups | Scope::Both,
                ..
            }
        )
    }

    /// Whether planning needs the course's groupings.
    pub fn requires_groupings(self) -> bool {
        matches!(
            self.topology(),
            Topology::Containers {
                scope: Scope::Groupings | Scope::Both,
                ..
            }
        )
    }
}

impl fmt::Display for DistributionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistributionMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DistributionMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMode(s.to_owned()))
    }
}

impl Scope {
    /// Whether groups are planned.
    pub fn groups(self) -> bool {
        matches!(self, Scope::Groups | Scope::Both)
    }

    /// Whether groupings are planned.
    pub fn groupings(self) -> bool {
        matches!(self, Scope::Groupings | Scope::Both)
    }
}
