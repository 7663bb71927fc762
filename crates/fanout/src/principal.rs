//! # Principals
//!
//! Students, groups and groupings are the targets a document can be shared with. They are
//! sourced from the directory and never mutated here.

use std::fmt;

use serde::{Deserialize, Serialize};

//================================================================================================
// Types
//================================================================================================

/// The identifier of a student, group or grouping, as assigned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

/// The identifier of a course.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(String);

/// Discriminates what sort of sharing target a [`Principal`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// An individual enrolled student.
    Student,
    /// A group of students.
    Group,
    /// A grouping, i.e. a set of groups.
    Grouping,
}

/// A student, group or grouping that can be a sharing target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// The directory identifier.
    pub id: PrincipalId,
    /// A human readable name, used when naming copies.
    pub name: String,
    /// The address used for individual sharing, if the principal has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// What kind of principal this is.
    pub kind: PrincipalKind,
}

//================================================================================================
// Impls
//================================================================================================

impl PrincipalId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PrincipalId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for PrincipalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl CourseId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CourseId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrincipalKind::Student => "student",
            PrincipalKind::Group => "group",
            PrincipalKind::Grouping => "grouping",
        })
    }
}

impl Principal {
    /// Constructs a student principal.
    pub fn student(id: impl Into<PrincipalId>, name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email,
            kind: PrincipalKind::Student,
        }
    }

    /// Constructs a group principal.
    pub fn group(id: impl Into<PrincipalId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            kind: PrincipalKind::Group,
        }
    }

    /// Constructs a grouping principal.
    pub fn grouping(id: impl Into<PrincipalId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            kind: PrincipalKind::Grouping,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.id, self.name)
    }
}
