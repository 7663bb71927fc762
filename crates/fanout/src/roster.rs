//! # Course Rosters
//!
//! The directory (enrolment, groups and groupings) is an external service reached through the
//! [`Directory`] trait. A distribution never talks to it directly: the activity's roster is
//! resolved once into a [`Roster`] snapshot, fetching only what the distribution mode needs, and
//! the planner works from that snapshot.
//!
//! Enumeration order is whatever order the directory returns, and it is preserved all the way
//! into the plan.

use std::collections::HashSet;

use async_trait::async_trait;
use membership::Membership;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CourseId, DistributionMode, Principal, PrincipalId};

//================================================================================================
// Types
//================================================================================================

/// Errors raised while reading the directory.
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// The directory has no such course.
    #[error("unknown course `{0}`")]
    UnknownCourse(CourseId),
    /// A group, grouping or student id did not resolve.
    #[error("unknown principal `{0}`")]
    UnknownPrincipal(PrincipalId),
    /// A roster file could not be parsed.
    #[error(transparent)]
    Parse(#[from] toml_edit::de::Error),
    /// The directory could not be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// The course directory, consumed as an external service.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Every student enrolled in the course.
    async fn course_students(&self, course: &CourseId) -> Result<Vec<Principal>, DirectoryError>;
    /// Every group defined in the course.
    async fn course_groups(&self, course: &CourseId) -> Result<Vec<Principal>, DirectoryError>;
    /// Every grouping defined in the course.
    async fn course_groupings(&self, course: &CourseId) -> Result<Vec<Principal>, DirectoryError>;
    /// The students in a group.
    async fn group_members(&self, group: &PrincipalId) -> Result<Vec<Principal>, DirectoryError>;
    /// The groups that make up a grouping.
    async fn grouping_groups(&self, grouping: &PrincipalId)
    -> Result<Vec<Principal>, DirectoryError>;
    /// The students in any group of a grouping, each listed once.
    async fn grouping_members(
        &self,
        grouping: &PrincipalId,
    ) -> Result<Vec<Principal>, DirectoryError>;
}

/// Which groups and groupings an activity distributes through.
///
/// An empty list means every group (or grouping) of the course.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Selected group ids.
    #[serde(default)]
    pub groups: Vec<PrincipalId>,
    /// Selected grouping ids.
    #[serde(default)]
    pub groupings: Vec<PrincipalId>,
}

/// A group and its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRoster {
    /// The group itself.
    pub group: Principal,
    /// Its members, in directory order.
    pub members: Vec<Principal>,
}

/// A grouping, its groups and its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupingRoster {
    /// The grouping itself.
    pub grouping: Principal,
    /// The groups inside it.
    pub groups: Vec<GroupRoster>,
    /// Every student in any of its groups.
    pub members: Vec<Principal>,
}

/// A resolved snapshot of the part of a course a distribution needs.
#[derive(Debug, Clone)]
pub struct Roster {
    course: CourseId,
    students: Vec<Principal>,
    groups: Vec<GroupRoster>,
    groupings: Vec<GroupingRoster>,
    membership: Membership<PrincipalId, PrincipalId>,
}

/// An in-memory directory, typically loaded from a TOML roster file.
///
/// ```toml
/// course = "bio101"
///
/// [[students]]
/// id = "s1"
/// name = "Ada"
/// email = "ada@example.edu"
///
/// [[groups]]
/// id = "g1"
/// name = "Red"
/// members = ["s1"]
///
/// [[groupings]]
/// id = "gg1"
/// name = "Lab A"
/// groups = ["g1"]
/// ```
#[derive(Debug, Clone)]
pub struct StaticDirectory {
    course: CourseId,
    students: Vec<Principal>,
    groups: Vec<(Principal, Vec<PrincipalId>)>,
    groupings: Vec<(Principal, Vec<PrincipalId>)>,
}

#[derive(Deserialize)]
struct RosterFile {
    course: CourseId,
    #[serde(default)]
    students: Vec<StudentEntry>,
    #[serde(default)]
    groups: Vec<ContainerEntry>,
    #[serde(default)]
    groupings: Vec<GroupingEntry>,
}

#[derive(Deserialize)]
struct StudentEntry {
    id: PrincipalId,
    name: String,
    email: Option<String>,
}

#[derive(Deserialize)]
struct ContainerEntry {
    id: PrincipalId,
    name: String,
    #[serde(default)]
    members: Vec<PrincipalId>,
}

#[derive(Deserialize)]
struct GroupingEntry {
    id: PrincipalId,
    name: String,
    #[serde(default)]
    groups: Vec<PrincipalId>,
}

//================================================================================================
// Impls
//================================================================================================

impl Roster {
    /// An empty roster for the given course.
    pub fn new(course: CourseId) -> Self {
        Self {
            course,
            students: Vec::new(),
            groups: Vec::new(),
            groupings: Vec::new(),
            membership: Membership::new(),
        }
    }

    /// Resolves the roster a distribution in `mode` needs from the directory.
    #[tracing::instrument(skip_all, fields(%course, %mode))]
    pub async fn resolve<D: Directory + ?Sized>(
        directory: &D,
        course: &CourseId,
        mode: DistributionMode,
        selection: &Selection,
    ) -> Result<Roster, DirectoryError> {
        let mut roster = Roster::new(course.clone());

        if mode.requires_students() {
            for student in directory.course_students(course).await? {
                roster.push_student(student);
            }
        }

        if mode.requires_groups() {
            let groups = select(directory.course_groups(course).await?, &selection.groups);
            for group in groups {
                let members = directory.group_members(&group.id).await?;
                roster.push_group(GroupRoster { group, members });
            }
        }

        if mode.requires_groupings() {
            let groupings = select(
                directory.course_groupings(course).await?,
                &selection.groupings,
            );
            for grouping in groupings {
                let mut groups = Vec::new();
                for group in directory.grouping_groups(&grouping.id).await? {
                    let members = directory.group_members(&group.id).await?;
                    groups.push(GroupRoster { group, members });
                }
                let members = directory.grouping_members(&grouping.id).await?;
                roster.push_grouping(GroupingRoster {
                    grouping,
                    groups,
                    members,
                });
            }
        }

        tracing::debug!(
            roster.students = roster.students.len(),
            roster.groups = roster.groups.len(),
            roster.groupings = roster.groupings.len(),
        );

        Ok(roster)
    }

    /// Adds a course-level student.
    pub fn push_student(&mut self, student: Principal) {
        self.students.push(student);
    }

    /// Adds a group and records its members.
    pub fn push_group(&mut self, group: GroupRoster) {
        self.membership.insert(
            group.group.id.clone(),
            group.members.iter().map(|m| m.id.clone()),
        );
        self.groups.push(group);
    }

    /// Adds a grouping and records its members.
    pub fn push_grouping(&mut self, grouping: GroupingRoster) {
        self.membership.insert(
            grouping.grouping.id.clone(),
            grouping.members.iter().map(|m| m.id.clone()),
        );
        self.groupings.push(grouping);
    }

    /// The course this roster belongs to.
    pub fn course(&self) -> &CourseId {
        &self.course
    }

    /// Course-level students.
    pub fn students(&self) -> &[Principal] {
        &self.students
    }

    /// Resolved groups.
    pub fn groups(&self) -> &[GroupRoster] {
        &self.groups
    }

    /// Resolved groupings.
    pub fn groupings(&self) -> &[GroupingRoster] {
        &self.groupings
    }

    /// The groups and groupings a student belongs to.
    ///
    /// A student sitting in several containers receives one result per container in the
    /// container-based modes.
    pub fn containers_of(&self, student: &PrincipalId) -> impl Iterator<Item = &PrincipalId> {
        self.membership.containers_of(student)
    }
}

impl StaticDirectory {
    /// Parses and validates a TOML roster file.
    pub fn from_toml(toml: &str) -> Result<Self, DirectoryError> {
        let file: RosterFile = toml_edit::de::from_str(toml)?;

        let known: HashSet<_> = file.students.iter().map(|s| s.id.clone()).collect();
        for group in &file.groups {
            if let Some(unknown) = group.members.iter().find(|m| !known.contains(*m)) {
                return Err(DirectoryError::UnknownPrincipal(unknown.clone()));
            }
        }
        let group_ids: HashSet<_> = file.groups.iter().map(|g| g.id.clone()).collect();
        for grouping in &file.groupings {
            if let Some(unknown) = grouping.groups.iter().find(|g| !group_ids.contains(*g)) {
                return Err(DirectoryError::UnknownPrincipal(unknown.clone()));
            }
        }

        Ok(Self {
            course: file.course,
            students: file
                .students
                .into_iter()
                .map(|s| Principal::student(s.id, s.name, s.email))
                .collect(),
            groups: file
                .groups
                .into_iter()
                .map(|g| (Principal::group(g.id, g.name), g.members))
                .collect(),
            groupings: file
                .groupings
                .into_iter()
                .map(|g| (Principal::grouping(g.id, g.name), g.groups))
                .collect(),
        })
    }

    /// The course the roster file describes.
    pub fn course(&self) -> &CourseId {
        &self.course
    }

    fn check(&self, course: &CourseId) -> Result<(), DirectoryError> {
        if &self.course == course {
            Ok(())
        } else {
            Err(DirectoryError::UnknownCourse(course.clone()))
        }
    }

    fn students_by_id<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a PrincipalId>,
    ) -> Result<Vec<Principal>, DirectoryError> {
        ids.into_iter()
            .map(|id| {
                self.students
                    .iter()
                    .find(|s| &s.id == id)
                    .cloned()
                    .ok_or_else(|| DirectoryError::UnknownPrincipal(id.clone()))
            })
            .collect()
    }

    fn group_entry(&self, id: &PrincipalId) -> Result<&(Principal, Vec<PrincipalId>), DirectoryError> {
        self.groups
            .iter()
            .find(|(g, _)| &g.id == id)
            .ok_or_else(|| DirectoryError::UnknownPrincipal(id.clone()))
    }

    fn grouping_entry(
        &self,
        id: &PrincipalId,
    ) -> Result<&(Principal, Vec<PrincipalId>), DirectoryError> {
        self.groupings
            .iter()
            .find(|(g, _)| &g.id == id)
            .ok_or_else(|| DirectoryError::UnknownPrincipal(id.clone()))
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn course_students(&self, course: &CourseId) -> Result<Vec<Principal>, DirectoryError> {
        self.check(course)?;
        Ok(self.students.clone())
    }

    async fn course_groups(&self, course: &CourseId) -> Result<Vec<Principal>, DirectoryError> {
        self.check(course)?;
        Ok(self.groups.iter().map(|(g, _)| g.clone()).collect())
    }

    async fn course_groupings(&self, course: &CourseId) -> Result<Vec<Principal>, DirectoryError> {
        self.check(course)?;
        Ok(self.groupings.iter().map(|(g, _)| g.clone()).collect())
    }

    async fn group_members(&self, group: &PrincipalId) -> Result<Vec<Principal>, DirectoryError> {
        let (_, members) = self.group_entry(group)?;
        self.students_by_id(members)
    }

    async fn grouping_groups(
        &self,
        grouping: &PrincipalId,
    ) -> Result<Vec<Principal>, DirectoryError> {
        let (_, groups) = self.grouping_entry(grouping)?;
        groups
            .iter()
            .map(|id| self.group_entry(id).map(|(g, _)| g.clone()))
            .collect()
    }

    async fn grouping_members(
        &self,
        grouping: &PrincipalId,
    ) -> Result<Vec<Principal>, DirectoryError> {
        let (_, groups) = self.grouping_entry(grouping)?;
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for id in groups {
            let (_, members) = self.group_entry(id)?;
            ids.extend(members.iter().filter(|m| seen.insert(*m)));
        }
        self.students_by_id(ids)
    }
}

//================================================================================================
// Functions
//================================================================================================

/// Keeps the directory's order, restricted to the selection when one is given.
fn select(all: Vec<Principal>, selected: &[PrincipalId]) -> Vec<Principal> {
    if selected.is_empty() {
        return all;
    }
    for id in selected {
        if !all.iter().any(|p| &p.id == id) {
            tracing::warn!(principal = %id, "selected container no longer exists in the course, skipping");
        }
    }
    all.into_iter()
        .filter(|p| selected.contains(&p.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::COURSE_TOML;

    #[test]
    fn rejects_unknown_members() {
        let toml = r#"
course = "c"

[[students]]
id = "s1"
name = "Ada"

[[groups]]
id = "g1"
name = "Red"
members = ["s1", "s9"]
"#;
        let err = StaticDirectory::from_toml(toml).unwrap_err();
        assert!(matches!(err, DirectoryError::UnknownPrincipal(id) if id.as_str() == "s9"));
    }

    #[tokio::test]
    async fn resolves_only_what_the_mode_needs() -> anyhow::Result<()> {
        let dir = StaticDirectory::from_toml(COURSE_TOML)?;
        let course = dir.course().clone();

        let roster =
            Roster::resolve(&dir, &course, DistributionMode::StdCopy, &Selection::default()).await?;
        assert_eq!(roster.students().len(), 4);
        assert!(roster.groups().is_empty());

        let roster = Roster::resolve(
            &dir,
            &course,
            DistributionMode::GroupGroupingCopy,
            &Selection::default(),
        )
        .await?;
        assert!(roster.students().is_empty());
        assert_eq!(roster.groups().len(), 3);
        assert_eq!(roster.groupings().len(), 1);
        // ada is in `red` and in `lab-a`
        assert_eq!(roster.containers_of(&"ada".into()).count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn selection_restricts_and_keeps_order() -> anyhow::Result<()> {
        let dir = StaticDirectory::from_toml(COURSE_TOML)?;
        let selection = Selection {
            groups: vec!["blue".into(), "red".into(), "gone".into()],
            groupings: Vec::new(),
        };
        let roster =
            Roster::resolve(&dir, dir.course(), DistributionMode::GroupCopy, &selection).await?;
        let ids: Vec<_> = roster.groups().iter().map(|g| g.group.id.as_str()).collect();
        assert_eq!(ids, ["red", "blue"]);
        Ok(())
    }

    #[tokio::test]
    async fn grouping_members_are_unique() -> anyhow::Result<()> {
        let dir = StaticDirectory::from_toml(COURSE_TOML)?;
        let members = dir.grouping_members(&"lab-a".into()).await?;
        let ids: Vec<_> = members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["ada", "grace", "alan"]);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_course() -> anyhow::Result<()> {
        let dir = StaticDirectory::from_toml(COURSE_TOML)?;
        let err = dir.course_students(&"chem".into()).await.unwrap_err();
        assert!(matches!(err, DirectoryError::UnknownCourse(_)));
        Ok(())
    }
}
