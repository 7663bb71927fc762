//! # Membership
//!
//! A `no_std` compatible index for many-to-many membership relationships.
//!
//! A course roster is a set of members (students) partitioned, possibly more than once, into
//! containers (groups and groupings). A single student may sit in several containers and a
//! container may hold any number of students, including none at all. [`Membership`] keeps both
//! directions of that relation so either side can be queried cheaply.
//!
//! ## Example
//!
//! ```
//! use membership::Membership;
//!
//! let mut index = Membership::new();
//! index.insert("red-team", ["ada", "grace"]);
//! index.insert("lab-a", ["ada"]);
//!
//! assert_eq!(index.containers_of(&"ada").count(), 2);
//! assert_eq!(index.members_of(&"red-team").count(), 2);
//! ```

#![no_std]
extern crate alloc;

use alloc::collections::btree_map::Entry;
use alloc::collections::{BTreeMap, BTreeSet};
use core::fmt;

/// A member of one or more containers.
pub trait Member: Ord + Clone + fmt::Debug {}
impl<T: Ord + Clone + fmt::Debug> Member for T {}

/// A container that groups members together.
pub trait Container: Ord + Clone + fmt::Debug {}
impl<T: Ord + Clone + fmt::Debug> Container for T {}

/// A bidirectional membership index.
///
/// `BTreeMap` and `BTreeSet` are used internally so iteration order is deterministic and
/// lookups are logarithmic. Containers with no members are retained, since an empty group is
/// still a meaningful part of a roster.
#[derive(Debug, Clone)]
pub struct Membership<M, C> {
    /// Maps each member to the containers it belongs to
    member_to_containers: BTreeMap<M, BTreeSet<C>>,
    /// Maps each container to the members it holds
    container_to_members: BTreeMap<C, BTreeSet<M>>,
}

impl<M: Member, C: Container> Default for Membership<M, C> {
    fn default() -> Self {
        Self {
            member_to_containers: BTreeMap::new(),
            container_to_members: BTreeMap::new(),
        }
    }
}

impl<M: Member, C: Container> Membership<M, C> {
    #[inline]
    /// Creates a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `container` holds the given members.
    ///
    /// Returns `true` if the container was newly inserted. Inserting an existing container again
    /// adds the new members to it.
    pub fn insert(&mut self, container: C, members: impl IntoIterator<Item = M>) -> bool {
        let fresh = !self.container_to_members.contains_key(&container);
        let set = self.container_to_members.entry(container.clone()).or_default();
        for m in members {
            self.member_to_containers
                .entry(m.clone())
                .or_default()
                .insert(container.clone());
            set.insert(m);
        }
        fresh
    }

    /// Removes a container and returns the members it was holding.
    ///
    /// Returns `None` if the container didn't exist.
    pub fn remove_container(&mut self, container: &C) -> Option<BTreeSet<M>> {
        let members = self.container_to_members.remove(container)?;
        for m in &members {
            if let Entry::Occupied(mut ent) = self.member_to_containers.entry(m.clone()) {
                ent.get_mut().remove(container);
                if ent.get().is_empty() {
                    ent.remove();
                }
            }
        }
        Some(members)
    }

    #[inline]
    /// Returns an iterator over every member of the given container.
    pub fn members_of(&self, container: &C) -> impl Iterator<Item = &M> {
        self.container_to_members.get(container).into_iter().flatten()
    }

    #[inline]
    /// Returns an iterator over every container the given member belongs to.
    pub fn containers_of(&self, member: &M) -> impl Iterator<Item = &C> {
        self.member_to_containers.get(member).into_iter().flatten()
    }

    /// Whether `member` belongs to `container`.
    pub fn is_member(&self, member: &M, container: &C) -> bool {
        self.member_to_containers
            .get(member)
            .is_some_and(|set| set.contains(container))
    }

    #[inline]
    /// The number of known containers, empty ones included.
    pub fn container_count(&self) -> usize {
        self.container_to_members.len()
    }

    #[inline]
    /// The number of members that belong to at least one container.
    pub fn member_count(&self) -> usize {
        self.member_to_containers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic() {
        let mut idx = Membership::<&str, &str>::new();
        assert!(idx.insert("g1", ["a", "b"]));
        assert!(!idx.insert("g1", ["c"]));
        assert_eq!(idx.members_of(&"g1").count(), 3);
        assert!(idx.is_member(&"c", &"g1"));
    }

    #[test]
    fn empty_container_is_kept() {
        let mut idx = Membership::<&str, &str>::new();
        idx.insert("empty", []);
        assert_eq!(idx.container_count(), 1);
        assert_eq!(idx.member_count(), 0);
        assert_eq!(idx.members_of(&"empty").count(), 0);
    }

    #[test]
    fn member_in_several_containers() {
        let mut idx = Membership::<&str, &str>::new();
        idx.insert("g1", ["a", "b"]);
        idx.insert("g2", ["a"]);

        let containers: alloc::vec::Vec<_> = idx.containers_of(&"a").collect();
        assert_eq!(containers, [&"g1", &"g2"]);

        let removed = idx.remove_container(&"g1").map(|s| s.len());
        assert_eq!(removed, Some(2));
        assert_eq!(idx.containers_of(&"a").count(), 1);
        // `b` no longer belongs anywhere and is dropped from the reverse index
        assert_eq!(idx.member_count(), 1);
    }
}
