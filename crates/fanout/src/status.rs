//! # Status Projection
//!
//! A [`StatusBoard`] turns entry results into one row per student, group and grouping, for
//! whatever is presenting the distribution. Every plan entry touching a row owns a slot in it,
//! so a student reached through two containers carries two slots and two links.
//!
//! Snapshots are published on a [`watch`] channel: subscribers always see the latest complete
//! picture and never a partially applied result.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tokio::sync::watch;
use url::Url;

use crate::plan::{FanoutPlan, NodeId, Recipient, Scope};
use crate::{Principal, PrincipalId, PrincipalKind};

//================================================================================================
// Types
//================================================================================================

/// Identifies a row on the board.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowKey {
    /// A student's row.
    Student(PrincipalId),
    /// A group's row.
    Group(PrincipalId),
    /// A grouping's row.
    Grouping(PrincipalId),
}

/// The state of one entry as seen from a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotStatus {
    /// Not dispatched yet.
    Pending,
    /// Dispatched and awaiting the provider.
    InProgress,
    /// The document exists at this address.
    Created(Url),
    /// The entry failed, or was never issued because its parent failed.
    Failed(String),
}

/// The aggregate state of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    /// Nothing has started.
    Pending,
    /// At least one entry is with the provider.
    InProgress,
    /// Every entry succeeded.
    Created,
    /// Every entry has finished and at least one failed.
    Failed,
}

/// One principal's line on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    key: RowKey,
    name: String,
    slots: BTreeMap<NodeId, SlotStatus>,
}

/// The board as of one moment.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    rows: Vec<Row>,
    index: HashMap<RowKey, usize>,
    touches: HashMap<NodeId, Vec<usize>>,
    /// Entries reported so far.
    pub reported: usize,
    /// Entries expected so far.
    pub total: usize,
    /// Set once every entry has reported.
    pub complete: bool,
}

/// Publishes distribution progress per row.
#[derive(Debug)]
pub struct StatusBoard {
    tx: watch::Sender<Snapshot>,
}

//================================================================================================
// Impls
//================================================================================================

impl From<&Principal> for RowKey {
    fn from(p: &Principal) -> Self {
        match p.kind {
            PrincipalKind::Student => RowKey::Student(p.id.clone()),
            PrincipalKind::Group => RowKey::Group(p.id.clone()),
            PrincipalKind::Grouping => RowKey::Grouping(p.id.clone()),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Student(id) => write!(f, "student {id}"),
            RowKey::Group(id) => write!(f, "group {id}"),
            RowKey::Grouping(id) => write!(f, "grouping {id}"),
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RowStatus::Pending => "pending",
            RowStatus::InProgress => "in progress",
            RowStatus::Created => "created",
            RowStatus::Failed => "failed",
        })
    }
}

impl Row {
    /// Who the row is for.
    pub fn key(&self) -> &RowKey {
        &self.key
    }

    /// The principal's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every slot, in plan order.
    pub fn slots(&self) -> impl Iterator<Item = (NodeId, &SlotStatus)> {
        self.slots.iter().map(|(id, s)| (*id, s))
    }

    /// Aggregates the row's slots.
    pub fn status(&self) -> RowStatus {
        let has = |f: fn(&SlotStatus) -> bool| self.slots.values().any(f);
        if has(|s| matches!(s, SlotStatus::InProgress)) {
            RowStatus::InProgress
        } else if has(|s| matches!(s, SlotStatus::Pending)) {
            RowStatus::Pending
        } else if has(|s| matches!(s, SlotStatus::Failed(_))) {
            RowStatus::Failed
        } else {
            RowStatus::Created
        }
    }

    /// Every link delivered to the row.
    pub fn links(&self) -> impl Iterator<Item = &Url> {
        self.slots.values().filter_map(|s| match s {
            SlotStatus::Created(url) => Some(url),
            _ => None,
        })
    }
}

impl Snapshot {
    /// Every row, in the order the plan first touched them.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Looks up a row.
    pub fn row(&self, key: &RowKey) -> Option<&Row> {
        self.index.get(key).map(|i| &self.rows[*i])
    }

    /// Rows in the given aggregate state.
    pub fn count(&self, status: RowStatus) -> usize {
        self.rows.iter().filter(|r| r.status() == status).count()
    }

    /// Entries dispatched or waiting that have not reported.
    pub fn outstanding(&self) -> usize {
        self.total.saturating_sub(self.reported)
    }

    fn row_for(&mut self, principal: &Principal) -> usize {
        let key = RowKey::from(principal);
        if let Some(i) = self.index.get(&key) {
            return *i;
        }
        self.rows.push(Row {
            key: key.clone(),
            name: principal.name.clone(),
            slots: BTreeMap::new(),
        });
        self.index.insert(key, self.rows.len() - 1);
        self.rows.len() - 1
    }

    fn set(&mut self, node: NodeId, status: SlotStatus) {
        let Some(touched) = self.touches.get(&node) else {
            return;
        };
        for i in touched {
            self.rows[*i].slots.insert(node, status.clone());
        }
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    /// An empty board.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Snapshot::default());
        Self { tx }
    }

    /// Follows the board as it changes.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    /// The current state of the board.
    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    /// Replaces the board with a pending slot for every entry of `plan`.
    pub fn load(&self, plan: &FanoutPlan) {
        let mut snapshot = Snapshot::default();
        for entry in plan.entries() {
            let mut rows = Vec::new();
            match entry.recipient() {
                Recipient::Principal(p) => rows.push(snapshot.row_for(p)),
                Recipient::Audience { scope, members } => {
                    if let Scope::Container(c) = scope {
                        rows.push(snapshot.row_for(c));
                    }
                    rows.extend(members.iter().map(|m| snapshot.row_for(m)));
                },
            }
            for i in &rows {
                snapshot.rows[*i].slots.insert(entry.id(), SlotStatus::Pending);
            }
            snapshot.touches.insert(entry.id(), rows);
        }
        snapshot.total = plan.roots().count();
        self.tx.send_replace(snapshot);
    }

    /// Marks an entry as handed to the provider.
    pub fn start(&self, node: NodeId) {
        self.tx.send_modify(|s| s.set(node, SlotStatus::InProgress));
    }

    /// Records an entry's result.
    pub fn record(&self, node: NodeId, result: Result<&Url, String>) {
        let status = match result {
            Ok(url) => SlotStatus::Created(url.clone()),
            Err(reason) => SlotStatus::Failed(reason),
        };
        self.tx.send_modify(|s| s.set(node, status));
    }

    /// Updates the overall counts.
    pub fn progress(&self, reported: usize, total: usize) {
        self.tx.send_modify(|s| {
            s.reported = reported;
            s.total = total;
        });
    }

    /// Publishes completion, failing every slot that never got a result.
    pub fn finalize(&self) {
        self.tx.send_modify(|s| {
            for row in &mut s.rows {
                for slot in row.slots.values_mut() {
                    if matches!(slot, SlotStatus::Pending | SlotStatus::InProgress) {
                        *slot = SlotStatus::Failed("not issued: its container failed".into());
                    }
                }
            }
            s.complete = true;
        });
    }
}
