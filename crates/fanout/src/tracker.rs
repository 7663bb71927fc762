//! # Completion Tracking
//!
//! The [`CompletionTracker`] counts reported plan entries against the number expected, per
//! [`Lane`]. The expected total starts at the number of root entries and grows as containers
//! succeed and their deferred children become known. Callers must [`extend`] a lane with a
//! container's children *before* reporting the container itself, otherwise the tracker could
//! see `reported == total` while work is still to be issued.
//!
//! Completion fires exactly once per distribution: the report that saturates the last lane
//! returns [`Progress::Complete`], and every report after it is an error.
//!
//! [`extend`]: CompletionTracker::extend

use std::collections::BTreeMap;

use thiserror::Error;

use crate::plan::Lane;

//================================================================================================
// Types
//================================================================================================

/// Violations of the counting invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// A report arrived before the distribution began.
    #[error("result reported before the distribution began")]
    NotStarted,
    /// More results arrived on a lane than it expects.
    #[error("more results reported on the {0} lane than were issued")]
    Overreport(Lane),
    /// Work was added after completion had already fired.
    #[error("cannot add work to the {0} lane after completion")]
    AfterCompletion(Lane),
    /// A lane the plan never declared.
    #[error("the plan has no {0} lane")]
    UnknownLane(Lane),
}

/// Where a distribution is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Planned but not yet dispatched.
    Planned,
    /// Entries are outstanding.
    InProgress,
    /// Every entry has reported.
    Complete,
}

/// The outcome of a single report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Entries are still outstanding.
    Outstanding {
        /// Entries reported so far.
        reported: usize,
        /// Entries expected so far.
        total: usize,
    },
    /// This report completed the distribution.
    Complete {
        /// The final number of entries.
        total: usize,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counter {
    reported: usize,
    total: usize,
}

/// Counts entry results until every lane of a plan is saturated.
#[derive(Debug, Clone)]
pub struct CompletionTracker {
    lanes: BTreeMap<Lane, Counter>,
    phase: Phase,
}

//================================================================================================
// Impls
//================================================================================================

impl CompletionTracker {
    /// A tracker expecting `lanes[lane]` root entries on each lane.
    pub fn new(lanes: BTreeMap<Lane, usize>) -> Self {
        Self {
            lanes: lanes
                .into_iter()
                .map(|(lane, total)| (lane, Counter { reported: 0, total }))
                .collect(),
            phase: Phase::Planned,
        }
    }

    /// Marks the distribution dispatched.
    ///
    /// A plan with nothing to do completes immediately.
    pub fn begin(&mut self) -> Progress {
        if self.total() == 0 {
            self.phase = Phase::Complete;
            return Progress::Complete { total: 0 };
        }
        self.phase = Phase::InProgress;
        self.progress()
    }

    /// Adds `n` newly issued entries to a lane.
    pub fn extend(&mut self, lane: Lane, n: usize) -> Result<(), TrackerError> {
        if self.phase == Phase::Complete {
            return Err(TrackerError::AfterCompletion(lane));
        }
        let counter = self
            .lanes
            .get_mut(&lane)
            .ok_or(TrackerError::UnknownLane(lane))?;
        counter.total += n;
        Ok(())
    }

    /// Records one result, successful or not, on a lane.
    pub fn report(&mut self, lane: Lane) -> Result<Progress, TrackerError> {
        match self.phase {
            Phase::Planned => return Err(TrackerError::NotStarted),
            Phase::Complete => return Err(TrackerError::Overreport(lane)),
            Phase::InProgress => {},
        }
        let counter = self
            .lanes
            .get_mut(&lane)
            .ok_or(TrackerError::UnknownLane(lane))?;
        if counter.reported >= counter.total {
            return Err(TrackerError::Overreport(lane));
        }
        counter.reported += 1;

        if self.lanes.values().all(|c| c.reported == c.total) {
            self.phase = Phase::Complete;
            tracing::debug!(total = self.total(), "every lane saturated");
            return Ok(Progress::Complete {
                total: self.total(),
            });
        }
        Ok(self.progress())
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Results reported across every lane.
    pub fn reported(&self) -> usize {
        self.lanes.values().map(|c| c.reported).sum()
    }

    /// Entries expected across every lane.
    pub fn total(&self) -> usize {
        self.lanes.values().map(|c| c.total).sum()
    }

    /// Counts for one lane as `(reported, total)`.
    pub fn lane(&self, lane: Lane) -> Option<(usize, usize)> {
        self.lanes.get(&lane).map(|c| (c.reported, c.total))
    }

    /// Discards every count, returning the tracker to [`Phase::Planned`].
    pub fn reset(&mut self) {
        self.lanes.values_mut().for_each(|c| *c = Counter::default());
        self.phase = Phase::Planned;
    }

    fn progress(&self) -> Progress {
        Progress::Outstanding {
            reported: self.reported(),
            total: self.total(),
        }
    }
}
