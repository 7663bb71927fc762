//! # Distribution Errors
//!
//! Failures that abort a whole action. A single entry failing is not one of these: it is
//! recorded as a failed [`OperationResult`](crate::executor::OperationResult) and the
//! distribution carries on.

use thiserror::Error;

use crate::plan::{NodeId, PlanError};
use crate::provider::ProviderError;
use crate::roster::DirectoryError;
use crate::store::{ActivityId, StoreError};
use crate::tracker::TrackerError;
use crate::PrincipalId;

//================================================================================================
// Types
//================================================================================================

/// An error aborting a distribution or submission.
#[derive(Error, Debug)]
pub enum Error {
    /// The plan could not be built.
    #[error(transparent)]
    Plan(#[from] PlanError),
    /// The directory could not be read.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    /// A provider call outside of any plan entry failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The persisted state could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The completion counts became inconsistent.
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    /// A task finished that no plan entry was dispatched on.
    #[error("a task finished that belongs to no plan entry")]
    UntrackedTask,
    /// An entry reported twice.
    #[error("entry {0} reported more than once")]
    DuplicateResult(NodeId),
    /// Every task finished but the tracker never completed.
    #[error("distribution stalled with {reported} of {total} entries reported")]
    Stalled {
        /// Entries reported.
        reported: usize,
        /// Entries expected.
        total: usize,
    },
    /// An earlier run consumed the activity's source document.
    #[error("the source of activity `{0}` was cleaned up after its last distribution")]
    SourceConsumed(ActivityId),
    /// The student has no documents in the activity.
    #[error("student `{0}` received nothing in this activity")]
    UnknownStudent(PrincipalId),
}

//================================================================================================
// Impls
//================================================================================================

impl Error {
    const STALLED_SUGGESTION: &str =
        "results were recorded for every finished entry; run the distribution again to retry";
    const CONSUMED_SUGGESTION: &str =
        "distribute from a fresh source document, or share an existing one in place";

    /// Logs the error at warning level with any useful context.
    pub fn warn(&self) {
        match self {
            Error::Stalled { reported, total } => {
                tracing::warn!(
                    message = %self,
                    reported,
                    total,
                    suggest = Error::STALLED_SUGGESTION
                );
            },
            Error::DuplicateResult(node) => {
                tracing::warn!(message = %self, entry = %node);
            },
            Error::SourceConsumed(activity) => {
                tracing::warn!(message = %self, %activity, suggest = Error::CONSUMED_SUGGESTION);
            },
            Error::UnknownStudent(student) => {
                tracing::warn!(message = %self, %student);
            },
            _ => tracing::warn!(message = %self),
        }
    }
}
