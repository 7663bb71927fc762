//! # Fanout Crate
//!
//! The `fanout` crate distributes a single source document to every student, group and
//! grouping of a course according to a [`DistributionMode`], then tracks each asynchronous
//! copy or share until the whole distribution has reported back.
//!
//! ## Key Concepts
//!
//! A **distribution** takes an activity's source document and a resolved [`Roster`] and turns
//! them into a [`FanoutPlan`]: a dependency graph of copy, share and folder operations. Nodes
//! whose parent is the source document run immediately; nodes that hang off a container (a
//! group or grouping copy, or a folder) only run once that container exists.
//!
//! Every node reports exactly once, whether it succeeded or failed. The
//! [`CompletionTracker`](tracker::CompletionTracker) counts those reports and fires once when
//! every lane of the plan is saturated, at which point documents made redundant by their copies
//! are deleted by [`cleanup`](cleanup::cleanup).
//!
//! ## Architecture
//!
//! - [`mode`] - The closed set of distribution policies and their topologies.
//! - [`roster`] - The directory adapter and the resolved course roster.
//! - [`provider`] - The document provider adapter, plus a local filesystem implementation.
//! - [`plan`] - Turns a mode and a roster into a fan-out plan.
//! - [`executor`] - Runs a single plan entry against the provider with a bounded timeout.
//! - [`tracker`] - The completion state machine.
//! - [`cleanup`] - Deletes superseded documents once the fan-out completes.
//! - [`status`] - A live, per-row projection of the distribution for presentation.
//! - [`store`] - Persisted activity and result records.
//! - [`action`] - Threads all of the above through a single distribution.
//! - [`submission`] - Student submissions against distributed documents.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fanout::provider::LocalProvider;
//! use fanout::roster::{Roster, StaticDirectory};
//! use fanout::status::StatusBoard;
//! use fanout::store::{ActivityId, ActivityStore, JsonStore};
//! use fanout::{Settings, action};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = JsonStore::open("/tmp/docfan/state")?;
//! let provider = Arc::new(LocalProvider::open("/tmp/docfan/documents")?);
//! let directory = StaticDirectory::from_toml(&std::fs::read_to_string("course.toml")?)?;
//!
//! let activity = store.load_activity(&ActivityId::from("essay"))?;
//! let roster = Roster::resolve(&directory, &activity.course, activity.mode, &activity.selection).await?;
//!
//! let board = StatusBoard::new();
//! let report = action::distribute(&activity, &roster, provider, &store, &Settings::default(), &board).await?;
//! println!("{} created, {} failed", report.created, report.failed);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

use std::time::Duration;

pub use self::document::{CreatedDocument, DocumentId, SourceDocument};
pub use self::error::Error;
pub use self::mode::DistributionMode;
pub use self::permission::{Permission, PermissionTemplate, Role};
pub use self::plan::FanoutPlan;
pub use self::principal::{CourseId, Principal, PrincipalId, PrincipalKind};
pub use self::roster::Roster;

pub mod action;
pub mod cleanup;
mod document;
mod error;
pub mod executor;
pub mod log;
pub mod mode;
mod permission;
pub mod plan;
mod principal;
pub mod provider;
pub mod roster;
pub mod status;
pub mod store;
pub mod submission;
pub mod tracker;

#[cfg(test)]
mod test;

/// Knobs that bound how a distribution talks to the document provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// How long a single provider call may run before its entry is recorded as failed.
    pub call_timeout: Duration,
    /// The most provider calls allowed in flight at once.
    pub max_concurrent: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            max_concurrent: 16,
        }
    }
}
