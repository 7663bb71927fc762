//! # The Distribution Action
//!
//! [`distribute`] runs one activity's fan-out from plan to cleanup. Everything a single run needs
//! lives in a [`Distribution`] owned by that call: the plan, the in-flight tasks, the completion
//! tracker, the erasure set and the results recorded so far. Nothing outlives the call except
//! what is written to the store and published on the status board.
//!
//! ## Scheduling
//!
//! Root entries are spawned onto a [`JoinSet`] straight away. When an entry's task finishes its
//! result is recorded before anything else happens; only then are its deferred children bound to
//! the document it produced and spawned. A child therefore can never reach the provider before
//! its container exists, and a failed container simply never issues its children.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::task::{self, JoinSet};
use tracing::{Instrument, Span};

use crate::cleanup::{self, CleanupReport, ErasureSet};
use crate::executor::{Call, EntryFailure, Executor, OperationResult};
use crate::plan::{self, FanoutPlan, NodeId, Parent, PlanEntry, Recipient};
use crate::provider::DocumentProvider;
use crate::status::StatusBoard;
use crate::store::{ActivityRecord, ActivityStore, ResultRecord, StoreError, SubmissionStatus};
use crate::tracker::{CompletionTracker, Progress};
use crate::{CreatedDocument, Error, Permission, Roster, Settings};

//================================================================================================
// Types
//================================================================================================

/// The outcome of a completed distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionReport {
    /// Entries that produced a document.
    pub created: usize,
    /// Entries that failed.
    pub failed: usize,
    /// Entries never issued because their container failed.
    pub skipped: usize,
    /// Result records written for students.
    pub delivered: usize,
    /// What cleanup deleted.
    pub cleanup: CleanupReport,
}

/// The state of one distribution run.
pub struct Distribution<'a, P: ?Sized, S: ?Sized> {
    activity: &'a ActivityRecord,
    plan: FanoutPlan,
    provider: Arc<P>,
    executor: Executor<P>,
    permission: Permission,
    store: &'a S,
    board: &'a StatusBoard,
    tracker: CompletionTracker,
    erasures: ErasureSet,
    outcomes: HashMap<NodeId, Result<CreatedDocument, String>>,
    tasks: JoinSet<OperationResult>,
    running: HashMap<task::Id, NodeId>,
    progress: Span,
    report: DistributionReport,
}

//================================================================================================
// Impls
//================================================================================================

impl<'a, P, S> Distribution<'a, P, S>
where
    P: DocumentProvider + ?Sized,
    S: ActivityStore + ?Sized,
{
    /// Plans a distribution of `activity` to `roster`.
    ///
    /// An activity whose source was deleted by an earlier run's cleanup cannot be distributed
    /// from that source again.
    pub fn new(
        activity: &'a ActivityRecord,
        roster: &Roster,
        provider: Arc<P>,
        store: &'a S,
        settings: &Settings,
        board: &'a StatusBoard,
    ) -> Result<Self, Error> {
        let plan = plan::plan(activity.mode, &activity.source, roster)?;
        let consumes_source = plan
            .entries()
            .iter()
            .any(|e| e.supersedes() == Some(Parent::Source));
        if consumes_source && !activity.source.from_existing && source_consumed(store, activity)? {
            return Err(Error::SourceConsumed(activity.id.clone()));
        }
        board.load(&plan);

        Ok(Self {
            activity,
            tracker: CompletionTracker::new(plan.lanes()),
            permission: provider.resolve_permission(activity.source.template),
            executor: Executor::new(Arc::clone(&provider), settings),
            provider,
            plan,
            store,
            board,
            erasures: ErasureSet::new(),
            outcomes: HashMap::new(),
            tasks: JoinSet::new(),
            running: HashMap::new(),
            progress: Span::current(),
            report: DistributionReport::default(),
        })
    }

    /// The plan being executed.
    pub fn plan(&self) -> &FanoutPlan {
        &self.plan
    }

    /// Dispatches every root entry and drives the distribution to completion.
    ///
    /// If the run aborts, entries still queued or in flight are abandoned and nothing is cleaned
    /// up. Results recorded before the abort stay in the store.
    pub async fn run(mut self) -> Result<DistributionReport, Error> {
        let roots = self.plan.roots().count();
        crate::log::set_bar(&self.progress, "📄 distributing", roots as u64);

        match self.drive().await {
            Ok(()) => self.finish().await,
            Err(e) => {
                self.abort().await;
                Err(e)
            },
        }
    }

    async fn drive(&mut self) -> Result<(), Error> {
        if let Progress::Complete { .. } = self.tracker.begin() {
            return Ok(());
        }
        let roots: Vec<_> = self.plan.roots().map(PlanEntry::id).collect();
        for node in roots {
            self.spawn(node, None);
        }
        self.board.progress(self.tracker.reported(), self.tracker.total());

        while let Some(joined) = self.tasks.join_next_with_id().await {
            let result = match joined {
                Ok((id, result)) => {
                    self.running.remove(&id).ok_or(Error::UntrackedTask)?;
                    result
                },
                Err(e) => OperationResult {
                    node: self.running.remove(&e.id()).ok_or(Error::UntrackedTask)?,
                    outcome: Err(EntryFailure::Aborted(e.to_string())),
                },
            };
            if let Progress::Complete { total } = self.record(result)? {
                tracing::info!(total, "every entry reported");
                return Ok(());
            }
        }

        Err(Error::Stalled {
            reported: self.tracker.reported(),
            total: self.tracker.total(),
        })
    }

    async fn abort(&mut self) {
        self.executor.close();
        self.tasks.shutdown().await;
        if !self.running.is_empty() {
            tracing::warn!(abandoned = self.running.len(), "distribution aborted");
        }
        self.running.clear();
    }

    fn spawn(&mut self, node: NodeId, parent: Option<&CreatedDocument>) {
        let Some(entry) = self.plan.entry(node) else {
            return;
        };
        let call = Call::bind(entry, &self.activity.source, parent, self.permission);
        let handle = match call {
            Some(call) => {
                let span = tracing::debug_span!("entry", entry = %node, op = %entry.operation());
                self.tasks
                    .spawn(self.executor.clone().execute(call).instrument(span))
            },
            None => self.tasks.spawn(async move {
                OperationResult {
                    node,
                    outcome: Err(EntryFailure::Unbound),
                }
            }),
        };
        self.running.insert(handle.id(), node);
        self.board.start(node);
    }

    /// Records one result, issuing the entry's children if it succeeded.
    fn record(&mut self, result: OperationResult) -> Result<Progress, Error> {
        let OperationResult { node, outcome } = result;
        if self.outcomes.contains_key(&node) {
            return Err(Error::DuplicateResult(node));
        }
        let Some(entry) = self.plan.entry(node).cloned() else {
            return Err(Error::UntrackedTask);
        };

        match outcome {
            Ok(document) => {
                self.report.created += 1;
                if entry.supersedes() == Some(Parent::Source) {
                    self.erasures.insert(self.activity.source.id.clone());
                }
                self.deliver(&entry, &document)?;
                self.board.record(node, Ok(&document.url));

                // children are counted before their parent so completion cannot fire early
                let children = entry.children();
                self.tracker.extend(entry.lane(), children.len())?;
                crate::log::grow_bar(&self.progress, children.len() as u64);
                for child in children {
                    self.spawn(*child, Some(&document));
                }
                self.outcomes.insert(node, Ok(document));
            },
            Err(e) => {
                self.report.failed += 1;
                tracing::warn!(
                    entry = %node,
                    recipient = %entry.recipient(),
                    skipped = entry.children().len(),
                    error = %e,
                    "entry failed"
                );
                self.board.record(node, Err(e.to_string()));
                self.outcomes.insert(node, Err(e.to_string()));
            },
        }

        let progress = self.tracker.report(entry.lane())?;
        crate::log::tick(&self.progress);
        self.board
            .progress(self.tracker.reported(), self.tracker.total());
        Ok(progress)
    }

    /// Writes a result record for every student the entry delivered to.
    fn deliver(&mut self, entry: &PlanEntry, document: &CreatedDocument) -> Result<(), Error> {
        let students = match entry.recipient() {
            Recipient::Principal(p) if entry.recipient().leaf_count() == 1 => vec![p.clone()],
            Recipient::Principal(_) => return Ok(()),
            Recipient::Audience { members, .. } => members.clone(),
        };
        let records: Vec<_> = students
            .into_iter()
            .map(|student| ResultRecord {
                recipient: student.id,
                email: student.email,
                container: entry.container().cloned(),
                document: document.id.clone(),
                url: document.url.clone(),
                permission: self.activity.source.template,
                status: SubmissionStatus::NotSubmitted,
            })
            .collect();
        self.report.delivered += records.len();
        self.store.append_results(&self.activity.id, &records)?;
        Ok(())
    }

    async fn finish(mut self) -> Result<DistributionReport, Error> {
        self.board.finalize();
        self.report.skipped = self.plan.entries().len() - self.outcomes.len();
        self.reconcile()?;

        self.store.mark_shared(&self.activity.id)?;
        self.report.cleanup = cleanup::cleanup(
            &*self.provider,
            self.store,
            &self.activity.id,
            &mut self.erasures,
            self.activity.source.from_existing,
        )
        .await?;

        self.tracker.reset();
        tracing::info!(
            created = self.report.created,
            failed = self.report.failed,
            skipped = self.report.skipped,
            deleted = self.report.cleanup.deleted.len(),
            "distribution complete"
        );
        Ok(self.report)
    }

    /// Collapses the stored results to the latest record per student and container.
    ///
    /// Records from an earlier run survive unless this run delivered to the same place again.
    fn reconcile(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        let mut latest: Vec<_> = self
            .store
            .load_results(&self.activity.id)?
            .into_iter()
            .rev()
            .filter(|r| seen.insert((r.recipient.clone(), r.container.clone())))
            .collect();
        latest.reverse();
        self.store.replace_results(&self.activity.id, latest)?;
        Ok(())
    }
}

//================================================================================================
// Functions
//================================================================================================

/// Whether an earlier run already finished with `activity`'s source and cleaned it up.
fn source_consumed<S>(store: &S, activity: &ActivityRecord) -> Result<bool, Error>
where
    S: ActivityStore + ?Sized,
{
    match store.load_activity(&activity.id) {
        Ok(stored) => Ok(stored.shared && stored.source.id == activity.source.id),
        Err(StoreError::NotFound(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Distributes an activity's source document to its roster.
///
/// Individual entries failing does not fail the distribution: they are counted in the report and
/// shown on the board. Only planning, an already consumed source, persistence and broken invariants
/// abort it.
#[tracing::instrument(skip_all, fields(activity = %activity.id, mode = %activity.mode))]
pub async fn distribute<P, S>(
    activity: &ActivityRecord,
    roster: &Roster,
    provider: Arc<P>,
    store: &S,
    settings: &Settings,
    board: &StatusBoard,
) -> Result<DistributionReport, Error>
where
    P: DocumentProvider + ?Sized,
    S: ActivityStore + ?Sized,
{
    Distribution::new(activity, roster, provider, store, settings, board)?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::provider::mock::MockProvider;
    use crate::store::MemoryStore;
    use crate::test::activity;
    use crate::{DistributionMode, Principal};

    #[tokio::test(start_paused = true)]
    async fn aborting_abandons_queued_calls() -> anyhow::Result<()> {
        let provider = Arc::new(
            MockProvider::with_document("src-1")
                .delay("ada", Duration::from_secs(10))
                .delay("grace", Duration::from_secs(10)),
        );
        let store = MemoryStore::default();
        let board = StatusBoard::new();
        let essay = activity(DistributionMode::StdCopy);
        store.save_activity(&essay)?;
        let mut roster = Roster::new("bio101".into());
        roster.push_student(Principal::student("ada", "Ada", None));
        roster.push_student(Principal::student("grace", "Grace", None));

        let settings = Settings {
            max_concurrent: 1,
            ..Settings::default()
        };
        let mut run = Distribution::new(
            &essay,
            &roster,
            Arc::clone(&provider),
            &store,
            &settings,
            &board,
        )?;
        let roots: Vec<_> = run.plan().roots().map(PlanEntry::id).collect();
        for node in roots {
            run.spawn(node, None);
        }
        run.abort().await;
        assert!(run.tasks.is_empty());
        assert!(run.running.is_empty());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(provider.calls().is_empty());
        assert!(provider.exists(&"src-1".into()));
        assert!(store.load_results(&essay.id)?.is_empty());
        Ok(())
    }
}
