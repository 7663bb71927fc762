//! # Cleanup
//!
//! Once a distribution completes, documents that every recipient now has a copy of are no longer
//! needed. Successful copies add the document they superseded to the activity's [`ErasureSet`],
//! and [`cleanup`] deletes whatever the set holds exactly once.
//!
//! A source document that pre-existed outside the system belongs to its author and is never
//! deleted, whatever the set contains.

use std::collections::BTreeSet;

use crate::provider::DocumentProvider;
use crate::store::{ActivityId, ActivityStore, StoreError};
use crate::DocumentId;

//================================================================================================
// Types
//================================================================================================

/// Documents scheduled for deletion once the distribution completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErasureSet(BTreeSet<DocumentId>);

/// What a cleanup pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Deleted documents and the provider's status code for each.
    pub deleted: Vec<(DocumentId, u16)>,
    /// Documents whose deletion failed.
    pub failed: Vec<DocumentId>,
    /// Documents kept because the source pre-existed.
    pub skipped: Vec<DocumentId>,
}

//================================================================================================
// Impls
//================================================================================================

impl ErasureSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a document, returning `false` if it already was.
    pub fn insert(&mut self, id: DocumentId) -> bool {
        self.0.insert(id)
    }

    /// Whether a document is scheduled.
    pub fn contains(&self, id: &DocumentId) -> bool {
        self.0.contains(id)
    }

    /// Whether nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of scheduled documents.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn drain(&mut self) -> Vec<DocumentId> {
        std::mem::take(&mut self.0).into_iter().collect()
    }
}

//================================================================================================
// Functions
//================================================================================================

/// Deletes every document in `erasures`, leaving the set empty.
///
/// Delete failures are logged and reported, never raised: the distribution itself has already
/// succeeded. After any deletion the activity is marked shared. Calling this again on the
/// drained set does nothing.
#[tracing::instrument(skip(provider, store, erasures), fields(erasures = erasures.len()))]
pub async fn cleanup<P, S>(
    provider: &P,
    store: &S,
    activity: &ActivityId,
    erasures: &mut ErasureSet,
    from_existing: bool,
) -> Result<CleanupReport, StoreError>
where
    P: DocumentProvider + ?Sized,
    S: ActivityStore + ?Sized,
{
    let mut report = CleanupReport::default();

    if from_existing {
        report.skipped = erasures.drain();
        if !report.skipped.is_empty() {
            tracing::debug!(kept = report.skipped.len(), "source pre-existed, nothing deleted");
        }
        return Ok(report);
    }
    if erasures.is_empty() {
        return Ok(report);
    }

    for id in erasures.drain() {
        match provider.delete(&id).await {
            Ok(status) if (200..300).contains(&status) => {
                tracing::info!(document = %id, status, "deleted superseded document");
                report.deleted.push((id, status));
            },
            Ok(status) => {
                tracing::warn!(document = %id, status, "provider refused to delete document");
                report.failed.push(id);
            },
            Err(e) => {
                tracing::warn!(document = %id, error = %e, "failed to delete document");
                report.failed.push(id);
            },
        }
    }

    store.mark_shared(activity)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;
    use crate::store::MemoryStore;
    use crate::test::activity;
    use crate::DistributionMode;

    #[tokio::test]
    async fn deletes_once() -> anyhow::Result<()> {
        let provider = MockProvider::with_document("src-1");
        let store = MemoryStore::default();
        let record = activity(DistributionMode::StdCopy);
        store.save_activity(&record)?;

        let mut erasures = ErasureSet::new();
        erasures.insert("src-1".into());
        erasures.insert("src-1".into());

        let report = cleanup(&provider, &store, &record.id, &mut erasures, false).await?;
        assert_eq!(report.deleted, vec![(DocumentId::from("src-1"), 204)]);
        assert!(erasures.is_empty());
        assert!(store.load_activity(&record.id)?.shared);

        let again = cleanup(&provider, &store, &record.id, &mut erasures, false).await?;
        assert_eq!(again, CleanupReport::default());
        assert_eq!(provider.deletes().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn pre_existing_sources_are_kept() -> anyhow::Result<()> {
        let provider = MockProvider::with_document("src-1");
        let store = MemoryStore::default();
        let record = activity(DistributionMode::StdCopy);
        store.save_activity(&record)?;

        let mut erasures = ErasureSet::new();
        erasures.insert("src-1".into());

        let report = cleanup(&provider, &store, &record.id, &mut erasures, true).await?;
        assert_eq!(report.skipped, [DocumentId::from("src-1")]);
        assert!(provider.deletes().is_empty());
        assert!(provider.exists(&"src-1".into()));
        Ok(())
    }

    #[tokio::test]
    async fn delete_failures_are_reported() -> anyhow::Result<()> {
        let provider = MockProvider::with_document("src-1").fail_deletes();
        let store = MemoryStore::default();
        let record = activity(DistributionMode::StdCopy);
        store.save_activity(&record)?;

        let mut erasures = ErasureSet::new();
        erasures.insert("src-1".into());

        let report = cleanup(&provider, &store, &record.id, &mut erasures, false).await?;
        assert!(report.deleted.is_empty());
        assert_eq!(report.failed, [DocumentId::from("src-1")]);
        Ok(())
    }
}
