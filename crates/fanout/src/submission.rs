//! Student submissions.
//!
//! Submitting hands a student's documents back: their access drops to commenting on every
//! document delivered to them in the activity, and their result records are marked submitted.

use crate::provider::DocumentProvider;
use crate::store::{ActivityId, ActivityStore, SubmissionStatus};
use crate::{Error, PermissionTemplate, Principal, PrincipalId};

/// Submits every document `student` received in `activity`, returning how many changed.
///
/// Records already submitted are left alone, so submitting twice is harmless.
#[tracing::instrument(skip(provider, store))]
pub async fn submit<P, S>(
    provider: &P,
    store: &S,
    activity: &ActivityId,
    student: &PrincipalId,
) -> Result<usize, Error>
where
    P: DocumentProvider + ?Sized,
    S: ActivityStore + ?Sized,
{
    let mut results = store.load_results(activity)?;
    if !results.iter().any(|r| &r.recipient == student) {
        return Err(Error::UnknownStudent(student.clone()));
    }

    let permission = provider.resolve_permission(PermissionTemplate::Comment);
    let mut submitted = 0;
    let mut failure = None;
    for record in results
        .iter_mut()
        .filter(|r| &r.recipient == student && r.status == SubmissionStatus::NotSubmitted)
    {
        let grantee = Principal::student(
            record.recipient.clone(),
            record.recipient.as_str(),
            record.email.clone(),
        );
        if let Err(e) = provider.share(&record.document, &[grantee], permission).await {
            tracing::warn!(document = %record.document, error = %e, "submission interrupted");
            failure = Some(e);
            break;
        }
        record.status = SubmissionStatus::Submitted;
        record.permission = PermissionTemplate::Comment;
        submitted += 1;
        tracing::info!(document = %record.document, "submitted");
    }

    // documents already downgraded at the provider must be recorded even if a later one failed
    if submitted > 0 {
        store.replace_results(activity, results)?;
    }
    match failure {
        Some(e) => Err(e.into()),
        None => Ok(submitted),
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::provider::ProviderError;
    use crate::provider::mock::{Call, MockProvider};
    use crate::store::{MemoryStore, ResultRecord};
    use crate::test::activity;
    use crate::DistributionMode;

    fn record(student: &str, document: &str) -> ResultRecord {
        ResultRecord {
            recipient: student.into(),
            email: Some(format!("{student}@example.edu")),
            container: None,
            document: document.into(),
            url: Url::parse(&format!("https://docs.example.com/d/{document}")).unwrap(),
            permission: PermissionTemplate::Edit,
            status: SubmissionStatus::NotSubmitted,
        }
    }

    #[tokio::test]
    async fn submitting_twice_is_harmless() -> anyhow::Result<()> {
        let provider = MockProvider::with_document("copy-1");
        let store = MemoryStore::default();
        let essay = activity(DistributionMode::StdCopy);
        store.save_activity(&essay)?;
        store.append_results(&essay.id, &[record("ada", "copy-1"), record("grace", "copy-2")])?;

        let ada = PrincipalId::from("ada");
        assert_eq!(submit(&provider, &store, &essay.id, &ada).await?, 1);
        assert_eq!(submit(&provider, &store, &essay.id, &ada).await?, 0);

        let results = store.load_results(&essay.id)?;
        assert_eq!(results[0].status, SubmissionStatus::Submitted);
        assert_eq!(results[1].status, SubmissionStatus::NotSubmitted);
        assert_eq!(
            provider.calls(),
            [Call::Share {
                document: "copy-1".into(),
                grantees: vec![ada],
            }]
        );
        Ok(())
    }

    #[tokio::test]
    async fn partial_submissions_are_kept() -> anyhow::Result<()> {
        // copy-2 is missing, so sharing it fails after copy-1 was downgraded
        let provider = MockProvider::with_document("copy-1");
        let store = MemoryStore::default();
        let essay = activity(DistributionMode::StdCopyGroup);
        store.save_activity(&essay)?;
        store.append_results(&essay.id, &[record("ada", "copy-1"), record("ada", "copy-2")])?;

        let err = submit(&provider, &store, &essay.id, &"ada".into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::NotFound(ref id)) if id.as_str() == "copy-2"
        ));

        let results = store.load_results(&essay.id)?;
        assert_eq!(results[0].status, SubmissionStatus::Submitted);
        assert_eq!(results[0].permission, PermissionTemplate::Comment);
        assert_eq!(results[1].status, SubmissionStatus::NotSubmitted);

        assert_eq!(submit(&provider, &store, &essay.id, &"ada".into()).await.ok(), None);
        assert_eq!(provider.calls().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_student() -> anyhow::Result<()> {
        let provider = MockProvider::default();
        let store = MemoryStore::default();
        let essay = activity(DistributionMode::StdCopy);
        store.save_activity(&essay)?;

        let err = submit(&provider, &store, &essay.id, &"edsger".into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownStudent(id) if id.as_str() == "edsger"));
        Ok(())
    }
}
