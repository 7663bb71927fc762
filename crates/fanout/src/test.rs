use std::sync::Arc;
use std::time::Duration;

use crate::action::distribute;
use crate::provider::mock::{Call, MockProvider};
use crate::roster::{GroupRoster, Selection, StaticDirectory};
use crate::status::{RowKey, RowStatus, StatusBoard};
use crate::store::{ActivityRecord, ActivityStore, MemoryStore};
use crate::{DistributionMode, DocumentId, PermissionTemplate, Principal, Roster, Settings, SourceDocument};

pub(crate) const COURSE_TOML: &str = r#"
course = "bio101"

[[students]]
id = "ada"
name = "Ada"
email = "ada@example.edu"

[[students]]
id = "grace"
name = "Grace"
email = "grace@example.edu"

[[students]]
id = "alan"
name = "Alan"

[[students]]
id = "edsger"
name = "Edsger"

[[groups]]
id = "red"
name = "Red"
members = ["ada", "grace"]

[[groups]]
id = "blue"
name = "Blue"
members = ["alan"]

[[groups]]
id = "green"
name = "Green"

[[groupings]]
id = "lab-a"
name = "Lab A"
groups = ["red", "blue"]
"#;

pub(crate) fn source() -> SourceDocument {
    SourceDocument {
        id: "src-1".into(),
        name: "Worksheet".into(),
        owner: None,
        template: PermissionTemplate::Edit,
        from_existing: false,
    }
}

pub(crate) fn activity(mode: DistributionMode) -> ActivityRecord {
    ActivityRecord {
        id: "essay".into(),
        name: "Essay".into(),
        course: "bio101".into(),
        mode,
        shared: false,
        source: source(),
        selection: Selection::default(),
    }
}

async fn course_roster(mode: DistributionMode) -> anyhow::Result<Roster> {
    let dir = StaticDirectory::from_toml(COURSE_TOML)?;
    Ok(Roster::resolve(&dir, dir.course(), mode, &Selection::default()).await?)
}

fn students(n: usize) -> Roster {
    let mut roster = Roster::new("bio101".into());
    for i in 0..n {
        roster.push_student(Principal::student(format!("s{i}"), format!("Student {i}"), None));
    }
    roster
}

struct Harness {
    provider: Arc<MockProvider>,
    store: MemoryStore,
    board: StatusBoard,
    activity: ActivityRecord,
}

impl Harness {
    fn new(mode: DistributionMode, provider: MockProvider) -> anyhow::Result<Self> {
        let store = MemoryStore::default();
        let activity = activity(mode);
        store.save_activity(&activity)?;
        Ok(Self {
            provider: Arc::new(provider),
            store,
            board: StatusBoard::new(),
            activity,
        })
    }

    async fn run(
        &self,
        roster: &Roster,
        settings: &Settings,
    ) -> Result<crate::action::DistributionReport, crate::Error> {
        distribute(
            &self.activity,
            roster,
            Arc::clone(&self.provider),
            &self.store,
            settings,
            &self.board,
        )
        .await
    }
}

/// Every copy into a folder and every share of a copy must come after the call creating it.
fn assert_causal(calls: &[Call]) {
    let created_at = |id: &DocumentId| {
        calls.iter().position(|c| match c {
            Call::Copy { created, .. } => created.as_ref() == Some(id),
            Call::Folder { created } => created == id,
            _ => false,
        })
    };
    for (i, call) in calls.iter().enumerate() {
        let parent = match call {
            Call::Copy {
                folder: Some(folder),
                ..
            } => folder,
            Call::Share { document, .. } if document.as_str() != "src-1" => document,
            _ => continue,
        };
        let Some(at) = created_at(parent) else {
            panic!("{parent} used by call {i} was never created");
        };
        assert!(at < i, "{parent} used by call {i} before it was created at {at}");
    }
}

#[tokio::test]
async fn copies_for_every_student_then_deletes_the_source() -> anyhow::Result<()> {
    let h = Harness::new(DistributionMode::StdCopy, MockProvider::with_document("src-1"))?;
    let report = h.run(&students(3), &Settings::default()).await?;

    assert_eq!((report.created, report.failed), (3, 0));
    assert_eq!(report.cleanup.deleted, vec![(DocumentId::from("src-1"), 204)]);
    assert_eq!(h.provider.deletes(), [DocumentId::from("src-1")]);

    let snapshot = h.board.snapshot();
    assert!(snapshot.complete);
    assert_eq!((snapshot.reported, snapshot.total), (3, 3));
    assert_eq!(snapshot.count(RowStatus::Created), 3);

    assert_eq!(h.store.load_results(&h.activity.id)?.len(), 3);
    assert!(h.store.load_activity(&h.activity.id)?.shared);
    Ok(())
}

#[tokio::test]
async fn group_totals_grow_with_their_members() -> anyhow::Result<()> {
    let mut roster = Roster::new("bio101".into());
    roster.push_group(GroupRoster {
        group: Principal::group("g1", "One"),
        members: vec![
            Principal::student("ada", "Ada", None),
            Principal::student("grace", "Grace", None),
        ],
    });
    roster.push_group(GroupRoster {
        group: Principal::group("g2", "Two"),
        members: Vec::new(),
    });

    let h = Harness::new(DistributionMode::GroupCopy, MockProvider::with_document("src-1"))?;
    let report = h.run(&roster, &Settings::default()).await?;

    let snapshot = h.board.snapshot();
    assert_eq!((snapshot.reported, snapshot.total), (4, 4));
    assert_eq!(report.created, 4);
    // shares of the group copy, never of the source
    let results = h.store.load_results(&h.activity.id)?;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.document == results[0].document));
    assert_ne!(results[0].document.as_str(), "src-1");
    assert_causal(&h.provider.calls());
    Ok(())
}

#[tokio::test]
async fn one_share_reaches_every_student() -> anyhow::Result<()> {
    let h = Harness::new(
        DistributionMode::DistShareSame,
        MockProvider::with_document("src-1"),
    )?;
    let report = h.run(&students(5), &Settings::default()).await?;

    assert_eq!(report.created, 1);
    assert_eq!(report.delivered, 5);
    assert_eq!(h.board.snapshot().count(RowStatus::Created), 5);
    assert!(matches!(
        h.provider.calls().as_slice(),
        [Call::Share { grantees, .. }] if grantees.len() == 5
    ));
    // the shared source is what students work in
    assert!(h.provider.deletes().is_empty());
    assert!(report.cleanup.deleted.is_empty());
    Ok(())
}

#[tokio::test]
async fn a_failed_entry_still_completes() -> anyhow::Result<()> {
    let h = Harness::new(
        DistributionMode::StdCopy,
        MockProvider::with_document("src-1").fail("s1"),
    )?;
    let report = h.run(&students(3), &Settings::default()).await?;

    assert_eq!((report.created, report.failed), (2, 1));
    let snapshot = h.board.snapshot();
    assert!(snapshot.complete);
    assert_eq!(snapshot.count(RowStatus::Created), 2);
    assert_eq!(snapshot.count(RowStatus::Failed), 1);
    assert_eq!(report.cleanup.deleted.len(), 1);
    assert_eq!(h.store.load_results(&h.activity.id)?.len(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn copies_wait_for_slow_folders() -> anyhow::Result<()> {
    let provider = MockProvider::with_document("src-1")
        .delay("red", Duration::from_secs(10))
        .delay("blue", Duration::from_secs(1));
    let h = Harness::new(DistributionMode::StdCopyGroup, provider)?;
    let roster = course_roster(DistributionMode::StdCopyGroup).await?;
    let report = h.run(&roster, &Settings::default()).await?;

    assert_eq!(report.failed, 0);
    assert_eq!(report.created, 6);
    let calls = h.provider.calls();
    assert_causal(&calls);
    // blue's folder and copy finish before red's folder exists
    assert!(matches!(&calls[0], Call::Folder { .. }));
    assert!(matches!(&calls[2], Call::Copy { grantee: Some(g), .. } if g.as_str() == "alan"));
    Ok(())
}

#[tokio::test]
async fn failed_containers_issue_no_children() -> anyhow::Result<()> {
    let h = Harness::new(
        DistributionMode::GroupCopy,
        MockProvider::with_document("src-1").fail("red"),
    )?;
    let roster = course_roster(DistributionMode::GroupCopy).await?;
    let report = h.run(&roster, &Settings::default()).await?;

    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 2);
    let snapshot = h.board.snapshot();
    for student in ["ada", "grace"] {
        let row = snapshot
            .row(&RowKey::Student(student.into()))
            .ok_or_else(|| anyhow::anyhow!("{student} has a row"))?;
        assert_eq!(row.status(), RowStatus::Failed);
    }
    let shares = h
        .provider
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Share { .. }))
        .count();
    assert_eq!(shares, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unresponsive_calls_time_out() -> anyhow::Result<()> {
    let h = Harness::new(
        DistributionMode::StdCopy,
        MockProvider::with_document("src-1").delay("s0", Duration::from_secs(600)),
    )?;
    let settings = Settings {
        call_timeout: Duration::from_secs(30),
        max_concurrent: 2,
    };
    let report = h.run(&students(4), &settings).await?;

    assert_eq!((report.created, report.failed), (3, 1));
    let snapshot = h.board.snapshot();
    let row = snapshot
        .row(&RowKey::Student("s0".into()))
        .ok_or_else(|| anyhow::anyhow!("s0 has a row"))?;
    assert!(row
        .slots()
        .all(|(_, s)| matches!(s, crate::status::SlotStatus::Failed(r) if r.contains("timed out"))));
    Ok(())
}

#[tokio::test]
async fn pre_existing_sources_survive() -> anyhow::Result<()> {
    let mut h = Harness::new(DistributionMode::StdCopy, MockProvider::with_document("src-1"))?;
    h.activity.source.from_existing = true;
    let report = h.run(&students(2), &Settings::default()).await?;

    assert_eq!(report.created, 2);
    assert!(h.provider.deletes().is_empty());
    assert_eq!(report.cleanup.skipped, [DocumentId::from("src-1")]);
    Ok(())
}

#[tokio::test]
async fn combined_modes_clean_up_once() -> anyhow::Result<()> {
    let h = Harness::new(
        DistributionMode::GroupGroupingCopy,
        MockProvider::with_document("src-1"),
    )?;
    let roster = course_roster(DistributionMode::GroupGroupingCopy).await?;
    let report = h.run(&roster, &Settings::default()).await?;

    assert_eq!(report.created, 12);
    assert_eq!(h.provider.deletes().len(), 1);
    assert_causal(&h.provider.calls());

    let results = h.store.load_results(&h.activity.id)?;
    let mut ada: Vec<_> = results
        .iter()
        .filter(|r| r.recipient.as_str() == "ada")
        .filter_map(|r| r.container.as_ref().map(|c| c.as_str()))
        .collect();
    ada.sort();
    assert_eq!(ada, ["lab-a", "red"]);

    let row = h.board.snapshot();
    let ada = row
        .row(&RowKey::Student("ada".into()))
        .ok_or_else(|| anyhow::anyhow!("ada has a row"))?;
    assert_eq!(ada.links().count(), 2);
    Ok(())
}

#[tokio::test]
async fn rerunning_replaces_results() -> anyhow::Result<()> {
    let h = Harness::new(
        DistributionMode::DistShareSameGroup,
        MockProvider::with_document("src-1"),
    )?;
    let roster = course_roster(DistributionMode::DistShareSameGroup).await?;

    h.run(&roster, &Settings::default()).await?;
    let report = h.run(&roster, &Settings::default()).await?;

    assert_eq!(report.created, 2);
    assert_eq!(h.store.load_results(&h.activity.id)?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn consumed_sources_are_not_distributed_again() -> anyhow::Result<()> {
    let h = Harness::new(DistributionMode::StdCopy, MockProvider::with_document("src-1"))?;
    let roster = students(3);

    let first = h.run(&roster, &Settings::default()).await?;
    assert_eq!(first.cleanup.deleted, [(DocumentId::from("src-1"), 204)]);
    let calls = h.provider.calls().len();

    let err = h.run(&roster, &Settings::default()).await.unwrap_err();
    assert!(matches!(err, crate::Error::SourceConsumed(ref id) if id == &h.activity.id));
    assert_eq!(h.provider.calls().len(), calls);
    assert_eq!(h.store.load_results(&h.activity.id)?.len(), 3);
    assert!(h.store.load_activity(&h.activity.id)?.shared);
    Ok(())
}

#[tokio::test]
async fn a_failed_rerun_keeps_earlier_results() -> anyhow::Result<()> {
    let h = Harness::new(
        DistributionMode::DistShareSameGroup,
        MockProvider::with_document("src-1").fail("alan"),
    )?;
    let roster = course_roster(DistributionMode::DistShareSameGroup).await?;
    h.store.append_results(
        &h.activity.id,
        &[crate::store::ResultRecord {
            recipient: "alan".into(),
            email: None,
            container: Some("blue".into()),
            document: "src-1".into(),
            url: url::Url::parse("https://docs.example.com/d/src-1")?,
            permission: PermissionTemplate::Edit,
            status: crate::store::SubmissionStatus::Submitted,
        }],
    )?;

    let report = h.run(&roster, &Settings::default()).await?;
    assert_eq!((report.created, report.failed), (1, 1));

    let results = h.store.load_results(&h.activity.id)?;
    assert_eq!(results.len(), 3);
    let alan = results
        .iter()
        .find(|r| r.recipient.as_str() == "alan")
        .ok_or_else(|| anyhow::anyhow!("no record for alan"))?;
    assert_eq!(alan.status, crate::store::SubmissionStatus::Submitted);
    Ok(())
}

#[tokio::test]
async fn empty_roster_is_refused() -> anyhow::Result<()> {
    let h = Harness::new(DistributionMode::StdCopy, MockProvider::with_document("src-1"))?;
    let err = h.run(&students(0), &Settings::default()).await.unwrap_err();
    assert!(matches!(err, crate::Error::Plan(_)));
    assert!(h.provider.calls().is_empty());
    Ok(())
}
