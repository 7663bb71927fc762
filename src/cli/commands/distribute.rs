use std::path::PathBuf;

use clap::Parser;
use fanout::action::{self, DistributionReport};
use fanout::roster::Roster;
use fanout::status::{RowKey, RowStatus, Snapshot, SlotStatus};
use fanout::store::ActivityStore;

use crate::cli::BOARD;
use crate::cli::input::{self, ActivityFile};
use crate::cli::logging::{ansi, paint};

#[derive(Parser, Debug)]
#[command(next_help_heading = "Distribute Options")]
#[group(id = "distribute_args")]
pub struct Args {
    /// The activity file to distribute.
    activity: PathBuf,
    /// The course roster to distribute to.
    #[arg(long, short)]
    roster: PathBuf,
    /// Print the outcome as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[tracing::instrument(skip_all)]
pub(super) async fn run(args: Args) -> anyhow::Result<()> {
    let provider = super::provider()?;
    let store = super::store()?;
    let directory = input::load_roster(&args.roster)?;

    let activity = ActivityFile::load(&args.activity)?.into_record(&provider)?;
    store.save_activity(&activity)?;
    let roster =
        Roster::resolve(&directory, &activity.course, activity.mode, &activity.selection).await?;

    let report = action::distribute(
        &activity,
        &roster,
        provider,
        &store,
        &super::settings(),
        &BOARD,
    )
    .await
    .inspect_err(|e| e.warn())?;

    let snapshot = BOARD.snapshot();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&to_json(&report, &snapshot, &roster))?);
    } else {
        print_table(&snapshot, &roster);
    }
    if report.failed > 0 {
        tracing::warn!(
            failed = report.failed,
            skipped = report.skipped,
            "some recipients did not receive the document"
        );
    }
    Ok(())
}

fn print_table(snapshot: &Snapshot, roster: &Roster) {
    for row in snapshot.rows() {
        let links: Vec<_> = row.links().map(|u| u.as_str()).collect();
        let status = format!("{:<12}", row.status().to_string());
        let status = match row.status() {
            RowStatus::Created => paint(&status, ansi::GREEN),
            RowStatus::Failed => paint(&status, ansi::RED),
            _ => status,
        };
        println!(
            "{:<24} {status} {:<16} {}",
            format!("{} ({})", row.key(), row.name()),
            containers(roster, row.key()).join(","),
            links.join(" ")
        );
    }
}

fn to_json(report: &DistributionReport, snapshot: &Snapshot, roster: &Roster) -> serde_json::Value {
    let rows: Vec<_> = snapshot
        .rows()
        .iter()
        .map(|row| {
            let failures: Vec<_> = row
                .slots()
                .filter_map(|(_, s)| match s {
                    SlotStatus::Failed(reason) => Some(reason.as_str()),
                    _ => None,
                })
                .collect();
            serde_json::json!({
                "row": row.key().to_string(),
                "name": row.name(),
                "status": row.status().to_string(),
                "containers": containers(roster, row.key()),
                "links": row.links().map(|u| u.as_str()).collect::<Vec<_>>(),
                "failures": failures,
            })
        })
        .collect();
    serde_json::json!({
        "created": report.created,
        "failed": report.failed,
        "skipped": report.skipped,
        "delivered": report.delivered,
        "deleted": report.cleanup.deleted.len(),
        "rows": rows,
    })
}

/// The groups and groupings a student row belongs to; empty for container rows.
fn containers<'a>(roster: &'a Roster, key: &RowKey) -> Vec<&'a str> {
    match key {
        RowKey::Student(id) => roster.containers_of(id).map(|c| c.as_str()).collect(),
        RowKey::Group(_) | RowKey::Grouping(_) => Vec::new(),
    }
}
