use std::path::PathBuf;

use clap::Parser;
use fanout::roster::Roster;

use crate::cli::input::{self, ActivityFile};

#[derive(Parser, Debug)]
#[command(next_help_heading = "Plan Options")]
#[group(id = "plan_args")]
pub struct Args {
    /// The activity file to plan.
    activity: PathBuf,
    /// The course roster to plan against.
    #[arg(long, short)]
    roster: PathBuf,
}

pub(super) async fn run(args: Args) -> anyhow::Result<()> {
    let activity = ActivityFile::load(&args.activity)?;
    let directory = input::load_roster(&args.roster)?;
    let roster =
        Roster::resolve(&directory, &activity.course, activity.mode, &activity.selection).await?;

    let plan = fanout::plan::plan(activity.mode, &activity.preview(), &roster)?;
    tracing::info!(
        entries = plan.entries().len(),
        students = plan.leaf_count(),
        "planned"
    );
    print!("{}", plan.render());
    Ok(())
}
