use clap::Parser;
use fanout::store::{ActivityId, ActivityStore};

#[derive(Parser, Debug)]
#[command(next_help_heading = "Status Options")]
#[group(id = "status_args")]
pub struct Args {
    /// The activity to report on; lists every activity when omitted.
    activity: Option<ActivityId>,
    /// Print records as JSON.
    #[arg(long)]
    json: bool,
}

pub(super) fn run(args: Args) -> anyhow::Result<()> {
    let store = super::store()?;

    let Some(id) = args.activity else {
        for id in store.activities()? {
            let activity = store.load_activity(&id)?;
            println!(
                "{:<16} {:<32} {:<28} {}",
                id,
                activity.name,
                activity.mode.to_string(),
                if activity.shared { "shared" } else { "not shared" }
            );
        }
        return Ok(());
    };

    let results = store.load_results(&id)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    for record in &results {
        println!(
            "{:<16} {:<12} {:<14} {}",
            record.recipient,
            record.container.as_ref().map_or("", |c| c.as_str()),
            record.status.to_string(),
            record.url
        );
    }
    tracing::info!(activity = %id, records = results.len());
    Ok(())
}
