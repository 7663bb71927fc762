use clap::Parser;
use fanout::PrincipalId;
use fanout::store::ActivityId;

#[derive(Parser, Debug)]
#[command(next_help_heading = "Submit Options")]
#[group(id = "submit_args")]
pub struct Args {
    /// The activity the documents belong to.
    activity: ActivityId,
    /// The student handing in.
    student: PrincipalId,
}

pub(super) async fn run(args: Args) -> anyhow::Result<()> {
    let provider = super::provider()?;
    let store = super::store()?;

    let submitted = fanout::submission::submit(&*provider, &store, &args.activity, &args.student)
        .await
        .inspect_err(|e| e.warn())?;
    if submitted == 0 {
        tracing::info!(student = %args.student, "already submitted");
    } else {
        tracing::info!(student = %args.student, documents = submitted, "submitted");
    }
    Ok(())
}
