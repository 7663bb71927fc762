mod distribute;
mod plan;
mod status;
mod submit;

use std::sync::Arc;

use clap::Subcommand;
use config::CONFIG;
use fanout::Settings;
use fanout::provider::LocalProvider;
use fanout::store::JsonStore;

use super::Args;

#[derive(Subcommand)]
pub(super) enum Commands {
    /// Show the fan-out an activity would perform, without performing it.
    ///
    /// Every provider call is listed as a tree: calls at the top level run
    /// immediately, indented calls wait for the call above them to succeed.
    #[command(verbatim_doc_comment)]
    Plan(plan::Args),
    /// Distribute an activity's source document to its course.
    ///
    /// The source is copied or shared according to the activity's mode, one
    /// provider call per student, group or grouping. Individual failures are
    /// reported and do not stop the rest of the distribution. Once every call
    /// has reported, a source superseded by its copies is deleted.
    #[command(verbatim_doc_comment)]
    Distribute(distribute::Args),
    /// Show the documents each student received.
    #[command(verbatim_doc_comment)]
    Status(status::Args),
    /// Hand in a student's documents.
    ///
    /// The student keeps access to their documents but can only comment on
    /// them from here on.
    #[command(verbatim_doc_comment)]
    Submit(submit::Args),
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Commands::Plan(args) => plan::run(args).await?,
        Commands::Distribute(args) => distribute::run(args).await?,
        Commands::Status(args) => status::run(args)?,
        Commands::Submit(args) => submit::run(args).await?,
    }
    Ok(())
}

fn settings() -> Settings {
    Settings {
        call_timeout: CONFIG.fanout.call_timeout(),
        max_concurrent: CONFIG.fanout.max_concurrent,
    }
}

fn provider() -> anyhow::Result<Arc<LocalProvider>> {
    tracing::debug!(root = %CONFIG.provider.root.display(), "opening document provider");
    Ok(Arc::new(LocalProvider::open(&CONFIG.provider.root)?))
}

fn store() -> anyhow::Result<JsonStore> {
    tracing::debug!(root = %CONFIG.state.root.display(), "opening state store");
    Ok(JsonStore::open(&CONFIG.state.root)?)
}
