use super::common::{CommonArgs, Session, fail, init_logging, print_report};
use super::Host;
use crate::Result;
use crate::error;
use crate::facts::RepoRef;
use crate::pipeline::{RunMode, RunReport};
use chrono::NaiveDate;
use clap::Parser;

#[derive(Parser, Debug)]
pub struct EventArgs {
    /// Repository the event belongs to (`owner/name`, `host/owner/name` or a URL)
    #[arg(long, value_name = "REPO")]
    pub repo: RepoRef,

    /// What happened, e.g. "Published the 1.0 release"
    #[arg(long, short = 'd', value_name = "TEXT")]
    pub description: String,

    /// Day the event happened (default is today, UTC)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,

    /// Print the record without persisting it
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn process_event<H: Host>(host: &mut H, common: &CommonArgs, args: &EventArgs) -> Result<()> {
    init_logging(common.log_level);

    match record(common, args).await {
        Ok(report) => print_report(host, &report),
        Err(e) => fail(host, e),
    }
}

async fn record(common: &CommonArgs, args: &EventArgs) -> error::Result<RunReport> {
    let orchestrator = Session::open(common, &args.repo)?.orchestrator().with_dry_run(args.dry_run);
    orchestrator
        .run(RunMode::Event {
            description: args.description.clone(),
            date: args.date,
        })
        .await
        .map_err(|failure| failure.error)
}
