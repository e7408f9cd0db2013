use super::common::{CommonArgs, Session, fail, init_logging, print_report};
use super::Host;
use crate::Result;
use crate::error;
use crate::facts::RepoRef;
use crate::pipeline::{RunMode, RunReport};
use camino::Utf8PathBuf;
use clap::Parser;

#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Repository to collect metrics for (`owner/name`, `host/owner/name` or a URL)
    #[arg(long, value_name = "REPO")]
    pub repo: RepoRef,

    /// Local checkout of the repository to count lines of code in
    #[arg(long, value_name = "PATH")]
    pub checkout: Option<Utf8PathBuf>,

    /// Print the record without persisting it
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn process_stats<H: Host>(host: &mut H, common: &CommonArgs, args: &StatsArgs) -> Result<()> {
    init_logging(common.log_level);

    match collect(common, args).await {
        Ok(report) => print_report(host, &report),
        Err(e) => fail(host, e),
    }
}

async fn collect(common: &CommonArgs, args: &StatsArgs) -> error::Result<RunReport> {
    let orchestrator = Session::open(common, &args.repo)?.stats_orchestrator()?.with_dry_run(args.dry_run);
    let checkout = args.checkout.clone().map(Utf8PathBuf::into_std_path_buf);
    orchestrator.run(RunMode::Stats { checkout }).await.map_err(|failure| failure.error)
}
