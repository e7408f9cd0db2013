use super::common::{CommonArgs, Session, fail, init_logging, print_json};
use super::Host;
use crate::Result;
use crate::error::{self, Error};
use crate::facts::RepoRef;
use clap::Parser;
use tokio::task::spawn_blocking;

#[derive(Parser, Debug)]
pub struct HistoryArgs {
    /// Repository whose records to print (`owner/name`, `host/owner/name` or a URL)
    #[arg(long, value_name = "REPO")]
    pub repo: RepoRef,

    /// Print events instead of stats records
    #[arg(long)]
    pub events: bool,
}

pub async fn process_history<H: Host>(host: &mut H, common: &CommonArgs, args: &HistoryArgs) -> Result<()> {
    init_logging(common.log_level);

    let store = match Session::open(common, &args.repo) {
        Ok(session) => session.store(),
        Err(e) => return fail(host, e),
    };

    let events = args.events;
    let collection = if events {
        store.collections().events.clone()
    } else {
        store.collections().stats.clone()
    };

    let history = spawn_blocking(move || -> error::Result<serde_json::Value> {
        let to_value = |e: serde_json::Error| Error::persistence("list", &collection, e);
        if events {
            serde_json::to_value(store.list_events()?).map_err(to_value)
        } else {
            serde_json::to_value(store.list_stats()?).map_err(to_value)
        }
    })
    .await;

    match history {
        Ok(Ok(history)) => print_json(host, &history),
        Ok(Err(e)) => fail(host, e),
        Err(e) => fail(host, Error::persistence("list", "history", format!("store task failed: {e}"))),
    }
}
