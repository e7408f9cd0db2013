//! Command dispatch logic for repo-pulse

use super::event::process_event;
use super::history::process_history;
use super::stats::process_stats;
use super::{CommonArgs, EventArgs, HistoryArgs, StatsArgs};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use std::io::Write;

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "repo-pulse", author, version, long_about = None)]
#[command(about = "Record repository health metrics and events as a dated time series")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: PulseSubcommand,
}

#[derive(Subcommand, Debug)]
enum PulseSubcommand {
    /// Collect today's metrics for a repository and store them
    Stats(StatsArgs),
    /// Record a dated event for a repository
    Event(EventArgs),
    /// Print the records stored for a repository
    History(HistoryArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// Usage errors, `--help` and `--version` are written to the host and end with the
/// exit code clap picks for them.
///
/// # Arguments
///
/// * `args` - An iterator of command-line arguments (typically from `std::env::args()`)
///
/// # Errors
///
/// Returns an error if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let rendered = e.render().to_string();
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                let _ = write!(host.output(), "{rendered}");
            } else {
                let _ = write!(host.error(), "{rendered}");
            }
            host.exit(e.exit_code());
            return Ok(());
        }
    };

    match &cli.command {
        PulseSubcommand::Stats(args) => process_stats(host, &cli.common, args).await,
        PulseSubcommand::Event(args) => process_event(host, &cli.common, args).await,
        PulseSubcommand::History(args) => process_history(host, &cli.common, args).await,
    }
}
