//! Setup and output shared by all commands.

use super::Host;
use crate::Result;
use crate::config::Config;
use crate::error::{self, Error};
use crate::facts::RepoRef;
use crate::facts::codebase::TokeiCounter;
use crate::facts::hosting::{Client, Provider};
use crate::pipeline::{Orchestrator, RunReport};
use crate::store::{DocumentStore, FileStore};
use camino::Utf8PathBuf;
use clap::{Args, ValueEnum};
use ohno::IntoAppError;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use tick::Clock;

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Options accepted by every command
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Path to the configuration file (default is `repo-pulse/config.toml` in the platform config directory)
    #[arg(long, short = 'c', value_name = "PATH", global = true)]
    pub config: Option<Utf8PathBuf>,

    /// GitHub personal access token, overrides the configured one
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    pub github_token: Option<String>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,
}

/// Everything a command needs to talk to one repository's data.
#[derive(Debug)]
pub(super) struct Session {
    config: Config,
    repo: RepoRef,
    clock: Clock,
}

impl Session {
    pub(super) fn open(common: &CommonArgs, repo: &RepoRef) -> error::Result<Self> {
        let path = match &common.config {
            Some(path) => path.clone(),
            None => Config::default_path()?,
        };

        let config = Config::load(&path)?.with_token_override(common.github_token.clone());
        log::debug!(target: LOG_TARGET, "Loaded configuration from '{path}'");

        Ok(Self {
            config,
            repo: repo.clone(),
            clock: Clock::new_tokio(),
        })
    }

    pub(super) fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::new(FileStore::new(&self.config.store.root, &self.repo, self.config.collections()))
    }

    /// An orchestrator for event runs.
    pub(super) fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.repo.clone(), self.store(), self.clock.clone()).with_policy(self.config.policy)
    }

    /// An orchestrator for stats runs, which also needs the hosting API and the code counter.
    pub(super) fn stats_orchestrator(&self) -> error::Result<Orchestrator> {
        let client = Client::new(
            self.config.token()?,
            &self.config.github.api_url,
            self.clock.clone(),
            self.config.retry_policy(),
        )?;
        let provider = Provider::new(client, self.config.traffic.window_days);
        let counter = Arc::new(TokeiCounter::new(&self.config.collector.program, self.config.collector.timeout));

        Ok(self.orchestrator().with_stats_sources(provider, counter))
    }
}

const LOG_TARGET: &str = "  commands";

/// Initialize logger based on log level
pub(super) fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    // a second command in the same process keeps the first logger
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init();
}

/// Write `value` to the host's output as pretty JSON.
pub(super) fn print_json<H: Host, T: Serialize>(host: &mut H, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_app_err("serializing output")?;
    writeln!(host.output(), "{json}").into_app_err("writing output")
}

/// Print the record a run produced, preceded by its warnings on the error stream.
pub(super) fn print_report<H: Host>(host: &mut H, report: &RunReport) -> Result<()> {
    for warning in &report.warnings {
        let _ = writeln!(host.error(), "warning: {warning}");
    }

    if !report.persisted {
        let _ = writeln!(host.error(), "dry run: record not persisted");
    }

    print_json(host, &report.record)
}

/// Report a fatal pipeline error and end the process.
pub(super) fn fail<H: Host, T>(host: &mut H, e: Error) -> Result<T> {
    let stage = e.stage();
    let _ = writeln!(host.error(), "Error while {stage}: {e}");
    host.exit(1);
    Err::<T, _>(e).into_app_err_with(|| format!("repo-pulse failed while {stage}"))
}
