use super::{LOG_TARGET, MetricPolicy, Requirement, RunState};
use crate::clock;
use crate::error::{Error, Result};
use crate::facts::codebase::LineCounter;
use crate::facts::hosting::Provider;
use crate::facts::{Metric, MetricKind, RepoRef};
use crate::records::{EventRecord, HostingCounts, StatsRecord, normalize, record_event};
use crate::store::DocumentStore;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tick::Clock;
use tokio::task::spawn_blocking;

const NO_CHECKOUT_REASON: &str = "no checkout path supplied";

/// What a single invocation does. The two modes never mix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Collect metrics and upsert today's stats record.
    Stats { checkout: Option<PathBuf> },

    /// Append one event, dated `date` or today.
    Event { description: String, date: Option<NaiveDate> },
}

/// The record a run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Stats(StatsRecord),
    Event(EventRecord),
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub record: Record,
    /// `false` for dry runs.
    pub persisted: bool,
    /// Optional metrics that could not be collected.
    pub warnings: Vec<String>,
    pub state: RunState,
}

/// Outcome of a failed run.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RunFailure {
    /// The state the run was in when the error occurred.
    pub failed_in: RunState,
    /// Always [`RunState::Failed`].
    pub state: RunState,
    pub error: Error,
}

#[derive(Debug, Clone)]
struct StatsSources {
    provider: Provider,
    counter: Arc<dyn LineCounter>,
}

/// Drives one run against one repository.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    repo: RepoRef,
    sources: Option<StatsSources>,
    store: Arc<dyn DocumentStore>,
    clock: Clock,
    policy: MetricPolicy,
    dry_run: bool,
}

/// Tracks the state of a run and logs every transition.
#[derive(Debug)]
struct Progress {
    state: RunState,
}

impl Progress {
    const fn new() -> Self {
        Self { state: RunState::Idle }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(self.state.can_transition_to(next), "illegal transition {} -> {next}", self.state);
        log::debug!(target: LOG_TARGET, "{} -> {next}", self.state);
        self.state = next;
    }

    fn fail(&mut self, error: Error) -> RunFailure {
        log::debug!(target: LOG_TARGET, "{} -> {} ({})", self.state, RunState::Failed, error.stage());
        let failed_in = self.state;
        self.state = RunState::Failed;
        RunFailure {
            failed_in,
            state: self.state,
            error,
        }
    }
}

impl Orchestrator {
    /// An orchestrator that can record events. Stats runs also need [`Self::with_stats_sources`].
    #[must_use]
    pub fn new(repo: RepoRef, store: Arc<dyn DocumentStore>, clock: Clock) -> Self {
        Self {
            repo,
            sources: None,
            store,
            clock,
            policy: MetricPolicy::default(),
            dry_run: false,
        }
    }

    #[must_use]
    pub fn with_stats_sources(mut self, provider: Provider, counter: Arc<dyn LineCounter>) -> Self {
        self.sources = Some(StatsSources { provider, counter });
        self
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: MetricPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Compute the record but do not write it.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Execute one run.
    ///
    /// Required-metric failures, authentication failures, invalid events and store
    /// failures end the run in [`RunState::Failed`]; nothing is persisted in the first
    /// three cases.
    pub async fn run(&self, mode: RunMode) -> Result<RunReport, RunFailure> {
        let mut progress = Progress::new();
        let mut warnings = Vec::new();

        let record = match mode {
            RunMode::Stats { checkout } => {
                progress.advance(RunState::FetchingStats);
                let record = self
                    .fetch_stats(checkout.as_deref(), &mut warnings)
                    .await
                    .map_err(|e| progress.fail(e))?;
                Record::Stats(record)
            }

            RunMode::Event { description, date } => {
                progress.advance(RunState::RecordingEvent);
                let date = date.unwrap_or_else(|| clock::today(&self.clock));
                let record = record_event(&description, date).map_err(|e| progress.fail(e))?;
                Record::Event(record)
            }
        };

        if self.dry_run {
            log::info!(target: LOG_TARGET, "Dry run for '{}', not persisting", self.repo);
            progress.advance(RunState::Done);
            return Ok(RunReport {
                record,
                persisted: false,
                warnings,
                state: progress.state,
            });
        }

        progress.advance(RunState::Persisting);
        self.persist(&record).await.map_err(|e| progress.fail(e))?;
        progress.advance(RunState::Done);

        Ok(RunReport {
            record,
            persisted: true,
            warnings,
            state: progress.state,
        })
    }

    async fn fetch_stats(&self, checkout: Option<&Path>, warnings: &mut Vec<String>) -> Result<StatsRecord> {
        let sources = self
            .sources
            .as_ref()
            .ok_or_else(|| Error::Configuration("stats runs need a hosting API client".to_string()))?;

        let provider = &sources.provider;
        let repo = &self.repo;
        let today = clock::today(&self.clock);

        log::info!(target: LOG_TARGET, "Collecting stats for '{repo}' on {today}");

        let (metadata, stars, forks, clones, views, loc) = tokio::join!(
            provider.repository(repo),
            provider.count_stars(repo),
            provider.count_forks(repo),
            provider.count_clones(repo, today),
            provider.count_views(repo, today),
            count_lines(sources.counter.as_ref(), checkout),
        );

        let metadata = metadata?;
        log::debug!(target: LOG_TARGET, "Repository '{}' is reachable", metadata.full_name);

        let counts = HostingCounts {
            stars: stars?,
            forks: forks?,
            clones: self.absorb(MetricKind::Clones, clones, warnings)?,
            views: self.absorb(MetricKind::Views, views, warnings)?,
        };

        let loc = match loc {
            Ok(loc) => loc,
            Err(e) => Metric::absent(e.to_string()),
        };
        if let Some(reason) = loc.absent_reason() {
            warn(warnings, format!("{} not collected: {reason}", MetricKind::Loc));
        }

        Ok(normalize(counts, loc, today))
    }

    /// Apply the policy to the outcome of an optional-by-default metric.
    fn absorb(&self, kind: MetricKind, outcome: Result<u64>, warnings: &mut Vec<String>) -> Result<Metric<u64>> {
        match outcome {
            Ok(value) => Ok(Metric::Present(value)),
            Err(e @ Error::Authentication { .. }) => Err(e),
            Err(e) if self.policy.requirement(kind) == Requirement::Required => Err(e),
            Err(e) => {
                let reason = e.to_string();
                warn(warnings, format!("{kind} not collected: {reason}"));
                Ok(Metric::absent(reason))
            }
        }
    }

    async fn persist(&self, record: &Record) -> Result<()> {
        let store = Arc::clone(&self.store);
        let collections = store.collections().clone();
        let record = record.clone();

        let (operation, collection) = match &record {
            Record::Stats(_) => ("upsert", collections.stats),
            Record::Event(_) => ("append", collections.events),
        };

        log::info!(target: LOG_TARGET, "Writing to collection '{collection}' for '{}'", self.repo);

        spawn_blocking(move || match &record {
            Record::Stats(stats) => store.upsert_stats(stats),
            Record::Event(event) => store.append_event(event),
        })
        .await
        .map_err(|e| Error::persistence(operation, &collection, format!("store task failed: {e}")))?
    }
}

async fn count_lines(counter: &dyn LineCounter, checkout: Option<&Path>) -> Result<Metric<BTreeMap<String, u64>>> {
    let Some(checkout) = checkout else {
        return Ok(Metric::absent(NO_CHECKOUT_REASON));
    };

    let report = counter.count_lines(checkout).await?;
    Ok(Metric::Present(report.languages))
}

fn warn(warnings: &mut Vec<String>, message: String) {
    log::warn!(target: LOG_TARGET, "{message}");
    warnings.push(message);
}
