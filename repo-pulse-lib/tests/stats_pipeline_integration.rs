//! End-to-end stats runs: mock GitHub API, stub code counter, in-memory or on-disk store.

use chrono::{Days, NaiveDate};
use core::time::Duration;
use futures::future::BoxFuture;
use repo_pulse_lib::clock;
use repo_pulse_lib::error::{Error, Result};
use repo_pulse_lib::facts::codebase::{LineCounter, LocReport};
use repo_pulse_lib::facts::hosting::{Client, Provider, RetryPolicy};
use repo_pulse_lib::facts::{Metric, MetricKind, RepoRef};
use repo_pulse_lib::pipeline::{MetricPolicy, Orchestrator, Record, Requirement, RunMode, RunState};
use repo_pulse_lib::records::StatsRecord;
use repo_pulse_lib::store::{Collections, DocumentStore, FileStore, MemoryStore};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tick::{Clock, ClockControl};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OWNER: &str = "microsoft";
const NAME: &str = "nlp-recipes";

/// A clock that only moves when a delay is awaited.
fn controlled_clock() -> Clock {
    ClockControl::new().auto_advance_timers(true).to_clock()
}

/// Midnight of `days` days before `today`, as the traffic API formats it.
fn day_stamp(today: NaiveDate, days: u64) -> String {
    format!("{}T00:00:00Z", today - Days::new(days))
}

fn repo() -> RepoRef {
    RepoRef::new("github.com", OWNER, NAME)
}

/// A code counter that returns a fixed report, or fails like a missing `tokei` would.
#[derive(Debug)]
struct StubCounter(Option<LocReport>);

impl LineCounter for StubCounter {
    fn count_lines<'a>(&'a self, _checkout: &'a Path) -> BoxFuture<'a, Result<LocReport>> {
        let outcome = self
            .0
            .clone()
            .ok_or_else(|| Error::CollectorUnavailable("could not spawn 'tokei': No such file or directory".to_string()));
        Box::pin(core::future::ready(outcome))
    }
}

fn python_only() -> Arc<dyn LineCounter> {
    Arc::new(StubCounter(Some([("python".to_string(), 5000)].into_iter().collect())))
}

fn missing_counter() -> Arc<dyn LineCounter> {
    Arc::new(StubCounter(None))
}

fn entries(count: usize) -> serde_json::Value {
    json!((0..count).map(|i| json!({ "id": i })).collect::<Vec<_>>())
}

async fn mount_json(server: &MockServer, endpoint: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/{OWNER}/{NAME}{endpoint}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// A healthy repository: 120 stars over two pages, 30 forks, 15 clones and 200 views
/// in the traffic window ending `today`.
async fn healthy_api(today: NaiveDate, views_fail: bool) -> MockServer {
    let server = MockServer::start().await;

    mount_json(&server, "", json!({ "full_name": "microsoft/nlp-recipes", "stargazers_count": 120, "forks_count": 30 })).await;

    Mock::given(method("GET"))
        .and(path(format!("/repos/{OWNER}/{NAME}/stargazers")))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries(100)).insert_header(
            "link",
            format!(r#"<{}/repos/{OWNER}/{NAME}/stargazers?per_page=100&page=2>; rel="next""#, server.uri()).as_str(),
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/repos/{OWNER}/{NAME}/stargazers")))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries(20)))
        .mount(&server)
        .await;

    mount_json(&server, "/forks", entries(30)).await;

    mount_json(
        &server,
        "/traffic/clones",
        json!({
            "count": 15,
            "uniques": 4,
            "clones": [
                { "timestamp": day_stamp(today, 2), "count": 10, "uniques": 3 },
                { "timestamp": day_stamp(today, 0), "count": 5, "uniques": 1 }
            ]
        }),
    )
    .await;

    if views_fail {
        Mock::given(method("GET"))
            .and(path(format!("/repos/{OWNER}/{NAME}/traffic/views")))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;
    } else {
        mount_json(
            &server,
            "/traffic/views",
            json!({
                "count": 200,
                "uniques": 50,
                "views": [
                    { "timestamp": day_stamp(today, 1), "count": 80, "uniques": 20 },
                    { "timestamp": day_stamp(today, 0), "count": 120, "uniques": 30 }
                ]
            }),
        )
        .await;
    }

    server
}

fn build_orchestrator(server: &MockServer, store: Arc<dyn DocumentStore>, counter: Arc<dyn LineCounter>, clock: &Clock) -> Orchestrator {
    let retry = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(1),
    };
    let client = Client::new("test_token", server.uri(), clock.clone(), retry).unwrap();
    let provider = Provider::new(client, 14);

    Orchestrator::new(repo(), store, clock.clone()).with_stats_sources(provider, counter)
}

fn checkout() -> Option<PathBuf> {
    Some(PathBuf::from("/src/nlp-recipes"))
}

fn healthy_repo_record(today: NaiveDate) -> StatsRecord {
    StatsRecord {
        date: today,
        stars: 120,
        forks: 30,
        clones: Metric::Present(15),
        views: Metric::Present(200),
        loc: Metric::Present(BTreeMap::from([("python".to_string(), 5000)])),
        total_loc: Metric::Present(5000),
    }
}

#[tokio::test]
async fn test_full_stats_run_is_persisted() {
    let clock = controlled_clock();
    let today = clock::today(&clock);
    let server = healthy_api(today, false).await;
    let store = Arc::new(MemoryStore::default());
    let orchestrator = build_orchestrator(&server, Arc::clone(&store) as Arc<dyn DocumentStore>, python_only(), &clock);

    let report = orchestrator.run(RunMode::Stats { checkout: checkout() }).await.unwrap();

    assert_eq!(report.record, Record::Stats(healthy_repo_record(today)));
    assert!(report.persisted);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(report.state, RunState::Done);

    assert_eq!(store.get_stats(today).unwrap(), Some(healthy_repo_record(today)));
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn test_optional_views_failure_persists_with_absent_views() {
    let clock = controlled_clock();
    let today = clock::today(&clock);
    let started = clock::now(&clock);
    let server = healthy_api(today, true).await;
    let store = Arc::new(MemoryStore::default());
    let orchestrator = build_orchestrator(&server, Arc::clone(&store) as Arc<dyn DocumentStore>, python_only(), &clock);

    let report = orchestrator.run(RunMode::Stats { checkout: checkout() }).await.unwrap();

    let Record::Stats(record) = &report.record else {
        panic!("expected a stats record");
    };
    assert!(record.views.absent_reason().unwrap().contains("views"));
    assert_eq!(record.stars, 120);
    assert_eq!(record.forks, 30);
    assert_eq!(record.clones, Metric::Present(15));
    assert_eq!(record.total_loc, Metric::Present(5000));

    assert!(report.persisted);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("views"));
    assert_eq!(store.get_stats(today).unwrap().as_ref(), Some(record));

    // the retries backed off on the injected clock
    assert!(clock::now(&clock) > started);
    server.verify().await;
}

#[tokio::test]
async fn test_required_views_failure_aborts_before_persisting() {
    let clock = controlled_clock();
    let server = healthy_api(clock::today(&clock), true).await;
    let store = Arc::new(MemoryStore::default());
    let orchestrator = build_orchestrator(&server, Arc::clone(&store) as Arc<dyn DocumentStore>, python_only(), &clock).with_policy(MetricPolicy {
        clones: Requirement::Optional,
        views: Requirement::Required,
    });

    let failure = orchestrator.run(RunMode::Stats { checkout: checkout() }).await.unwrap_err();
    assert_eq!(failure.failed_in, RunState::FetchingStats);
    assert_eq!(failure.state, RunState::Failed);

    let err = failure.error;
    assert!(matches!(err, Error::UpstreamUnavailable { kind: MetricKind::Views, .. }), "{err}");
    assert!(err.to_string().contains("views"));
    assert_eq!(err.stage(), "fetching stats");
    assert_eq!(store.write_count(), 0);
    assert!(store.list_stats().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_code_counter_degrades_loc_only() {
    let clock = controlled_clock();
    let today = clock::today(&clock);
    let server = healthy_api(today, false).await;
    let store = Arc::new(MemoryStore::default());
    let orchestrator = build_orchestrator(&server, Arc::clone(&store) as Arc<dyn DocumentStore>, missing_counter(), &clock);

    let report = orchestrator.run(RunMode::Stats { checkout: checkout() }).await.unwrap();

    let Record::Stats(record) = report.record else {
        panic!("expected a stats record");
    };
    assert!(record.loc.absent_reason().unwrap().contains("tokei"));
    assert!(record.total_loc.absent_reason().unwrap().contains("tokei"));
    assert_eq!(record.stars, 120);
    assert_eq!(record.forks, 30);
    assert_eq!(record.clones, Metric::Present(15));
    assert_eq!(record.views, Metric::Present(200));

    assert!(report.persisted);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(store.get_stats(today).unwrap(), Some(record));
}

#[tokio::test]
async fn test_no_checkout_marks_loc_absent() {
    let clock = controlled_clock();
    let server = healthy_api(clock::today(&clock), false).await;
    let store = Arc::new(MemoryStore::default());
    let orchestrator = build_orchestrator(&server, Arc::clone(&store) as Arc<dyn DocumentStore>, python_only(), &clock);

    let report = orchestrator.run(RunMode::Stats { checkout: None }).await.unwrap();

    let Record::Stats(record) = report.record else {
        panic!("expected a stats record");
    };
    assert_eq!(record.loc.absent_reason(), Some("no checkout path supplied"));
    assert_eq!(record.total_loc.absent_reason(), Some("no checkout path supplied"));
    assert!(report.persisted);
}

#[tokio::test]
async fn test_dry_run_computes_without_persisting() {
    let clock = controlled_clock();
    let today = clock::today(&clock);
    let server = healthy_api(today, false).await;
    let store = Arc::new(MemoryStore::default());
    let orchestrator = build_orchestrator(&server, Arc::clone(&store) as Arc<dyn DocumentStore>, python_only(), &clock);

    let report = orchestrator
        .with_dry_run(true)
        .run(RunMode::Stats { checkout: checkout() })
        .await
        .unwrap();

    assert_eq!(report.record, Record::Stats(healthy_repo_record(today)));
    assert!(!report.persisted);
    assert_eq!(report.state, RunState::Done);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_unavailable_store_is_persistence_error() {
    let clock = controlled_clock();
    let server = healthy_api(clock::today(&clock), false).await;
    let store = Arc::new(MemoryStore::default());
    store.set_unavailable(true);
    let orchestrator = build_orchestrator(&server, Arc::clone(&store) as Arc<dyn DocumentStore>, python_only(), &clock);

    let failure = orchestrator.run(RunMode::Stats { checkout: checkout() }).await.unwrap_err();

    assert_eq!(failure.failed_in, RunState::Persisting);
    assert_eq!(failure.state, RunState::Failed);
    assert!(matches!(failure.error, Error::Persistence { operation: "upsert", .. }), "{failure}");
    assert_eq!(failure.error.stage(), "persisting");
}

#[tokio::test]
async fn test_clone_traffic_permission_failure_is_fatal() {
    let server = MockServer::start().await;

    mount_json(&server, "", json!({ "full_name": "microsoft/nlp-recipes" })).await;
    mount_json(&server, "/stargazers", entries(3)).await;
    mount_json(&server, "/forks", entries(2)).await;
    mount_json(&server, "/traffic/views", json!({ "views": [] })).await;

    Mock::given(method("GET"))
        .and(path(format!("/repos/{OWNER}/{NAME}/traffic/clones")))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "message": "Must have push access to repository" })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::default());
    let orchestrator = build_orchestrator(&server, Arc::clone(&store) as Arc<dyn DocumentStore>, python_only(), &controlled_clock());

    let failure = orchestrator.run(RunMode::Stats { checkout: None }).await.unwrap_err();

    // clones are optional by default, but a rejected credential always ends the run
    assert!(matches!(failure.error, Error::Authentication { kind: MetricKind::Clones, .. }), "{failure}");
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_repeated_runs_on_same_day_keep_one_document() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn DocumentStore> = Arc::new(FileStore::new(temp_dir.path(), &repo(), Collections::default()));

    let clock = controlled_clock();
    let today = clock::today(&clock);

    let first = healthy_api(today, false).await;
    let orchestrator = build_orchestrator(&first, Arc::clone(&store), python_only(), &clock);
    let _ = orchestrator.run(RunMode::Stats { checkout: checkout() }).await.unwrap();

    let second = healthy_api(today, false).await;
    let orchestrator = build_orchestrator(&second, Arc::clone(&store), missing_counter(), &clock);
    let report = orchestrator.run(RunMode::Stats { checkout: checkout() }).await.unwrap();

    let Record::Stats(latest) = report.record else {
        panic!("expected a stats record");
    };

    let stored = store.list_stats().unwrap();
    assert_eq!(stored, vec![latest]);
    assert!(stored[0].loc.absent_reason().is_some());
}
