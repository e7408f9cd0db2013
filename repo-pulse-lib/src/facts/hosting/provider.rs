use super::LOG_TARGET;
use super::client::Client;
use super::traffic::{CloneTraffic, ViewTraffic, sum_window};
use crate::error::{Error, Result};
use crate::facts::{MetricKind, RepoRef};
use chrono::NaiveDate;
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};

const PAGE_SIZE: u8 = 100;

/// Guards against a server that keeps handing out `next` links forever.
const MAX_PAGES: u32 = 10_000;

/// Minimal repository metadata with only the fields we need
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
}

/// Fetches repository metrics from the GitHub REST API.
///
/// Every count is fully materialized: list endpoints are followed page by page until
/// no `next` link remains, and a failure on any page fails the whole metric.
#[derive(Debug, Clone)]
pub struct Provider {
    client: Client,
    traffic_window_days: u32,
}

impl Provider {
    #[must_use]
    pub const fn new(client: Client, traffic_window_days: u32) -> Self {
        Self {
            client,
            traffic_window_days,
        }
    }

    /// Fetch repository metadata, which also validates the repository and the credential.
    pub async fn repository(&self, repo: &RepoRef) -> Result<Repository> {
        let url = self.repo_url(repo, "");
        let page = self.client.get_page(MetricKind::Metadata, &url).await?;
        decode(MetricKind::Metadata, page.response).await
    }

    /// Count stargazers across all pages.
    pub async fn count_stars(&self, repo: &RepoRef) -> Result<u64> {
        let url = self.repo_url(repo, &format!("/stargazers?per_page={PAGE_SIZE}&page=1"));
        self.paginate(MetricKind::Stars, url, |page: Vec<IgnoredAny>| page.len() as u64).await
    }

    /// Count forks across all pages.
    pub async fn count_forks(&self, repo: &RepoRef) -> Result<u64> {
        let url = self.repo_url(repo, &format!("/forks?per_page={PAGE_SIZE}&page=1"));
        self.paginate(MetricKind::Forks, url, |page: Vec<IgnoredAny>| page.len() as u64).await
    }

    /// Sum of daily clones over the trailing window ending `today`.
    pub async fn count_clones(&self, repo: &RepoRef, today: NaiveDate) -> Result<u64> {
        let url = self.repo_url(repo, "/traffic/clones?per=day");
        let window_days = self.traffic_window_days;
        self.paginate(MetricKind::Clones, url, move |page: CloneTraffic| sum_window(&page.clones, today, window_days))
            .await
    }

    /// Sum of daily page views over the trailing window ending `today`.
    pub async fn count_views(&self, repo: &RepoRef, today: NaiveDate) -> Result<u64> {
        let url = self.repo_url(repo, "/traffic/views?per=day");
        let window_days = self.traffic_window_days;
        self.paginate(MetricKind::Views, url, move |page: ViewTraffic| sum_window(&page.views, today, window_days))
            .await
    }

    /// Fetch every page starting at `url` and add up what `count_page` extracts from each.
    async fn paginate<T, F>(&self, kind: MetricKind, url: String, count_page: F) -> Result<u64>
    where
        T: DeserializeOwned,
        F: Fn(T) -> u64,
    {
        let mut next_url = Some(url);
        let mut total = 0_u64;
        let mut pages = 0_u32;

        while let Some(url) = next_url {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(Error::UpstreamUnavailable {
                    kind,
                    message: format!("pagination did not terminate after {MAX_PAGES} pages"),
                });
            }

            let page = self.client.get_page(kind, &url).await?;
            next_url = page.next_url;

            let body: T = decode(kind, page.response).await?;
            total = total.saturating_add(count_page(body));
        }

        log::debug!(target: LOG_TARGET, "Counted {total} {kind} over {pages} page(s)");
        Ok(total)
    }

    /// Construct API URL for a repository with optional path suffix
    fn repo_url(&self, repo: &RepoRef, suffix: &str) -> String {
        format!("{}/repos/{}/{}{suffix}", self.client.base_url(), repo.owner(), repo.name())
    }
}

async fn decode<T: DeserializeOwned>(kind: MetricKind, response: reqwest::Response) -> Result<T> {
    response.json().await.map_err(|e| Error::UpstreamUnavailable {
        kind,
        message: format!("malformed response body: {e}"),
    })
}
