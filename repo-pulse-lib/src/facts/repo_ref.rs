use crate::error::Error;
use core::fmt::{Display, Formatter};
use core::str::FromStr;
use std::sync::Arc;
use url::Url;

const DEFAULT_HOST: &str = "github.com";

/// Identifies the repository a run targets.
///
/// Accepts `owner/name`, `host/owner/name`, or a full URL such as
/// `https://github.com/owner/name.git`. Anything after the repository name in a URL
/// path (`/tree/main/...`) is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    host: Arc<str>,
    owner: Arc<str>,
    name: Arc<str>,
}

impl RepoRef {
    #[must_use]
    pub fn new(host: &str, owner: &str, name: &str) -> Self {
        Self {
            host: Arc::from(host),
            owner: Arc::from(owner),
            name: Arc::from(name),
        }
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        let s = s.trim();

        if s.contains("://") {
            let url = Url::parse(s).map_err(|e| Error::Configuration(format!("invalid repository URL '{s}': {e}")))?;
            let segments: Vec<_> = url.path_segments().map(Iterator::collect).unwrap_or_default();
            let host = url.host_str().unwrap_or_default();
            return Self::from_parts(s, host, &segments);
        }

        let segments: Vec<_> = s.split('/').collect();
        match segments.len() {
            2 => Self::from_parts(s, DEFAULT_HOST, &segments),
            3 => Self::from_parts(s, segments[0], &segments[1..]),
            _ => Err(Error::Configuration(format!(
                "invalid repository reference '{s}': expected 'owner/name', 'host/owner/name' or a URL"
            ))),
        }
    }

    fn from_parts(original: &str, host: &str, segments: &[&str]) -> Result<Self, Error> {
        if segments.len() < 2 {
            return Err(Error::Configuration(format!("invalid repository reference '{original}': missing owner or name")));
        }

        let owner = segments[0];
        let name = segments[1].trim_end_matches(".git");

        if host.is_empty() || owner.is_empty() || name.is_empty() {
            return Err(Error::Configuration(format!(
                "invalid repository reference '{original}': empty host, owner or name"
            )));
        }

        Ok(Self::new(&host.to_ascii_lowercase(), owner, name))
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for RepoRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for RepoRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}/{}", self.host, self.owner, self.name)
    }
}
