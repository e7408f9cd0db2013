use super::{LOG_TARGET, LocReport};
use crate::error::{Error, Result};
use core::fmt::Debug;
use core::time::Duration;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

/// Counts lines of code in a local checkout.
pub trait LineCounter: Send + Sync + Debug {
    fn count_lines<'a>(&'a self, checkout: &'a Path) -> BoxFuture<'a, Result<LocReport>>;
}

/// Runs `tokei --output json <path>` and reads its per-language code counts.
#[derive(Debug, Clone)]
pub struct TokeiCounter {
    program: PathBuf,
    timeout: Duration,
}

/// One language entry in tokei's JSON report. Only the code count matters here.
#[derive(Debug, Deserialize)]
struct LanguageStats {
    #[serde(default)]
    code: u64,
}

impl TokeiCounter {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    async fn count(&self, checkout: &Path) -> Result<LocReport> {
        let is_dir = tokio::fs::metadata(checkout).await.is_ok_and(|metadata| metadata.is_dir());
        if !is_dir {
            return Err(Error::CollectorUnavailable(format!(
                "checkout path '{}' does not exist or is not a directory",
                checkout.display()
            )));
        }

        let start_time = std::time::Instant::now();
        let output = self.run_with_timeout(checkout).await?;
        check_output(&output, &self.program)?;

        let report = parse_report(&output.stdout)?;

        log::debug!(
            target: LOG_TARGET,
            "Counted {} lines across {} language(s) in '{}' in {:.3}s",
            report.total(),
            report.languages.len(),
            checkout.display(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(report)
    }

    async fn run_with_timeout(&self, checkout: &Path) -> Result<Output> {
        let program = self.program.display();

        let child = Command::new(&self.program)
            .arg("--output")
            .arg("json")
            .arg(checkout)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::CollectorUnavailable(format!("could not spawn '{program}': {e}")))?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(Error::CollectorUnavailable(format!("'{program}' failed to run: {e}"))),
            Err(_) => Err(Error::CollectorUnavailable(format!(
                "'{program}' timed out after {} seconds",
                self.timeout.as_secs()
            ))),
        }
    }
}

impl LineCounter for TokeiCounter {
    fn count_lines<'a>(&'a self, checkout: &'a Path) -> BoxFuture<'a, Result<LocReport>> {
        Box::pin(self.count(checkout))
    }
}

fn check_output(output: &Output, program: &Path) -> Result<()> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::CollectorUnavailable(format!(
            "'{}' exited with {}: {}",
            program.display(),
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

/// Turn tokei's JSON report into a [`LocReport`].
///
/// The synthetic `Total` entry is skipped, language names are lower-cased and
/// languages without any code lines are dropped.
fn parse_report(stdout: &[u8]) -> Result<LocReport> {
    let raw: BTreeMap<String, LanguageStats> =
        serde_json::from_slice(stdout).map_err(|e| Error::CollectorUnavailable(format!("could not parse code counter output: {e}")))?;

    Ok(raw
        .into_iter()
        .filter(|(language, stats)| language != "Total" && stats.code > 0)
        .map(|(language, stats)| (language.to_lowercase(), stats.code))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::ExitStatus;

    fn exit_status(code: i32) -> ExitStatus {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            ExitStatus::from_raw(code << 8)
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::ExitStatusExt;
            ExitStatus::from_raw(code as u32)
        }
    }

    #[test]
    fn test_parse_report() {
        let json = br#"{
            "Python": { "blanks": 800, "code": 5000, "comments": 400, "reports": [], "children": {}, "inaccurate": false },
            "Markdown": { "blanks": 10, "code": 0, "comments": 90, "reports": [], "children": {}, "inaccurate": false },
            "Jupyter Notebooks": { "blanks": 0, "code": 1200, "comments": 0, "reports": [], "children": {}, "inaccurate": false },
            "Total": { "blanks": 810, "code": 6200, "comments": 490, "reports": [], "children": {}, "inaccurate": false }
        }"#;

        let report = parse_report(json).unwrap();

        assert_eq!(report.languages.len(), 2);
        assert_eq!(report.languages.get("python"), Some(&5000));
        assert_eq!(report.languages.get("jupyter notebooks"), Some(&1200));
        assert!(!report.languages.contains_key("markdown"));
        assert!(!report.languages.contains_key("total"));
        assert_eq!(report.total(), 6200);
    }

    #[test]
    fn test_parse_empty_report() {
        let report = parse_report(b"{}").unwrap();
        assert!(report.languages.is_empty());
        assert_eq!(report.total(), 0);
    }

    #[test]
    fn test_parse_garbage_is_collector_unavailable() {
        let err = parse_report(b"tokei: command not understood").unwrap_err();
        assert!(matches!(err, Error::CollectorUnavailable(_)));
    }

    #[test]
    fn test_check_output_failure_includes_stderr() {
        let output = Output {
            status: exit_status(1),
            stdout: vec![],
            stderr: b"error: unknown output format".to_vec(),
        };

        let err = check_output(&output, Path::new("tokei")).unwrap_err();
        assert!(matches!(err, Error::CollectorUnavailable(_)));
        assert!(err.to_string().contains("unknown output format"));
    }

    #[test]
    fn test_check_output_success() {
        let output = Output {
            status: exit_status(0),
            stdout: b"{}".to_vec(),
            stderr: vec![],
        };

        check_output(&output, Path::new("tokei")).unwrap();
    }

    #[tokio::test]
    async fn test_missing_checkout_is_collector_unavailable() {
        let counter = TokeiCounter::new("tokei", Duration::from_secs(5));
        let err = counter.count_lines(Path::new("/definitely/not/a/checkout")).await.unwrap_err();

        assert!(matches!(err, Error::CollectorUnavailable(_)));
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_file_checkout_is_collector_unavailable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let counter = TokeiCounter::new("tokei", Duration::from_secs(5));
        let err = counter.count_lines(file.path()).await.unwrap_err();

        assert!(err.to_string().contains("is not a directory"));
    }

    #[tokio::test]
    async fn test_missing_program_is_collector_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let counter = TokeiCounter::new("repo-pulse-no-such-counter", Duration::from_secs(5));
        let err = counter.count_lines(dir.path()).await.unwrap_err();

        assert!(matches!(err, Error::CollectorUnavailable(_)));
        assert!(err.to_string().contains("could not spawn"));
    }
}
