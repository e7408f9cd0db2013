use super::collection_lock::CollectionLock;
use super::{Collections, DocumentStore, LOG_TARGET};
use crate::error::{Error, Result};
use crate::facts::RepoRef;
use crate::records::{EventRecord, StatsRecord};
use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

const STATS_EXTENSION: &str = "json";
const EVENTS_EXTENSION: &str = "jsonl";
const TEMP_SUFFIX: &str = ".tmp";

/// JSON documents on disk, one directory per repository and collection.
///
/// ```text
/// <root>/<host>/<owner>/<name>/<stats collection>/<date>.json
/// <root>/<host>/<owner>/<name>/<events collection>/<date>.jsonl
/// ```
///
/// A stats document is written to a temporary sibling and renamed over its target,
/// so readers see either the previous record or the new one. Events are appended to
/// the day's file as one JSON object per line. Writers serialize on an advisory lock
/// held on the collection directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    stats_dir: PathBuf,
    events_dir: PathBuf,
    collections: Collections,
}

impl FileStore {
    #[must_use]
    pub fn new(root: impl AsRef<Path>, repo: &RepoRef, collections: Collections) -> Self {
        let repo_dir = root
            .as_ref()
            .join(sanitize_path_component(repo.host()))
            .join(sanitize_path_component(repo.owner()))
            .join(sanitize_path_component(repo.name()));

        Self {
            stats_dir: repo_dir.join(sanitize_path_component(&collections.stats)),
            events_dir: repo_dir.join(sanitize_path_component(&collections.events)),
            collections,
        }
    }

    #[must_use]
    pub fn stats_dir(&self) -> &Path {
        &self.stats_dir
    }

    #[must_use]
    pub fn events_dir(&self) -> &Path {
        &self.events_dir
    }

    fn stats_path(&self, date: NaiveDate) -> PathBuf {
        self.stats_dir.join(format!("{date}.{STATS_EXTENSION}"))
    }

    fn events_path(&self, date: NaiveDate) -> PathBuf {
        self.events_dir.join(format!("{date}.{EVENTS_EXTENSION}"))
    }
}

impl DocumentStore for FileStore {
    fn collections(&self) -> &Collections {
        &self.collections
    }

    fn upsert_stats(&self, record: &StatsRecord) -> Result<()> {
        let collection = self.collections.stats.as_str();
        let fail = |message: String| Error::persistence("upsert", collection, message);

        create_dir(&self.stats_dir, "upsert", collection)?;
        let _lock = CollectionLock::acquire(&self.stats_dir, collection)?;

        let target = self.stats_path(record.date);
        let temp = target.with_extension(format!("{STATS_EXTENSION}{TEMP_SUFFIX}"));

        write_json(&temp, record).map_err(|e| fail(format!("could not write '{}': {e}", temp.display())))?;

        if let Err(e) = fs::rename(&temp, &target) {
            let _ = fs::remove_file(&temp);
            return Err(fail(format!("could not move '{}' into place: {e}", target.display())));
        }

        log::debug!(target: LOG_TARGET, "Upserted stats for {} into '{}'", record.date, target.display());
        Ok(())
    }

    fn append_event(&self, record: &EventRecord) -> Result<()> {
        let collection = self.collections.events.as_str();
        let fail = |message: String| Error::persistence("append", collection, message);

        create_dir(&self.events_dir, "append", collection)?;
        let _lock = CollectionLock::acquire(&self.events_dir, collection)?;

        let path = self.events_path(record.date);
        let line = serde_json::to_string(record).map_err(|e| fail(format!("could not serialize event: {e}")))?;

        append_line(&path, &line).map_err(|e| fail(format!("could not append to '{}': {e}", path.display())))?;

        log::debug!(target: LOG_TARGET, "Appended event for {} to '{}'", record.date, path.display());
        Ok(())
    }

    fn get_stats(&self, date: NaiveDate) -> Result<Option<StatsRecord>> {
        let collection = self.collections.stats.as_str();
        let path = self.stats_path(date);

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::persistence("read", collection, format!("could not open '{}': {e}", path.display()))),
        };

        serde_json::from_reader(BufReader::new(file))
            .map(Some)
            .map_err(|e| Error::persistence("read", collection, format!("could not parse '{}': {e}", path.display())))
    }

    fn list_stats(&self) -> Result<Vec<StatsRecord>> {
        let collection = self.collections.stats.as_str();

        dated_files(&self.stats_dir, STATS_EXTENSION, collection)?
            .into_iter()
            .filter_map(|(date, _)| self.get_stats(date).transpose())
            .collect()
    }

    fn events_on(&self, date: NaiveDate) -> Result<Vec<EventRecord>> {
        read_lines(&self.events_path(date), &self.collections.events)
    }

    fn list_events(&self) -> Result<Vec<EventRecord>> {
        let collection = self.collections.events.as_str();

        let mut events = Vec::new();
        for (_, path) in dated_files(&self.events_dir, EVENTS_EXTENSION, collection)? {
            events.extend(read_lines::<EventRecord>(&path, collection)?);
        }

        Ok(events)
    }
}

fn create_dir(dir: &Path, operation: &'static str, collection: &str) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::persistence(operation, collection, format!("could not create directory '{}': {e}", dir.display())))
}

fn write_json<T: Serialize>(path: &Path, data: &T) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

/// Every `<date>.<extension>` file in `dir`, sorted by date.
///
/// A missing directory simply holds no documents. Files whose stem is not a date
/// (temporaries, the lock file, strays) are skipped.
fn dated_files(dir: &Path, extension: &str, collection: &str) -> Result<Vec<(NaiveDate, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::persistence("list", collection, format!("could not read directory '{}': {e}", dir.display()))),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::persistence("list", collection, format!("could not read directory '{}': {e}", dir.display())))?;
        let path = entry.path();

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if CollectionLock::is_lock_file(name) {
            continue;
        }

        let date = name
            .strip_suffix(extension)
            .and_then(|stem| stem.strip_suffix('.'))
            .and_then(|stem| stem.parse::<NaiveDate>().ok());

        match date {
            Some(date) => files.push((date, path)),
            None => log::trace!(target: LOG_TARGET, "Skipping '{}'", path.display()),
        }
    }

    files.sort_by_key(|(date, _)| *date);
    Ok(files)
}

/// Append `line` and its terminator with a single write.
///
/// An unterminated tail left by an earlier interrupted write is dropped first, and a
/// failed write is truncated away, so the file always ends on a complete line.
fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).read(true).append(true).open(path)?;
    let len = trim_torn_tail(&mut file, path)?;

    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');

    if let Err(e) = file.write_all(buf.as_bytes()).and_then(|()| file.sync_data()) {
        let _ = file.set_len(len);
        return Err(e);
    }

    Ok(())
}

/// Cut `file` back to its last complete line and return the resulting length.
fn trim_torn_tail(file: &mut File, path: &Path) -> std::io::Result<u64> {
    let mut contents = Vec::new();
    let _ = file.read_to_end(&mut contents)?;

    let complete = contents.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    if complete < contents.len() {
        log::warn!(
            target: LOG_TARGET,
            "Dropping {} byte(s) of unterminated data at the end of '{}'",
            contents.len() - complete,
            path.display()
        );
        file.set_len(complete as u64)?;
    }

    Ok(complete as u64)
}

fn read_lines<T: DeserializeOwned>(path: &Path, collection: &str) -> Result<Vec<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::persistence("read", collection, format!("could not open '{}': {e}", path.display()))),
    };

    let mut documents = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| Error::persistence("read", collection, format!("could not read '{}': {e}", path.display())))?;
        if line.trim().is_empty() {
            continue;
        }

        let document = serde_json::from_str(&line).map_err(|e| {
            Error::persistence("read", collection, format!("could not parse line {} of '{}': {e}", index + 1, path.display()))
        })?;
        documents.push(document);
    }

    Ok(documents)
}

/// Make a repository or collection name safe to use as a single directory name.
///
/// Path separators and characters that are invalid on common filesystems become `_`,
/// and `..` cannot survive, so a name never escapes the store root.
fn sanitize_path_component(s: &str) -> String {
    let s = s.replace("..", "__");
    let s = s.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");

    if s.is_empty() || s == "." { "_".to_string() } else { s }
}
