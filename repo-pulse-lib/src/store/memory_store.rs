use super::{Collections, DocumentStore, LOG_TARGET};
use crate::error::{Error, Result};
use crate::records::{EventRecord, StatsRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// An in-process store keyed by date.
///
/// Can be switched into an unavailable mode where every call fails with a
/// persistence error, and counts successful writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Collections,
    stats: Mutex<BTreeMap<NaiveDate, StatsRecord>>,
    events: Mutex<BTreeMap<NaiveDate, Vec<EventRecord>>>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new(collections: Collections) -> Self {
        Self {
            collections,
            ..Self::default()
        }
    }

    /// Make every following call fail, or succeed again.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self, operation: &'static str, collection: &str) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::persistence(operation, collection, "store is unavailable"));
        }
        Ok(())
    }

    fn stats_map(&self, operation: &'static str) -> Result<MutexGuard<'_, BTreeMap<NaiveDate, StatsRecord>>> {
        let collection = &self.collections.stats;
        self.check(operation, collection)?;
        self.stats.lock().map_err(|e| Error::persistence(operation, collection, e))
    }

    fn events_map(&self, operation: &'static str) -> Result<MutexGuard<'_, BTreeMap<NaiveDate, Vec<EventRecord>>>> {
        let collection = &self.collections.events;
        self.check(operation, collection)?;
        self.events.lock().map_err(|e| Error::persistence(operation, collection, e))
    }
}

impl DocumentStore for MemoryStore {
    fn collections(&self) -> &Collections {
        &self.collections
    }

    fn upsert_stats(&self, record: &StatsRecord) -> Result<()> {
        let replaced = self.stats_map("upsert")?.insert(record.date, record.clone()).is_some();
        let _ = self.writes.fetch_add(1, Ordering::SeqCst);

        log::debug!(target: LOG_TARGET, "Upserted stats for {} (replaced: {replaced})", record.date);
        Ok(())
    }

    fn append_event(&self, record: &EventRecord) -> Result<()> {
        self.events_map("append")?.entry(record.date).or_default().push(record.clone());
        let _ = self.writes.fetch_add(1, Ordering::SeqCst);

        log::debug!(target: LOG_TARGET, "Appended event for {}", record.date);
        Ok(())
    }

    fn get_stats(&self, date: NaiveDate) -> Result<Option<StatsRecord>> {
        Ok(self.stats_map("read")?.get(&date).cloned())
    }

    fn list_stats(&self) -> Result<Vec<StatsRecord>> {
        Ok(self.stats_map("list")?.values().cloned().collect())
    }

    fn events_on(&self, date: NaiveDate) -> Result<Vec<EventRecord>> {
        Ok(self.events_map("read")?.get(&date).cloned().unwrap_or_default())
    }

    fn list_events(&self) -> Result<Vec<EventRecord>> {
        Ok(self.events_map("list")?.values().flatten().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::Metric;

    fn stats(day: u32, stars: u64) -> StatsRecord {
        StatsRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            stars,
            forks: 0,
            clones: Metric::absent("not requested"),
            views: Metric::absent("not requested"),
            loc: Metric::absent("no checkout path supplied"),
            total_loc: Metric::absent("no checkout path supplied"),
        }
    }

    #[test]
    fn test_upsert_is_idempotent_per_date() {
        let store = MemoryStore::default();

        store.upsert_stats(&stats(10, 1)).unwrap();
        store.upsert_stats(&stats(10, 2)).unwrap();
        store.upsert_stats(&stats(9, 3)).unwrap();

        let all = store.list_stats().unwrap();
        assert_eq!(all, vec![stats(9, 3), stats(10, 2)]);
        assert_eq!(store.write_count(), 3);
    }

    #[test]
    fn test_events_keep_insertion_order() {
        let store = MemoryStore::default();
        let date = NaiveDate::from_ymd_opt(2019, 6, 1).unwrap();

        for description in ["first", "second", "third"] {
            store
                .append_event(&EventRecord {
                    date,
                    description: description.to_string(),
                })
                .unwrap();
        }

        let descriptions: Vec<_> = store.events_on(date).unwrap().into_iter().map(|e| e.description).collect();
        assert_eq!(descriptions, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unavailable_store_fails_and_names_collection() {
        let store = MemoryStore::new(Collections {
            stats: "daily".to_string(),
            events: "annotations".to_string(),
        });
        store.set_unavailable(true);

        let err = store.upsert_stats(&stats(10, 1)).unwrap_err();
        assert!(matches!(err, Error::Persistence { operation: "upsert", .. }));
        assert!(err.to_string().contains("'daily'"));
        assert_eq!(store.write_count(), 0);

        store.set_unavailable(false);
        store.upsert_stats(&stats(10, 1)).unwrap();
        assert_eq!(store.write_count(), 1);
    }
}
