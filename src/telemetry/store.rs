//! Telemetry store with snapshot-isolated queries
//!
//! Samples live in a timestamp-ordered `Vec` behind an `Arc`. Readers clone
//! the `Arc` when a query starts and iterate that snapshot; writers copy on
//! write (`Arc::make_mut`) when a reader still holds the previous snapshot.
//! Appends are serialized by the writer mutex, which also owns the journal.

use crate::aggregator::zone_aggregator::canonical_density;
use crate::aggregator::{ZoneAggregator, ZoneSnapshot};
use crate::error::IngestError;
use crate::events::{DensitySample, NewSample, TimeRange, Timestamp};
use crate::telemetry::journal::{Journal, JournalEntry};
use chrono::Utc;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Query parameters for [`TelemetryStore::query`]
#[derive(Debug, Clone, Default)]
pub struct SampleFilter {
    pub event_id: Option<String>,
    pub zone_id: Option<String>,
    pub range: TimeRange,
    pub limit: Option<usize>,
    pub descending: bool,
}

impl SampleFilter {
    pub fn for_event(event_id: impl Into<String>) -> Self {
        Self {
            event_id: Some(event_id.into()),
            ..Self::default()
        }
    }

    pub fn zone(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }

    pub fn between(mut self, start: Option<Timestamp>, end: Option<Timestamp>) -> Self {
        self.range = TimeRange::new(start, end);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    fn matches(&self, sample: &DensitySample) -> bool {
        self.event_id
            .as_deref()
            .map_or(true, |event| sample.event_id == event)
            && self
                .zone_id
                .as_deref()
                .map_or(true, |zone| sample.zone_id == zone)
    }
}

/// A lazy, restartable view over the samples committed before the query began
///
/// Each call to [`SampleQuery::iter`] starts from the beginning of the same
/// snapshot; later appends are never visible through it.
#[derive(Debug, Clone)]
pub struct SampleQuery {
    snapshot: Arc<Vec<DensitySample>>,
    lower: usize,
    upper: usize,
    filter: SampleFilter,
}

impl SampleQuery {
    fn new(snapshot: Arc<Vec<DensitySample>>, filter: SampleFilter) -> Self {
        // The vector is timestamp-ordered, so the range bounds are two binary searches.
        let lower = match filter.range.start {
            Some(start) => snapshot.partition_point(|s| s.timestamp < start),
            None => 0,
        };
        let upper = match filter.range.end {
            Some(end) => snapshot.partition_point(|s| s.timestamp <= end),
            None => snapshot.len(),
        };
        let upper = upper.max(lower);
        Self {
            snapshot,
            lower,
            upper,
            filter,
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &DensitySample> + '_> {
        let window = &self.snapshot[self.lower..self.upper];
        let filter = &self.filter;
        let limit = filter.limit.unwrap_or(usize::MAX);
        let matching = move |sample: &&DensitySample| filter.matches(sample);

        if filter.descending {
            Box::new(window.iter().rev().filter(matching).take(limit))
        } else {
            Box::new(window.iter().filter(matching).take(limit))
        }
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn to_vec(&self) -> Vec<DensitySample> {
        self.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a SampleQuery {
    type Item = &'a DensitySample;
    type IntoIter = Box<dyn Iterator<Item = &'a DensitySample> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Durable append/query store for density samples
#[derive(Debug, Default)]
pub struct TelemetryStore {
    samples: RwLock<Arc<Vec<DensitySample>>>,
    writer: Mutex<Option<Journal>>,
    read_only: bool,
}

impl TelemetryStore {
    /// Create an in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a JSON-lines journal, replaying what it holds
    ///
    /// # Errors
    ///
    /// Fails if the journal cannot be read, a line is corrupt, or a replayed
    /// sample violates the ingestion invariants.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let (journal, entries) = Journal::open(path)?;
        Ok(Self {
            samples: RwLock::new(Arc::new(replayed_samples(entries)?)),
            writer: Mutex::new(Some(journal)),
            read_only: false,
        })
    }

    /// Load a journal for querying only
    ///
    /// A missing journal yields an empty store and no file is created.
    /// Appends fail with `IngestError::ReadOnly`.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let entries = Journal::replay(path)?;
        Ok(Self {
            samples: RwLock::new(Arc::new(replayed_samples(entries)?)),
            writer: Mutex::new(None),
            read_only: true,
        })
    }

    /// Validate and store one sample
    ///
    /// # Errors
    ///
    /// Returns `IngestError::InvalidSample` if `peopleCount` is negative,
    /// `densityPercentage` is outside [0, 100] or NaN, or an id is empty.
    /// Journal write failures are returned as-is and leave the store unchanged.
    pub fn append(&self, sample: NewSample) -> Result<DensitySample, IngestError> {
        let mut committed = self.append_batch(vec![sample])?;
        Ok(committed.remove(0))
    }

    /// Validate and store a batch; either every sample is stored or none is
    pub fn append_batch(&self, batch: Vec<NewSample>) -> Result<Vec<DensitySample>, IngestError> {
        if self.read_only {
            return Err(IngestError::ReadOnly);
        }
        let ingested_at = Utc::now();
        let validated = batch
            .into_iter()
            .map(|sample| validate(sample, ingested_at))
            .collect::<Result<Vec<_>, _>>()?;

        if validated.is_empty() {
            return Ok(validated);
        }

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(journal) = writer.as_mut() {
            journal.append(&validated)?;
        }

        {
            let mut guard = self.samples.write().unwrap_or_else(PoisonError::into_inner);
            let samples = Arc::make_mut(&mut guard);
            for sample in &validated {
                let position = samples.partition_point(|s| s.timestamp <= sample.timestamp);
                samples.insert(position, sample.clone());
            }
        }

        debug!("Committed {} samples", validated.len());
        Ok(validated)
    }

    /// Start a query over the samples committed so far
    pub fn query(&self, filter: SampleFilter) -> SampleQuery {
        SampleQuery::new(self.snapshot(), filter)
    }

    /// Zone snapshots for the samples selected by `filter`
    pub fn aggregate(&self, filter: SampleFilter) -> Vec<ZoneSnapshot> {
        let query = self.query(filter);
        ZoneAggregator::aggregate(query.iter())
    }

    /// Most recent sample per zone, sorted by zone id
    pub fn latest_by_zone(&self, event_id: Option<&str>) -> Vec<DensitySample> {
        let snapshot = self.snapshot();
        let mut latest: BTreeMap<&str, &DensitySample> = BTreeMap::new();
        for sample in snapshot
            .iter()
            .filter(|s| event_id.map_or(true, |event| s.event_id == event))
        {
            latest.insert(sample.zone_id.as_str(), sample);
        }
        latest.into_values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Arc<Vec<DensitySample>> {
        Arc::clone(&self.samples.read().unwrap_or_else(PoisonError::into_inner))
    }
}

fn replayed_samples(entries: Vec<JournalEntry>) -> Result<Vec<DensitySample>, IngestError> {
    let mut samples = Vec::with_capacity(entries.len());
    for JournalEntry { line, mut sample } in entries {
        check_ranges(sample.people_count as i64, sample.density_percentage)
            .map_err(|message| IngestError::CorruptJournal { line, message })?;
        sample.density_percentage = canonical_density(sample.density_percentage);
        samples.push(sample);
    }
    samples.sort_by_key(|s| s.timestamp);
    Ok(samples)
}

fn check_ranges(people_count: i64, density_percentage: f64) -> Result<(), String> {
    if people_count < 0 {
        return Err(format!("peopleCount must be >= 0, got {}", people_count));
    }
    if !(0.0..=100.0).contains(&density_percentage) {
        return Err(format!(
            "densityPercentage must be within [0, 100], got {}",
            density_percentage
        ));
    }
    Ok(())
}

fn validate(sample: NewSample, ingested_at: Timestamp) -> Result<DensitySample, IngestError> {
    if sample.zone_id.trim().is_empty() {
        return Err(IngestError::InvalidSample("zoneId is required".to_string()));
    }
    if sample.event_id.trim().is_empty() {
        return Err(IngestError::InvalidSample("eventId is required".to_string()));
    }
    check_ranges(sample.people_count, sample.density_percentage).map_err(|message| {
        warn!("Rejected sample for zone {}: {}", sample.zone_id, message);
        IngestError::InvalidSample(message)
    })?;

    let zone_name = sample
        .zone_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| sample.zone_id.clone());

    Ok(DensitySample {
        zone_id: sample.zone_id,
        zone_name,
        event_id: sample.event_id,
        people_count: sample.people_count as u64,
        density_percentage: canonical_density(sample.density_percentage),
        video_timestamp: sample.video_timestamp,
        timestamp: sample.timestamp.unwrap_or(ingested_at),
        camera_id: sample.camera_id,
        camera_name: sample.camera_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base_time() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 5, 1, 18, 0, 0).unwrap()
    }

    fn sample_at(zone: &str, offset_secs: i64, people: i64) -> NewSample {
        NewSample::new(zone, "evt-1", people, (people as f64 * 10.0).min(100.0))
            .at(base_time() + Duration::seconds(offset_secs))
    }

    #[test]
    fn test_append_rejects_out_of_range_density() {
        let store = TelemetryStore::new();
        store.append(sample_at("a", 0, 3)).unwrap();

        let err = store
            .append(NewSample::new("a", "evt-1", 3, 150.0))
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidSample(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_append_rejects_negative_people_and_nan() {
        let store = TelemetryStore::new();
        assert!(matches!(
            store.append(NewSample::new("a", "evt-1", -1, 10.0)),
            Err(IngestError::InvalidSample(_))
        ));
        assert!(matches!(
            store.append(NewSample::new("a", "evt-1", 1, f64::NAN)),
            Err(IngestError::InvalidSample(_))
        ));
        assert!(matches!(
            store.append(NewSample::new("", "evt-1", 1, 10.0)),
            Err(IngestError::InvalidSample(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_append_accepts_boundaries_and_fills_defaults() {
        let store = TelemetryStore::new();
        let before = Utc::now();
        let stored = store.append(NewSample::new("a", "evt-1", 0, 0.0)).unwrap();
        store.append(NewSample::new("a", "evt-1", 10, 100.0)).unwrap();

        assert!(stored.timestamp >= before);
        assert_eq!(stored.zone_name, "a");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let store = TelemetryStore::new();
        let batch = vec![
            sample_at("a", 0, 1),
            sample_at("b", 1, 2),
            NewSample::new("c", "evt-1", 2, 101.0),
        ];
        assert!(store.append_batch(batch).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_query_orders_by_timestamp() {
        let store = TelemetryStore::new();
        store.append(sample_at("a", 30, 3)).unwrap();
        store.append(sample_at("a", 10, 1)).unwrap();
        store.append(sample_at("a", 20, 2)).unwrap();

        let ascending: Vec<u64> = store
            .query(SampleFilter::default())
            .iter()
            .map(|s| s.people_count)
            .collect();
        assert_eq!(ascending, vec![1, 2, 3]);

        let descending: Vec<u64> = store
            .query(SampleFilter::default().descending().limit(2))
            .iter()
            .map(|s| s.people_count)
            .collect();
        assert_eq!(descending, vec![3, 2]);
    }

    #[test]
    fn test_query_filters_zone_event_and_range() {
        let store = TelemetryStore::new();
        for offset in 0..10 {
            store.append(sample_at("a", offset, 1)).unwrap();
            store.append(sample_at("b", offset, 2)).unwrap();
        }
        store
            .append(NewSample::new("a", "other-event", 5, 50.0).at(base_time()))
            .unwrap();

        let query = store.query(
            SampleFilter::for_event("evt-1")
                .zone("a")
                .between(
                    Some(base_time() + Duration::seconds(2)),
                    Some(base_time() + Duration::seconds(5)),
                ),
        );
        assert_eq!(query.count(), 4);
        assert!(query.iter().all(|s| s.zone_id == "a" && s.event_id == "evt-1"));
    }

    #[test]
    fn test_query_is_restartable_and_isolated_from_later_appends() {
        let store = TelemetryStore::new();
        store.append(sample_at("a", 0, 1)).unwrap();
        store.append(sample_at("a", 1, 2)).unwrap();

        let query = store.query(SampleFilter::default());
        let mut in_progress = query.iter();
        assert_eq!(in_progress.next().unwrap().people_count, 1);

        store.append(sample_at("a", 2, 3)).unwrap();

        assert_eq!(in_progress.count(), 1);
        assert_eq!(query.count(), 2);
        assert_eq!(query.count(), 2);
        assert_eq!(store.query(SampleFilter::default()).count(), 3);
    }

    #[test]
    fn test_concurrent_appends_and_queries() {
        let store = Arc::new(TelemetryStore::new());

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for i in 0..50 {
                        store
                            .append(sample_at(&format!("zone-{}", worker), i, 1))
                            .unwrap();
                    }
                });
            }
            let reader = Arc::clone(&store);
            scope.spawn(move || {
                for _ in 0..50 {
                    let query = reader.query(SampleFilter::default());
                    let first = query.count();
                    let timestamps: Vec<_> = query.iter().map(|s| s.timestamp).collect();
                    assert_eq!(first, timestamps.len());
                    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
                }
            });
        });

        assert_eq!(store.len(), 200);
    }

    #[test]
    fn test_latest_by_zone() {
        let store = TelemetryStore::new();
        store.append(sample_at("a", 0, 1)).unwrap();
        store.append(sample_at("a", 5, 4)).unwrap();
        store.append(sample_at("b", 3, 2)).unwrap();

        let latest = store.latest_by_zone(Some("evt-1"));
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].zone_id, "a");
        assert_eq!(latest[0].people_count, 4);
        assert_eq!(latest[1].zone_id, "b");
        assert!(store.latest_by_zone(Some("missing")).is_empty());
    }

    #[test]
    fn test_store_aggregate_uses_filter() {
        let store = TelemetryStore::new();
        store.append(sample_at("a", 0, 2)).unwrap();
        store.append(sample_at("a", 1, 4)).unwrap();
        store.append(sample_at("b", 1, 6)).unwrap();

        let snapshots = store.aggregate(SampleFilter::for_event("evt-1").zone("a"));
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].sample_count, 2);
        assert_eq!(snapshots[0].avg_people_count, 3.0);
    }

    #[test]
    fn test_journal_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");

        {
            let store = TelemetryStore::open(&path).unwrap();
            store.append(sample_at("a", 10, 2)).unwrap();
            store.append(sample_at("a", 0, 1)).unwrap();
            assert!(store.append(NewSample::new("a", "evt-1", 1, 150.0)).is_err());
        }

        let reopened = TelemetryStore::open(&path).unwrap();
        let people: Vec<u64> = reopened
            .query(SampleFilter::default())
            .iter()
            .map(|s| s.people_count)
            .collect();
        assert_eq!(people, vec![1, 2]);
    }

    #[test]
    fn test_out_of_range_journal_record_reports_file_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");
        {
            let store = TelemetryStore::open(&path).unwrap();
            store.append(sample_at("a", 0, 1)).unwrap();
        }

        let mut bad = serde_json::to_value(
            TelemetryStore::new().append(sample_at("a", 1, 2)).unwrap(),
        )
        .unwrap();
        bad["densityPercentage"] = serde_json::json!(150.0);
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("\n\n");
        contents.push_str(&bad.to_string());
        contents.push('\n');
        std::fs::write(&path, contents).unwrap();

        match TelemetryStore::open(&path) {
            Err(IngestError::CorruptJournal { line, .. }) => assert_eq!(line, 4),
            other => panic!("Expected CorruptJournal, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_zero_density_is_stored_as_zero() {
        let store = TelemetryStore::new();
        let stored = store.append(NewSample::new("a", "evt-1", 0, -0.0)).unwrap();
        assert!(stored.density_percentage.is_sign_positive());
    }

    #[test]
    fn test_read_only_open_leaves_missing_journal_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");

        let store = TelemetryStore::open_read_only(&path).unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            store.append(sample_at("a", 0, 1)),
            Err(IngestError::ReadOnly)
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_read_only_open_replays_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");
        {
            let store = TelemetryStore::open(&path).unwrap();
            store.append(sample_at("a", 0, 3)).unwrap();
        }
        let before = std::fs::read(&path).unwrap();

        let store = TelemetryStore::open_read_only(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.append(sample_at("a", 1, 4)).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
