// src/dedup.rs
//
// Per-source record of fingerprints already notified. Bounded FIFO retention,
// idempotent commits, administrative reset. Persistence is the caller's job
// (see state.rs); this store only owns the in-memory truth.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DedupEntry {
    pub fingerprint: String,
    pub first_seen_at: DateTime<Utc>,
}

/// Ordered, size-bounded collection of fingerprints for one source, plus the
/// time the source was last checked. Insertion order is eviction order.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DedupRecord {
    pub entries: Vec<DedupEntry>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl DedupRecord {
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.entries.iter().any(|e| e.fingerprint == fingerprint)
    }

    /// Insert if absent, then evict oldest entries until at or under
    /// `capacity`. Returns false (and keeps the original `first_seen_at`)
    /// when the fingerprint was already present.
    fn insert(&mut self, fingerprint: &str, now: DateTime<Utc>, capacity: usize) -> bool {
        if self.contains(fingerprint) {
            return false;
        }
        self.entries.push(DedupEntry {
            fingerprint: fingerprint.to_string(),
            first_seen_at: now,
        });
        if self.entries.len() > capacity {
            let excess = self.entries.len() - capacity;
            self.entries.drain(0..excess);
        }
        true
    }
}

/// Point-in-time view of one source's record for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStat {
    pub source_id: String,
    pub tracked: usize,
    pub last_checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct DedupStore {
    capacity: usize,
    records: Mutex<HashMap<String, DedupRecord>>,
}

impl DedupStore {
    pub fn new(capacity: usize) -> Self {
        Self::with_records(capacity, HashMap::new())
    }

    /// Rehydrate from persisted records (process restart). Oversized records
    /// from an earlier, larger capacity are trimmed oldest-first on load.
    pub fn with_records(capacity: usize, mut records: HashMap<String, DedupRecord>) -> Self {
        let capacity = capacity.max(1);
        for rec in records.values_mut() {
            if rec.entries.len() > capacity {
                let excess = rec.entries.len() - capacity;
                rec.entries.drain(0..excess);
            }
        }
        Self {
            capacity,
            records: Mutex::new(records),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True iff the fingerprint is absent from the source's current record.
    pub fn is_new(&self, source_id: &str, fingerprint: &str) -> bool {
        let records = self.records.lock().expect("dedup mutex poisoned");
        records
            .get(source_id)
            .map(|r| !r.contains(fingerprint))
            .unwrap_or(true)
    }

    /// Insert `(fingerprint, now)` if absent; evicts oldest-first above
    /// capacity. Idempotent. Returns true when the fingerprint was new.
    pub fn commit(&self, source_id: &str, fingerprint: &str, now: DateTime<Utc>) -> bool {
        let mut records = self.records.lock().expect("dedup mutex poisoned");
        records
            .entry(source_id.to_string())
            .or_default()
            .insert(fingerprint, now, self.capacity)
    }

    /// Record that a check cycle touched this source.
    pub fn touch_checked(&self, source_id: &str, now: DateTime<Utc>) {
        let mut records = self.records.lock().expect("dedup mutex poisoned");
        records.entry(source_id.to_string()).or_default().last_checked_at = Some(now);
    }

    /// Administrative reset: clear one source's record, or all of them.
    /// Returns how many fingerprints were dropped. The next cycle treats
    /// every current occurrence as new.
    pub fn reset(&self, source_id: Option<&str>) -> usize {
        let mut records = self.records.lock().expect("dedup mutex poisoned");
        match source_id {
            Some(id) => records.remove(id).map(|r| r.entries.len()).unwrap_or(0),
            None => {
                let dropped = records.values().map(|r| r.entries.len()).sum();
                records.clear();
                dropped
            }
        }
    }

    /// Full clone of all records, for persistence.
    pub fn snapshot(&self) -> HashMap<String, DedupRecord> {
        self.records.lock().expect("dedup mutex poisoned").clone()
    }

    /// Per-source sizes and timestamps for the status surface, sorted by id.
    pub fn source_stats(&self) -> Vec<SourceStat> {
        let records = self.records.lock().expect("dedup mutex poisoned");
        let mut stats: Vec<SourceStat> = records
            .iter()
            .map(|(id, rec)| SourceStat {
                source_id: id.clone(),
                tracked: rec.entries.len(),
                last_checked_at: rec.last_checked_at,
            })
            .collect();
        stats.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        stats
    }

    pub fn total_tracked(&self) -> usize {
        let records = self.records.lock().expect("dedup mutex poisoned");
        records.values().map(|r| r.entries.len()).sum()
    }
}
