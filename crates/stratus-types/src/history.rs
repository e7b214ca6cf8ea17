use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Backend action recorded in the audit history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Insert,
    Retrieve,
    Delete,
    Check,
    Locate,
    Get,
    Put,
    Clear,
    Wait,
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::Insert => "insert",
            Self::Retrieve => "retrieve",
            Self::Delete => "delete",
            Self::Check => "check",
            Self::Locate => "locate",
            Self::Get => "get",
            Self::Put => "put",
            Self::Clear => "clear",
            Self::Wait => "wait",
        };
        f.write_str(tag)
    }
}

/// One audit record: who did what to which item, and how it went.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Monotonic sequence number within one history.
    pub seq: u64,
    /// Wall-clock time of the call.
    pub timestamp: DateTime<Utc>,
    /// Name of the backend that handled the call.
    pub backend: String,
    /// The operation performed.
    pub action: HistoryAction,
    /// The item path the operation targeted.
    pub item: String,
    /// The call's boolean outcome. Recorded even on failure.
    pub status: bool,
    /// Backend-specific extras (intent, format, ...).
    pub extra: BTreeMap<String, String>,
}

/// Append-only audit log of backend operations.
///
/// Every insert/retrieve/delete on a store appends exactly one record,
/// success or not; post-mortem analysis must never depend on live logs
/// alone. Appends are guarded by a mutex so that independent stores
/// sharing one tag may record concurrently.
pub struct History {
    tag: String,
    records: Mutex<Vec<HistoryRecord>>,
}

fn shared_histories() -> &'static Mutex<HashMap<String, Arc<History>>> {
    static SHARED: OnceLock<Mutex<HashMap<String, Arc<History>>>> = OnceLock::new();
    SHARED.get_or_init(|| Mutex::new(HashMap::new()))
}

impl History {
    /// A private history (not shared with other owners of the same tag).
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            records: Mutex::new(Vec::new()),
        }
    }

    /// The process-wide shared history for `tag`.
    ///
    /// All stores constructed with the same tag record into the same log,
    /// whatever order they were created in.
    pub fn for_tag(tag: &str) -> Arc<History> {
        let mut map = shared_histories().lock().expect("lock poisoned");
        map.entry(tag.to_string())
            .or_insert_with(|| Arc::new(History::new(tag)))
            .clone()
    }

    /// The identifier this history is keyed on.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Append one record, returning its sequence number.
    pub fn append(
        &self,
        backend: &str,
        action: HistoryAction,
        item: &str,
        status: bool,
        extra: BTreeMap<String, String>,
    ) -> u64 {
        let mut records = self.records.lock().expect("lock poisoned");
        let seq = records.len() as u64 + 1;
        records.push(HistoryRecord {
            seq,
            timestamp: Utc::now(),
            backend: backend.to_string(),
            action,
            item: item.to_string(),
            status,
            extra,
        });
        seq
    }

    /// Number of records so far.
    pub fn len(&self) -> usize {
        self.records.lock().expect("lock poisoned").len()
    }

    /// Returns `true` if nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all records, in append order.
    pub fn records(&self) -> Vec<HistoryRecord> {
        self.records.lock().expect("lock poisoned").clone()
    }

    /// The most recent record, if any.
    pub fn last(&self) -> Option<HistoryRecord> {
        self.records.lock().expect("lock poisoned").last().cloned()
    }

    /// Dump the history as JSON for offline audit.
    pub fn flush(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let snapshot = self.records();
        let payload = serde_json::to_vec_pretty(&snapshot)?;
        fs::write(path, payload)?;
        Ok(())
    }
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("tag", &self.tag)
            .field("records", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_increasing_sequence() {
        let h = History::new("test_seq");
        let s1 = h.append("cache", HistoryAction::Insert, "a/b", true, BTreeMap::new());
        let s2 = h.append("cache", HistoryAction::Delete, "a/b", false, BTreeMap::new());
        assert_eq!((s1, s2), (1, 2));
        let records = h.records();
        assert_eq!(records.len(), 2);
        assert!(records[0].status);
        assert!(!records[1].status);
    }

    #[test]
    fn same_tag_shares_one_history() {
        let a = History::for_tag("cache_/tmp/shared_test");
        let b = History::for_tag("cache_/tmp/shared_test");
        a.append("cache", HistoryAction::Insert, "x", true, BTreeMap::new());
        assert_eq!(b.len(), a.len());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn concurrent_appends_do_not_lose_records() {
        let h = History::for_tag("cache_/tmp/concurrent_test");
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let h = Arc::clone(&h);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        h.append("cache", HistoryAction::Check, "it", true, BTreeMap::new());
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(h.len(), 8 * 50);
    }

    #[test]
    fn flush_writes_serialized_records() {
        let dir = tempfile::tempdir().unwrap();
        let h = History::new("test_flush");
        h.append("archive", HistoryAction::Insert, "x/y", true, BTreeMap::new());
        let out = dir.path().join("audit/history.json");
        h.flush(&out).unwrap();
        let body = std::fs::read_to_string(&out).unwrap();
        let parsed: Vec<HistoryRecord> = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].item, "x/y");
    }
}
