//! Staging and hand-off for delayed archive inserts.
//!
//! A producer that cannot afford to wait on a congested archive stages its
//! file into a hidden local area and drops one self-contained job
//! description into a queue directory. An external best-effort worker
//! drains the queue; its retry policy is not this crate's concern.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StoreResult;
use crate::fsutil;

/// Self-contained description of one pending archive transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayedJob {
    /// Staged copy inside the hidden cache; the worker owns it from here.
    pub source: PathBuf,
    /// Final location in the archive's namespace.
    pub destination: String,
    /// The producer's original local path, for audit only.
    pub original: PathBuf,
    /// Declared data format, when known.
    pub format: Option<String>,
    /// Compression pipeline suffix the archive will apply, when any.
    pub compression: Option<String>,
}

/// The staging area and queue directory pair.
#[derive(Clone, Debug)]
pub struct Spool {
    root: PathBuf,
}

impl Spool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Hidden cache holding staged copies.
    pub fn stash_dir(&self) -> PathBuf {
        self.root.join(".stash")
    }

    /// Directory the external worker polls for job descriptions.
    pub fn queue_dir(&self) -> PathBuf {
        self.root.join("queue")
    }

    /// Copy `source` into the hidden cache under a collision-free name
    /// derived from the absolute path, a timestamp and the pid.
    pub fn stage(&self, source: &Path) -> StoreResult<PathBuf> {
        let absolute = source.canonicalize()?;
        let digest = blake3::hash(absolute.as_os_str().as_encoded_bytes());
        let name = format!(
            "{}.{}.P{}",
            &hex::encode(digest.as_bytes())[..16],
            Utc::now().format("%Y%m%dT%H%M%S"),
            std::process::id()
        );
        let staged = self.stash_dir().join(name);
        fsutil::copy_file_atomic(&absolute, &staged)?;
        Ok(staged)
    }

    /// Write the job description into the queue, named after the staged
    /// file. Returns the queue entry path.
    pub fn enqueue(&self, job: &DelayedJob) -> StoreResult<PathBuf> {
        let queue = self.queue_dir();
        fs::create_dir_all(&queue)?;
        let stem = job
            .source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("job");
        let entry = queue.join(format!("{stem}.json"));
        fs::write(&entry, serde_json::to_vec_pretty(job)?)?;
        info!(destination = %job.destination, entry = %entry.display(), "delayed transfer queued");
        Ok(entry)
    }

    /// Pending job descriptions, oldest naming first.
    pub fn pending(&self) -> StoreResult<Vec<DelayedJob>> {
        let queue = self.queue_dir();
        if !queue.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries: Vec<PathBuf> = fs::read_dir(&queue)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|x| x == "json"))
            .collect();
        entries.sort();
        let mut jobs = Vec::with_capacity(entries.len());
        for entry in entries {
            let body = fs::read_to_string(&entry)?;
            jobs.push(serde_json::from_str(&body)?);
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_name_carries_stamp_and_pid() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("y.grib");
        fs::write(&src, b"payload").unwrap();
        let spool = Spool::new(dir.path().join("spool"));
        let staged = spool.stage(&src).unwrap();
        assert!(staged.starts_with(spool.stash_dir()));
        let name = staged.file_name().unwrap().to_str().unwrap();
        let parts: Vec<&str> = name.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 16);
        assert!(parts[2].starts_with('P'));
        assert_eq!(fs::read(&staged).unwrap(), b"payload");
    }

    #[test]
    fn identical_paths_share_the_digest_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("y.grib");
        fs::write(&src, b"one").unwrap();
        let spool = Spool::new(dir.path().join("spool"));
        let a = spool.stage(&src).unwrap();
        let b = spool.stage(&src).unwrap();
        let prefix = |p: &PathBuf| {
            p.file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .split('.')
                .next()
                .unwrap()
                .to_string()
        };
        assert_eq!(prefix(&a), prefix(&b));
    }

    #[test]
    fn enqueue_then_pending_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Spool::new(dir.path());
        let job = DelayedJob {
            source: dir.path().join(".stash/abc.20240114T000000.P1"),
            destination: "/x/y.grib".to_string(),
            original: dir.path().join("y.grib"),
            format: Some("grib".to_string()),
            compression: None,
        };
        spool.enqueue(&job).unwrap();
        let pending = spool.pending().unwrap();
        assert_eq!(pending, vec![job]);
    }

    #[test]
    fn empty_queue_reads_as_no_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Spool::new(dir.path().join("never-created"));
        assert!(spool.pending().unwrap().is_empty());
    }
}
