use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use stratus_types::{PromiseNote, PROMISE_SUFFIX};

use crate::error::StoreResult;
use crate::options::{DelOptions, GetOptions, PutOptions};
use crate::traits::{Fetch, StatInfo, Store, Stow};

/// Promise-token semantics layered over a real store.
///
/// The `promise` side is a cache holding small `.pr` token files; the
/// `other` side is the real backend. A retrieve that finds a token
/// delivers it and reports [`Fetch::Promised`], telling the caller to
/// poll instead of reading data. An insert with no physical source
/// writes a token recording the intent ([`Stow::Ghost`]); an insert with
/// real data stores it and clears any stale token.
///
/// History is recorded by the wrapped stores; the wrapper routes each
/// call so exactly one of them records it.
pub struct PromiseStore {
    promise: Arc<dyn Store>,
    other: Arc<dyn Store>,
    tag: String,
}

impl PromiseStore {
    pub fn new(promise: Arc<dyn Store>, other: Arc<dyn Store>) -> Self {
        let tag = format!("promise_{}", other.tag());
        Self {
            promise,
            other,
            tag,
        }
    }

    fn token_item(item: &str) -> String {
        format!("{item}{PROMISE_SUFFIX}")
    }

    fn token_present(&self, item: &str) -> bool {
        self.promise.check(&Self::token_item(item)).is_some()
    }

    /// Build and stage the token note for a ghost insert.
    fn write_note(&self, item: &str, opts: &PutOptions) -> StoreResult<tempfile::NamedTempFile> {
        let token = Self::token_item(item);
        let note = PromiseNote {
            itself: PathBuf::from(self.promise.full_path(&token)),
            locate: self.other.full_path(item),
            stamp: Utc::now().format("%Y%m%dT%H%M%S").to_string(),
            datafmt: opts.fmt,
        };
        let mut staged = tempfile::NamedTempFile::new()?;
        staged.write_all(&serde_json::to_vec_pretty(&note)?)?;
        staged.flush()?;
        Ok(staged)
    }
}

impl Store for PromiseStore {
    fn backend(&self) -> &str {
        "promise"
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn readonly(&self) -> bool {
        self.other.readonly()
    }

    fn check(&self, item: &str) -> Option<StatInfo> {
        self.promise
            .check(&Self::token_item(item))
            .or_else(|| self.other.check(item))
    }

    /// Both candidate locations, promise side first, joined with `;`.
    fn full_path(&self, item: &str) -> String {
        format!(
            "{};{}",
            self.promise.full_path(&Self::token_item(item)),
            self.other.full_path(item)
        )
    }

    fn insert(&self, item: &str, source: &Path, opts: &PutOptions) -> StoreResult<Stow> {
        if source.exists() {
            let stow = self.other.insert(item, source, opts)?;
            if stow.succeeded() && self.token_present(item) {
                debug!(item, "clearing fulfilled promise token");
                let _ = self.promise.delete(&Self::token_item(item), &DelOptions::default());
            }
            Ok(stow)
        } else {
            // No physical data: record the intent as a promise token.
            let staged = self.write_note(item, opts)?;
            let stow = self
                .promise
                .insert(&Self::token_item(item), staged.path(), opts)?;
            if stow.succeeded() {
                info!(item, "promise token registered");
                Ok(Stow::Ghost)
            } else {
                warn!(item, "promise token could not be written");
                Ok(Stow::Failed)
            }
        }
    }

    fn retrieve(&self, item: &str, dest: &Path, opts: &GetOptions) -> StoreResult<Fetch> {
        if self.token_present(item) {
            let fetch = self
                .promise
                .retrieve(&Self::token_item(item), dest, opts)?;
            if fetch.succeeded() {
                debug!(item, "delivered promise token instead of data");
                return Ok(Fetch::Promised);
            }
        }
        self.other.retrieve(item, dest, opts)
    }

    fn delete(&self, item: &str, opts: &DelOptions) -> StoreResult<bool> {
        let token_gone = if self.token_present(item) {
            self.promise.delete(&Self::token_item(item), opts)?
        } else {
            false
        };
        let data_gone = self.other.delete(item, opts)?;
        Ok(token_gone || data_gone)
    }
}

impl std::fmt::Debug for PromiseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromiseStore")
            .field("promise", &self.promise.tag())
            .field("other", &self.other.tag())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use std::fs;

    fn stores(dir: &Path) -> PromiseStore {
        let promise = CacheStore::new(dir.join("promises"), "stratus", "promise");
        let real = CacheStore::new(dir.join("data"), "stratus", "store");
        PromiseStore::new(Arc::new(promise), Arc::new(real))
    }

    #[test]
    fn ghost_insert_writes_a_loadable_token() {
        let dir = tempfile::tempdir().unwrap();
        let ps = stores(dir.path());
        let stow = ps
            .insert("a/b.grib", &dir.path().join("no-such-file"), &PutOptions::default())
            .unwrap();
        assert_eq!(stow, Stow::Ghost);
        assert!(ps.check("a/b.grib").is_some());

        let dest = dir.path().join("local/b.grib");
        assert_eq!(
            ps.retrieve("a/b.grib", &dest, &GetOptions::default()).unwrap(),
            Fetch::Promised
        );
        let note = PromiseNote::load(&dest).unwrap();
        assert!(note.locate.contains("a/b.grib"));
        assert!(note.itself.to_string_lossy().ends_with(".pr"));
    }

    #[test]
    fn real_insert_clears_the_token() {
        let dir = tempfile::tempdir().unwrap();
        let ps = stores(dir.path());
        ps.insert("a/b.grib", &dir.path().join("absent"), &PutOptions::default())
            .unwrap();

        let src = dir.path().join("real.grib");
        fs::write(&src, b"arrived").unwrap();
        assert_eq!(
            ps.insert("a/b.grib", &src, &PutOptions::default()).unwrap(),
            Stow::Stored
        );

        let dest = dir.path().join("local/b.grib");
        assert_eq!(
            ps.retrieve("a/b.grib", &dest, &GetOptions::default()).unwrap(),
            Fetch::Hit
        );
        assert_eq!(fs::read(&dest).unwrap(), b"arrived");
    }

    #[test]
    fn miss_on_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        let ps = stores(dir.path());
        assert!(ps.check("never/there").is_none());
        assert_eq!(
            ps.retrieve(
                "never/there",
                &dir.path().join("d"),
                &GetOptions {
                    silent: true,
                    ..GetOptions::default()
                }
            )
            .unwrap(),
            Fetch::Miss
        );
    }

    #[test]
    fn delete_removes_token_and_data() {
        let dir = tempfile::tempdir().unwrap();
        let ps = stores(dir.path());
        ps.insert("a/b", &dir.path().join("absent"), &PutOptions::default())
            .unwrap();
        assert!(ps.delete("a/b", &DelOptions::default()).unwrap());
        assert!(ps.check("a/b").is_none());
        assert!(!ps.delete("a/b", &DelOptions::default()).unwrap());
    }

    #[test]
    fn full_path_joins_candidates_with_semicolons() {
        let dir = tempfile::tempdir().unwrap();
        let ps = stores(dir.path());
        let joined = ps.full_path("a/b");
        let parts: Vec<&str> = joined.split(';').collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].ends_with("a/b.pr"));
        assert!(parts[1].ends_with("a/b"));
    }
}
