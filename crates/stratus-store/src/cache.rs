use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, error, warn};
use walkdir::WalkDir;

use stratus_types::{History, HistoryAction};

use crate::error::{StoreError, StoreResult};
use crate::fsutil;
use crate::options::{DelOptions, GetOptions, PutOptions};
use crate::traits::{history_extras, Fetch, StatInfo, Store, Stow};

/// How a cache resolves its root directory.
///
/// The original lattice of cache subclasses differed only in root
/// resolution and readonly default, so it is flattened into this one
/// enum composed into [`CacheStore`].
#[derive(Clone, Debug)]
pub enum CacheLocus {
    /// Explicit root, writable.
    Fixed(PathBuf),
    /// Environment-driven per-job scratch: `STRATUS_STEP_CACHE`, else
    /// `STRATUS_WORKDIR/cache`.
    JobScratch,
    /// Readonly mirror of the operational cache.
    OpMirror(PathBuf),
    /// User-local area for manual overrides, readonly by default.
    Hack(PathBuf),
}

impl CacheLocus {
    fn resolve(&self) -> StoreResult<PathBuf> {
        match self {
            Self::Fixed(root) | Self::OpMirror(root) | Self::Hack(root) => Ok(root.clone()),
            Self::JobScratch => {
                if let Ok(step) = std::env::var("STRATUS_STEP_CACHE") {
                    return Ok(PathBuf::from(step));
                }
                if let Ok(work) = std::env::var("STRATUS_WORKDIR") {
                    return Ok(PathBuf::from(work).join("cache"));
                }
                Err(StoreError::NoCacheRoot(
                    "neither STRATUS_STEP_CACHE nor STRATUS_WORKDIR is set".to_string(),
                ))
            }
        }
    }

    fn readonly_default(&self) -> bool {
        matches!(self, Self::OpMirror(_) | Self::Hack(_))
    }
}

/// Local or shared filesystem store.
///
/// Entry point on disk is `root/kind/headdir`; an item path maps directly
/// onto `entry/<item>`. Inserts go through a hidden sibling then an
/// atomic rename, so concurrent jobs sharing the root never read partial
/// files.
pub struct CacheStore {
    kind: String,
    headdir: String,
    entry: PathBuf,
    readonly: bool,
    rtouch: bool,
    rtouch_skip: usize,
    tag: String,
    history: Arc<History>,
}

impl CacheStore {
    /// Writable cache under a fixed root.
    pub fn new(
        rootdir: impl Into<PathBuf>,
        kind: impl Into<String>,
        headdir: impl Into<String>,
    ) -> Self {
        let kind = kind.into();
        let headdir = headdir.into();
        let entry = rootdir.into().join(&kind).join(&headdir);
        let tag = format!("cache_{}", entry.display());
        let history = History::for_tag(&tag);
        Self {
            kind,
            headdir,
            entry,
            readonly: false,
            rtouch: false,
            rtouch_skip: 0,
            tag,
            history,
        }
    }

    /// Cache with an indirect root resolution.
    pub fn with_locus(
        locus: CacheLocus,
        kind: impl Into<String>,
        headdir: impl Into<String>,
    ) -> StoreResult<Self> {
        let kind = kind.into();
        let headdir = headdir.into();
        let entry = locus.resolve()?.join(&kind).join(&headdir);
        let tag = format!("cache_{}", entry.display());
        let history = History::for_tag(&tag);
        Ok(Self {
            kind,
            headdir,
            entry,
            readonly: locus.readonly_default(),
            rtouch: false,
            rtouch_skip: 0,
            tag,
            history,
        })
    }

    /// Force the store readonly.
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Touch parent directories on successful insert/retrieve, skipping
    /// the `skip` levels closest to the entry. Feeds external
    /// mtime-based garbage collection.
    pub fn with_rtouch(mut self, skip: usize) -> Self {
        self.rtouch = true;
        self.rtouch_skip = skip;
        self
    }

    pub fn entry(&self) -> &Path {
        &self.entry
    }

    /// All item paths currently below the entry, sorted.
    pub fn catalog(&self) -> Vec<String> {
        let mut items: Vec<String> = WalkDir::new(&self.entry)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&self.entry)
                    .ok()
                    .map(|rel| rel.to_string_lossy().into_owned())
            })
            .collect();
        items.sort();
        items
    }

    fn item_path(&self, item: &str) -> PathBuf {
        self.entry.join(item.trim_start_matches('/'))
    }

    fn record(
        &self,
        action: HistoryAction,
        item: &str,
        status: bool,
        extras: std::collections::BTreeMap<String, String>,
    ) {
        self.history
            .append(self.backend(), action, item, status, extras);
    }

    fn do_insert(&self, source: &Path, target: &Path) -> io::Result<()> {
        if source.is_dir() {
            fs::create_dir_all(target)?;
            fsutil::copy_tree(source, target)
        } else {
            fsutil::copy_file_atomic(source, target)
        }
    }

    fn do_retrieve(&self, source: &Path, dest: &Path, opts: &GetOptions) -> io::Result<bool> {
        if !source.exists() {
            if opts.silent {
                debug!(source = %source.display(), "cache miss");
            } else {
                warn!(source = %source.display(), "cache miss");
            }
            return Ok(false);
        }
        if source.is_dir() && (opts.dir_extract || fsutil::looks_like_archive(dest)) {
            // Directory extract: the archive was stored unpacked, deliver
            // its children next to the would-be archive file.
            let into = dest.parent().unwrap_or_else(|| Path::new("."));
            fs::create_dir_all(into)?;
            fsutil::copy_tree(source, into)?;
            return Ok(true);
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, dest)?;
        if opts.tar_extract && fsutil::looks_like_archive(dest) {
            fsutil::extract_archive(dest)?;
        }
        Ok(true)
    }

    /// Walk item parents upward, refreshing mtimes for the collector.
    fn recursive_touch(&self, item: &str) {
        let mut dirs = Vec::new();
        let mut cursor = self.item_path(item);
        while cursor.pop() && cursor.starts_with(&self.entry) {
            dirs.push(cursor.clone());
        }
        // dirs runs deepest-first; skipping counts from the entry side.
        let keep = dirs.len().saturating_sub(self.rtouch_skip);
        for dir in dirs.into_iter().take(keep) {
            if let Ok(handle) = fs::File::open(&dir) {
                let _ = handle.set_modified(SystemTime::now());
            }
        }
    }
}

impl Store for CacheStore {
    fn backend(&self) -> &str {
        "cache"
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn readonly(&self) -> bool {
        self.readonly
    }

    fn check(&self, item: &str) -> Option<StatInfo> {
        fs::metadata(self.item_path(item))
            .ok()
            .map(|m| StatInfo::from(&m))
    }

    fn full_path(&self, item: &str) -> String {
        self.item_path(item).to_string_lossy().into_owned()
    }

    fn insert(&self, item: &str, source: &Path, opts: &PutOptions) -> StoreResult<Stow> {
        if self.readonly {
            self.record(
                HistoryAction::Insert,
                item,
                false,
                history_extras(Some(opts.intent), opts.fmt),
            );
            return Err(StoreError::ReadOnly {
                backend: format!("{} ({})", self.backend(), self.entry.display()),
                action: "insert",
            });
        }
        let target = self.item_path(item);
        let stow = match self.do_insert(source, &target) {
            Ok(()) => Stow::Stored,
            Err(e) => {
                error!(item, error = %e, "cache insert failed");
                Stow::Failed
            }
        };
        self.record(
            HistoryAction::Insert,
            item,
            stow.succeeded(),
            history_extras(Some(opts.intent), opts.fmt),
        );
        if matches!(stow, Stow::Stored) && self.rtouch {
            self.recursive_touch(item);
        }
        Ok(stow)
    }

    fn retrieve(&self, item: &str, dest: &Path, opts: &GetOptions) -> StoreResult<Fetch> {
        let source = self.item_path(item);
        let fetch = match self.do_retrieve(&source, dest, opts) {
            Ok(true) => Fetch::Hit,
            Ok(false) => Fetch::Miss,
            Err(e) => {
                error!(item, error = %e, "cache retrieve failed");
                Fetch::Miss
            }
        };
        self.record(
            HistoryAction::Retrieve,
            item,
            fetch.succeeded(),
            history_extras(Some(opts.intent), opts.fmt),
        );
        if matches!(fetch, Fetch::Hit) && self.rtouch {
            self.recursive_touch(item);
        }
        Ok(fetch)
    }

    fn delete(&self, item: &str, opts: &DelOptions) -> StoreResult<bool> {
        if self.readonly {
            self.record(
                HistoryAction::Delete,
                item,
                false,
                history_extras(None, opts.fmt),
            );
            return Err(StoreError::ReadOnly {
                backend: format!("{} ({})", self.backend(), self.entry.display()),
                action: "delete",
            });
        }
        let target = self.item_path(item);
        let deleted = match fs::symlink_metadata(&target) {
            Err(_) => false,
            Ok(meta) => {
                let removed = if meta.is_dir() {
                    fs::remove_dir_all(&target)
                } else {
                    fs::remove_file(&target)
                };
                match removed {
                    Ok(()) => true,
                    Err(e) => {
                        error!(item, error = %e, "cache delete failed");
                        false
                    }
                }
            }
        };
        self.record(
            HistoryAction::Delete,
            item,
            deleted,
            history_extras(None, opts.fmt),
        );
        Ok(deleted)
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("kind", &self.kind)
            .field("headdir", &self.headdir)
            .field("entry", &self.entry)
            .field("readonly", &self.readonly)
            .finish()
    }
}
