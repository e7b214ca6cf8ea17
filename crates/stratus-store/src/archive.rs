use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use stratus_types::{History, HistoryAction};

use crate::error::{StoreError, StoreResult};
use crate::options::{DelOptions, GetOptions, PutOptions};
use crate::spool::{DelayedJob, Spool};
use crate::traits::{history_extras, Fetch, StatInfo, Store, Stow};
use crate::tube::Tube;

/// Remote storage tier, reached through a transport [`Tube`].
///
/// The physical location of an item is the optional store root, the item
/// path, and the compression suffix when a pipeline is configured.
/// Check, retrieve and delete are synchronous against the remote; insert
/// honours `PutOptions::sync` and may instead stage the source locally
/// and hand the transfer to the spool queue.
pub struct ArchiveStore {
    storeroot: Option<String>,
    compression: Option<String>,
    tube: Arc<dyn Tube>,
    spool: Option<Spool>,
    readonly: bool,
    tag: String,
    history: Arc<History>,
}

impl ArchiveStore {
    pub fn new(tube: Arc<dyn Tube>) -> Self {
        let tag = format!("archive_{}", tube.name());
        let history = History::for_tag(&tag);
        Self {
            storeroot: None,
            compression: None,
            tube,
            spool: None,
            readonly: false,
            tag,
            history,
        }
    }

    /// Prefix every item with this root. The history tag follows the
    /// root, so stores sharing one archive area share one audit log.
    pub fn with_storeroot(mut self, root: impl Into<String>) -> Self {
        self.storeroot = Some(root.into());
        self.tag = format!(
            "archive_{}_{}",
            self.tube.name(),
            self.storeroot.as_deref().unwrap_or("")
        );
        self.history = History::for_tag(&self.tag);
        self
    }

    /// Suffix appended to physical names by the archive's compression
    /// pipeline (e.g. `gz`).
    pub fn with_compression(mut self, suffix: impl Into<String>) -> Self {
        self.compression = Some(suffix.into());
        self
    }

    /// Enable delayed inserts through this spool.
    pub fn with_spool(mut self, spool: Spool) -> Self {
        self.spool = Some(spool);
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
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

    /// Fire-and-forget insert: stage the source, queue one job, report
    /// success without touching the network.
    fn delayed_insert(&self, item: &str, source: &Path, opts: &PutOptions) -> StoreResult<Stow> {
        let Some(spool) = &self.spool else {
            return Err(StoreError::NoCacheRoot(
                "delayed insert requested but no spool is configured".to_string(),
            ));
        };
        let staged = spool.stage(source)?;
        let job = DelayedJob {
            source: staged,
            destination: self.full_path(item),
            original: source.canonicalize()?,
            format: opts.fmt.map(|f| f.as_str().to_string()),
            compression: self.compression.clone(),
        };
        spool.enqueue(&job)?;
        info!(item, "archive insert deferred to spool queue");
        Ok(Stow::Stored)
    }
}

impl Store for ArchiveStore {
    fn backend(&self) -> &str {
        "archive"
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn readonly(&self) -> bool {
        self.readonly
    }

    fn check(&self, item: &str) -> Option<StatInfo> {
        self.tube.check(&self.full_path(item))
    }

    fn full_path(&self, item: &str) -> String {
        let item = item.trim_start_matches('/');
        let mut path = match &self.storeroot {
            Some(root) => format!("{}/{item}", root.trim_end_matches('/')),
            None => format!("/{item}"),
        };
        if let Some(suffix) = &self.compression {
            path.push('.');
            path.push_str(suffix);
        }
        path
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
                backend: format!("{} ({})", self.backend(), self.tube.name()),
                action: "insert",
            });
        }
        let attempt = if opts.sync {
            self.tube
                .insert(source, &self.full_path(item))
                .map(|done| if done { Stow::Stored } else { Stow::Failed })
        } else {
            self.delayed_insert(item, source, opts)
        };
        let stow = match attempt {
            Ok(stow) => stow,
            Err(e) => {
                error!(item, error = %e, "archive insert failed");
                Stow::Failed
            }
        };
        self.record(
            HistoryAction::Insert,
            item,
            stow.succeeded(),
            history_extras(Some(opts.intent), opts.fmt),
        );
        Ok(stow)
    }

    fn retrieve(&self, item: &str, dest: &Path, opts: &GetOptions) -> StoreResult<Fetch> {
        let fetch = match self.tube.retrieve(&self.full_path(item), dest) {
            Ok(true) => Fetch::Hit,
            Ok(false) => Fetch::Miss,
            Err(e) => {
                error!(item, error = %e, "archive retrieve failed");
                Fetch::Miss
            }
        };
        self.record(
            HistoryAction::Retrieve,
            item,
            fetch.succeeded(),
            history_extras(Some(opts.intent), opts.fmt),
        );
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
                backend: format!("{} ({})", self.backend(), self.tube.name()),
                action: "delete",
            });
        }
        let deleted = match self.tube.delete(&self.full_path(item)) {
            Ok(done) => done,
            Err(e) => {
                error!(item, error = %e, "archive delete failed");
                false
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

impl std::fmt::Debug for ArchiveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveStore")
            .field("tube", &self.tube.name())
            .field("storeroot", &self.storeroot)
            .field("compression", &self.compression)
            .field("readonly", &self.readonly)
            .finish()
    }
}
