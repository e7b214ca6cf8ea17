use std::collections::BTreeMap;
use std::fs::Metadata;
use std::path::Path;

use chrono::{DateTime, Utc};
use stratus_types::DataFormat;

use crate::error::StoreResult;
use crate::options::{DelOptions, GetOptions, Intent, PutOptions};

/// Stat information for a present item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatInfo {
    pub size: u64,
    pub mtime: Option<DateTime<Utc>>,
    pub is_dir: bool,
}

impl From<&Metadata> for StatInfo {
    fn from(meta: &Metadata) -> Self {
        Self {
            size: meta.len(),
            mtime: meta.modified().ok().map(DateTime::<Utc>::from),
            is_dir: meta.is_dir(),
        }
    }
}

/// Outcome of a retrieve call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fetch {
    /// Real data landed at the destination.
    Hit,
    /// A promise token was delivered instead of real data; the caller
    /// should switch to polling.
    Promised,
    /// Nothing was delivered.
    Miss,
}

impl Fetch {
    pub fn succeeded(&self) -> bool {
        !matches!(self, Self::Miss)
    }
}

/// Outcome of an insert call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stow {
    /// The data was stored (or staged for a delayed transfer).
    Stored,
    /// No physical source existed; a promise token recorded the intent.
    Ghost,
    /// The transfer failed.
    Failed,
}

impl Stow {
    pub fn succeeded(&self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// A storage backend addressed by opaque item paths.
///
/// `check` never errors. `insert` and `delete` raise on readonly stores;
/// transient transfer failures come back as the unsuccessful variant of
/// the return value. Implementations append exactly one history record
/// per insert/retrieve/delete call, whatever the outcome.
pub trait Store: Send + Sync {
    /// Short backend name used in logs and history records.
    fn backend(&self) -> &str;

    /// History tag shared by all instances of the same backend area.
    fn tag(&self) -> &str;

    /// Mutating calls on a readonly store raise `StoreError::ReadOnly`.
    fn readonly(&self) -> bool {
        false
    }

    /// Stat the item; `None` means absent.
    fn check(&self, item: &str) -> Option<StatInfo>;

    /// The resolved physical location of the item.
    fn full_path(&self, item: &str) -> String;

    /// Store a local source under the item path.
    fn insert(&self, item: &str, source: &Path, opts: &PutOptions) -> StoreResult<Stow>;

    /// Fetch the item into a local destination.
    fn retrieve(&self, item: &str, dest: &Path, opts: &GetOptions) -> StoreResult<Fetch>;

    /// Remove the item. Deleting an absent item is `Ok(false)`.
    fn delete(&self, item: &str, opts: &DelOptions) -> StoreResult<bool>;
}

/// History extras common to all backends.
pub(crate) fn history_extras(
    intent: Option<Intent>,
    fmt: Option<DataFormat>,
) -> BTreeMap<String, String> {
    let mut extra = BTreeMap::new();
    if let Some(intent) = intent {
        extra.insert("intent".to_string(), intent.as_str().to_string());
    }
    if let Some(fmt) = fmt {
        extra.insert("format".to_string(), fmt.as_str().to_string());
    }
    extra
}
