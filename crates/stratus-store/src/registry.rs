use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::debug;

use stratus_types::Uri;

use crate::cache::CacheStore;
use crate::error::StoreResult;
use crate::promise::PromiseStore;
use crate::spool::Spool;
use crate::traits::Store;
use crate::tube::FileTube;

type StorePredicate = Box<dyn Fn(&Uri) -> bool + Send + Sync>;
type StoreFactory = Box<dyn Fn(&Uri) -> StoreResult<Arc<dyn Store>> + Send + Sync>;

/// Ordered `(predicate, factory)` resolution from a [`Uri`] to a backend.
///
/// Rules are evaluated in registration order; the first matching
/// predicate wins. Resolved instances are shared, keyed by
/// `(scheme, netloc)`, so every handler addressing the same area talks
/// to the same store (and the same history).
///
/// An `x`-prefixed scheme resolves the plain variant first, then wraps
/// it in a [`PromiseStore`] whose token cache lives under the configured
/// promise root.
pub struct StoreRegistry {
    rules: Vec<(StorePredicate, StoreFactory)>,
    promise_root: Option<PathBuf>,
    instances: Mutex<HashMap<(String, String), Arc<dyn Store>>>,
}

impl StoreRegistry {
    /// An empty registry with no rules.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            promise_root: None,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Registry with the standard wiring, rooted at `base`:
    /// `*.cache.*` netlocs map to caches under `base`, `*.archive.*`
    /// netlocs to a file-tube archive under `base/archive` spooling to
    /// `base/spool`, and `file`/`symlink` on localhost to a bare archive
    /// store addressing absolute paths.
    pub fn with_defaults(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        let mut registry = Self::new().promise_root(base.join("promises"));

        let cache_base = base.clone();
        registry.register(
            |uri| uri.hostname().contains(".cache"),
            move |uri| {
                let kind = uri
                    .hostname()
                    .split('.')
                    .next()
                    .unwrap_or("stratus")
                    .to_string();
                Ok(Arc::new(CacheStore::new(cache_base.clone(), kind, "store")))
            },
        );

        let archive_base = base.clone();
        registry.register(
            |uri| uri.hostname().contains(".archive"),
            move |_uri| {
                Ok(Arc::new(
                    crate::archive::ArchiveStore::new(Arc::new(FileTube::new()))
                        .with_storeroot(
                            archive_base.join("archive").to_string_lossy().into_owned(),
                        )
                        .with_spool(Spool::new(archive_base.join("spool"))),
                ))
            },
        );

        registry.register(
            |uri| uri.scheme == "file" && uri.hostname() == "localhost",
            |_uri| {
                Ok(Arc::new(crate::archive::ArchiveStore::new(Arc::new(
                    FileTube::new(),
                ))))
            },
        );
        registry.register(
            |uri| uri.scheme == "symlink" && uri.hostname() == "localhost",
            |_uri| {
                Ok(Arc::new(crate::archive::ArchiveStore::new(Arc::new(
                    FileTube::symlinking(),
                ))))
            },
        );
        registry
    }

    /// Where promise token caches live; required for `x` schemes.
    pub fn promise_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.promise_root = Some(root.into());
        self
    }

    /// Append a resolution rule. Earlier rules have priority.
    pub fn register<P, F>(&mut self, predicate: P, factory: F)
    where
        P: Fn(&Uri) -> bool + Send + Sync + 'static,
        F: Fn(&Uri) -> StoreResult<Arc<dyn Store>> + Send + Sync + 'static,
    {
        self.rules.push((Box::new(predicate), Box::new(factory)));
    }

    /// Resolve a URI to its backend, `None` when no rule matches.
    pub fn resolve(&self, uri: &Uri) -> StoreResult<Option<Arc<dyn Store>>> {
        let key = (uri.scheme.clone(), uri.netloc.clone());
        if let Some(store) = self.instances.lock().expect("lock poisoned").get(&key) {
            return Ok(Some(store.clone()));
        }

        let resolved: Option<Arc<dyn Store>> = if uri.is_expected() {
            self.resolve_expected(uri)?
        } else {
            match self.rules.iter().find(|(predicate, _)| predicate(uri)) {
                Some((_, factory)) => Some(factory(uri)?),
                None => None,
            }
        };

        if let Some(store) = &resolved {
            debug!(%uri, backend = store.backend(), tag = store.tag(), "store resolved");
            self.instances
                .lock()
                .expect("lock poisoned")
                .insert(key, store.clone());
        }
        Ok(resolved)
    }

    fn resolve_expected(&self, uri: &Uri) -> StoreResult<Option<Arc<dyn Store>>> {
        let plain = Uri::new(
            uri.proxy_scheme(),
            uri.netloc.clone(),
            &uri.path,
            uri.query.clone(),
        );
        let Some(other) = self.resolve(&plain)? else {
            return Ok(None);
        };
        let Some(root) = &self.promise_root else {
            return Ok(None);
        };
        let promise = Arc::new(CacheStore::new(root, "stratus", "promises"));
        Ok(Some(Arc::new(PromiseStore::new(promise, other))))
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn cache_netloc_resolves_to_a_cache() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::with_defaults(dir.path());
        let uri = Uri::from_str("stratus://stratus.cache.local/a/b.grib").unwrap();
        let store = registry.resolve(&uri).unwrap().unwrap();
        assert_eq!(store.backend(), "cache");
        assert!(store.full_path("a/b.grib").starts_with(&*dir.path().to_string_lossy()));
    }

    #[test]
    fn instances_are_shared_per_scheme_and_netloc() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::with_defaults(dir.path());
        let uri = Uri::from_str("stratus://stratus.cache.local/a/b").unwrap();
        let other_item = Uri::from_str("stratus://stratus.cache.local/c/d").unwrap();
        let a = registry.resolve(&uri).unwrap().unwrap();
        let b = registry.resolve(&other_item).unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn expected_scheme_wraps_in_a_promise_store() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::with_defaults(dir.path());
        let uri = Uri::from_str("xstratus://stratus.cache.local/a/b").unwrap();
        let store = registry.resolve(&uri).unwrap().unwrap();
        assert_eq!(store.backend(), "promise");
    }

    #[test]
    fn unknown_location_resolves_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::with_defaults(dir.path());
        let uri = Uri::from_str("gopher://elsewhere/a").unwrap();
        assert!(registry.resolve(&uri).unwrap().is_none());
    }

    #[test]
    fn earlier_rules_take_priority() {
        let dir = tempfile::tempdir().unwrap();
        let specific = dir.path().join("specific");
        let fallback = dir.path().join("fallback");
        let mut registry = StoreRegistry::new();
        let s = specific.clone();
        registry.register(
            |uri| uri.netloc == "special.cache.local",
            move |_| Ok(Arc::new(CacheStore::new(s.clone(), "k", "h"))),
        );
        let f = fallback.clone();
        registry.register(
            |_| true,
            move |_| Ok(Arc::new(CacheStore::new(f.clone(), "k", "h"))),
        );
        let uri = Uri::from_str("stratus://special.cache.local/x").unwrap();
        let store = registry.resolve(&uri).unwrap().unwrap();
        assert!(store.full_path("x").starts_with(&*specific.to_string_lossy()));
    }

    #[test]
    fn archive_netloc_resolves_to_an_archive() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::with_defaults(dir.path());
        let uri = Uri::from_str("stratus://stratus.archive.local/x/y").unwrap();
        let store = registry.resolve(&uri).unwrap().unwrap();
        assert_eq!(store.backend(), "archive");
    }
}
