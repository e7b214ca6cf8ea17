use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use stratus_container::Container;
use stratus_provider::Provider;
use stratus_store::{DelOptions, Fetch, GetOptions, PutOptions, StoreRegistry, Stow};
use stratus_types::{History, HistoryAction, PromiseNote, Resource, Uri};

use crate::error::{HandlerError, HandlerResult};
use crate::hooks::{HookEvent, NamedHook};

/// Smallest sleep interval `wait` will honour.
const MIN_POLL_SLEEP: Duration = Duration::from_millis(100);

/// Lifecycle stage of a handler. Transitions are one-way; a stage is
/// never revisited except through a fresh handler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Stage {
    /// Initial stage, nothing moved yet.
    #[default]
    Load,
    /// A synchronous fetch succeeded.
    Get,
    /// A fetch was accepted but the data is only promised.
    Expected,
    /// A store succeeded.
    Put,
    /// A store call was a deliberate no-op success (intent only).
    Ghost,
}

impl Stage {
    fn rank(&self) -> u8 {
        match self {
            Self::Load => 0,
            Self::Get | Self::Expected => 1,
            Self::Put | Self::Ghost => 2,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::Load => "load",
            Self::Get => "get",
            Self::Expected => "expected",
            Self::Put => "put",
            Self::Ghost => "ghost",
        };
        f.write_str(tag)
    }
}

/// Releases the handler's busy flag on every exit path.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Aggregate of a resource, its provider and a local container.
///
/// A handler is complete once all three components are present;
/// operations on an incomplete handler log an error and report failure
/// instead of panicking. Single logical owner only: overlapping calls
/// are rejected with [`HandlerError::Reentrant`].
pub struct Handler {
    resource: Option<Resource>,
    provider: Option<Arc<dyn Provider>>,
    container: Option<Box<dyn Container>>,
    registry: Arc<StoreRegistry>,
    stage: Stage,
    history: History,
    hooks: Vec<NamedHook>,
    busy: Arc<AtomicBool>,
}

impl Handler {
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        Self {
            resource: None,
            provider: None,
            container: None,
            registry,
            stage: Stage::Load,
            history: History::new("handler"),
            hooks: Vec::new(),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn container(mut self, container: Box<dyn Container>) -> Self {
        self.container = Some(container);
        self
    }

    /// Register a hook; hooks fire in registration order.
    pub fn add_hook(&mut self, hook: NamedHook) {
        self.hooks.push(hook);
    }

    /// All three components are present.
    pub fn complete(&self) -> bool {
        self.resource.is_some() && self.provider.is_some() && self.container.is_some()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// This handler's private audit history.
    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn container_mut(&mut self) -> Option<&mut (dyn Container + 'static)> {
        self.container.as_deref_mut()
    }

    /// The canonical URI of the handled resource, when complete.
    pub fn location(&self) -> Option<Uri> {
        let (resource, provider) = (self.resource.as_ref()?, self.provider.as_ref()?);
        Some(provider.uri(resource))
    }

    fn enter(&self) -> HandlerResult<BusyGuard> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(HandlerError::Reentrant);
        }
        Ok(BusyGuard(self.busy.clone()))
    }

    fn advance(&mut self, next: Stage) {
        if next.rank() > self.stage.rank() {
            debug!(from = %self.stage, to = %next, "handler stage advanced");
            self.stage = next;
        }
    }

    fn record(&self, action: HistoryAction, item: &str, status: bool) {
        self.history
            .append("handler", action, item, status, BTreeMap::new());
    }

    /// Resolve the store for the current location, or explain why not.
    fn store_for(&self, uri: &Uri) -> HandlerResult<Arc<dyn stratus_store::Store>> {
        self.registry
            .resolve(uri)?
            .ok_or_else(|| HandlerError::NoStore(uri.to_string()))
    }

    fn incomplete(&self, action: HistoryAction) -> bool {
        if self.complete() {
            return false;
        }
        error!(%action, "handler is incomplete, operation skipped");
        self.record(action, "", false);
        true
    }

    fn run_hooks(&self, event: HookEvent) {
        for hook in self.hooks.iter().filter(|h| h.event == event) {
            debug!(name = %hook.name, event = ?event, "running hook");
            (hook.callback)(self);
        }
    }

    /// All candidate physical locations for the resource, `;`-joined.
    pub fn locate(&mut self) -> HandlerResult<Option<String>> {
        let _guard = self.enter()?;
        if self.incomplete(HistoryAction::Locate) {
            return Ok(None);
        }
        let uri = self.location().expect("checked complete");
        let store = self.store_for(&uri)?;
        let located = store.full_path(uri.item());
        self.record(HistoryAction::Locate, uri.item(), true);
        Ok(Some(located))
    }

    /// Stat the resource in its backend. Does not move the stage.
    pub fn check(&mut self) -> HandlerResult<bool> {
        let _guard = self.enter()?;
        if self.incomplete(HistoryAction::Check) {
            return Ok(false);
        }
        let uri = self.location().expect("checked complete");
        let store = self.store_for(&uri)?;
        let present = store.check(uri.item()).is_some();
        self.record(HistoryAction::Check, uri.item(), present);
        Ok(present)
    }

    /// Fetch the resource into the container.
    ///
    /// Moves the stage to `Get`, or to `Expected` when the backend
    /// delivered a promise token instead of real data. After-get hooks
    /// fire only on a real hit.
    pub fn get(&mut self, opts: &GetOptions) -> HandlerResult<bool> {
        let _guard = self.enter()?;
        if self.incomplete(HistoryAction::Get) {
            return Ok(false);
        }
        let uri = self.location().expect("checked complete");
        let store = self.store_for(&uri)?;
        let dest = self
            .container
            .as_mut()
            .expect("checked complete")
            .local_path()?;
        let fetch = store.retrieve(uri.item(), &dest, opts)?;
        self.record(HistoryAction::Get, uri.item(), fetch.succeeded());
        if let Some(container) = self.container.as_mut() {
            container.update_fill(fetch.succeeded());
        }
        match fetch {
            Fetch::Hit => {
                info!(item = uri.item(), "resource fetched");
                self.advance(Stage::Get);
                drop(_guard);
                self.run_hooks(HookEvent::AfterGet);
            }
            Fetch::Promised => {
                info!(item = uri.item(), "resource is promised, switch to wait");
                self.advance(Stage::Expected);
            }
            Fetch::Miss => {
                warn!(item = uri.item(), "resource not found");
            }
        }
        Ok(fetch.succeeded())
    }

    /// Store the container's content under the resource's location.
    ///
    /// Before-put hooks fire first. Moves the stage to `Put`, or to
    /// `Ghost` when the backend only recorded the intent.
    pub fn put(&mut self, opts: &PutOptions) -> HandlerResult<bool> {
        let _guard = self.enter()?;
        if self.incomplete(HistoryAction::Put) {
            return Ok(false);
        }
        drop(_guard);
        self.run_hooks(HookEvent::BeforePut);
        let _guard = self.enter()?;

        let uri = self.location().expect("checked complete");
        let store = self.store_for(&uri)?;
        let source = self
            .container
            .as_mut()
            .expect("checked complete")
            .local_path()?;
        let stow = store.insert(uri.item(), &source, opts)?;
        self.record(HistoryAction::Put, uri.item(), stow.succeeded());
        match stow {
            Stow::Stored => {
                info!(item = uri.item(), "resource stored");
                self.advance(Stage::Put);
            }
            Stow::Ghost => {
                info!(item = uri.item(), "intent recorded, no data moved");
                self.advance(Stage::Ghost);
            }
            Stow::Failed => {
                warn!(item = uri.item(), "store failed");
            }
        }
        Ok(stow.succeeded())
    }

    /// Remove the resource from its backend. Does not move the stage.
    pub fn delete(&mut self, opts: &DelOptions) -> HandlerResult<bool> {
        let _guard = self.enter()?;
        if self.incomplete(HistoryAction::Delete) {
            return Ok(false);
        }
        let uri = self.location().expect("checked complete");
        let store = self.store_for(&uri)?;
        let deleted = store.delete(uri.item(), opts)?;
        self.record(HistoryAction::Delete, uri.item(), deleted);
        Ok(deleted)
    }

    /// Drop the local container content. Does not move the stage.
    pub fn clear(&mut self) -> HandlerResult<bool> {
        let _guard = self.enter()?;
        let Some(container) = self.container.as_mut() else {
            error!("handler has no container, clear skipped");
            self.history
                .append("handler", HistoryAction::Clear, "", false, BTreeMap::new());
            return Ok(false);
        };
        container.clear()?;
        self.history
            .append("handler", HistoryAction::Clear, "", true, BTreeMap::new());
        Ok(true)
    }

    /// Poll a promised resource until its token disappears.
    ///
    /// Meaningful only in the `Expected` stage: the container holds a
    /// promise note naming the token file. Sleeps `sleep` per round
    /// (clamped to 100ms), for at most `timeout / sleep` rounds. On
    /// exhaustion returns `false`, or raises when `fatal` is set.
    pub fn wait(&mut self, sleep: Duration, timeout: Duration, fatal: bool) -> HandlerResult<bool> {
        let _guard = self.enter()?;
        if self.stage != Stage::Expected {
            warn!(stage = %self.stage, "wait called outside the expected stage");
            return Ok(false);
        }
        let local = self
            .container
            .as_mut()
            .expect("expected stage implies a container")
            .local_path()?;
        let note = PromiseNote::load(&local)?;
        let sleep = sleep.max(MIN_POLL_SLEEP);
        let rounds = (timeout.as_millis() / sleep.as_millis()).max(1) as u64;
        debug!(item = %note.locate, rounds, "polling promise token");
        for round in 1..=rounds {
            std::thread::sleep(sleep);
            if !note.pending() {
                info!(round, "promise fulfilled");
                self.record(HistoryAction::Wait, &note.locate, true);
                return Ok(true);
            }
        }
        self.record(HistoryAction::Wait, &note.locate, false);
        if fatal {
            Err(HandlerError::PromiseTimeout {
                item: note.locate,
                waited_secs: (sleep * rounds as u32).as_secs(),
            })
        } else {
            warn!(item = %note.locate, "promise still pending after timeout");
            Ok(false)
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("complete", &self.complete())
            .field("stage", &self.stage)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;

    use stratus_container::SingleFile;
    use stratus_provider::MagicProvider;
    use stratus_types::DataFormat;

    fn resource() -> Resource {
        Resource::new(
            "gridpoint",
            Utc.with_ymd_and_hms(2024, 1, 14, 0, 0, 0).unwrap(),
            DataFormat::Grib,
        )
    }

    fn handler_for(base: &Path, magic: &str, local: &Path) -> Handler {
        let registry = Arc::new(StoreRegistry::with_defaults(base));
        Handler::new(registry)
            .resource(resource())
            .provider(Arc::new(MagicProvider::parse(magic).unwrap()))
            .container(Box::new(SingleFile::new(local)))
    }

    #[test]
    fn incomplete_handler_fails_soft() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(StoreRegistry::with_defaults(dir.path()));
        let mut h = Handler::new(registry).resource(resource());
        assert!(!h.complete());
        assert!(!h.get(&GetOptions::default()).unwrap());
        assert!(!h.put(&PutOptions::default()).unwrap());
        assert_eq!(h.stage(), Stage::Load);
        assert_eq!(h.history().len(), 2);
        assert!(h.history().records().iter().all(|r| !r.status));
    }

    #[test]
    fn put_then_get_roundtrip_through_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let magic = "stratus://stratus.cache.local/a/b.grib";

        let produced = dir.path().join("produced.grib");
        fs::write(&produced, b"forecast bytes").unwrap();
        let mut producer = handler_for(dir.path(), magic, &produced);
        assert!(producer.put(&PutOptions::default()).unwrap());
        assert_eq!(producer.stage(), Stage::Put);

        let fetched = dir.path().join("fetched.grib");
        let mut consumer = handler_for(dir.path(), magic, &fetched);
        assert!(consumer.check().unwrap());
        assert!(consumer.get(&GetOptions::default()).unwrap());
        assert_eq!(consumer.stage(), Stage::Get);
        assert_eq!(fs::read(&fetched).unwrap(), b"forecast bytes");

        assert!(consumer.delete(&DelOptions::default()).unwrap());
        assert!(!consumer.check().unwrap());
    }

    #[test]
    fn promised_data_moves_the_stage_to_expected() {
        let dir = tempfile::tempdir().unwrap();
        let magic = "xstratus://stratus.cache.local/a/b.grib";

        // A producer with no physical data registers the intent.
        let ghost_src = dir.path().join("never-produced.grib");
        let mut producer = handler_for(dir.path(), magic, &ghost_src);
        assert!(producer.put(&PutOptions::default()).unwrap());
        assert_eq!(producer.stage(), Stage::Ghost);

        let fetched = dir.path().join("fetched.grib");
        let mut consumer = handler_for(dir.path(), magic, &fetched);
        assert!(consumer.get(&GetOptions::default()).unwrap());
        assert_eq!(consumer.stage(), Stage::Expected);
        // The container holds the promise note, not data.
        assert!(PromiseNote::load(&fetched).is_ok());
    }

    #[test]
    fn wait_returns_false_after_exactly_timeout_over_sleep_polls() {
        let dir = tempfile::tempdir().unwrap();
        let magic = "xstratus://stratus.cache.local/w/x.grib";

        let mut producer = handler_for(dir.path(), magic, &dir.path().join("absent"));
        producer.put(&PutOptions::default()).unwrap();

        let fetched = dir.path().join("fetched.pr");
        let mut consumer = handler_for(dir.path(), magic, &fetched);
        consumer.get(&GetOptions::default()).unwrap();
        assert_eq!(consumer.stage(), Stage::Expected);

        let sleep = Duration::from_millis(100);
        let started = std::time::Instant::now();
        let done = consumer.wait(sleep, sleep * 3, false).unwrap();
        assert!(!done);
        // Three polls of 100ms each, give or take scheduling.
        assert!(started.elapsed() >= sleep * 3);
        assert!(started.elapsed() < sleep * 8);
    }

    #[test]
    fn wait_succeeds_once_the_token_disappears() {
        let dir = tempfile::tempdir().unwrap();
        let magic = "xstratus://stratus.cache.local/w/y.grib";

        let mut producer = handler_for(dir.path(), magic, &dir.path().join("absent"));
        producer.put(&PutOptions::default()).unwrap();

        let fetched = dir.path().join("fetched.pr");
        let mut consumer = handler_for(dir.path(), magic, &fetched);
        consumer.get(&GetOptions::default()).unwrap();

        let note = PromiseNote::load(&fetched).unwrap();
        assert!(note.pending());
        let token = note.itself.clone();
        let fulfiller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            fs::remove_file(token).unwrap();
        });
        let done = consumer
            .wait(Duration::from_millis(100), Duration::from_secs(2), false)
            .unwrap();
        fulfiller.join().unwrap();
        assert!(done);
    }

    #[test]
    fn fatal_wait_timeout_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let magic = "xstratus://stratus.cache.local/w/z.grib";

        let mut producer = handler_for(dir.path(), magic, &dir.path().join("absent"));
        producer.put(&PutOptions::default()).unwrap();

        let fetched = dir.path().join("fetched.pr");
        let mut consumer = handler_for(dir.path(), magic, &fetched);
        consumer.get(&GetOptions::default()).unwrap();

        let sleep = Duration::from_millis(100);
        assert!(matches!(
            consumer.wait(sleep, sleep * 2, true),
            Err(HandlerError::PromiseTimeout { .. })
        ));
    }

    #[test]
    fn hooks_fire_at_the_right_moments() {
        let dir = tempfile::tempdir().unwrap();
        let magic = "stratus://stratus.cache.local/h/k.grib";
        let fired: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let produced = dir.path().join("p.grib");
        fs::write(&produced, b"x").unwrap();
        let mut producer = handler_for(dir.path(), magic, &produced);
        let log = fired.clone();
        producer.add_hook(NamedHook::new("notify", HookEvent::BeforePut, move |h| {
            log.lock().unwrap().push(format!("pre-put@{}", h.stage()));
        }));
        producer.put(&PutOptions::default()).unwrap();

        let fetched = dir.path().join("f.grib");
        let mut consumer = handler_for(dir.path(), magic, &fetched);
        let log = fired.clone();
        consumer.add_hook(NamedHook::new("announce", HookEvent::AfterGet, move |h| {
            log.lock().unwrap().push(format!("post-get@{}", h.stage()));
        }));
        consumer.get(&GetOptions::default()).unwrap();

        assert_eq!(
            *fired.lock().unwrap(),
            vec!["pre-put@load".to_string(), "post-get@get".to_string()]
        );
    }

    #[test]
    fn after_get_hooks_do_not_fire_on_promised_data() {
        let dir = tempfile::tempdir().unwrap();
        let magic = "xstratus://stratus.cache.local/h/m.grib";
        let mut producer = handler_for(dir.path(), magic, &dir.path().join("absent"));
        producer.put(&PutOptions::default()).unwrap();

        let fired = Arc::new(Mutex::new(Vec::<String>::new()));
        let mut consumer = handler_for(dir.path(), magic, &dir.path().join("f.pr"));
        let log = fired.clone();
        consumer.add_hook(NamedHook::new("announce", HookEvent::AfterGet, move |_| {
            log.lock().unwrap().push("post-get".to_string());
        }));
        consumer.get(&GetOptions::default()).unwrap();
        assert_eq!(consumer.stage(), Stage::Expected);
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn locate_reports_candidate_locations() {
        let dir = tempfile::tempdir().unwrap();
        let magic = "xstratus://stratus.cache.local/l/n.grib";
        let mut h = handler_for(dir.path(), magic, &dir.path().join("c.grib"));
        let located = h.locate().unwrap().unwrap();
        let parts: Vec<&str> = located.split(';').collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].ends_with("l/n.grib.pr"));
        assert!(parts[1].ends_with("l/n.grib"));
    }

    #[test]
    fn stage_never_moves_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let magic = "stratus://stratus.cache.local/s/t.grib";
        let produced = dir.path().join("p.grib");
        fs::write(&produced, b"x").unwrap();
        let mut h = handler_for(dir.path(), magic, &produced);
        assert!(h.put(&PutOptions::default()).unwrap());
        assert_eq!(h.stage(), Stage::Put);
        // A later get does not demote the stage.
        assert!(h.get(&GetOptions::default()).unwrap());
        assert_eq!(h.stage(), Stage::Put);
    }
}
