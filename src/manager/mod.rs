//! Runtime atlas registry.
//!
//! [`AtlasManager`] batches inserts per atlas name, runs at most one build
//! pass per atlas at a time, publishes each finished generation in a single
//! swap and then fans out completions and update notifications.
//!
//! All work is driven by [`AtlasManager::poll`]. Continuations (insert
//! callbacks, subscribers, the failure hook) always run after the manager's
//! internal state has been released, so they may call back into the manager.

mod clock;
mod handle;
mod notify;
mod scheduler;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use handle::{Handle, Ticket};
pub use notify::{NotificationBus, SubscriptionId};
pub use scheduler::BatchScheduler;
pub use state::{AtlasId, BuildTicket};

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use log::{debug, error, warn};

use crate::atlas::{AtlasBuilder, AtlasGeneration, BuildJob};
use crate::config::{AtlasConfig, BuildMode};
use crate::error::AtlasError;
use crate::packing::PackerFactory;
use crate::sprite::{PendingItem, PixelSource};
use notify::Subscriber;
use state::{AtlasArena, AtlasState};

/// Completion continuation of one insert
pub type Callback = Box<dyn FnOnce(Result<Handle, AtlasError>)>;

type FailureHook = Rc<dyn Fn(&str, &AtlasError)>;

/// What `insert` did with the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Already published; the callback has been invoked
    Resolved,
    /// Added to the next batch and the batch window restarted
    Scheduled,
    /// Added while a build is running; it goes into the following batch
    Deferred,
    /// The name is already pending or being built; only the callback was queued
    Duplicate,
}

/// Counters for debug overlays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub builds_started: u64,
    pub builds_published: u64,
    pub builds_failed: u64,
    pub builds_discarded: u64,
}

/// A build result coming back from the rayon pool
struct FinishedBuild {
    id: AtlasId,
    ticket: BuildTicket,
    result: Result<AtlasGeneration, AtlasError>,
}

/// Continuations collected under the borrow, run after it is released
enum Dispatch {
    Done(Callback, Result<Handle, AtlasError>),
    /// Dropped once the atlas is released
    Notify(AtlasId, Vec<Subscriber>),
    Failed(FailureHook, String, AtlasError),
}

struct Inner {
    config: AtlasConfig,
    builder: AtlasBuilder,
    clock: Rc<dyn Clock>,
    arena: AtlasArena,
    /// Last version of released atlases, so a recreated name continues
    /// counting instead of starting over. Holds one entry per distinct name
    /// ever released; `release_all` clears it.
    retired_versions: HashMap<String, u64>,
    next_ticket: u64,
    next_subscription: u64,
    finished_tx: Sender<FinishedBuild>,
    finished_rx: Receiver<FinishedBuild>,
    background_builds: usize,
    failure_hook: Option<FailureHook>,
    stats: ManagerStats,
}

impl Inner {
    fn state_or_create(&mut self, atlas: &str) -> &mut AtlasState {
        let retired = &mut self.retired_versions;
        self.arena.get_or_insert_with(atlas, || {
            let floor = retired.remove(atlas).unwrap_or(0);
            debug!("Creating atlas '{}' above version {}", atlas, floor);
            AtlasState::new(atlas, floor)
        })
    }

    fn handle(&self, atlas: &str, name: &str) -> Option<Handle> {
        let state = self.arena.by_name(atlas)?;
        let generation = state.generation.as_ref()?;
        Handle::new(atlas, name, state.version, generation)
    }

    fn admit(
        &mut self,
        atlas: &str,
        item: PendingItem,
        callback: Callback,
        dispatch: &mut Vec<Dispatch>,
    ) -> InsertOutcome {
        if let Some(handle) = self.handle(atlas, &item.name) {
            dispatch.push(Dispatch::Done(callback, Ok(handle)));
            return InsertOutcome::Resolved;
        }

        let now = self.clock.now();
        let delay = self.config.batch_delay();
        let state = self.state_or_create(atlas);
        let name = item.name.clone();

        if state.is_in_flight(&name) {
            debug!(
                "'{}' is already being built in atlas '{}', waiting for it",
                name, atlas
            );
            state.queue_callback(&name, callback);
            return InsertOutcome::Duplicate;
        }

        if state.is_pending(&name) {
            warn!(
                "{}",
                AtlasError::DuplicateNameIgnored {
                    atlas: atlas.to_string(),
                    name: name.clone(),
                }
            );
            state.queue_callback(&name, callback);
            return InsertOutcome::Duplicate;
        }

        state.pending.push(item);
        state.queue_callback(&name, callback);

        if state.is_building() {
            debug!("Deferring '{}' until the running build of '{}' ends", name, atlas);
            InsertOutcome::Deferred
        } else {
            state.scheduler.arm(now, delay);
            debug!(
                "Scheduled '{}' in atlas '{}' ({} pending)",
                name,
                atlas,
                state.pending.len()
            );
            InsertOutcome::Scheduled
        }
    }

    fn poll_once(&mut self, dispatch: &mut Vec<Dispatch>) -> usize {
        let mut finished = 0;

        while let Ok(done) = self.finished_rx.try_recv() {
            self.background_builds = self.background_builds.saturating_sub(1);
            finished += 1;
            self.finish_build(done, dispatch);
        }

        let now = self.clock.now();
        for id in self.arena.ids() {
            let due = self.arena.get(id).is_some_and(|state| state.is_due(now));
            if due {
                finished += self.start_build(id, dispatch);
            }
        }

        finished
    }

    /// Take the pending batch of `id` and run or spawn its build pass.
    /// Returns 1 when the pass completed inline.
    fn start_build(&mut self, id: AtlasId, dispatch: &mut Vec<Dispatch>) -> usize {
        let ticket = BuildTicket(self.next_ticket);
        self.next_ticket += 1;

        let Some(state) = self.arena.get_mut(id) else {
            return 0;
        };

        let items = std::mem::take(&mut state.pending);
        state.in_flight = items.iter().map(|item| item.name.clone()).collect();
        state.building = Some(ticket);
        state.scheduler.disarm();

        debug!(
            "Building atlas '{}' with {} new items",
            state.name,
            items.len()
        );

        let job = BuildJob {
            atlas: state.name.clone(),
            previous: state.generation.clone(),
            items,
        };
        self.stats.builds_started += 1;

        match self.config.build_mode {
            BuildMode::Inline => {
                let result = job.run(&self.builder);
                self.finish_build(FinishedBuild { id, ticket, result }, dispatch);
                1
            }
            BuildMode::Background => {
                let builder = self.builder.clone();
                let tx = self.finished_tx.clone();
                self.background_builds += 1;
                rayon::spawn(move || {
                    let atlas = job.atlas.clone();
                    let result = job.run(&builder);
                    if tx.send(FinishedBuild { id, ticket, result }).is_err() {
                        debug!("Manager gone before build of '{}' finished", atlas);
                    }
                });
                0
            }
        }
    }

    fn finish_build(&mut self, done: FinishedBuild, dispatch: &mut Vec<Dispatch>) {
        let now = self.clock.now();
        let delay = self.config.batch_delay();
        let failure_hook = self.failure_hook.clone();

        let Some(state) = self.arena.get_mut(done.id) else {
            debug!("Discarding build {:?} of released atlas {:?}", done.ticket, done.id);
            self.stats.builds_discarded += 1;
            return;
        };
        if state.building != Some(done.ticket) {
            debug!("Discarding stale build {:?} of '{}'", done.ticket, state.name);
            self.stats.builds_discarded += 1;
            return;
        }

        let names = std::mem::take(&mut state.in_flight);
        state.building = None;

        match done.result {
            Ok(generation) => {
                let generation = Arc::new(generation);
                // Swap; readers holding the old Arc keep it until they drop it
                state.generation = Some(Arc::clone(&generation));
                state.next_version();

                for name in &names {
                    let Some(callbacks) = state.callbacks.remove(name) else {
                        continue;
                    };
                    let handle = Handle::new(&state.name, name, state.version, &generation);
                    for callback in callbacks {
                        let result = handle.clone().ok_or_else(|| AtlasError::UnknownAtlas(
                            state.name.clone(),
                        ));
                        dispatch.push(Dispatch::Done(callback, result));
                    }
                }
                dispatch.push(Dispatch::Notify(done.id, state.bus.snapshot()));
                self.stats.builds_published += 1;
            }
            Err(err) => {
                error!("Build of atlas '{}' failed: {}", state.name, err);
                for name in &names {
                    for callback in state.callbacks.remove(name).unwrap_or_default() {
                        dispatch.push(Dispatch::Done(callback, Err(err.clone())));
                    }
                }
                if let Some(hook) = failure_hook {
                    dispatch.push(Dispatch::Failed(hook, state.name.clone(), err));
                }
                self.stats.builds_failed += 1;
            }
        }

        if !state.pending.is_empty() {
            state.scheduler.arm(now, delay);
        }
    }

    fn release(&mut self, atlas: &str, dispatch: &mut Vec<Dispatch>) -> bool {
        let Some(state) = self.arena.remove(atlas) else {
            return false;
        };

        if state.last_version() > 0 {
            self.retired_versions
                .insert(atlas.to_string(), state.last_version());
        }

        for (_, callbacks) in state.callbacks {
            for callback in callbacks {
                dispatch.push(Dispatch::Done(
                    callback,
                    Err(AtlasError::Released {
                        atlas: atlas.to_string(),
                    }),
                ));
            }
        }

        debug!(
            "Released atlas '{}' ({} pending items dropped)",
            atlas,
            state.pending.len()
        );
        true
    }
}

/// Owner of all atlases. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct AtlasManager {
    inner: Rc<RefCell<Inner>>,
}

impl fmt::Debug for AtlasManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("AtlasManager")
            .field("atlases", &inner.arena.len())
            .field("background_builds", &inner.background_builds)
            .field("stats", &inner.stats)
            .finish()
    }
}

impl AtlasManager {
    pub fn new(config: AtlasConfig) -> Result<Self, AtlasError> {
        config.validate()?;
        let (finished_tx, finished_rx) = mpsc::channel();
        let inner = Inner {
            builder: AtlasBuilder::from_config(&config),
            config,
            clock: Rc::new(SystemClock::new()),
            arena: AtlasArena::default(),
            retired_versions: HashMap::new(),
            next_ticket: 0,
            next_subscription: 0,
            finished_tx,
            finished_rx,
            background_builds: 0,
            failure_hook: None,
            stats: ManagerStats::default(),
        };
        Ok(Self {
            inner: Rc::new(RefCell::new(inner)),
        })
    }

    /// Replace the time source
    pub fn with_clock(self, clock: impl Clock + 'static) -> Self {
        self.inner.borrow_mut().clock = Rc::new(clock);
        self
    }

    /// Replace the packing oracle used by build passes
    pub fn with_packer(self, packer: PackerFactory) -> Self {
        {
            let mut inner = self.inner.borrow_mut();
            inner.builder = inner.builder.clone().packer(packer);
        }
        self
    }

    /// Called with the atlas name and error after every failed build
    pub fn set_failure_hook(&self, hook: impl Fn(&str, &AtlasError) + 'static) {
        self.inner.borrow_mut().failure_hook = Some(Rc::new(hook));
    }

    pub fn config(&self) -> AtlasConfig {
        self.inner.borrow().config.clone()
    }

    /// Request `name` in `atlas`; `on_done` receives its handle once published.
    ///
    /// A name already published in the atlas resolves synchronously, before
    /// this returns, without touching the pixels.
    pub fn insert<F>(
        &self,
        atlas: &str,
        source: impl PixelSource,
        name: &str,
        on_done: F,
    ) -> Result<InsertOutcome, AtlasError>
    where
        F: FnOnce(Result<Handle, AtlasError>) + 'static,
    {
        let hit = self.inner.borrow().handle(atlas, name);
        if let Some(handle) = hit {
            on_done(Ok(handle));
            return Ok(InsertOutcome::Resolved);
        }

        let item = PendingItem::new(name, source)?;

        let mut dispatch = Vec::new();
        let outcome = self
            .inner
            .borrow_mut()
            .admit(atlas, item, Box::new(on_done), &mut dispatch);
        self.run_dispatch(dispatch);
        Ok(outcome)
    }

    /// Like [`insert`](Self::insert), with the completion delivered through a [`Ticket`].
    pub fn insert_ticket(
        &self,
        atlas: &str,
        source: impl PixelSource,
        name: &str,
    ) -> Result<Ticket, AtlasError> {
        let (tx, receiver) = mpsc::channel();
        self.insert(atlas, source, name, move |result| {
            // The ticket may have been dropped; nobody is waiting then
            let _ = tx.send(result);
        })?;
        Ok(Ticket {
            atlas: atlas.to_string(),
            name: name.to_string(),
            receiver,
        })
    }

    /// Look `name` up in the current generation only
    pub fn resolve(&self, atlas: &str, name: &str) -> Option<Handle> {
        self.inner.borrow().handle(atlas, name)
    }

    pub fn is_building(&self, atlas: &str) -> bool {
        self.inner
            .borrow()
            .arena
            .by_name(atlas)
            .is_some_and(AtlasState::is_building)
    }

    /// Version of the published generation; 0 when nothing is published
    pub fn current_version(&self, atlas: &str) -> u64 {
        self.inner
            .borrow()
            .arena
            .by_name(atlas)
            .map_or(0, |state| state.version)
    }

    pub fn generation(&self, atlas: &str) -> Option<Arc<AtlasGeneration>> {
        self.inner
            .borrow()
            .arena
            .by_name(atlas)
            .and_then(|state| state.generation.clone())
    }

    pub fn atlas_size(&self, atlas: &str) -> Option<(u32, u32)> {
        self.generation(atlas).map(|g| (g.width, g.height))
    }

    pub fn pending_count(&self, atlas: &str) -> usize {
        self.inner
            .borrow()
            .arena
            .by_name(atlas)
            .map_or(0, |state| state.pending.len() + state.in_flight.len())
    }

    pub fn atlas_count(&self) -> usize {
        self.inner.borrow().arena.len()
    }

    /// Published regions across all atlases
    pub fn region_count(&self) -> usize {
        self.inner
            .borrow()
            .arena
            .states()
            .filter_map(|state| state.generation.as_ref())
            .map(|g| g.len())
            .sum()
    }

    /// Build passes currently running on the rayon pool
    pub fn in_flight_builds(&self) -> usize {
        self.inner.borrow().background_builds
    }

    pub fn stats(&self) -> ManagerStats {
        self.inner.borrow().stats
    }

    pub fn subscribe(&self, atlas: &str, subscriber: impl Fn() + 'static) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;
        inner
            .state_or_create(atlas)
            .bus
            .subscribe(id, Rc::new(subscriber));
        id
    }

    pub fn unsubscribe(&self, atlas: &str, id: SubscriptionId) -> bool {
        self.inner
            .borrow_mut()
            .arena
            .by_name_mut(atlas)
            .is_some_and(|state| state.bus.unsubscribe(id))
    }

    /// Invoke every subscriber of `atlas` now, in subscription order
    pub fn notify(&self, atlas: &str) {
        let notify = {
            let inner = self.inner.borrow();
            inner
                .arena
                .lookup(atlas)
                .zip(inner.arena.by_name(atlas))
                .map(|(id, state)| Dispatch::Notify(id, state.bus.snapshot()))
        };
        self.run_dispatch(notify.into_iter().collect());
    }

    /// Drop everything held for `atlas`. Waiting callbacks get `Released`.
    /// A build still running for it is discarded when it finishes.
    pub fn release(&self, atlas: &str) -> bool {
        let mut dispatch = Vec::new();
        let released = self.inner.borrow_mut().release(atlas, &mut dispatch);
        self.run_dispatch(dispatch);
        released
    }

    /// Release every atlas and forget their versions
    pub fn release_all(&self) {
        let mut dispatch = Vec::new();
        {
            let mut inner = self.inner.borrow_mut();
            for name in inner.arena.names() {
                inner.release(&name, &mut dispatch);
            }
            inner.retired_versions.clear();
        }
        self.run_dispatch(dispatch);
    }

    /// One time slice: publish finished builds and start due batches.
    /// Returns how many build passes completed.
    pub fn poll(&self) -> usize {
        let mut dispatch = Vec::new();
        let finished = self.inner.borrow_mut().poll_once(&mut dispatch);
        self.run_dispatch(dispatch);
        finished
    }

    fn run_dispatch(&self, dispatch: Vec<Dispatch>) {
        for action in dispatch {
            match action {
                Dispatch::Done(callback, result) => callback(result),
                Dispatch::Notify(id, subscribers) => {
                    for subscriber in subscribers {
                        // An earlier continuation may have released the atlas
                        if self.inner.borrow().arena.get(id).is_none() {
                            break;
                        }
                        subscriber();
                    }
                }
                Dispatch::Failed(hook, atlas, err) => hook(&atlas, &err),
            }
        }
    }

    fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.inner.borrow().clock)
    }

    /// Poll until `ticket` completes or `budget` runs out.
    pub fn wait(&self, ticket: &Ticket, budget: Duration) -> Result<Handle, AtlasError> {
        self.wait_until(&ticket.atlas, &ticket.name, budget, || ticket.try_take())
    }

    /// Poll until `name` resolves in `atlas` or `budget` runs out.
    pub fn resolve_blocking(
        &self,
        atlas: &str,
        name: &str,
        budget: Duration,
    ) -> Result<Handle, AtlasError> {
        self.wait_until(atlas, name, budget, || None)
    }

    fn wait_until(
        &self,
        atlas: &str,
        name: &str,
        budget: Duration,
        mut check: impl FnMut() -> Option<Result<Handle, AtlasError>>,
    ) -> Result<Handle, AtlasError> {
        let clock = self.clock();
        let interval = self.inner.borrow().config.poll_interval();
        let started = clock.now();
        let deadline = started + budget;

        loop {
            self.poll();

            if let Some(result) = check() {
                return result;
            }
            // A name published by an earlier batch has no pending completion
            if !self.is_building(atlas)
                && let Some(handle) = self.resolve(atlas, name)
            {
                return Ok(handle);
            }

            let now = clock.now();
            if now >= deadline {
                return Err(AtlasError::ResolutionTimeout {
                    atlas: atlas.to_string(),
                    name: name.to_string(),
                    waited_ms: (now - started).as_millis(),
                });
            }
            clock.sleep(interval.min(deadline - now));
        }
    }

    /// Poll until no atlas has pending or running work, bounded by the
    /// configured resolve timeout. Returns false if work remained.
    pub fn flush(&self) -> bool {
        let clock = self.clock();
        let interval = self.inner.borrow().config.poll_interval();
        let deadline = clock.now() + self.inner.borrow().config.resolve_timeout();

        loop {
            self.poll();

            let idle = {
                let inner = self.inner.borrow();
                inner.background_builds == 0 && inner.arena.states().all(AtlasState::is_idle)
            };
            if idle {
                return true;
            }

            let now = clock.now();
            if now >= deadline {
                return false;
            }
            clock.sleep(interval.min(deadline - now));
        }
    }
}
