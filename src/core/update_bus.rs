//! UI update notification bus.
//!
//! Architecture:
//! - Components subscribe to one or more parameter *names* with a callback
//! - `publish()` on the owning (UI) thread fans out immediately
//! - `publish()` from any other thread, and everything sent through a
//!   [`UiPoster`], is queued and delivered by `drain()` on the UI thread
//!
//! Delivery rules:
//! - A subscription fires once per published event if the event carries at
//!   least one of its names, even when it carries several of them.
//! - Registering the same callback twice fires it twice.
//! - Order between subscriptions is registration order, but callers must not
//!   rely on it.
//! - No internal lock is held while callbacks run, so a callback may publish
//!   or subscribe itself.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use indexmap::IndexMap;
use log::{debug, trace, warn};
use std::collections::{HashMap, HashSet};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, RwLock};
use std::thread::{self, ThreadId};
use std::time::Duration;
use uuid::Uuid;

use super::command::CommandContext;
use super::params::{ParamValue, Params};

/// Named, parameterised notification of a state change.
///
/// Derefs to [`Params`], so `evt.has("picture")` / `evt.get_int(..)` work directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateEvent {
    params: Params,
}

impl UpdateEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: Params) -> Self {
        Self { params }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.set(key, value);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn into_params(self) -> Params {
        self.params
    }
}

impl Deref for UpdateEvent {
    type Target = Params;

    fn deref(&self) -> &Params {
        &self.params
    }
}

impl DerefMut for UpdateEvent {
    fn deref_mut(&mut self) -> &mut Params {
        &mut self.params
    }
}

/// Identifies one `listen_to_params` registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

type Callback = Arc<dyn Fn(&UpdateEvent) + Send + Sync>;

/// Continuation executed on the UI thread with full command context.
pub type UiTask = Box<dyn FnOnce(&CommandContext<'_>) + Send + 'static>;

enum UiMessage {
    Update(UpdateEvent),
    Task(UiTask),
}

struct Subscription {
    names: Vec<String>,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    // Registration order is preserved by IndexMap
    subs: IndexMap<SubscriptionId, Subscription>,
    by_name: HashMap<String, Vec<SubscriptionId>>,
}

impl Registry {
    /// Callbacks interested in any of the event's names, each at most once.
    fn matching(&self, event: &UpdateEvent) -> Vec<Callback> {
        let mut hit: HashSet<SubscriptionId> = HashSet::new();
        for name in event.names() {
            if let Some(ids) = self.by_name.get(name) {
                hit.extend(ids.iter().copied());
            }
        }
        self.subs
            .iter()
            .filter(|(id, _)| hit.contains(id))
            .map(|(_, s)| Arc::clone(&s.callback))
            .collect()
    }
}

/// Subscription registry plus UI-thread hand-off queue.
///
/// Cloning shares the same registry and queue; the owning thread is the one
/// that created the first instance.
#[derive(Clone)]
pub struct UpdateBus {
    registry: Arc<RwLock<Registry>>,
    tx: Sender<UiMessage>,
    rx: Receiver<UiMessage>,
    owner: ThreadId,
}

impl Default for UpdateBus {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateBus {
    /// Create a bus owned by the calling thread.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            tx,
            rx,
            owner: thread::current().id(),
        }
    }

    // ========== Subscriptions ==========

    /// Register `callback` for every name in `names`.
    ///
    /// # Example
    /// ```ignore
    /// bus.listen_to_params(["total_frame_num", "current_frame_poc"], move |evt| {
    ///     if evt.has("current_frame_poc") { /* ... */ }
    /// });
    /// ```
    pub fn listen_to_params<I, S, F>(&self, names: I, callback: F) -> SubscriptionId
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&UpdateEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.dedup();

        let mut reg = self.registry.write().unwrap_or_else(|e| e.into_inner());
        for name in &names {
            let ids = reg.by_name.entry(name.clone()).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        trace!("Subscription {:?} listens to {:?}", id, names);
        reg.subs.insert(
            id,
            Subscription {
                names,
                callback: Arc::new(callback),
            },
        );
        id
    }

    /// Single-name convenience for `listen_to_params`.
    pub fn listen_to<F>(&self, name: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&UpdateEvent) + Send + Sync + 'static,
    {
        self.listen_to_params([name], callback)
    }

    /// Drop one registration (component teardown). Returns false if unknown.
    pub fn remove_subscriber(&self, id: SubscriptionId) -> bool {
        let mut reg = self.registry.write().unwrap_or_else(|e| e.into_inner());
        let Some(sub) = reg.subs.shift_remove(&id) else {
            return false;
        };
        for name in &sub.names {
            if let Some(ids) = reg.by_name.get_mut(name) {
                ids.retain(|i| *i != id);
                if ids.is_empty() {
                    reg.by_name.remove(name);
                }
            }
        }
        true
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_name
            .get(name)
            .map(|v| v.len())
            .unwrap_or(0)
    }

    // ========== Publishing ==========

    /// Deliver now on the UI thread, otherwise queue for `drain()`.
    pub fn publish(&self, event: UpdateEvent) {
        if self.is_owner_thread() {
            self.deliver(&event);
        } else {
            trace!("Off-thread publish queued: {:?}", event.names().collect::<Vec<_>>());
            if self.tx.send(UiMessage::Update(event)).is_err() {
                debug!("UpdateBus gone, dropping update");
            }
        }
    }

    /// Thread-safe hand-off handle for worker threads.
    pub fn poster(&self) -> UiPoster {
        UiPoster {
            tx: self.tx.clone(),
        }
    }

    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    fn deliver(&self, event: &UpdateEvent) {
        // Snapshot callbacks, then release the lock before invoking them
        let callbacks = self
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .matching(event);
        trace!(
            "Update {:?} -> {} subscriber(s)",
            event.names().collect::<Vec<_>>(),
            callbacks.len()
        );
        for cb in callbacks {
            cb(event);
        }
    }

    // ========== UI-thread queue processing ==========

    /// Process everything queued so far. Tasks are handed to `run_task`.
    ///
    /// Must be called on the owning thread; elsewhere it logs and does nothing.
    pub fn drain(&self, mut run_task: impl FnMut(UiTask)) -> usize {
        if !self.is_owner_thread() {
            warn!("UpdateBus::drain called off the UI thread, ignoring");
            return 0;
        }
        let mut processed = 0;
        while let Ok(msg) = self.rx.try_recv() {
            self.handle(msg, &mut run_task);
            processed += 1;
        }
        processed
    }

    /// Wait up to `timeout` for the first message, then drain the rest.
    pub fn drain_blocking(&self, timeout: Duration, mut run_task: impl FnMut(UiTask)) -> usize {
        if !self.is_owner_thread() {
            warn!("UpdateBus::drain_blocking called off the UI thread, ignoring");
            return 0;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => {
                self.handle(msg, &mut run_task);
                1 + self.drain(run_task)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn handle(&self, msg: UiMessage, run_task: &mut impl FnMut(UiTask)) {
        match msg {
            UiMessage::Update(event) => self.deliver(&event),
            UiMessage::Task(task) => run_task(task),
        }
    }
}

/// Cloneable, `Send` handle that marshals work back onto the UI thread.
#[derive(Clone)]
pub struct UiPoster {
    tx: Sender<UiMessage>,
}

impl std::fmt::Debug for UiPoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiPoster").field("queued", &self.tx.len()).finish()
    }
}

impl UiPoster {
    /// Queue an update for delivery on the UI thread.
    pub fn post_update(&self, event: UpdateEvent) {
        if self.tx.send(UiMessage::Update(event)).is_err() {
            debug!("UI queue closed, dropping update");
        }
    }

    /// Queue a continuation; model mutation from workers goes through here.
    pub fn post_task<F>(&self, task: F)
    where
        F: FnOnce(&CommandContext<'_>) + Send + 'static,
    {
        if self.tx.send(UiMessage::Task(Box::new(task))).is_err() {
            debug!("UI queue closed, dropping task");
        }
    }
}
