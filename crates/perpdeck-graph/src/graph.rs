//! The node graph.
//!
//! Every node owns a cache slot that is `Empty`, `Running` (a spawned compute
//! task) or `Ready` (a settled value or failure). Reads that find a `Running`
//! node wait on the node's version channel; the compute task commits its
//! result and bumps the version.
//!
//! # Invariants
//!
//! - Each compute cycle carries an epoch. Commits, emits and finalizer
//!   registrations from a superseded epoch are ignored.
//! - Invalidating a node invalidates its transitive dependents. Finalizers of
//!   every invalidated node run exactly once before the next cycle starts.
//! - A node is retained while it is keep-alive, has a subscriber, or has a
//!   retained dependent. Nodes that are not retained may be torn down.
//!   Tearing a node down invalidates its cached dependents.
//! - Finalizers and dispose hooks always run after the graph lock is
//!   released.

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use parking_lot::Mutex;
use perpdeck_telemetry::Metrics;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, error, trace, warn};

use crate::atom::{Atom, NodeHandle, NodeId, NodeState, Writable};
use crate::context::Ctx;
use crate::error::{NodeError, NodeResult};
use crate::subscription::Subscription;
use crate::tag::ReactivityTag;

/// Boxed future returned by compute functions and capability traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;
pub(crate) type ComputeFn =
    Arc<dyn Fn(Ctx) -> BoxFuture<'static, NodeResult<AnyValue>> + Send + Sync>;
pub(crate) type Finalizer = Box<dyn FnOnce() + Send>;

enum NodeKind {
    Computed(ComputeFn),
    /// Writable node; the value is the initializer restored on refresh.
    Source(AnyValue),
}

enum Cache {
    Empty,
    Running(AbortHandle),
    Ready(NodeResult<AnyValue>),
}

struct Slot {
    label: Arc<str>,
    kind: NodeKind,
    cache: Cache,
    epoch: u64,
    deps: HashSet<NodeId>,
    dependents: HashSet<NodeId>,
    keep_alive: bool,
    subscribers: usize,
    tags: Vec<ReactivityTag>,
    finalizers: Vec<Finalizer>,
    version: watch::Sender<u64>,
    /// Set for family-owned nodes: teardown removes the slot and runs this.
    on_dispose: Option<Finalizer>,
}

impl Slot {
    /// Holds a value or computation, or is a family member awaiting removal.
    fn is_live(&self) -> bool {
        !matches!(self.cache, Cache::Empty) || self.on_dispose.is_some()
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Drop the cached value and end the current cycle.
    fn reset(&mut self, deferred: &mut Deferred) {
        self.epoch += 1;
        if let Cache::Running(task) = &self.cache {
            task.abort();
        }
        self.cache = Cache::Empty;
        deferred.finalizers.append(&mut self.finalizers);
        self.bump();
    }
}

#[derive(Default)]
struct GraphState {
    nodes: HashMap<NodeId, Slot>,
    tags: HashMap<ReactivityTag, HashSet<NodeId>>,
    /// Running computations and the nodes they are currently waiting on.
    waits: HashMap<NodeId, HashSet<NodeId>>,
    closed: bool,
}

impl GraphState {
    fn label(&self, id: NodeId) -> String {
        self.nodes
            .get(&id)
            .map(|slot| slot.label.to_string())
            .unwrap_or_else(|| id.to_string())
    }

    fn is_retained(&self, id: NodeId) -> bool {
        let mut stack = vec![id];
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            let Some(slot) = self.nodes.get(&node) else {
                continue;
            };
            if slot.keep_alive || slot.subscribers > 0 {
                return true;
            }
            stack.extend(slot.dependents.iter().copied());
        }
        false
    }

    fn link(&mut self, reader: NodeId, target: NodeId) {
        if let Some(slot) = self.nodes.get_mut(&reader) {
            slot.deps.insert(target);
        }
        if let Some(slot) = self.nodes.get_mut(&target) {
            slot.dependents.insert(reader);
        }
    }

    fn unlink_deps(&mut self, id: NodeId) -> HashSet<NodeId> {
        let deps = match self.nodes.get_mut(&id) {
            Some(slot) => std::mem::take(&mut slot.deps),
            None => return HashSet::new(),
        };
        for dep in &deps {
            if let Some(slot) = self.nodes.get_mut(dep) {
                slot.dependents.remove(&id);
            }
        }
        deps
    }

    /// Path `waiter -> target -> ... -> waiter` if `waiter` waiting on
    /// `target` would close a wait-for cycle.
    fn wait_cycle(&self, waiter: NodeId, target: NodeId) -> Option<Vec<String>> {
        let mut stack = vec![(target, vec![target])];
        let mut seen = HashSet::new();
        while let Some((node, path)) = stack.pop() {
            if node == waiter {
                let mut labels = vec![self.label(waiter)];
                labels.extend(path.iter().map(|id| self.label(*id)));
                return Some(labels);
            }
            if !seen.insert(node) {
                continue;
            }
            if let Some(next) = self.waits.get(&node) {
                for n in next {
                    let mut p = path.clone();
                    p.push(*n);
                    stack.push((*n, p));
                }
            }
        }
        None
    }

    fn remove_slot(&mut self, id: NodeId) -> Option<Slot> {
        let slot = self.nodes.remove(&id)?;
        for tag in &slot.tags {
            if let Some(ids) = self.tags.get_mut(tag) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
        self.waits.remove(&id);
        Some(slot)
    }
}

/// Work collected under the lock and run after it is released.
#[derive(Default)]
struct Deferred {
    finalizers: Vec<Finalizer>,
    invalidated: usize,
    torn_down: usize,
}

impl Deferred {
    fn run(self) {
        if self.invalidated > 0 {
            Metrics::nodes_invalidated(self.invalidated);
        }
        for _ in 0..self.torn_down {
            Metrics::node_torn_down();
        }
        for finalizer in self.finalizers {
            finalizer();
        }
    }
}

enum Lookup {
    Ready(NodeResult<AnyValue>),
    Running,
    Empty,
}

/// A reading computation, identified by node and cycle.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reader {
    pub node: NodeId,
    pub epoch: u64,
}

/// Removes a wait-for edge when the waiting read finishes or is dropped.
struct WaitGuard {
    graph: Graph,
    waiter: NodeId,
    target: NodeId,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        let mut state = self.graph.inner.state.lock();
        if let Some(targets) = state.waits.get_mut(&self.waiter) {
            targets.remove(&self.target);
            if targets.is_empty() {
                state.waits.remove(&self.waiter);
            }
        }
    }
}

struct GraphInner {
    state: Mutex<GraphState>,
    next_id: AtomicU64,
}

/// Shared handle to a node graph.
///
/// Cloning is cheap; all clones see the same nodes.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.node_count())
            .finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GraphInner {
                state: Mutex::new(GraphState::default()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Start building a computed node.
    pub fn builder(&self, label: impl Into<String>) -> AtomBuilder<'_> {
        AtomBuilder {
            graph: self,
            label: label.into(),
            keep_alive: false,
            tags: Vec::new(),
        }
    }

    /// Computed node with default options.
    pub fn atom<T, F, Fut>(&self, label: impl Into<String>, compute: F) -> Atom<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = NodeResult<T>> + Send + 'static,
    {
        self.builder(label).build(compute)
    }

    /// Writable node holding `initial` until set.
    pub fn writable<T>(&self, label: impl Into<String>, initial: T) -> Writable<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.builder(label).writable(initial)
    }

    fn register(
        &self,
        label: String,
        kind: NodeKind,
        keep_alive: bool,
        tags: Vec<ReactivityTag>,
    ) -> NodeId {
        let id = NodeId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (version, _) = watch::channel(0u64);
        let mut state = self.inner.state.lock();
        for tag in &tags {
            state.tags.entry(tag.clone()).or_default().insert(id);
        }
        state.nodes.insert(
            id,
            Slot {
                label: Arc::from(label),
                kind,
                cache: Cache::Empty,
                epoch: 0,
                deps: HashSet::new(),
                dependents: HashSet::new(),
                keep_alive,
                subscribers: 0,
                tags,
                finalizers: Vec::new(),
                version,
                on_dispose: None,
            },
        );
        Metrics::nodes_live(state.nodes.len());
        id
    }

    /// Read a node, waiting for its computation if needed.
    pub async fn get<T: Clone + 'static>(&self, atom: &Atom<T>) -> NodeResult<T> {
        let value = self.get_any(atom.id(), None).await?;
        downcast(value, atom.id())
    }

    /// Cached state without starting or awaiting a computation.
    pub fn peek<T: Clone + 'static>(&self, atom: &Atom<T>) -> NodeState<T> {
        let state = self.inner.state.lock();
        if state.closed {
            return NodeState::Failure(NodeError::Shutdown);
        }
        match state.nodes.get(&atom.id()).map(|slot| &slot.cache) {
            None => NodeState::Failure(NodeError::Disposed(atom.id().to_string())),
            Some(Cache::Ready(Ok(value))) => match downcast(value.clone(), atom.id()) {
                Ok(value) => NodeState::Success(value),
                Err(err) => NodeState::Failure(err),
            },
            Some(Cache::Ready(Err(err))) => NodeState::Failure(err.clone()),
            Some(_) => NodeState::Pending,
        }
    }

    pub(crate) async fn get_any(&self, id: NodeId, reader: Option<Reader>) -> NodeResult<AnyValue> {
        loop {
            let mut changed = {
                let mut state = self.inner.state.lock();
                if state.closed {
                    return Err(NodeError::Shutdown);
                }
                if let Some(reader) = reader {
                    match state.nodes.get(&reader.node) {
                        Some(slot) if slot.epoch == reader.epoch => {}
                        _ => return Err(NodeError::Cancelled),
                    }
                    if reader.node == id {
                        let label = state.label(id);
                        return Err(NodeError::Cycle(vec![label.clone(), label]));
                    }
                }

                let lookup = match state.nodes.get(&id).map(|slot| &slot.cache) {
                    Some(Cache::Ready(result)) => Lookup::Ready(result.clone()),
                    Some(Cache::Running(_)) => Lookup::Running,
                    Some(Cache::Empty) => Lookup::Empty,
                    None => return Err(NodeError::Disposed(id.to_string())),
                };
                let cache = match lookup {
                    Lookup::Ready(result) => Some(result),
                    Lookup::Running => None,
                    Lookup::Empty => self.start_locked(&mut state, id),
                };

                if let Some(result) = cache {
                    if let Some(reader) = reader {
                        state.link(reader.node, id);
                    }
                    return result;
                }

                if let Some(reader) = reader {
                    if let Some(path) = state.wait_cycle(reader.node, id) {
                        warn!(cycle = %path.join(" -> "), "Dependency cycle detected");
                        return Err(NodeError::Cycle(path));
                    }
                    state.link(reader.node, id);
                    state.waits.entry(reader.node).or_default().insert(id);
                }

                match state.nodes.get(&id) {
                    Some(slot) => slot.version.subscribe(),
                    None => return Err(NodeError::Disposed(id.to_string())),
                }
            };

            let _wait = reader.map(|reader| WaitGuard {
                graph: self.clone(),
                waiter: reader.node,
                target: id,
            });
            if changed.changed().await.is_err() {
                return Err(NodeError::Disposed(id.to_string()));
            }
        }
    }

    /// Begin a compute cycle for an `Empty` node.
    ///
    /// Source nodes settle synchronously and their result is returned.
    /// Computed nodes return `None` once their task is spawned.
    fn start_locked(&self, state: &mut GraphState, id: NodeId) -> Option<NodeResult<AnyValue>> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => return Some(Err(NodeError::defect("no tokio runtime to run computation"))),
        };
        state.unlink_deps(id);
        let slot = state.nodes.get_mut(&id)?;
        slot.epoch += 1;

        let compute = match &slot.kind {
            NodeKind::Source(initial) => {
                let result: NodeResult<AnyValue> = Ok(initial.clone());
                slot.cache = Cache::Ready(result.clone());
                slot.bump();
                return Some(result);
            }
            NodeKind::Computed(compute) => compute.clone(),
        };

        let epoch = slot.epoch;
        let ctx = Ctx::tracked(self.clone(), id, epoch);
        let graph = self.clone();
        let task = runtime.spawn(async move {
            let started = Instant::now();
            let result = match AssertUnwindSafe(async move { compute(ctx).await })
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(_) => Err(NodeError::defect("computation panicked")),
            };
            graph.commit(id, epoch, result, started);
        });
        slot.cache = Cache::Running(task.abort_handle());
        trace!(node = %slot.label, epoch, "Computation started");
        None
    }

    fn commit(&self, id: NodeId, epoch: u64, result: NodeResult<AnyValue>, started: Instant) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let mut deferred = Deferred::default();
        let outcome = {
            let mut state = self.inner.state.lock();
            let Some(slot) = state.nodes.get_mut(&id) else {
                return;
            };
            if slot.epoch != epoch {
                trace!(node = %slot.label, epoch, "Discarding stale result");
                "discarded"
            } else {
                let outcome = match &result {
                    Ok(_) => {
                        debug!(node = %slot.label, elapsed_ms, "Node computed");
                        "success"
                    }
                    Err(err) if err.is_defect() => {
                        error!(node = %slot.label, error = %err, "Node defect");
                        "defect"
                    }
                    Err(err) => {
                        warn!(node = %slot.label, error = %err, "Node failed");
                        "failure"
                    }
                };
                // An emitter may already have published a value this cycle.
                let replaced = matches!(slot.cache, Cache::Running(_));
                if replaced {
                    slot.cache = Cache::Ready(result);
                    slot.bump();
                }
                let stale: Vec<NodeId> = if replaced {
                    slot.dependents.iter().copied().collect()
                } else {
                    Vec::new()
                };
                for dependent in stale {
                    let ready = matches!(
                        state.nodes.get(&dependent).map(|s| &s.cache),
                        Some(Cache::Ready(_))
                    );
                    if ready {
                        self.invalidate_locked(&mut state, dependent, true, &mut deferred);
                    }
                }
                outcome
            }
        };
        deferred.run();
        Metrics::node_computed(outcome, elapsed_ms);
    }

    /// Reset `root` (optionally) and every transitive dependent.
    /// Subscribed nodes restart immediately.
    fn invalidate_locked(
        &self,
        state: &mut GraphState,
        root: NodeId,
        include_root: bool,
        deferred: &mut Deferred,
    ) {
        let mut queue = VecDeque::new();
        if include_root {
            queue.push_back(root);
        } else if let Some(slot) = state.nodes.get(&root) {
            queue.extend(slot.dependents.iter().copied());
        }

        let mut seen = HashSet::new();
        let mut restart = Vec::new();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let Some(slot) = state.nodes.get_mut(&id) else {
                continue;
            };
            slot.reset(deferred);
            deferred.invalidated += 1;
            if slot.subscribers > 0 {
                restart.push(id);
            }
            queue.extend(slot.dependents.iter().copied());
        }

        for id in restart {
            let idle = matches!(
                state.nodes.get(&id).map(|s| &s.cache),
                Some(Cache::Empty)
            );
            if idle {
                self.start_locked(state, id);
            }
        }
    }

    /// Replace a writable's value and invalidate its dependents.
    pub fn set<T: Send + Sync + 'static>(&self, writable: &Writable<T>, value: T) {
        self.set_any(writable.id(), Arc::new(value));
    }

    fn set_any(&self, id: NodeId, value: AnyValue) {
        let mut deferred = Deferred::default();
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            let Some(slot) = state.nodes.get_mut(&id) else {
                return;
            };
            slot.reset(&mut deferred);
            slot.cache = Cache::Ready(Ok(value));
            slot.bump();
            trace!(node = %slot.label, "Writable set");
            self.invalidate_locked(&mut state, id, false, &mut deferred);
        }
        deferred.run();
    }

    /// Set a writable from its current value (its initializer when unset).
    pub fn update<T>(&self, writable: &Writable<T>, f: impl FnOnce(&T) -> T)
    where
        T: Send + Sync + 'static,
    {
        let current = {
            let state = self.inner.state.lock();
            let Some(slot) = state.nodes.get(&writable.id()) else {
                return;
            };
            match (&slot.cache, &slot.kind) {
                (Cache::Ready(Ok(value)), _) => value.clone(),
                (_, NodeKind::Source(initial)) => initial.clone(),
                _ => return,
            }
        };
        if let Some(current) = current.downcast_ref::<T>() {
            let next = f(current);
            self.set(writable, next);
        }
    }

    /// Discard a node's value and recompute it. Writables reset to their
    /// initializer. Dependents are invalidated.
    pub fn refresh<T>(&self, atom: &Atom<T>) {
        self.refresh_id(atom.id());
    }

    pub(crate) fn refresh_id(&self, id: NodeId) {
        let mut deferred = Deferred::default();
        {
            let mut state = self.inner.state.lock();
            if state.closed || !state.nodes.contains_key(&id) {
                return;
            }
            self.invalidate_locked(&mut state, id, true, &mut deferred);
        }
        deferred.run();
    }

    /// Refresh only if the node is still in cycle `epoch`.
    pub(crate) fn refresh_if_current(&self, id: NodeId, epoch: u64) {
        let current = {
            let state = self.inner.state.lock();
            state.nodes.get(&id).map(|slot| slot.epoch) == Some(epoch)
        };
        if current {
            self.refresh_id(id);
        }
    }

    /// Refresh every node carrying `tag`.
    pub fn invalidate_tag(&self, tag: &ReactivityTag) -> usize {
        let mut deferred = Deferred::default();
        let count = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return 0;
            }
            let ids: Vec<NodeId> = state
                .tags
                .get(tag)
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default();
            for id in &ids {
                self.invalidate_locked(&mut state, *id, true, &mut deferred);
            }
            ids.len()
        };
        debug!(tag = %tag, nodes = count, "Tag invalidated");
        deferred.run();
        count
    }

    /// Attach tags to an existing node.
    pub fn with_tags<H: NodeHandle>(&self, handle: &H, tags: &[ReactivityTag]) {
        let id = handle.node_id();
        let mut state = self.inner.state.lock();
        if !state.nodes.contains_key(&id) {
            return;
        }
        for tag in tags {
            state.tags.entry(tag.clone()).or_default().insert(id);
        }
        if let Some(slot) = state.nodes.get_mut(&id) {
            for tag in tags {
                if !slot.tags.contains(tag) {
                    slot.tags.push(tag.clone());
                }
            }
        }
    }

    /// Mount a node. The node is computed eagerly and recomputed eagerly
    /// after every invalidation until the subscription is dropped.
    pub fn subscribe<T: Clone + 'static>(&self, atom: &Atom<T>) -> Subscription<T> {
        let mut state = self.inner.state.lock();
        let (receiver, idle) = match state.nodes.get_mut(&atom.id()) {
            Some(slot) => {
                slot.subscribers += 1;
                (
                    Some(slot.version.subscribe()),
                    matches!(slot.cache, Cache::Empty),
                )
            }
            None => (None, false),
        };
        if idle && !state.closed {
            self.start_locked(&mut state, atom.id());
        }
        drop(state);
        Subscription::new(self.clone(), *atom, receiver)
    }

    pub(crate) fn release(&self, id: NodeId) {
        let mut deferred = Deferred::default();
        {
            let mut state = self.inner.state.lock();
            let Some(slot) = state.nodes.get_mut(&id) else {
                return;
            };
            slot.subscribers = slot.subscribers.saturating_sub(1);
            if slot.subscribers == 0 {
                self.teardown_locked(&mut state, id, &mut deferred);
            }
        }
        deferred.run();
    }

    /// Tear down `id` unless retained, then any dependency left unretained.
    fn teardown_locked(&self, state: &mut GraphState, id: NodeId, deferred: &mut Deferred) {
        if state.is_retained(id) {
            return;
        }
        // Dependents are unretained too; a value derived from a torn-down
        // node must not outlive it.
        self.invalidate_locked(state, id, false, deferred);
        let deps = state.unlink_deps(id);
        let Some(slot) = state.nodes.get_mut(&id) else {
            return;
        };
        slot.reset(deferred);
        deferred.torn_down += 1;
        debug!(node = %slot.label, "Node torn down");

        if let Some(dispose) = slot.on_dispose.take() {
            state.remove_slot(id);
            deferred.finalizers.push(dispose);
            Metrics::nodes_live(state.nodes.len());
        }

        for dep in deps {
            let live = state.nodes.get(&dep).map(Slot::is_live).unwrap_or(false);
            if live {
                self.teardown_locked(state, dep, deferred);
            }
        }
    }

    /// Tear down the given nodes if nothing retains them.
    pub(crate) fn teardown_idle(&self, ids: &[NodeId]) -> usize {
        let mut deferred = Deferred::default();
        {
            let mut state = self.inner.state.lock();
            for id in ids {
                let live = state.nodes.get(id).map(Slot::is_live).unwrap_or(false);
                if live && !state.is_retained(*id) {
                    self.teardown_locked(&mut state, *id, &mut deferred);
                }
            }
        }
        let count = deferred.torn_down;
        deferred.run();
        count
    }

    /// Sweep every node that is cached but no longer retained.
    pub fn collect(&self) -> usize {
        let ids: Vec<NodeId> = {
            let state = self.inner.state.lock();
            state
                .nodes
                .iter()
                .filter(|(_, slot)| slot.is_live())
                .map(|(id, _)| *id)
                .collect()
        };
        let count = self.teardown_idle(&ids);
        if count > 0 {
            debug!(nodes = count, "Collected idle nodes");
        }
        count
    }

    /// Tear down every node. Later reads fail with [`NodeError::Shutdown`].
    pub fn shutdown(&self) {
        let mut deferred = Deferred::default();
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let ids: Vec<NodeId> = state.nodes.keys().copied().collect();
            for id in ids {
                if let Some(mut slot) = state.remove_slot(id) {
                    slot.reset(&mut deferred);
                    deferred.torn_down += 1;
                    if let Some(dispose) = slot.on_dispose.take() {
                        deferred.finalizers.push(dispose);
                    }
                }
            }
            state.tags.clear();
            state.waits.clear();
            Metrics::nodes_live(0);
        }
        debug!(nodes = deferred.torn_down, "Graph shut down");
        deferred.run();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn node_count(&self) -> usize {
        self.inner.state.lock().nodes.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.state.lock().nodes.contains_key(&id)
    }

    pub fn label(&self, id: NodeId) -> Option<String> {
        self.inner
            .state
            .lock()
            .nodes
            .get(&id)
            .map(|slot| slot.label.to_string())
    }

    /// Whether the node currently holds a settled value or failure.
    pub fn is_cached(&self, id: NodeId) -> bool {
        matches!(
            self.inner.state.lock().nodes.get(&id).map(|slot| &slot.cache),
            Some(Cache::Ready(_))
        )
    }

    pub fn subscriber_count(&self, id: NodeId) -> usize {
        self.inner
            .state
            .lock()
            .nodes
            .get(&id)
            .map(|slot| slot.subscribers)
            .unwrap_or(0)
    }

    /// Mark a node as family-owned; `hook` runs once it is torn down.
    pub(crate) fn set_disposer(&self, id: NodeId, hook: Finalizer) {
        let orphan = {
            let mut state = self.inner.state.lock();
            match state.nodes.get_mut(&id) {
                Some(slot) => {
                    slot.on_dispose = Some(hook);
                    None
                }
                None => Some(hook),
            }
        };
        if let Some(hook) = orphan {
            hook();
        }
    }

    /// Publish a value for cycle `epoch` of a computed node.
    pub(crate) fn emit(&self, id: NodeId, epoch: u64, value: AnyValue) -> bool {
        let mut deferred = Deferred::default();
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return false;
            }
            let Some(slot) = state.nodes.get_mut(&id) else {
                return false;
            };
            if slot.epoch != epoch {
                return false;
            }
            slot.cache = Cache::Ready(Ok(value));
            slot.bump();
            trace!(node = %slot.label, epoch, "Value emitted");
            self.invalidate_locked(&mut state, id, false, &mut deferred);
        }
        deferred.run();
        true
    }

    pub(crate) fn is_current(&self, id: NodeId, epoch: u64) -> bool {
        self.inner
            .state
            .lock()
            .nodes
            .get(&id)
            .map(|slot| slot.epoch == epoch)
            .unwrap_or(false)
    }

    /// Attach a finalizer to cycle `epoch`; runs at once if the cycle is over.
    pub(crate) fn add_finalizer(&self, id: NodeId, epoch: u64, finalizer: Finalizer) {
        let rejected = {
            let mut state = self.inner.state.lock();
            let closed = state.closed;
            match state.nodes.get_mut(&id) {
                Some(slot) if slot.epoch == epoch && !closed => {
                    slot.finalizers.push(finalizer);
                    None
                }
                _ => Some(finalizer),
            }
        };
        if let Some(finalizer) = rejected {
            finalizer();
        }
    }
}

fn downcast<T: Clone + 'static>(value: AnyValue, id: NodeId) -> NodeResult<T> {
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| NodeError::TypeMismatch(id.to_string()))
}

/// Options for a new node.
pub struct AtomBuilder<'g> {
    graph: &'g Graph,
    label: String,
    keep_alive: bool,
    tags: Vec<ReactivityTag>,
}

impl<'g> AtomBuilder<'g> {
    /// Never tear this node down while the graph lives.
    pub fn keep_alive(mut self) -> Self {
        self.keep_alive = true;
        self
    }

    pub fn tag(mut self, tag: impl Into<ReactivityTag>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, R>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ReactivityTag>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn build<T, F, Fut>(self, compute: F) -> Atom<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = NodeResult<T>> + Send + 'static,
    {
        let compute: ComputeFn =
            Arc::new(move |ctx: Ctx| -> BoxFuture<'static, NodeResult<AnyValue>> {
                let fut = compute(ctx);
                Box::pin(async move { fut.await.map(|value| Arc::new(value) as AnyValue) })
            });
        let id = self.graph.register(
            self.label,
            NodeKind::Computed(compute),
            self.keep_alive,
            self.tags,
        );
        Atom::from_id(id)
    }

    pub fn writable<T>(self, initial: T) -> Writable<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let id = self.graph.register(
            self.label,
            NodeKind::Source(Arc::new(initial)),
            self.keep_alive,
            self.tags,
        );
        Writable::from_id(id)
    }
}
