//! Computation context handed to node and mutation bodies.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use crate::atom::{Atom, NodeId, Writable};
use crate::error::{NodeError, NodeResult};
use crate::graph::{Finalizer, Graph, Reader};
use crate::tag::ReactivityTag;

/// Handle a computation uses to read other nodes.
///
/// A tracked context (node computations) records every read as a dependency
/// edge and scopes finalizers to the current compute cycle. An untracked
/// context (mutations) records nothing and runs its finalizers when the
/// invocation ends.
#[derive(Clone)]
pub struct Ctx {
    graph: Graph,
    node: NodeId,
    epoch: u64,
    scope: Option<Arc<Mutex<Vec<Finalizer>>>>,
}

impl fmt::Debug for Ctx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ctx")
            .field("node", &self.node)
            .field("epoch", &self.epoch)
            .field("tracked", &self.is_tracked())
            .finish()
    }
}

impl Ctx {
    pub(crate) fn tracked(graph: Graph, node: NodeId, epoch: u64) -> Self {
        Self {
            graph,
            node,
            epoch,
            scope: None,
        }
    }

    pub(crate) fn untracked(graph: Graph, node: NodeId) -> Self {
        Self {
            graph,
            node,
            epoch: 0,
            scope: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The node this context computes (the state node for mutations).
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn is_tracked(&self) -> bool {
        self.scope.is_none()
    }

    fn reader(&self) -> Option<Reader> {
        self.is_tracked().then_some(Reader {
            node: self.node,
            epoch: self.epoch,
        })
    }

    /// Read a node. In a tracked context the read becomes a dependency.
    pub async fn get<T: Clone + 'static>(&self, atom: &Atom<T>) -> NodeResult<T> {
        let value = self.graph.get_any(atom.id(), self.reader()).await?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| NodeError::TypeMismatch(atom.id().to_string()))
    }

    /// Read a node, substituting `fallback` for ordinary failures.
    /// Defects and cancellation still propagate.
    pub async fn get_or<T: Clone + 'static>(&self, atom: &Atom<T>, fallback: T) -> NodeResult<T> {
        match self.get(atom).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_defect() || matches!(err, NodeError::Cancelled | NodeError::Shutdown) => {
                Err(err)
            }
            Err(err) => {
                trace!(node = %atom.id(), error = %err, "Using fallback value");
                Ok(fallback)
            }
        }
    }

    pub fn set<T: Send + Sync + 'static>(&self, writable: &Writable<T>, value: T) {
        self.graph.set(writable, value);
    }

    pub fn refresh<T>(&self, atom: &Atom<T>) {
        self.graph.refresh(atom);
    }

    pub fn invalidate_tag(&self, tag: &ReactivityTag) -> usize {
        self.graph.invalidate_tag(tag)
    }

    /// Register cleanup for the current cycle.
    pub fn add_finalizer(&self, finalizer: impl FnOnce() + Send + 'static) {
        match &self.scope {
            Some(scope) => scope.lock().push(Box::new(finalizer)),
            None => self
                .graph
                .add_finalizer(self.node, self.epoch, Box::new(finalizer)),
        }
    }

    /// Refresh this node after `delay` unless it is recomputed first.
    /// Has no effect in an untracked context.
    pub fn refresh_after(&self, delay: Duration) {
        if !self.is_tracked() {
            return;
        }
        let graph = self.graph.clone();
        let (node, epoch) = (self.node, self.epoch);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(node = %node, "Scheduled refresh");
            graph.refresh_if_current(node, epoch);
        });
        self.add_finalizer(move || timer.abort());
    }

    /// Publisher for values of this node within the current cycle.
    ///
    /// `T` must be the node's value type; a mismatch surfaces as
    /// [`NodeError::TypeMismatch`] on read.
    pub fn emitter<T: Send + Sync + 'static>(&self) -> Emitter<T> {
        Emitter {
            graph: self.graph.clone(),
            node: self.node,
            epoch: if self.is_tracked() { self.epoch } else { u64::MAX },
            _marker: PhantomData,
        }
    }

    pub(crate) fn run_scope_finalizers(&self) {
        if let Some(scope) = &self.scope {
            let finalizers: Vec<Finalizer> = std::mem::take(&mut *scope.lock());
            for finalizer in finalizers {
                finalizer();
            }
        }
    }
}

/// Pushes new values into a node outside its pull computation.
///
/// An emitter is bound to one compute cycle. Once the node is invalidated,
/// refreshed or torn down, `emit` returns `false` and does nothing.
pub struct Emitter<T> {
    graph: Graph,
    node: NodeId,
    epoch: u64,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            node: self.node,
            epoch: self.epoch,
            _marker: PhantomData,
        }
    }
}

impl<T: Send + Sync + 'static> Emitter<T> {
    /// Publish `value` and invalidate dependents. Returns whether it was accepted.
    pub fn emit(&self, value: T) -> bool {
        self.graph.emit(self.node, self.epoch, Arc::new(value))
    }

    pub fn is_current(&self) -> bool {
        self.graph.is_current(self.node, self.epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_emitter_publishes_and_invalidates_dependents() {
        let graph = Graph::new();
        let slot: Arc<Mutex<Option<Emitter<u32>>>> = Arc::new(Mutex::new(None));
        let slot_in = slot.clone();
        let source = graph.builder("source").keep_alive().build(move |ctx| {
            let slot = slot_in.clone();
            async move {
                *slot.lock() = Some(ctx.emitter::<u32>());
                Ok(1u32)
            }
        });
        let doubled = graph.atom("doubled", move |ctx| async move {
            Ok(ctx.get(&source).await? * 2)
        });

        assert_eq!(graph.get(&doubled).await.unwrap(), 2);

        let emitter = slot.lock().clone().unwrap();
        assert!(emitter.emit(5));
        assert_eq!(graph.peek(&source).value(), Some(&5));
        assert!(graph.peek(&doubled).is_pending());
        assert_eq!(graph.get(&doubled).await.unwrap(), 10);

        graph.refresh(&source);
        assert!(!emitter.is_current());
        assert!(!emitter.emit(9));
    }

    #[tokio::test]
    async fn test_get_or_falls_back_on_failure() {
        let graph = Graph::new();
        let broken = graph.atom("broken", |_ctx| async {
            Err::<u32, _>(NodeError::message("offline"))
        });
        let safe = graph.atom("safe", move |ctx| async move { ctx.get_or(&broken, 0).await });

        assert_eq!(graph.get(&safe).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_after_reruns_node() {
        let graph = Graph::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_in = runs.clone();
        let ticking = graph.atom("ticking", move |ctx| {
            let runs = runs_in.clone();
            async move {
                ctx.refresh_after(Duration::from_millis(20));
                Ok(runs.fetch_add(1, Ordering::SeqCst))
            }
        });

        let _sub = graph.subscribe(&ticking);
        tokio::time::sleep(Duration::from_millis(90)).await;
        assert!(runs.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_untracked_context_finalizers_run_at_scope_end() {
        let graph = Graph::new();
        let state = graph.writable("state", 0u32);
        let ctx = Ctx::untracked(graph.clone(), state.id());
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_in = ran.clone();

        ctx.add_finalizer(move || {
            ran_in.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        ctx.run_scope_finalizers();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(!ctx.emitter::<u32>().emit(3));
    }
}
