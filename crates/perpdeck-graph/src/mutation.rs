//! Mutations: side-effecting operations with observable state.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::atom::{Atom, NodeHandle, NodeId, Writable};
use crate::context::Ctx;
use crate::error::{NodeError, NodeResult};
use crate::graph::{BoxFuture, Graph};

/// Last known outcome of a mutation.
#[derive(Debug, Clone)]
pub enum MutationState<R> {
    Idle,
    Waiting,
    Success(R),
    Failure(NodeError),
}

impl<R> MutationState<R> {
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    pub fn value(&self) -> Option<&R> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&NodeError> {
        match self {
            Self::Failure(err) => Some(err),
            _ => None,
        }
    }
}

impl<R> From<NodeResult<R>> for MutationState<R> {
    fn from(result: NodeResult<R>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Failure(err),
        }
    }
}

type Handler<A, R> = Arc<dyn Fn(Ctx, A) -> BoxFuture<'static, NodeResult<R>> + Send + Sync>;

/// A callable operation whose last outcome is itself a readable node.
///
/// The state node is keep-alive, so family-owned mutations stay in their
/// family for the life of the graph. The handler receives an untracked [`Ctx`]: its reads create no
/// dependencies, but it may set writables and invalidate tags.
pub struct Mutation<A, R> {
    graph: Graph,
    label: Arc<str>,
    state: Writable<MutationState<R>>,
    handler: Handler<A, R>,
}

impl<A, R> Clone for Mutation<A, R> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            label: self.label.clone(),
            state: self.state,
            handler: self.handler.clone(),
        }
    }
}

impl<A, R> fmt::Debug for Mutation<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("label", &self.label)
            .field("state", &self.state)
            .finish()
    }
}

impl<A, R> Mutation<A, R>
where
    A: Send + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(graph: &Graph, label: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Ctx, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = NodeResult<R>> + Send + 'static,
    {
        let label: String = label.into();
        // The last outcome outlives its readers; sweeps must not reset it.
        let state = graph
            .builder(format!("{label}/state"))
            .keep_alive()
            .writable(MutationState::Idle);
        let handler: Handler<A, R> =
            Arc::new(move |ctx: Ctx, args: A| -> BoxFuture<'static, NodeResult<R>> {
                Box::pin(handler(ctx, args))
            });
        Self {
            graph: graph.clone(),
            label: Arc::from(label),
            state,
            handler,
        }
    }

    /// Run the mutation. The state node moves to `Waiting`, then to the outcome.
    pub async fn run(&self, args: A) -> NodeResult<R> {
        self.graph.set(&self.state, MutationState::Waiting);
        debug!(mutation = %self.label, "Mutation started");

        let ctx = Ctx::untracked(self.graph.clone(), self.state.id());
        let result = (self.handler)(ctx.clone(), args).await;
        ctx.run_scope_finalizers();

        match &result {
            Ok(_) => debug!(mutation = %self.label, "Mutation succeeded"),
            Err(err) if err.is_defect() => {
                error!(mutation = %self.label, error = %err, "Mutation defect")
            }
            Err(err) => warn!(mutation = %self.label, error = %err, "Mutation failed"),
        }

        self.graph
            .set(&self.state, MutationState::from(result.clone()));
        result
    }

    /// Readable state node.
    pub fn state(&self) -> Atom<MutationState<R>> {
        self.state.atom()
    }

    /// Back to `Idle`.
    pub fn reset(&self) {
        self.graph.set(&self.state, MutationState::Idle);
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<A, R> NodeHandle for Mutation<A, R>
where
    A: 'static,
    R: 'static,
{
    fn node_id(&self) -> NodeId {
        self.state.node_id()
    }
}

impl Graph {
    /// Shorthand for [`Mutation::new`].
    pub fn mutation<A, R, F, Fut>(&self, label: impl Into<String>, handler: F) -> Mutation<A, R>
    where
        A: Send + 'static,
        R: Clone + Send + Sync + 'static,
        F: Fn(Ctx, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = NodeResult<R>> + Send + 'static,
    {
        Mutation::new(self, label, handler)
    }
}
