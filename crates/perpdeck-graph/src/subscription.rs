//! Subscriptions: mounted nodes observed by a consumer.

use tokio::sync::watch;

use crate::atom::{Atom, NodeState};
use crate::error::{NodeError, NodeResult};
use crate::graph::Graph;

/// Keeps a node mounted and reports its changes.
///
/// While at least one subscription exists the node is recomputed eagerly
/// after every invalidation. Dropping the last subscription tears the node
/// down (and, transitively, any dependency nothing else retains).
pub struct Subscription<T: Clone + 'static> {
    graph: Graph,
    atom: Atom<T>,
    changes: Option<watch::Receiver<u64>>,
}

impl<T: Clone + 'static> Subscription<T> {
    pub(crate) fn new(graph: Graph, atom: Atom<T>, changes: Option<watch::Receiver<u64>>) -> Self {
        Self {
            graph,
            atom,
            changes,
        }
    }

    pub fn atom(&self) -> Atom<T> {
        self.atom
    }

    /// Current cached state.
    pub fn state(&self) -> NodeState<T> {
        if self.changes.is_none() {
            return NodeState::Failure(NodeError::Disposed(self.atom.id().to_string()));
        }
        self.graph.peek(&self.atom)
    }

    /// Current value, waiting for a running computation.
    pub async fn get(&self) -> NodeResult<T> {
        self.graph.get(&self.atom).await
    }

    /// Wait for the next change. Returns `false` once the node is gone.
    pub async fn changed(&mut self) -> bool {
        match self.changes.as_mut() {
            Some(changes) => changes.changed().await.is_ok(),
            None => false,
        }
    }

    /// Wait until the node settles after its next change.
    /// Returns `None` once the node is gone.
    pub async fn next(&mut self) -> Option<NodeResult<T>> {
        loop {
            if !self.changed().await {
                return None;
            }
            if let Some(result) = self.state().into_result() {
                return Some(result);
            }
        }
    }

    pub fn refresh(&self) {
        self.graph.refresh(&self.atom);
    }
}

impl<T: Clone + 'static> Drop for Subscription<T> {
    fn drop(&mut self) {
        if self.changes.is_some() {
            self.graph.release(self.atom.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_subscription_sees_updates() {
        let graph = Graph::new();
        let count = graph.writable("count", 0u32);
        let label = graph.atom("label", move |ctx| async move {
            Ok(format!("count={}", ctx.get(&count).await?))
        });

        let mut sub = graph.subscribe(&label);
        assert_eq!(sub.get().await.unwrap(), "count=0");

        graph.set(&count, 3);
        assert_eq!(sub.next().await.unwrap().unwrap(), "count=3");
    }

    #[tokio::test]
    async fn test_changed_pending_until_set() {
        let graph = Graph::new();
        let count = graph.writable("count", 0u32);
        assert_eq!(graph.get(&count).await.unwrap(), 0);

        let mut sub = graph.subscribe(&count.atom());
        {
            let mut changed = tokio_test::task::spawn(sub.changed());
            tokio_test::assert_pending!(changed.poll());

            graph.set(&count, 1);
            assert!(changed.is_woken());
            assert!(tokio_test::assert_ready!(changed.poll()));
        }
        assert_eq!(sub.state().value(), Some(&1));
    }

    #[tokio::test]
    async fn test_last_unsubscribe_tears_down_unretained_deps() {
        let graph = Graph::new();
        let finalized = Arc::new(AtomicUsize::new(0));
        let finalized_in = finalized.clone();
        let upstream = graph.atom("upstream", move |ctx| {
            let finalized = finalized_in.clone();
            async move {
                ctx.add_finalizer(move || {
                    finalized.fetch_add(1, Ordering::SeqCst);
                });
                Ok(1u32)
            }
        });
        let downstream = graph.atom("downstream", move |ctx| async move {
            Ok(ctx.get(&upstream).await? + 1)
        });

        let first = graph.subscribe(&downstream);
        let second = graph.subscribe(&downstream);
        assert_eq!(first.get().await.unwrap(), 2);
        assert_eq!(graph.subscriber_count(downstream.id()), 2);

        drop(first);
        assert!(graph.is_cached(upstream.id()));

        drop(second);
        assert!(!graph.is_cached(downstream.id()));
        assert!(!graph.is_cached(upstream.id()));
        assert_eq!(finalized.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subscribed_node_recomputes_eagerly() {
        let graph = Graph::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_in = runs.clone();
        let node = graph.atom("node", move |_ctx| {
            let runs = runs_in.clone();
            async move { Ok(runs.fetch_add(1, Ordering::SeqCst)) }
        });

        let mut sub = graph.subscribe(&node);
        assert_eq!(sub.get().await.unwrap(), 0);

        sub.refresh();
        assert_eq!(sub.next().await.unwrap().unwrap(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
