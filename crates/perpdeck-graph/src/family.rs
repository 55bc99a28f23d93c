//! Families: memoized node constructors keyed by value.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

use crate::atom::NodeHandle;
use crate::graph::Graph;

type BuildFn<K, H> = Arc<dyn Fn(&Graph, &K) -> H + Send + Sync>;

/// Maps keys to nodes, building each node at most once per lifetime.
///
/// Equal keys yield the identical handle while the node lives. Once the node
/// is torn down (last subscriber gone, `collect`, `evict_idle`) its entry is
/// removed and the next `get` builds a fresh node.
pub struct Family<K, H> {
    graph: Graph,
    entries: Arc<DashMap<K, H>>,
    build: BuildFn<K, H>,
}

impl<K, H> Clone for Family<K, H> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            entries: self.entries.clone(),
            build: self.build.clone(),
        }
    }
}

impl<K, H> fmt::Debug for Family<K, H>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Family")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<K, H> Family<K, H>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    H: NodeHandle,
{
    /// `build` must not call `get` on this same family.
    pub fn new(graph: &Graph, build: impl Fn(&Graph, &K) -> H + Send + Sync + 'static) -> Self {
        Self {
            graph: graph.clone(),
            entries: Arc::new(DashMap::new()),
            build: Arc::new(build),
        }
    }

    /// Handle for `key`, building the node on first use.
    pub fn get(&self, key: &K) -> H {
        if let Some(entry) = self.entries.get(key) {
            if self.graph.contains(entry.node_id()) {
                return entry.value().clone();
            }
        }

        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if self.graph.contains(occupied.get().node_id()) {
                    return occupied.get().clone();
                }
                let handle = self.create(key);
                occupied.insert(handle.clone());
                handle
            }
            Entry::Vacant(vacant) => {
                let handle = self.create(key);
                vacant.insert(handle.clone());
                handle
            }
        }
    }

    fn create(&self, key: &K) -> H {
        let handle = (self.build)(&self.graph, key);
        let id = handle.node_id();
        trace!(key = ?key, node = %id, "Family member created");

        let entries = Arc::downgrade(&self.entries);
        let owned_key = key.clone();
        self.graph.set_disposer(
            id,
            Box::new(move || {
                if let Some(entries) = entries.upgrade() {
                    entries.remove_if(&owned_key, |_, handle| handle.node_id() == id);
                }
            }),
        );
        handle
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<K> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Tear down members nothing retains. Returns how many were evicted.
    pub fn evict_idle(&self) -> usize {
        let ids: Vec<_> = self
            .entries
            .iter()
            .map(|entry| entry.value().node_id())
            .collect();
        self.graph.teardown_idle(&ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn squares(graph: &Graph, built: Arc<AtomicUsize>) -> Family<u64, Atom<u64>> {
        Family::new(graph, move |graph, key: &u64| {
            built.fetch_add(1, Ordering::SeqCst);
            let key = *key;
            graph.atom(format!("square/{key}"), move |_ctx| async move { Ok(key * key) })
        })
    }

    #[tokio::test]
    async fn test_equal_keys_share_node() {
        let graph = Graph::new();
        let built = Arc::new(AtomicUsize::new(0));
        let family = squares(&graph, built.clone());

        let a = family.get(&3);
        let b = family.get(&3);
        let c = family.get(&4);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(graph.get(&a).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_member_rebuilt_after_eviction() {
        let graph = Graph::new();
        let built = Arc::new(AtomicUsize::new(0));
        let family = squares(&graph, built.clone());

        let first = family.get(&5);
        assert_eq!(graph.get(&first).await.unwrap(), 25);

        assert_eq!(family.evict_idle(), 1);
        assert!(!family.contains(&5));
        assert!(!graph.contains(first.id()));

        let second = family.get(&5);
        assert_ne!(first, second);
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(graph.get(&second).await.unwrap(), 25);
    }

    #[tokio::test]
    async fn test_subscribed_member_not_evicted() {
        let graph = Graph::new();
        let family = squares(&graph, Arc::new(AtomicUsize::new(0)));

        let atom = family.get(&2);
        let sub = graph.subscribe(&atom);
        assert_eq!(sub.get().await.unwrap(), 4);

        assert_eq!(family.evict_idle(), 0);
        assert_eq!(graph.collect(), 0);
        assert_eq!(family.get(&2), atom);

        drop(sub);
        assert!(!family.contains(&2));
        assert_ne!(family.get(&2), atom);
    }
}
