//! Typed node handles.
//!
//! Handles are plain identifiers: copying one never copies state, and two
//! handles are equal exactly when they refer to the same node.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Deref;

use crate::error::{NodeError, NodeResult};

/// Graph-unique node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything that names a node in the graph.
///
/// Family entries are stored as `NodeHandle`s so eviction can match them by id.
pub trait NodeHandle: Clone + Send + Sync + 'static {
    fn node_id(&self) -> NodeId;
}

/// Read handle to a derived value of type `T`.
pub struct Atom<T> {
    id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Atom<T> {
    pub(crate) fn from_id(id: NodeId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl<T> Clone for Atom<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Atom<T> {}

impl<T> PartialEq for Atom<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Atom<T> {}

impl<T> Hash for Atom<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Atom<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({})", self.id)
    }
}

impl<T: 'static> NodeHandle for Atom<T> {
    fn node_id(&self) -> NodeId {
        self.id
    }
}

/// Handle to a source node that can be written directly.
///
/// Dereferences to [`Atom`], so it can be read anywhere an atom is expected.
pub struct Writable<T> {
    atom: Atom<T>,
}

impl<T> Writable<T> {
    pub(crate) fn from_id(id: NodeId) -> Self {
        Self {
            atom: Atom::from_id(id),
        }
    }

    pub fn atom(&self) -> Atom<T> {
        self.atom
    }
}

impl<T> Deref for Writable<T> {
    type Target = Atom<T>;

    fn deref(&self) -> &Atom<T> {
        &self.atom
    }
}

impl<T> Clone for Writable<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Writable<T> {}

impl<T> PartialEq for Writable<T> {
    fn eq(&self, other: &Self) -> bool {
        self.atom == other.atom
    }
}

impl<T> Eq for Writable<T> {}

impl<T> Hash for Writable<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.atom.hash(state);
    }
}

impl<T> fmt::Debug for Writable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Writable({})", self.atom.id)
    }
}

impl<T: 'static> NodeHandle for Writable<T> {
    fn node_id(&self) -> NodeId {
        self.atom.id
    }
}

/// Snapshot of a node's cache as seen by a non-suspending reader.
#[derive(Debug, Clone)]
pub enum NodeState<T> {
    /// Not yet computed, or recomputing.
    Pending,
    Success(T),
    Failure(NodeError),
}

impl<T> NodeState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn value(&self) -> Option<&T> {
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

    /// Settled result, `None` while pending.
    pub fn into_result(self) -> Option<NodeResult<T>> {
        match self {
            Self::Pending => None,
            Self::Success(value) => Some(Ok(value)),
            Self::Failure(err) => Some(Err(err)),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> NodeState<U> {
        match self {
            Self::Pending => NodeState::Pending,
            Self::Success(value) => NodeState::Success(f(value)),
            Self::Failure(err) => NodeState::Failure(err),
        }
    }
}

impl<T> From<NodeResult<T>> for NodeState<T> {
    fn from(result: NodeResult<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Failure(err),
        }
    }
}
