//! Reactive derived-value graph.
//!
//! Nodes are either writable sources or computed from other nodes. Reads
//! inside a computation are tracked as dependencies, so invalidating one node
//! invalidates everything derived from it. On top of that:
//!
//! - [`Family`] memoizes nodes by key.
//! - [`ReactivityTag`] groups nodes for broadcast invalidation.
//! - [`Mutation`] runs side effects and exposes its last outcome as a node.
//! - [`Subscription`] keeps a node mounted; unmounted nodes are torn down.

pub mod atom;
pub mod context;
pub mod error;
pub mod family;
pub mod graph;
pub mod mutation;
pub mod subscription;
pub mod tag;

pub use atom::{Atom, NodeHandle, NodeId, NodeState, Writable};
pub use context::{Ctx, Emitter};
pub use error::{NodeError, NodeResult};
pub use family::Family;
pub use graph::{AtomBuilder, BoxFuture, Graph};
pub use mutation::{Mutation, MutationState};
pub use subscription::Subscription;
pub use tag::ReactivityTag;
