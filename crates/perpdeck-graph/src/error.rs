//! Node error types.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure cached in a node.
///
/// Cloned into every reader, so sources are held behind `Arc`.
#[derive(Debug, Clone, Error)]
pub enum NodeError {
    /// The computation failed. The typed source can be recovered with
    /// [`NodeError::downcast_ref`].
    #[error("{0}")]
    Failed(Arc<dyn std::error::Error + Send + Sync>),

    /// A precondition did not hold. Never retried.
    #[error("Defect: {0}")]
    Defect(String),

    #[error("Dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("Node disposed: {0}")]
    Disposed(String),

    /// The reading computation was superseded by a newer cycle.
    #[error("Computation cancelled")]
    Cancelled,

    #[error("Graph shut down")]
    Shutdown,

    #[error("Type mismatch reading node {0}")]
    TypeMismatch(String),
}

/// Plain-text failure.
#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}

impl NodeError {
    /// Wrap a typed error.
    pub fn failed<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Failed(Arc::new(err))
    }

    /// Failure from a message.
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Failed(Arc::new(Message(msg.into())))
    }

    /// Precondition failure.
    pub fn defect(msg: impl Into<String>) -> Self {
        Self::Defect(msg.into())
    }

    /// Whether this failure indicates a wiring bug rather than a runtime condition.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            Self::Defect(_) | Self::Cycle(_) | Self::TypeMismatch(_)
        )
    }

    /// Recover the typed source of a `Failed` error.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Failed(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Result type alias for node reads.
pub type NodeResult<T> = Result<T, NodeError>;
