//! Reactivity tags: named invalidation channels.

use std::fmt;
use std::sync::Arc;

/// Opaque invalidation channel name.
///
/// A node may carry any number of tags; [`Graph::invalidate_tag`](crate::Graph::invalidate_tag)
/// refreshes every node carrying the tag without needing references to them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReactivityTag(Arc<str>);

impl ReactivityTag {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ReactivityTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ReactivityTag {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&ReactivityTag> for ReactivityTag {
    fn from(value: &ReactivityTag) -> Self {
        value.clone()
    }
}

impl fmt::Display for ReactivityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
