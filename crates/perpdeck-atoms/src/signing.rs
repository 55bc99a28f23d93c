//! Progress of the signing flow.

use perpdeck_core::ActionId;

/// Where the pending action is in the sign-and-submit flow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SigningState {
    #[default]
    Idle,
    /// `signed` of `total` transactions signed so far.
    Signing {
        action: ActionId,
        signed: usize,
        total: usize,
    },
    Submitting {
        action: ActionId,
    },
    Submitted {
        action: ActionId,
    },
    Failed {
        action: ActionId,
        reason: String,
    },
}

impl SigningState {
    pub fn action(&self) -> Option<&ActionId> {
        match self {
            Self::Idle => None,
            Self::Signing { action, .. }
            | Self::Submitting { action }
            | Self::Submitted { action }
            | Self::Failed { action, .. } => Some(action),
        }
    }

    /// Whether the flow is between start and submission.
    pub fn in_progress(&self) -> bool {
        matches!(self, Self::Signing { .. } | Self::Submitting { .. })
    }
}
