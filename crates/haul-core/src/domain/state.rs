//! State - タスクのライフサイクル状態と遷移表
//!
//! 遷移の正当性はこのモジュールの `TaskStatus::can_transition_to` だけが判定します。
//! Engine も CLI も、ここ以外で「この状態から何ができるか」を再実装しません。
//!
//! ```text
//! PLANNED ──► ASSIGNED ──► ACCEPTED ──► PICKED_UP ──► IN_TRANSIT ──► DELIVERED ──► COMPLETED
//!    ▲            │
//!    └────────────┘  (unassign)
//!
//! 終端以外のすべての状態 ──► CANCELLED
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// TaskStatus はタスクの状態を表現
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Planned,
    Assigned,
    Accepted,
    PickedUp,
    InTransit,
    Delivered,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 8] = [
        TaskStatus::Planned,
        TaskStatus::Assigned,
        TaskStatus::Accepted,
        TaskStatus::PickedUp,
        TaskStatus::InTransit,
        TaskStatus::Delivered,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "PLANNED",
            Self::Assigned => "ASSIGNED",
            Self::Accepted => "ACCEPTED",
            Self::PickedUp => "PICKED_UP",
            Self::InTransit => "IN_TRANSIT",
            Self::Delivered => "DELIVERED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// The canonical transition table.
    pub const fn allowed_targets(self) -> &'static [TaskStatus] {
        use TaskStatus::*;
        match self {
            Planned => &[Assigned, Cancelled],
            Assigned => &[Accepted, Planned, Cancelled],
            Accepted => &[PickedUp, Cancelled],
            PickedUp => &[InTransit, Cancelled],
            InTransit => &[Delivered, Cancelled],
            Delivered => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    /// Validate whether a transition from self to `requested` is allowed.
    pub fn can_transition_to(self, requested: TaskStatus) -> Result<(), InvalidTransition> {
        if self.allowed_targets().contains(&requested) {
            Ok(())
        } else {
            Err(InvalidTransition {
                current: self,
                requested,
            })
        }
    }

    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Material has left the customer container but has not been credited yet.
    pub fn is_in_progress(self) -> bool {
        matches!(self, Self::PickedUp | Self::InTransit | Self::Delivered)
    }

    /// Still waiting for the driver to scan the customer container.
    pub fn is_awaiting_pickup(self) -> bool {
        matches!(self, Self::Planned | Self::Assigned | Self::Accepted)
    }
}

/// Convenience form of the validator for callers that only need a yes/no.
pub fn is_valid_transition(current: TaskStatus, requested: TaskStatus) -> bool {
    current.can_transition_to(requested).is_ok()
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Requested status change is not an edge of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition {current} -> {requested}")]
pub struct InvalidTransition {
    pub current: TaskStatus,
    pub requested: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status: {0:?}")]
pub struct UnknownStatus(pub String);
