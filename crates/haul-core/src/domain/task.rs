//! Task record: planning fields, lifecycle status and per-status timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::container::MaterialType;
use super::ids::{CustomerContainerId, TaskId, UserId, WarehouseContainerId};
use super::state::TaskStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// One nullable timestamp per status ever entered.
///
/// Once set a timestamp is never cleared; reassignment keeps `assigned_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTimestamps {
    pub assigned_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub in_transit_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl StatusTimestamps {
    fn slot(&mut self, status: TaskStatus) -> Option<&mut Option<DateTime<Utc>>> {
        match status {
            TaskStatus::Planned => None,
            TaskStatus::Assigned => Some(&mut self.assigned_at),
            TaskStatus::Accepted => Some(&mut self.accepted_at),
            TaskStatus::PickedUp => Some(&mut self.picked_up_at),
            TaskStatus::InTransit => Some(&mut self.in_transit_at),
            TaskStatus::Delivered => Some(&mut self.delivered_at),
            TaskStatus::Completed => Some(&mut self.completed_at),
            TaskStatus::Cancelled => Some(&mut self.cancelled_at),
        }
    }

    pub fn get(&self, status: TaskStatus) -> Option<DateTime<Utc>> {
        match status {
            TaskStatus::Planned => None,
            TaskStatus::Assigned => self.assigned_at,
            TaskStatus::Accepted => self.accepted_at,
            TaskStatus::PickedUp => self.picked_up_at,
            TaskStatus::InTransit => self.in_transit_at,
            TaskStatus::Delivered => self.delivered_at,
            TaskStatus::Completed => self.completed_at,
            TaskStatus::Cancelled => self.cancelled_at,
        }
    }

    fn latest(&self) -> Option<DateTime<Utc>> {
        TaskStatus::ALL.into_iter().filter_map(|s| self.get(s)).max()
    }
}

/// Admin input for a new task. Validated by the engine against the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub customer_container_id: CustomerContainerId,
    #[serde(default)]
    pub target_warehouse_id: Option<WarehouseContainerId>,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    pub planned_quantity: u64,
    pub unit: String,
    #[serde(default)]
    pub priority: Priority,
    pub material_type: MaterialType,
}

/// A unit of work moving material from one customer container to one warehouse container.
///
/// Fields are public for read projections; mutation goes through
/// `TaskEngine`, which uses [`Task::enter`] so timestamps stay monotonic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub customer_container_id: CustomerContainerId,
    pub assigned_to: Option<UserId>,
    pub created_by: UserId,
    pub target_warehouse_id: Option<WarehouseContainerId>,

    pub scheduled_for: Option<DateTime<Utc>>,
    pub planned_quantity: u64,
    pub unit: String,
    pub priority: Priority,
    pub material_type: MaterialType,

    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub timestamps: StatusTimestamps,

    #[serde(default)]
    pub actual_quantity: Option<u64>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,

    /// Set on tasks created by reopening a cancelled one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reopened_from: Option<TaskId>,

    /// Optimistic concurrency counter, bumped by the store on every commit.
    #[serde(default)]
    pub version: u64,
}

impl Task {
    pub fn new(id: TaskId, spec: NewTask, created_by: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            customer_container_id: spec.customer_container_id,
            assigned_to: None,
            created_by,
            target_warehouse_id: spec.target_warehouse_id,
            scheduled_for: spec.scheduled_for,
            planned_quantity: spec.planned_quantity,
            unit: spec.unit,
            priority: spec.priority,
            material_type: spec.material_type,
            status: TaskStatus::Planned,
            created_at: now,
            timestamps: StatusTimestamps::default(),
            actual_quantity: None,
            cancellation_reason: None,
            reopened_from: None,
            version: 0,
        }
    }

    /// The planning half of this task, as used when reopening it.
    pub fn planning(&self) -> NewTask {
        NewTask {
            customer_container_id: self.customer_container_id,
            target_warehouse_id: self.target_warehouse_id,
            scheduled_for: self.scheduled_for,
            planned_quantity: self.planned_quantity,
            unit: self.unit.clone(),
            priority: self.priority,
            material_type: self.material_type.clone(),
        }
    }

    /// Latest instant recorded on this task (creation or any status timestamp).
    pub fn latest_timestamp(&self) -> DateTime<Utc> {
        self.timestamps
            .latest()
            .map_or(self.created_at, |t| t.max(self.created_at))
    }

    /// Clamp `now` so that a new timestamp never precedes one already recorded.
    pub fn monotonic(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.max(self.latest_timestamp())
    }

    /// Move to `status` and stamp its timestamp if it was never set.
    ///
    /// Legality is not checked here; callers consult the transition table first.
    pub fn enter(&mut self, status: TaskStatus, at: DateTime<Utc>) {
        let at = self.monotonic(at);
        self.status = status;
        if let Some(slot) = self.timestamps.slot(status)
            && slot.is_none()
        {
            *slot = Some(at);
        }
    }

    pub fn is_assigned_to(&self, driver: UserId) -> bool {
        self.assigned_to == Some(driver)
    }
}
