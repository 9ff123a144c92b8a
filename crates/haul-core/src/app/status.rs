//! Status - 状態別の件数と fill ledger の突き合わせ

use serde::{Deserialize, Serialize};

use crate::domain::{Task, TaskStatus, WarehouseContainerId};

/// Tasks per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub planned: usize,
    pub assigned: usize,
    pub accepted: usize,
    pub picked_up: usize,
    pub in_transit: usize,
    pub delivered: usize,
    pub completed: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn tally<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut counts = Self::default();
        for task in tasks {
            *counts.slot(task.status) += 1;
        }
        counts
    }

    fn slot(&mut self, status: TaskStatus) -> &mut usize {
        match status {
            TaskStatus::Planned => &mut self.planned,
            TaskStatus::Assigned => &mut self.assigned,
            TaskStatus::Accepted => &mut self.accepted,
            TaskStatus::PickedUp => &mut self.picked_up,
            TaskStatus::InTransit => &mut self.in_transit,
            TaskStatus::Delivered => &mut self.delivered,
            TaskStatus::Completed => &mut self.completed,
            TaskStatus::Cancelled => &mut self.cancelled,
        }
    }

    pub fn get(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Planned => self.planned,
            TaskStatus::Assigned => self.assigned,
            TaskStatus::Accepted => self.accepted,
            TaskStatus::PickedUp => self.picked_up,
            TaskStatus::InTransit => self.in_transit,
            TaskStatus::Delivered => self.delivered,
            TaskStatus::Completed => self.completed,
            TaskStatus::Cancelled => self.cancelled,
        }
    }

    pub fn total(&self) -> usize {
        TaskStatus::ALL.into_iter().map(|s| self.get(s)).sum()
    }

    /// Tasks not yet COMPLETED or CANCELLED.
    pub fn open(&self) -> usize {
        self.total() - self.completed - self.cancelled
    }
}

/// Result of checking a container's fill ledger against its amount.
///
/// `baseline + ledger_total == current_amount` when consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub container_id: WarehouseContainerId,
    pub baseline: u64,
    pub ledger_total: u64,
    pub current_amount: u64,
    pub max_capacity: u64,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.baseline.checked_add(self.ledger_total) == Some(self.current_amount)
            && self.current_amount <= self.max_capacity
    }
}
