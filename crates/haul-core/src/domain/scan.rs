//! Scan events and fill history: the two append-only ledgers written by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::container::ContainerRef;
use super::ids::{FillEntryId, ScanEventId, TaskId, UserId, WarehouseContainerId};

/// Why the scan happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanContext {
    /// Lookup only; no task was advanced.
    InfoOnly,
    TaskAcceptAtCustomer,
    TaskPickup,
    TaskCompleteAtWarehouse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanResult {
    Success,
    InvalidContainer,
    Error,
}

/// Immutable record of one QR scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub id: ScanEventId,
    /// `None` when the payload matched no container.
    pub container: Option<ContainerRef>,
    pub qr_payload: String,
    pub driver_id: UserId,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    pub scanned_at: DateTime<Utc>,
    pub context: ScanContext,
    #[serde(default)]
    pub location: Option<String>,
    pub result: ScanResult,
}

/// Immutable ledger row: one addition to a warehouse container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillEntry {
    pub id: FillEntryId,
    pub warehouse_container_id: WarehouseContainerId,
    pub task_id: TaskId,
    pub amount_added: u64,
    pub recorded_at: DateTime<Utc>,
}
