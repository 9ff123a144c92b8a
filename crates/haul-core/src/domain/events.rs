//! Events - 監査ログ（Activity Log）のドメイン型
//!
//! Activity log は成功した遷移の副作用としてのみ生成されます。
//! 生成は `app::audit::AuditEmitter` が担当し、このモジュールは型と
//! 状態 → ラベルの対応表だけを持ちます。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::container::ContainerRef;
use super::ids::{ActivityId, ScanEventId, TaskId, UserId};
use super::state::TaskStatus;

/// ActivityKind は監査ログの固定ラベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    TaskCreated,
    TaskAssigned,
    TaskAccepted,
    TaskPickedUp,
    TaskInTransit,
    TaskDelivered,
    TaskCompleted,
    TaskCancelled,
    ContainerScannedAtCustomer,
    ContainerScannedAtWarehouse,
    WeightRecorded,
}

impl ActivityKind {
    /// 遷移後の状態からラベルを決定（決定的な写像）
    ///
    /// PLANNED は作成と unassign の両方で到達するため、呼び出し側が
    /// `TaskCreated` を明示的に選ぶ場合を除き `TaskAssigned`（担当変更）扱いです。
    /// 割り当てか解除かは entry の `details.change`（`"assigned"` / `"unassigned"`）で区別します。
    pub const fn for_status(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Planned | TaskStatus::Assigned => Self::TaskAssigned,
            TaskStatus::Accepted => Self::TaskAccepted,
            TaskStatus::PickedUp => Self::TaskPickedUp,
            TaskStatus::InTransit => Self::TaskInTransit,
            TaskStatus::Delivered => Self::TaskDelivered,
            TaskStatus::Completed => Self::TaskCompleted,
            TaskStatus::Cancelled => Self::TaskCancelled,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreated => "TASK_CREATED",
            Self::TaskAssigned => "TASK_ASSIGNED",
            Self::TaskAccepted => "TASK_ACCEPTED",
            Self::TaskPickedUp => "TASK_PICKED_UP",
            Self::TaskInTransit => "TASK_IN_TRANSIT",
            Self::TaskDelivered => "TASK_DELIVERED",
            Self::TaskCompleted => "TASK_COMPLETED",
            Self::TaskCancelled => "TASK_CANCELLED",
            Self::ContainerScannedAtCustomer => "CONTAINER_SCANNED_AT_CUSTOMER",
            Self::ContainerScannedAtWarehouse => "CONTAINER_SCANNED_AT_WAREHOUSE",
            Self::WeightRecorded => "WEIGHT_RECORDED",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ActivityLogEntry は人間が読める監査ログ 1 件
///
/// 参照はすべて optional（id と kind 以外）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: ActivityId,
    pub kind: ActivityKind,
    pub task_id: Option<TaskId>,
    pub container: Option<ContainerRef>,
    pub user_id: Option<UserId>,
    pub scan_event_id: Option<ScanEventId>,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
