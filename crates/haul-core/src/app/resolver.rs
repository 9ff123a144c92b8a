//! Scan Resolver - QR ペイロードから「どのタスクを進めるか」を決める
//!
//! コンテナの検索（顧客 QR → 倉庫 QR の順）は Engine がストアに対して行い、
//! ここでは検索結果と driver の未完了タスク一覧だけを見て判定します。
//! 書き込みは一切しません。
//!
//! # 判定
//! - 顧客コンテナ: そのコンテナ上の driver のタスク。集荷待ち
//!   （PLANNED / ASSIGNED / ACCEPTED）を進行中より優先
//! - 倉庫コンテナ: driver の進行中タスク（PICKED_UP / IN_TRANSIT / DELIVERED）

use std::cmp::Reverse;

use serde::Serialize;

use crate::domain::{
    ContainerRef, CustomerContainer, EngineError, ScanContext, Task, TaskStatus, UserId,
    WarehouseContainer,
};

/// Container found for a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ScannedContainer {
    Customer(CustomerContainer),
    Warehouse(WarehouseContainer),
}

impl ScannedContainer {
    pub fn container_ref(&self) -> ContainerRef {
        match self {
            Self::Customer(c) => ContainerRef::Customer(c.id),
            Self::Warehouse(c) => ContainerRef::Warehouse(c.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum ScanResolution {
    /// Customer container; the task can be picked up next.
    AwaitingPickup {
        task: Task,
        container: CustomerContainer,
    },
    /// Customer container whose task is already on the truck. Informational.
    AlreadyPickedUp {
        task: Task,
        container: CustomerContainer,
    },
    /// Warehouse container; the driver's in-progress task can be delivered here.
    Delivery {
        task: Task,
        container: WarehouseContainer,
    },
}

impl ScanResolution {
    pub fn task(&self) -> &Task {
        match self {
            Self::AwaitingPickup { task, .. }
            | Self::AlreadyPickedUp { task, .. }
            | Self::Delivery { task, .. } => task,
        }
    }

    pub fn container(&self) -> ContainerRef {
        match self {
            Self::AwaitingPickup { container, .. } | Self::AlreadyPickedUp { container, .. } => {
                ContainerRef::Customer(container.id)
            }
            Self::Delivery { container, .. } => ContainerRef::Warehouse(container.id),
        }
    }

    /// Context a follow-up confirmation would record.
    pub fn next_context(&self) -> ScanContext {
        match self {
            Self::AwaitingPickup { task, .. } if task.status == TaskStatus::Accepted => {
                ScanContext::TaskPickup
            }
            Self::AwaitingPickup { .. } => ScanContext::TaskAcceptAtCustomer,
            Self::AlreadyPickedUp { .. } => ScanContext::InfoOnly,
            Self::Delivery { .. } => ScanContext::TaskCompleteAtWarehouse,
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self, Self::AlreadyPickedUp { .. })
    }
}

/// Classify a scan.
///
/// `open_tasks` are the driver's non-terminal tasks; tasks assigned to anyone
/// else are ignored even if present.
pub fn resolve(
    payload: &str,
    driver: UserId,
    scanned: Option<ScannedContainer>,
    open_tasks: &[Task],
) -> Result<ScanResolution, EngineError> {
    let mine = open_tasks
        .iter()
        .filter(|t| t.is_assigned_to(driver) && !t.status.is_terminal());

    match scanned {
        None => Err(EngineError::UnknownContainer {
            payload: payload.to_string(),
        }),
        Some(ScannedContainer::Customer(container)) => {
            let on_container: Vec<&Task> = mine
                .filter(|t| t.customer_container_id == container.id)
                .collect();

            let awaiting = on_container
                .iter()
                .filter(|t| t.status.is_awaiting_pickup())
                .min_by_key(|t| (Reverse(t.priority), t.scheduled_for, t.created_at, t.id));
            if let Some(task) = awaiting {
                return Ok(ScanResolution::AwaitingPickup {
                    task: (*task).clone(),
                    container,
                });
            }

            let in_progress = on_container
                .iter()
                .filter(|t| t.status.is_in_progress())
                .min_by_key(|t| (t.created_at, t.id));
            match in_progress {
                Some(task) => Ok(ScanResolution::AlreadyPickedUp {
                    task: (*task).clone(),
                    container,
                }),
                None => Err(EngineError::NoTaskForContainer {
                    container: container.id,
                    driver,
                }),
            }
        }
        Some(ScannedContainer::Warehouse(container)) => {
            let active = mine
                .filter(|t| t.status.is_in_progress())
                .min_by_key(|t| (t.timestamps.picked_up_at, t.created_at, t.id));
            match active {
                Some(task) => Ok(ScanResolution::Delivery {
                    task: task.clone(),
                    container,
                }),
                None => Err(EngineError::NoActiveTask { driver }),
            }
        }
    }
}
