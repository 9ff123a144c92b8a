//! EntityStore port - 正本（source of truth）
//!
//! EntityStore は以下を管理します：
//! - エンティティ（users, customer / warehouse containers, tasks）
//! - 追記専用の台帳（scan events, fill history, activity log）
//!
//! # 設計原則
//! - ビジネスルールを持たない（遷移・容量の判定は Engine 側）
//! - 書き込みは `UnitOfWork` 単位で all-or-nothing
//! - 更新は楽観ロック：レコードが持つ `version` が保存値と一致しなければ
//!   `StoreError::Conflict` で全体を拒否する
//! - 保存時制約として `current_amount <= max_capacity` を検査する

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    ActivityLogEntry, CustomerContainer, CustomerContainerId, FillEntry, ScanEvent, StoreError,
    Task, TaskId, TaskStatus, User, UserId, WarehouseContainer, WarehouseContainerId,
};

/// Which tasks a projection wants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub driver: Option<UserId>,
    pub status: Option<TaskStatus>,
    /// Exclude COMPLETED and CANCELLED.
    pub open_only: bool,
}

impl TaskFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Non-terminal tasks currently assigned to `driver`.
    pub fn open_for_driver(driver: UserId) -> Self {
        Self {
            driver: Some(driver),
            status: None,
            open_only: true,
        }
    }

    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(driver) = self.driver
            && task.assigned_to != Some(driver)
        {
            return false;
        }
        if let Some(status) = self.status
            && task.status != status
        {
            return false;
        }
        !(self.open_only && task.status.is_terminal())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityFilter {
    pub task: Option<TaskId>,
    pub user: Option<UserId>,
    pub since: Option<DateTime<Utc>>,
}

impl ActivityFilter {
    pub fn matches(&self, entry: &ActivityLogEntry) -> bool {
        self.task.is_none_or(|t| entry.task_id == Some(t))
            && self.user.is_none_or(|u| entry.user_id == Some(u))
            && self.since.is_none_or(|s| entry.created_at >= s)
    }
}

/// A batch of writes that commits together or not at all.
///
/// Updated records carry the `version` they were read at; the store compares it
/// with its current copy and bumps it on success.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    pub new_tasks: Vec<Task>,
    pub task_updates: Vec<Task>,
    pub customer_container_updates: Vec<CustomerContainer>,
    pub warehouse_container_updates: Vec<WarehouseContainer>,
    pub scan_events: Vec<ScanEvent>,
    pub fill_entries: Vec<FillEntry>,
    pub activity: Vec<ActivityLogEntry>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_task(&mut self, task: Task) -> &mut Self {
        self.new_tasks.push(task);
        self
    }

    pub fn update_task(&mut self, task: Task) -> &mut Self {
        self.task_updates.push(task);
        self
    }

    pub fn update_customer_container(&mut self, container: CustomerContainer) -> &mut Self {
        self.customer_container_updates.push(container);
        self
    }

    pub fn update_warehouse_container(&mut self, container: WarehouseContainer) -> &mut Self {
        self.warehouse_container_updates.push(container);
        self
    }

    pub fn append_scan(&mut self, event: ScanEvent) -> &mut Self {
        self.scan_events.push(event);
        self
    }

    pub fn append_fill(&mut self, entry: FillEntry) -> &mut Self {
        self.fill_entries.push(entry);
        self
    }

    pub fn append_activity(&mut self, entry: ActivityLogEntry) -> &mut Self {
        self.activity.push(entry);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.new_tasks.is_empty()
            && self.task_updates.is_empty()
            && self.customer_container_updates.is_empty()
            && self.warehouse_container_updates.is_empty()
            && self.scan_events.is_empty()
            && self.fill_entries.is_empty()
            && self.activity.is_empty()
    }
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn task(&self, id: TaskId) -> Result<Task, StoreError>;

    async fn tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError>;

    async fn user(&self, id: UserId) -> Result<User, StoreError>;

    async fn customer_container(
        &self,
        id: CustomerContainerId,
    ) -> Result<CustomerContainer, StoreError>;

    async fn warehouse_container(
        &self,
        id: WarehouseContainerId,
    ) -> Result<WarehouseContainer, StoreError>;

    async fn customer_container_by_qr(
        &self,
        qr_code: &str,
    ) -> Result<Option<CustomerContainer>, StoreError>;

    async fn warehouse_container_by_qr(
        &self,
        qr_code: &str,
    ) -> Result<Option<WarehouseContainer>, StoreError>;

    /// Amount the container held when it was registered.
    async fn warehouse_baseline(&self, id: WarehouseContainerId) -> Result<u64, StoreError>;

    async fn fill_history(&self, id: WarehouseContainerId) -> Result<Vec<FillEntry>, StoreError>;

    async fn scan_events(&self, driver: Option<UserId>) -> Result<Vec<ScanEvent>, StoreError>;

    async fn activity_log(&self, filter: &ActivityFilter)
    -> Result<Vec<ActivityLogEntry>, StoreError>;

    // ---- registration (admin CRUD, outside the engine's rules) ----

    async fn insert_user(&self, user: User) -> Result<(), StoreError>;

    async fn insert_customer_container(
        &self,
        container: CustomerContainer,
    ) -> Result<(), StoreError>;

    async fn insert_warehouse_container(
        &self,
        container: WarehouseContainer,
    ) -> Result<(), StoreError>;

    // ---- transactional write ----

    async fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError>;
}
