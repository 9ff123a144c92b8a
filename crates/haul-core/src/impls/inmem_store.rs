//! InMemoryEntityStore - 開発・テスト用の正本
//!
//! # 実装詳細
//! - 全テーブルを 1 つの `tokio::sync::Mutex` の内側に置く
//! - `commit` は「全件検証 → 全件適用」の 2 段階。検証で 1 件でも落ちれば何も書かない
//! - JSON スナップショットで保存・復元できる（CLI の state file）

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::{
    ActivityLogEntry, CustomerContainer, CustomerContainerId, EntityKind, FillEntry, ScanEvent,
    StoreError, Task, TaskId, User, UserId, WarehouseContainer, WarehouseContainerId,
};
use crate::ports::{ActivityFilter, EntityStore, TaskFilter, UnitOfWork};

#[derive(Default)]
struct InMemoryStoreState {
    users: HashMap<UserId, User>,
    customer_containers: HashMap<CustomerContainerId, CustomerContainer>,
    warehouse_containers: HashMap<WarehouseContainerId, WarehouseContainer>,
    warehouse_baselines: HashMap<WarehouseContainerId, u64>,
    tasks: HashMap<TaskId, Task>,

    // append-only ledgers, in commit order
    scan_events: Vec<ScanEvent>,
    fill_history: Vec<FillEntry>,
    activity: Vec<ActivityLogEntry>,
}

impl InMemoryStoreState {
    fn qr_in_use(&self, qr_code: &str) -> bool {
        self.customer_containers
            .values()
            .any(|c| c.qr_code == qr_code)
            || self
                .warehouse_containers
                .values()
                .any(|c| c.qr_code == qr_code)
    }

    /// Check every write in the unit without touching state.
    fn validate(&self, unit: &UnitOfWork) -> Result<(), StoreError> {
        for task in &unit.new_tasks {
            if self.tasks.contains_key(&task.id) {
                return Err(StoreError::Duplicate {
                    what: format!("task {}", task.id),
                });
            }
            self.check_task_references(task)?;
        }

        for task in &unit.task_updates {
            let stored = self.tasks.get(&task.id).ok_or_else(|| StoreError::NotFound {
                entity: EntityKind::Task,
                id: task.id.to_string(),
            })?;
            if stored.version != task.version {
                return Err(StoreError::Conflict {
                    entity: task.id.to_string(),
                });
            }
            if stored.customer_container_id != task.customer_container_id {
                return Err(StoreError::ConstraintViolation(format!(
                    "customer container of {} is immutable",
                    task.id
                )));
            }
            self.check_task_references(task)?;
        }

        for container in &unit.customer_container_updates {
            let stored = self
                .customer_containers
                .get(&container.id)
                .ok_or_else(|| StoreError::NotFound {
                    entity: EntityKind::CustomerContainer,
                    id: container.id.to_string(),
                })?;
            if stored.version != container.version {
                return Err(StoreError::Conflict {
                    entity: container.id.to_string(),
                });
            }
        }

        for container in &unit.warehouse_container_updates {
            let stored = self
                .warehouse_containers
                .get(&container.id)
                .ok_or_else(|| StoreError::NotFound {
                    entity: EntityKind::WarehouseContainer,
                    id: container.id.to_string(),
                })?;
            if stored.version != container.version {
                return Err(StoreError::Conflict {
                    entity: container.id.to_string(),
                });
            }
            if !container.is_within_capacity() {
                return Err(StoreError::ConstraintViolation(format!(
                    "{} would hold {} of {}",
                    container.id, container.current_amount, container.max_capacity
                )));
            }
        }

        for entry in &unit.fill_entries {
            if !self
                .warehouse_containers
                .contains_key(&entry.warehouse_container_id)
            {
                return Err(StoreError::ConstraintViolation(format!(
                    "fill entry {} references unknown {}",
                    entry.id, entry.warehouse_container_id
                )));
            }
            let task_known = self.tasks.contains_key(&entry.task_id)
                || unit.new_tasks.iter().any(|t| t.id == entry.task_id);
            if !task_known {
                return Err(StoreError::ConstraintViolation(format!(
                    "fill entry {} references unknown {}",
                    entry.id, entry.task_id
                )));
            }
        }

        Ok(())
    }

    fn check_task_references(&self, task: &Task) -> Result<(), StoreError> {
        if !self
            .customer_containers
            .contains_key(&task.customer_container_id)
        {
            return Err(StoreError::ConstraintViolation(format!(
                "{} references unknown {}",
                task.id, task.customer_container_id
            )));
        }
        if let Some(target) = task.target_warehouse_id
            && !self.warehouse_containers.contains_key(&target)
        {
            return Err(StoreError::ConstraintViolation(format!(
                "{} references unknown {}",
                task.id, target
            )));
        }
        Ok(())
    }

    fn apply(&mut self, unit: UnitOfWork) {
        for task in unit.new_tasks {
            self.tasks.insert(task.id, task);
        }
        for mut task in unit.task_updates {
            task.version += 1;
            self.tasks.insert(task.id, task);
        }
        for mut container in unit.customer_container_updates {
            container.version += 1;
            self.customer_containers.insert(container.id, container);
        }
        for mut container in unit.warehouse_container_updates {
            container.version += 1;
            self.warehouse_containers.insert(container.id, container);
        }
        self.scan_events.extend(unit.scan_events);
        self.fill_history.extend(unit.fill_entries);
        self.activity.extend(unit.activity);
    }
}

/// Serializable copy of the whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub customer_containers: Vec<CustomerContainer>,
    #[serde(default)]
    pub warehouse_containers: Vec<WarehouseContainer>,
    #[serde(default)]
    pub warehouse_baselines: BTreeMap<WarehouseContainerId, u64>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub scan_events: Vec<ScanEvent>,
    #[serde(default)]
    pub fill_history: Vec<FillEntry>,
    #[serde(default)]
    pub activity: Vec<ActivityLogEntry>,
}

impl StoreSnapshot {
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// In-memory entity store.
#[derive(Clone, Default)]
pub struct InMemoryEntityStore {
    state: Arc<Mutex<InMemoryStoreState>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut state = InMemoryStoreState {
            users: snapshot.users.into_iter().map(|u| (u.id, u)).collect(),
            customer_containers: snapshot
                .customer_containers
                .into_iter()
                .map(|c| (c.id, c))
                .collect(),
            warehouse_containers: snapshot
                .warehouse_containers
                .into_iter()
                .map(|c| (c.id, c))
                .collect(),
            warehouse_baselines: snapshot.warehouse_baselines.into_iter().collect(),
            tasks: snapshot.tasks.into_iter().map(|t| (t.id, t)).collect(),
            scan_events: snapshot.scan_events,
            fill_history: snapshot.fill_history,
            activity: snapshot.activity,
        };
        // Containers saved without a baseline start their ledger at zero.
        for id in state.warehouse_containers.keys() {
            state.warehouse_baselines.entry(*id).or_insert(0);
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.lock().await;

        let mut users: Vec<_> = state.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        let mut customer_containers: Vec<_> =
            state.customer_containers.values().cloned().collect();
        customer_containers.sort_by_key(|c| c.id);
        let mut warehouse_containers: Vec<_> =
            state.warehouse_containers.values().cloned().collect();
        warehouse_containers.sort_by_key(|c| c.id);
        let mut tasks: Vec<_> = state.tasks.values().cloned().collect();
        tasks.sort_by_key(|t| (t.created_at, t.id));

        StoreSnapshot {
            users,
            customer_containers,
            warehouse_containers,
            warehouse_baselines: state
                .warehouse_baselines
                .iter()
                .map(|(k, v)| (*k, *v))
                .collect(),
            tasks,
            scan_events: state.scan_events.clone(),
            fill_history: state.fill_history.clone(),
            activity: state.activity.clone(),
        }
    }

    pub async fn users(&self) -> Vec<User> {
        let state = self.state.lock().await;
        let mut users: Vec<_> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        users
    }

    pub async fn customer_containers(&self) -> Vec<CustomerContainer> {
        let state = self.state.lock().await;
        let mut all: Vec<_> = state.customer_containers.values().cloned().collect();
        all.sort_by(|a, b| a.qr_code.cmp(&b.qr_code));
        all
    }

    pub async fn warehouse_containers(&self) -> Vec<WarehouseContainer> {
        let state = self.state.lock().await;
        let mut all: Vec<_> = state.warehouse_containers.values().cloned().collect();
        all.sort_by(|a, b| a.qr_code.cmp(&b.qr_code));
        all
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn task(&self, id: TaskId) -> Result<Task, StoreError> {
        let state = self.state.lock().await;
        state.tasks.get(&id).cloned().ok_or_else(|| StoreError::NotFound {
            entity: EntityKind::Task,
            id: id.to_string(),
        })
    }

    async fn tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let state = self.state.lock().await;
        let mut tasks: Vec<_> = state
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.created_at, t.id));
        Ok(tasks)
    }

    async fn user(&self, id: UserId) -> Result<User, StoreError> {
        let state = self.state.lock().await;
        state.users.get(&id).cloned().ok_or_else(|| StoreError::NotFound {
            entity: EntityKind::User,
            id: id.to_string(),
        })
    }

    async fn customer_container(
        &self,
        id: CustomerContainerId,
    ) -> Result<CustomerContainer, StoreError> {
        let state = self.state.lock().await;
        state
            .customer_containers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: EntityKind::CustomerContainer,
                id: id.to_string(),
            })
    }

    async fn warehouse_container(
        &self,
        id: WarehouseContainerId,
    ) -> Result<WarehouseContainer, StoreError> {
        let state = self.state.lock().await;
        state
            .warehouse_containers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: EntityKind::WarehouseContainer,
                id: id.to_string(),
            })
    }

    async fn customer_container_by_qr(
        &self,
        qr_code: &str,
    ) -> Result<Option<CustomerContainer>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .customer_containers
            .values()
            .find(|c| c.qr_code == qr_code)
            .cloned())
    }

    async fn warehouse_container_by_qr(
        &self,
        qr_code: &str,
    ) -> Result<Option<WarehouseContainer>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .warehouse_containers
            .values()
            .find(|c| c.qr_code == qr_code)
            .cloned())
    }

    async fn warehouse_baseline(&self, id: WarehouseContainerId) -> Result<u64, StoreError> {
        let state = self.state.lock().await;
        state
            .warehouse_baselines
            .get(&id)
            .copied()
            .ok_or_else(|| StoreError::NotFound {
                entity: EntityKind::WarehouseContainer,
                id: id.to_string(),
            })
    }

    async fn fill_history(&self, id: WarehouseContainerId) -> Result<Vec<FillEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .fill_history
            .iter()
            .filter(|e| e.warehouse_container_id == id)
            .cloned()
            .collect())
    }

    async fn scan_events(&self, driver: Option<UserId>) -> Result<Vec<ScanEvent>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .scan_events
            .iter()
            .filter(|e| driver.is_none_or(|d| e.driver_id == d))
            .cloned()
            .collect())
    }

    async fn activity_log(
        &self,
        filter: &ActivityFilter,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .activity
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(&user.id) {
            return Err(StoreError::Duplicate {
                what: format!("user {}", user.id),
            });
        }
        state.users.insert(user.id, user);
        Ok(())
    }

    async fn insert_customer_container(
        &self,
        container: CustomerContainer,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.customer_containers.contains_key(&container.id) {
            return Err(StoreError::Duplicate {
                what: format!("customer container {}", container.id),
            });
        }
        if state.qr_in_use(&container.qr_code) {
            return Err(StoreError::Duplicate {
                what: format!("QR code {}", container.qr_code),
            });
        }
        state.customer_containers.insert(container.id, container);
        Ok(())
    }

    async fn insert_warehouse_container(
        &self,
        container: WarehouseContainer,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.warehouse_containers.contains_key(&container.id) {
            return Err(StoreError::Duplicate {
                what: format!("warehouse container {}", container.id),
            });
        }
        if state.qr_in_use(&container.qr_code) {
            return Err(StoreError::Duplicate {
                what: format!("QR code {}", container.qr_code),
            });
        }
        if !container.is_within_capacity() {
            return Err(StoreError::ConstraintViolation(format!(
                "{} registered above capacity",
                container.id
            )));
        }
        state
            .warehouse_baselines
            .insert(container.id, container.current_amount);
        state.warehouse_containers.insert(container.id, container);
        Ok(())
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.validate(&unit)?;
        state.apply(unit);
        Ok(())
    }
}
