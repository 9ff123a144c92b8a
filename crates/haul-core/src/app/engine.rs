//! TaskEngine - タスク遷移の唯一の書き手
//!
//! スキャンと管理操作を受け取り、遷移表・投入判定・ストアを組み合わせて
//! 1 操作 = 1 `UnitOfWork` で確定させます。
//!
//! # 1 操作の流れ
//! 1. LockTable でロック（task → driver → warehouse container）
//! 2. ロック内でストアから最新を読み直す
//! 3. 遷移表と投入判定で検証（失敗なら何も書かない）
//! 4. 遷移・台帳・監査ログを 1 つの UnitOfWork に積んで commit
//! 5. commit 成功後に EventSink へ通知
//!
//! version conflict は `RetryPolicy` に従って 2〜4 をやり直します。
//! ストア障害（Unavailable など）はやり直しません。

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::app::audit::{AuditEmitter, AuditRefs};
use crate::app::locks::{LockGuard, LockKey, LockTable, LockTimeout};
use crate::app::resolver::{self, ScanResolution, ScannedContainer};
use crate::app::retry::RetryPolicy;
use crate::app::status::{Reconciliation, StatusCounts};
use crate::config::EngineConfig;
use crate::domain::{
    ActivityKind, ActivityLogEntry, ContainerRef, CustomerContainer, EngineError, FillEntry,
    NewTask, ScanContext, ScanEvent, ScanResult, Task, TaskId, TaskStatus, UserId,
    WarehouseContainer, WarehouseContainerId, validate_delivery,
};
use crate::ports::{
    ActivityFilter, Clock, EntityStore, EventSink, IdGenerator, TaskFilter, UnitOfWork,
};

/// Statuses walked by one pickup confirmation.
const ACCEPT_AND_PICKUP: [TaskStatus; 3] = [
    TaskStatus::Accepted,
    TaskStatus::PickedUp,
    TaskStatus::InTransit,
];
const PICKUP: [TaskStatus; 2] = [TaskStatus::PickedUp, TaskStatus::InTransit];

/// What a successful delivery changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReceipt {
    pub task: Task,
    pub container: WarehouseContainer,
    pub fill: FillEntry,
}

pub struct TaskEngine {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    sink: Arc<dyn EventSink>,
    audit: AuditEmitter,
    locks: LockTable,
    retry: RetryPolicy,
}

impl TaskEngine {
    pub fn new(
        store: Arc<dyn EntityStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        sink: Arc<dyn EventSink>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            clock,
            audit: AuditEmitter::new(Arc::clone(&ids)),
            ids,
            sink,
            locks: LockTable::new(config.lock_timeout()),
            retry: RetryPolicy::from_config(config),
        }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    // ========================================
    // admin operations
    // ========================================

    /// Create a PLANNED task on an active customer container.
    #[instrument(skip_all, fields(creator = %creator))]
    pub async fn create_task(&self, spec: NewTask, creator: UserId) -> Result<Task, EngineError> {
        self.store.user(creator).await?;
        self.check_planning(&spec).await?;

        let now = self.clock.now();
        let task = Task::new(self.ids.generate_task_id(), spec, creator, now);
        let mut unit = UnitOfWork::new();
        unit.insert_task(task.clone()).append_activity(self.audit.emit(
            ActivityKind::TaskCreated,
            &task,
            AuditRefs::by(creator),
            now,
        ));
        self.commit(unit).await?;

        info!(task_id = %task.id, material = %task.material_type, "task created");
        Ok(task)
    }

    /// Assign (or re-assign) a PLANNED or ASSIGNED task to an active driver.
    #[instrument(skip_all, fields(task_id = %task_id, driver = %driver))]
    pub async fn assign_driver(
        &self,
        task_id: TaskId,
        driver: UserId,
        actor: UserId,
    ) -> Result<Task, EngineError> {
        let _guard = self
            .lock(&[LockKey::Task(task_id), LockKey::Driver(driver)])
            .await?;
        self.with_retry("assign_driver", || self.assign_once(task_id, driver, actor))
            .await
    }

    /// Admin reassignment: `Some(driver)` assigns, `None` puts the task back to PLANNED.
    #[instrument(skip_all, fields(task_id = %task_id))]
    pub async fn reassign(
        &self,
        task_id: TaskId,
        new_driver: Option<UserId>,
        actor: UserId,
    ) -> Result<Task, EngineError> {
        match new_driver {
            Some(driver) => self.assign_driver(task_id, driver, actor).await,
            None => {
                let _guard = self.lock(&[LockKey::Task(task_id)]).await?;
                self.with_retry("unassign", || self.unassign_once(task_id, actor))
                    .await
            }
        }
    }

    #[instrument(skip_all, fields(task_id = %task_id, actor = %actor))]
    pub async fn cancel(
        &self,
        task_id: TaskId,
        actor: UserId,
        reason: &str,
    ) -> Result<Task, EngineError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::MissingCancellationReason);
        }
        let reason = reason.to_string();

        let _guard = self.lock(&[LockKey::Task(task_id)]).await?;
        self.with_retry("cancel", || self.cancel_once(task_id, actor, reason.clone()))
            .await
    }

    /// Copy a CANCELLED task's planning into a fresh PLANNED task.
    ///
    /// The cancelled task is left as it is.
    #[instrument(skip_all, fields(task_id = %task_id, actor = %actor))]
    pub async fn reopen(&self, task_id: TaskId, actor: UserId) -> Result<Task, EngineError> {
        let _guard = self.lock(&[LockKey::Task(task_id)]).await?;

        let cancelled = self.store.task(task_id).await?;
        if cancelled.status != TaskStatus::Cancelled {
            return Err(EngineError::InvalidTransition {
                current: cancelled.status,
                requested: TaskStatus::Planned,
            });
        }
        self.store.user(actor).await?;
        let spec = cancelled.planning();
        self.check_planning(&spec).await?;

        let now = self.clock.now();
        let mut task = Task::new(self.ids.generate_task_id(), spec, actor, now);
        task.reopened_from = Some(cancelled.id);

        let mut unit = UnitOfWork::new();
        unit.insert_task(task.clone()).append_activity(self.audit.emit(
            ActivityKind::TaskCreated,
            &task,
            AuditRefs::by(actor),
            now,
        ));
        self.commit(unit).await?;

        info!(task_id = %task.id, reopened_from = %cancelled.id, "task reopened");
        Ok(task)
    }

    // ========================================
    // driver operations
    // ========================================

    /// Customer-side scan confirmed: walk to IN_TRANSIT in one commit.
    #[instrument(skip_all, fields(task_id = %task_id, driver = %driver))]
    pub async fn confirm_pickup(
        &self,
        task_id: TaskId,
        driver: UserId,
        location: Option<String>,
    ) -> Result<Task, EngineError> {
        let _guard = self
            .lock(&[LockKey::Task(task_id), LockKey::Driver(driver)])
            .await?;
        self.with_retry("confirm_pickup", || {
            self.pickup_once(task_id, driver, location.clone())
        })
        .await
    }

    /// Record the measured weight of an IN_TRANSIT load.
    #[instrument(skip_all, fields(task_id = %task_id, driver = %driver, amount = amount))]
    pub async fn record_weight(
        &self,
        task_id: TaskId,
        driver: UserId,
        amount: u64,
    ) -> Result<Task, EngineError> {
        if amount == 0 {
            return Err(EngineError::InvalidAmount);
        }
        let _guard = self.lock(&[LockKey::Task(task_id)]).await?;
        self.with_retry("record_weight", || {
            self.record_weight_once(task_id, driver, amount)
        })
        .await
    }

    /// Warehouse-side scan confirmed: deliver, credit the container and complete.
    ///
    /// `amount` falls back to the recorded weight, then the planned quantity.
    #[instrument(skip_all, fields(task_id = %task_id, driver = %driver, container = %container_id))]
    pub async fn confirm_delivery(
        &self,
        task_id: TaskId,
        driver: UserId,
        container_id: WarehouseContainerId,
        amount: Option<u64>,
        location: Option<String>,
    ) -> Result<DeliveryReceipt, EngineError> {
        let _guard = self
            .lock(&[LockKey::Task(task_id), LockKey::Warehouse(container_id)])
            .await?;
        self.with_retry("confirm_delivery", || {
            self.delivery_once(task_id, driver, container_id, amount, location.clone())
        })
        .await
    }

    // ========================================
    // scans
    // ========================================

    /// Classify a QR payload for `driver`. Read-only.
    #[instrument(skip_all, fields(driver = %driver))]
    pub async fn resolve_scan(
        &self,
        payload: &str,
        driver: UserId,
    ) -> Result<ScanResolution, EngineError> {
        let payload = payload.trim();
        let scanned = self.lookup(payload).await?;
        let open = self.store.tasks(&TaskFilter::open_for_driver(driver)).await?;
        resolver::resolve(payload, driver, scanned, &open)
    }

    /// Resolve a scan and log it as an info-only scan event, whatever the outcome.
    #[instrument(skip_all, fields(driver = %driver))]
    pub async fn record_scan(
        &self,
        payload: &str,
        driver: UserId,
        location: Option<String>,
    ) -> Result<ScanResolution, EngineError> {
        let payload = payload.trim();
        let scanned = self.lookup(payload).await?;
        let container = scanned.as_ref().map(ScannedContainer::container_ref);
        let open = self.store.tasks(&TaskFilter::open_for_driver(driver)).await?;
        let resolution = resolver::resolve(payload, driver, scanned, &open);

        let result = match &resolution {
            Ok(_) => ScanResult::Success,
            Err(EngineError::UnknownContainer { .. }) => ScanResult::InvalidContainer,
            Err(_) => ScanResult::Error,
        };
        let event = ScanEvent {
            id: self.ids.generate_scan_event_id(),
            container,
            qr_payload: payload.to_string(),
            driver_id: driver,
            task_id: resolution.as_ref().ok().map(|r| r.task().id),
            scanned_at: self.clock.now(),
            context: ScanContext::InfoOnly,
            location,
            result,
        };
        let mut unit = UnitOfWork::new();
        unit.append_scan(event);
        self.commit(unit).await?;

        if let Err(err) = &resolution {
            warn!(code = err.code(), error = %err, "scan rejected");
        }
        resolution
    }

    // ========================================
    // projections
    // ========================================

    pub async fn task(&self, id: TaskId) -> Result<Task, EngineError> {
        Ok(self.store.task(id).await?)
    }

    pub async fn tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, EngineError> {
        Ok(self.store.tasks(filter).await?)
    }

    /// Open tasks currently assigned to `driver`.
    pub async fn tasks_for_driver(&self, driver: UserId) -> Result<Vec<Task>, EngineError> {
        Ok(self.store.tasks(&TaskFilter::open_for_driver(driver)).await?)
    }

    pub async fn status_counts(&self) -> Result<StatusCounts, EngineError> {
        let tasks = self.store.tasks(&TaskFilter::all()).await?;
        Ok(StatusCounts::tally(&tasks))
    }

    pub async fn fill_history(
        &self,
        container_id: WarehouseContainerId,
    ) -> Result<Vec<FillEntry>, EngineError> {
        Ok(self.store.fill_history(container_id).await?)
    }

    pub async fn activity_log(
        &self,
        filter: &ActivityFilter,
    ) -> Result<Vec<ActivityLogEntry>, EngineError> {
        Ok(self.store.activity_log(filter).await?)
    }

    pub async fn scan_events(&self, driver: Option<UserId>) -> Result<Vec<ScanEvent>, EngineError> {
        Ok(self.store.scan_events(driver).await?)
    }

    /// Compare a container's amount with its registration baseline plus fill ledger.
    pub async fn reconcile(
        &self,
        container_id: WarehouseContainerId,
    ) -> Result<Reconciliation, EngineError> {
        let container = self.store.warehouse_container(container_id).await?;
        let baseline = self.store.warehouse_baseline(container_id).await?;
        let ledger_total = self
            .store
            .fill_history(container_id)
            .await?
            .iter()
            .map(|e| e.amount_added)
            .sum();
        Ok(Reconciliation {
            container_id,
            baseline,
            ledger_total,
            current_amount: container.current_amount,
            max_capacity: container.max_capacity,
        })
    }

    // ========================================
    // single attempts (run under the caller's locks)
    // ========================================

    async fn assign_once(
        &self,
        task_id: TaskId,
        driver: UserId,
        actor: UserId,
    ) -> Result<Task, EngineError> {
        let mut task = self.store.task(task_id).await?;
        // ASSIGNED -> ASSIGNED is a change of driver, not a status change.
        if task.status != TaskStatus::Assigned {
            task.status.can_transition_to(TaskStatus::Assigned)?;
        }
        let user = self.store.user(driver).await?;
        if !user.can_drive() {
            return Err(EngineError::NotADriver(driver));
        }
        self.ensure_not_busy(driver, task.id).await?;

        let now = task.monotonic(self.clock.now());
        task.assigned_to = Some(driver);
        task.enter(TaskStatus::Assigned, now);

        let mut unit = UnitOfWork::new();
        unit.append_activity(self.audit.emit_status(&task, AuditRefs::by(actor), now))
            .update_task(task.clone());
        self.commit(unit).await?;
        task.version += 1;

        info!(task_id = %task.id, driver = %driver, "task assigned");
        Ok(task)
    }

    async fn unassign_once(&self, task_id: TaskId, actor: UserId) -> Result<Task, EngineError> {
        let mut task = self.store.task(task_id).await?;
        task.status.can_transition_to(TaskStatus::Planned)?;

        let now = task.monotonic(self.clock.now());
        task.assigned_to = None;
        task.enter(TaskStatus::Planned, now);

        let mut unit = UnitOfWork::new();
        unit.append_activity(self.audit.emit_status(&task, AuditRefs::by(actor), now))
            .update_task(task.clone());
        self.commit(unit).await?;
        task.version += 1;

        info!(task_id = %task.id, "task unassigned");
        Ok(task)
    }

    async fn cancel_once(
        &self,
        task_id: TaskId,
        actor: UserId,
        reason: String,
    ) -> Result<Task, EngineError> {
        let mut task = self.store.task(task_id).await?;
        task.status.can_transition_to(TaskStatus::Cancelled)?;

        let now = task.monotonic(self.clock.now());
        task.cancellation_reason = Some(reason);
        task.enter(TaskStatus::Cancelled, now);

        let mut unit = UnitOfWork::new();
        unit.append_activity(self.audit.emit_status(&task, AuditRefs::by(actor), now))
            .update_task(task.clone());
        self.commit(unit).await?;
        task.version += 1;

        info!(task_id = %task.id, "task cancelled");
        Ok(task)
    }

    async fn pickup_once(
        &self,
        task_id: TaskId,
        driver: UserId,
        location: Option<String>,
    ) -> Result<Task, EngineError> {
        let mut task = self.store.task(task_id).await?;
        ensure_assignee(&task, driver)?;

        let (context, walk) = if task.status == TaskStatus::Assigned {
            (ScanContext::TaskAcceptAtCustomer, &ACCEPT_AND_PICKUP[..])
        } else {
            (ScanContext::TaskPickup, &PICKUP[..])
        };
        let mut current = task.status;
        for &next in walk {
            current.can_transition_to(next)?;
            current = next;
        }
        self.ensure_not_busy(driver, task.id).await?;

        let container = self
            .store
            .customer_container(task.customer_container_id)
            .await?;
        let container_ref = ContainerRef::Customer(container.id);
        let now = task.monotonic(self.clock.now());
        let scan = ScanEvent {
            id: self.ids.generate_scan_event_id(),
            container: Some(container_ref),
            qr_payload: container.qr_code.clone(),
            driver_id: driver,
            task_id: Some(task.id),
            scanned_at: now,
            context,
            location,
            result: ScanResult::Success,
        };
        let refs = AuditRefs::by(driver)
            .with_container(container_ref)
            .with_scan(scan.id);

        let mut unit = UnitOfWork::new();
        unit.append_activity(self.audit.emit(
            ActivityKind::ContainerScannedAtCustomer,
            &task,
            refs,
            now,
        ));
        for &next in walk {
            task.enter(next, now);
            unit.append_activity(self.audit.emit_status(&task, refs, now));
        }
        unit.append_scan(scan).update_task(task.clone());
        self.commit(unit).await?;
        task.version += 1;

        info!(task_id = %task.id, driver = %driver, ?context, "pickup confirmed");
        Ok(task)
    }

    async fn record_weight_once(
        &self,
        task_id: TaskId,
        driver: UserId,
        amount: u64,
    ) -> Result<Task, EngineError> {
        let mut task = self.store.task(task_id).await?;
        ensure_assignee(&task, driver)?;
        // Weighing belongs to the leg that ends in DELIVERED.
        task.status.can_transition_to(TaskStatus::Delivered)?;

        let now = task.monotonic(self.clock.now());
        task.actual_quantity = Some(amount);

        let mut unit = UnitOfWork::new();
        unit.append_activity(self.audit.emit(
            ActivityKind::WeightRecorded,
            &task,
            AuditRefs::by(driver),
            now,
        ))
        .update_task(task.clone());
        self.commit(unit).await?;
        task.version += 1;

        info!(task_id = %task.id, amount, "weight recorded");
        Ok(task)
    }

    async fn delivery_once(
        &self,
        task_id: TaskId,
        driver: UserId,
        container_id: WarehouseContainerId,
        amount: Option<u64>,
        location: Option<String>,
    ) -> Result<DeliveryReceipt, EngineError> {
        let mut task = self.store.task(task_id).await?;
        ensure_assignee(&task, driver)?;
        task.status.can_transition_to(TaskStatus::Delivered)?;

        let mut container = self.store.warehouse_container(container_id).await?;
        let amount = match validate_delivery(&task, &container, amount) {
            Ok(amount) => amount,
            Err(rejection) => {
                warn!(task_id = %task.id, container = %container.id, %rejection, "delivery rejected");
                return Err(rejection.into());
            }
        };
        let mut source: CustomerContainer = self
            .store
            .customer_container(task.customer_container_id)
            .await?;

        let now = task.monotonic(self.clock.now());
        let container_ref = ContainerRef::Warehouse(container.id);
        let scan = ScanEvent {
            id: self.ids.generate_scan_event_id(),
            container: Some(container_ref),
            qr_payload: container.qr_code.clone(),
            driver_id: driver,
            task_id: Some(task.id),
            scanned_at: now,
            context: ScanContext::TaskCompleteAtWarehouse,
            location,
            result: ScanResult::Success,
        };
        let refs = AuditRefs::by(driver)
            .with_container(container_ref)
            .with_scan(scan.id);

        let mut unit = UnitOfWork::new();
        unit.append_activity(self.audit.emit(
            ActivityKind::ContainerScannedAtWarehouse,
            &task,
            refs,
            now,
        ));

        task.actual_quantity = Some(amount);
        unit.append_activity(self.audit.emit(ActivityKind::WeightRecorded, &task, refs, now));
        task.enter(TaskStatus::Delivered, now);
        unit.append_activity(self.audit.emit_status(&task, refs, now));
        task.status.can_transition_to(TaskStatus::Completed)?;
        task.enter(TaskStatus::Completed, now);
        unit.append_activity(self.audit.emit_status(&task, refs, now));

        // validate_delivery guarantees amount <= available
        container.current_amount += amount;
        source.last_emptied = Some(now);
        let fill = FillEntry {
            id: self.ids.generate_fill_entry_id(),
            warehouse_container_id: container.id,
            task_id: task.id,
            amount_added: amount,
            recorded_at: now,
        };

        unit.append_scan(scan)
            .append_fill(fill.clone())
            .update_task(task.clone())
            .update_warehouse_container(container.clone())
            .update_customer_container(source);
        self.commit(unit).await?;
        task.version += 1;
        container.version += 1;

        info!(
            task_id = %task.id,
            container = %container.id,
            amount,
            current_amount = container.current_amount,
            "delivery confirmed"
        );
        Ok(DeliveryReceipt {
            task,
            container,
            fill,
        })
    }

    // ========================================
    // helpers
    // ========================================

    async fn check_planning(&self, spec: &NewTask) -> Result<(), EngineError> {
        if spec.planned_quantity == 0 {
            return Err(EngineError::InvalidAmount);
        }
        let container = self
            .store
            .customer_container(spec.customer_container_id)
            .await?;
        if !container.active {
            return Err(EngineError::InactiveContainer(ContainerRef::Customer(
                container.id,
            )));
        }
        if container.material_type != spec.material_type {
            return Err(EngineError::MaterialMismatch {
                expected: container.material_type,
                actual: spec.material_type.clone(),
            });
        }
        if let Some(target) = spec.target_warehouse_id {
            let warehouse = self.store.warehouse_container(target).await?;
            if warehouse.material_type != spec.material_type {
                return Err(EngineError::MaterialMismatch {
                    expected: spec.material_type.clone(),
                    actual: warehouse.material_type,
                });
            }
        }
        Ok(())
    }

    async fn ensure_not_busy(&self, driver: UserId, except: TaskId) -> Result<(), EngineError> {
        let open = self.store.tasks(&TaskFilter::open_for_driver(driver)).await?;
        match open
            .iter()
            .find(|t| t.id != except && t.status.is_in_progress())
        {
            Some(active) => Err(EngineError::DriverBusy {
                driver,
                active_task: active.id,
            }),
            None => Ok(()),
        }
    }

    /// Customer QR codes first, then warehouse QR codes.
    async fn lookup(&self, payload: &str) -> Result<Option<ScannedContainer>, EngineError> {
        if let Some(container) = self.store.customer_container_by_qr(payload).await? {
            return Ok(Some(ScannedContainer::Customer(container)));
        }
        Ok(self
            .store
            .warehouse_container_by_qr(payload)
            .await?
            .map(ScannedContainer::Warehouse))
    }

    async fn lock(&self, keys: &[LockKey]) -> Result<LockGuard, EngineError> {
        self.locks.acquire(keys).await.map_err(|LockTimeout(key)| {
            warn!(lock = %key, "lock wait timed out");
            EngineError::ConcurrentModification {
                entity: key.to_string(),
            }
        })
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<(), EngineError> {
        let activity = unit.activity.clone();
        self.store.commit(unit).await?;
        for entry in &activity {
            self.sink.publish(entry);
        }
        Ok(())
    }

    /// Re-run `attempt` after version conflicts, up to the policy's limit.
    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut attempt: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_conflict() && self.retry.should_retry(retries) => {
                    retries += 1;
                    let delay = self.retry.next_delay(retries);
                    warn!(op, retries, ?delay, error = %err, "conflict, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if err.is_conflict() {
                        warn!(op, retries, error = %err, "conflict, giving up");
                    }
                    return Err(err);
                }
                Ok(value) => return Ok(value),
            }
        }
    }
}

fn ensure_assignee(task: &Task, driver: UserId) -> Result<(), EngineError> {
    if task.is_assigned_to(driver) {
        Ok(())
    } else {
        Err(EngineError::DriverMismatch {
            task: task.id,
            expected: task.assigned_to,
            actual: driver,
        })
    }
}
