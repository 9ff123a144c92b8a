#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use haul_core::app::{EngineBuilder, TaskEngine};
use haul_core::config::EngineConfig;
use haul_core::domain::*;
use haul_core::impls::InMemoryEntityStore;
use haul_core::ports::*;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 7, 30, 0).unwrap()
}

/// Engine over an in-memory store with one admin, one driver and a clock that
/// only moves when told to.
pub struct Harness {
    pub engine: Arc<TaskEngine>,
    pub store: InMemoryEntityStore,
    pub clock: Arc<FixedClock>,
    pub ids: Arc<UlidGenerator<Arc<FixedClock>>>,
    pub admin: User,
    pub driver: User,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_store(InMemoryEntityStore::new(), |store| {
            Arc::new(store) as Arc<dyn EntityStore>
        })
        .await
    }

    /// Build with `wrap` deciding which store the engine talks to.
    pub async fn with_store(
        store: InMemoryEntityStore,
        wrap: impl FnOnce(InMemoryEntityStore) -> Arc<dyn EntityStore>,
    ) -> Self {
        let clock = Arc::new(FixedClock::new(t0()));
        let ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        let engine = EngineBuilder::new()
            .store(wrap(store.clone()))
            .clock(clock.clone())
            .id_generator(ids.clone())
            .event_sink(Arc::new(NoopEventSink))
            .config(EngineConfig {
                lock_timeout_ms: 2000,
                retry_base_delay_ms: 1,
                ..EngineConfig::default()
            })
            .build()
            .unwrap();

        let admin = User::new(ids.generate_user_id(), "Ada Admin", Role::Admin);
        let driver = User::new(ids.generate_user_id(), "Dan Driver", Role::Driver);
        store.insert_user(admin.clone()).await.unwrap();
        store.insert_user(driver.clone()).await.unwrap();

        Self {
            engine: Arc::new(engine),
            store,
            clock,
            ids,
            admin,
            driver,
        }
    }

    pub async fn add_driver(&self, name: &str) -> User {
        let user = User::new(self.ids.generate_user_id(), name, Role::Driver);
        self.store.insert_user(user.clone()).await.unwrap();
        user
    }

    pub async fn customer_container(&self, qr: &str, material: &str) -> CustomerContainer {
        let container = CustomerContainer::new(
            self.ids.generate_customer_container_id(),
            format!("Customer site {qr}"),
            MaterialType::new(material),
            qr,
        );
        self.store
            .insert_customer_container(container.clone())
            .await
            .unwrap();
        container
    }

    pub async fn warehouse_container(
        &self,
        qr: &str,
        material: &str,
        current: u64,
        max: u64,
    ) -> WarehouseContainer {
        let container = WarehouseContainer::new(
            self.ids.generate_warehouse_container_id(),
            format!("Bay {qr}"),
            MaterialType::new(material),
            qr,
            max,
        )
        .with_current_amount(current);
        self.store
            .insert_warehouse_container(container.clone())
            .await
            .unwrap();
        container
    }

    pub fn new_task(
        &self,
        container: &CustomerContainer,
        target: Option<&WarehouseContainer>,
        quantity: u64,
    ) -> NewTask {
        NewTask {
            customer_container_id: container.id,
            target_warehouse_id: target.map(|w| w.id),
            scheduled_for: None,
            planned_quantity: quantity,
            unit: "kg".to_string(),
            priority: Priority::Normal,
            material_type: container.material_type.clone(),
        }
    }

    pub async fn create(&self, spec: NewTask) -> Task {
        self.engine.create_task(spec, self.admin.id).await.unwrap()
    }

    /// Create, assign to `driver` and pick up: the task ends IN_TRANSIT.
    pub async fn in_transit(&self, spec: NewTask, driver: &User) -> Task {
        let task = self.create(spec).await;
        self.engine
            .assign_driver(task.id, driver.id, self.admin.id)
            .await
            .unwrap();
        self.engine
            .confirm_pickup(task.id, driver.id, None)
            .await
            .unwrap()
    }

    pub async fn amount(&self, id: WarehouseContainerId) -> u64 {
        self.store
            .warehouse_container(id)
            .await
            .unwrap()
            .current_amount
    }
}

/// How a [`FaultyStore`] misbehaves on commit.
pub enum Fault {
    /// Report a version conflict on this many commits, then behave.
    Conflicts(AtomicUsize),
    /// Every commit fails as if the backend were down.
    Unavailable,
}

/// Store wrapper that injects commit failures; reads pass through.
pub struct FaultyStore {
    pub inner: InMemoryEntityStore,
    pub fault: Fault,
    pub commits: AtomicUsize,
}

impl FaultyStore {
    pub fn conflicts(inner: InMemoryEntityStore, times: usize) -> Self {
        Self {
            inner,
            fault: Fault::Conflicts(AtomicUsize::new(times)),
            commits: AtomicUsize::new(0),
        }
    }

    pub fn unavailable(inner: InMemoryEntityStore) -> Self {
        Self {
            inner,
            fault: Fault::Unavailable,
            commits: AtomicUsize::new(0),
        }
    }

    /// Fail the next `times` commits with a conflict.
    pub fn arm(&self, times: usize) {
        if let Fault::Conflicts(remaining) = &self.fault {
            remaining.store(times, Ordering::SeqCst);
        }
    }

    pub fn commit_attempts(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityStore for FaultyStore {
    async fn task(&self, id: TaskId) -> Result<Task, StoreError> {
        self.inner.task(id).await
    }

    async fn tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        self.inner.tasks(filter).await
    }

    async fn user(&self, id: UserId) -> Result<User, StoreError> {
        self.inner.user(id).await
    }

    async fn customer_container(
        &self,
        id: CustomerContainerId,
    ) -> Result<CustomerContainer, StoreError> {
        self.inner.customer_container(id).await
    }

    async fn warehouse_container(
        &self,
        id: WarehouseContainerId,
    ) -> Result<WarehouseContainer, StoreError> {
        self.inner.warehouse_container(id).await
    }

    async fn customer_container_by_qr(
        &self,
        qr_code: &str,
    ) -> Result<Option<CustomerContainer>, StoreError> {
        self.inner.customer_container_by_qr(qr_code).await
    }

    async fn warehouse_container_by_qr(
        &self,
        qr_code: &str,
    ) -> Result<Option<WarehouseContainer>, StoreError> {
        self.inner.warehouse_container_by_qr(qr_code).await
    }

    async fn warehouse_baseline(&self, id: WarehouseContainerId) -> Result<u64, StoreError> {
        self.inner.warehouse_baseline(id).await
    }

    async fn fill_history(&self, id: WarehouseContainerId) -> Result<Vec<FillEntry>, StoreError> {
        self.inner.fill_history(id).await
    }

    async fn scan_events(&self, driver: Option<UserId>) -> Result<Vec<ScanEvent>, StoreError> {
        self.inner.scan_events(driver).await
    }

    async fn activity_log(
        &self,
        filter: &ActivityFilter,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        self.inner.activity_log(filter).await
    }

    async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        self.inner.insert_user(user).await
    }

    async fn insert_customer_container(
        &self,
        container: CustomerContainer,
    ) -> Result<(), StoreError> {
        self.inner.insert_customer_container(container).await
    }

    async fn insert_warehouse_container(
        &self,
        container: WarehouseContainer,
    ) -> Result<(), StoreError> {
        self.inner.insert_warehouse_container(container).await
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        match &self.fault {
            Fault::Conflicts(remaining) => {
                let left = remaining.load(Ordering::SeqCst);
                if left > 0 {
                    remaining.store(left - 1, Ordering::SeqCst);
                    return Err(StoreError::Conflict {
                        entity: "injected".to_string(),
                    });
                }
                self.inner.commit(unit).await
            }
            Fault::Unavailable => Err(StoreError::Unavailable("connection refused".to_string())),
        }
    }
}
