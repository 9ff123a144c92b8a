//! Random operation sequences against one engine; store-wide invariants are
//! checked after every step.

mod common;

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Duration;
use common::Harness;
use haul_core::domain::{Task, TaskId, TaskStatus, User, WarehouseContainer};
use haul_core::impls::StoreSnapshot;
use haul_core::ports::TaskFilter;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Create { container: usize, quantity: u64 },
    Assign { task: usize, driver: usize },
    Unassign { task: usize },
    Pickup { task: usize, driver: usize },
    Weigh { task: usize, driver: usize, amount: u64 },
    Deliver {
        task: usize,
        driver: usize,
        warehouse: usize,
        amount: Option<u64>,
    },
    Cancel { task: usize, with_reason: bool },
    Reopen { task: usize },
    Advance { minutes: i64 },
    Rewind { minutes: i64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..3usize, 1..400u64)
            .prop_map(|(container, quantity)| Op::Create { container, quantity }),
        3 => (any::<usize>(), 0..3usize).prop_map(|(task, driver)| Op::Assign { task, driver }),
        1 => any::<usize>().prop_map(|task| Op::Unassign { task }),
        3 => (any::<usize>(), 0..3usize).prop_map(|(task, driver)| Op::Pickup { task, driver }),
        1 => (any::<usize>(), 0..3usize, 0..500u64)
            .prop_map(|(task, driver, amount)| Op::Weigh { task, driver, amount }),
        3 => (any::<usize>(), 0..3usize, 0..2usize, proptest::option::of(0..600u64))
            .prop_map(|(task, driver, warehouse, amount)| Op::Deliver {
                task,
                driver,
                warehouse,
                amount,
            }),
        1 => (any::<usize>(), any::<bool>())
            .prop_map(|(task, with_reason)| Op::Cancel { task, with_reason }),
        1 => any::<usize>().prop_map(|task| Op::Reopen { task }),
        1 => (0..30i64).prop_map(|minutes| Op::Advance { minutes }),
        1 => (1..30i64).prop_map(|minutes| Op::Rewind { minutes }),
    ]
}

/// Statuses reachable from `from` along the transition table (including itself).
fn reachable(from: TaskStatus) -> HashSet<TaskStatus> {
    let mut seen = HashSet::from([from]);
    let mut queue = VecDeque::from([from]);
    while let Some(status) = queue.pop_front() {
        for &next in status.allowed_targets() {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    seen
}

fn check_task_step(before: Option<&Task>, after: &Task) {
    assert!(
        reachable(TaskStatus::Planned).contains(&after.status),
        "{} unreachable",
        after.status
    );
    assert!(
        after.timestamps.completed_at.is_none() || after.timestamps.cancelled_at.is_none(),
        "task {} both completed and cancelled",
        after.id
    );

    let Some(before) = before else {
        assert_eq!(after.status, TaskStatus::Planned);
        return;
    };
    if before.status.is_terminal() {
        assert_eq!(before, after, "terminal task {} changed", after.id);
    }
    assert!(
        reachable(before.status).contains(&after.status),
        "{} -> {} is not along the table",
        before.status,
        after.status
    );
    for status in TaskStatus::ALL {
        if let Some(stamp) = before.timestamps.get(status) {
            assert_eq!(after.timestamps.get(status), Some(stamp), "timestamp cleared or moved");
        }
    }
    assert_eq!(before.customer_container_id, after.customer_container_id);
    assert_eq!(before.created_at, after.created_at);
}

fn check_timestamps_ordered(task: &Task) {
    let walk = [
        TaskStatus::Assigned,
        TaskStatus::Accepted,
        TaskStatus::PickedUp,
        TaskStatus::InTransit,
        TaskStatus::Delivered,
        TaskStatus::Completed,
    ];
    let mut last = task.created_at;
    for status in walk {
        if let Some(stamp) = task.timestamps.get(status) {
            assert!(stamp >= last, "{status} stamped before an earlier status");
            last = stamp;
        }
    }
    if let Some(cancelled) = task.timestamps.cancelled_at {
        assert!(cancelled >= task.created_at);
    }
}

fn check_containers(snapshot: &StoreSnapshot) {
    for container in &snapshot.warehouse_containers {
        assert!(container.current_amount <= container.max_capacity);
        let baseline = snapshot.warehouse_baselines[&container.id];
        let ledger: u64 = snapshot
            .fill_history
            .iter()
            .filter(|f| f.warehouse_container_id == container.id)
            .map(|f| f.amount_added)
            .sum();
        assert_eq!(baseline + ledger, container.current_amount);
    }
}

fn check_single_active_task(tasks: &[Task]) {
    let mut active: HashMap<_, usize> = HashMap::new();
    for task in tasks.iter().filter(|t| t.status.is_in_progress()) {
        if let Some(driver) = task.assigned_to {
            *active.entry(driver).or_default() += 1;
        }
    }
    assert!(active.values().all(|n| *n <= 1), "driver with two active tasks");
}

struct World {
    h: Harness,
    drivers: Vec<User>,
    customers: Vec<haul_core::domain::CustomerContainer>,
    warehouses: Vec<WarehouseContainer>,
}

impl World {
    async fn new() -> Self {
        let h = Harness::new().await;
        let drivers = vec![
            h.driver.clone(),
            h.add_driver("Second Driver").await,
            h.admin.clone(),
        ];
        let customers = vec![
            h.customer_container("CC-0", "Cardboard").await,
            h.customer_container("CC-1", "Cardboard").await,
            h.customer_container("CC-2", "Cardboard").await,
        ];
        let warehouses = vec![
            h.warehouse_container("WH-0", "Cardboard", 300, 1000).await,
            h.warehouse_container("WH-1", "Cardboard", 0, 500).await,
        ];
        Self {
            h,
            drivers,
            customers,
            warehouses,
        }
    }

    async fn task_ids(&self) -> Vec<TaskId> {
        self.h
            .engine
            .tasks(&TaskFilter::all())
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect()
    }

    /// Apply `op`; `Ok(true)` if the engine accepted a write.
    async fn apply(&self, op: &Op) -> Result<bool, haul_core::EngineError> {
        let ids = self.task_ids().await;
        let pick = |i: usize| (!ids.is_empty()).then(|| ids[i % ids.len()]);
        let engine = &self.h.engine;
        let admin = self.h.admin.id;

        match *op {
            Op::Create {
                container,
                quantity,
            } => {
                let spec = self.h.new_task(&self.customers[container], None, quantity);
                engine.create_task(spec, admin).await.map(|_| true)
            }
            Op::Assign { task, driver } => match pick(task) {
                Some(id) => engine
                    .assign_driver(id, self.drivers[driver].id, admin)
                    .await
                    .map(|_| true),
                None => Ok(false),
            },
            Op::Unassign { task } => match pick(task) {
                Some(id) => engine.reassign(id, None, admin).await.map(|_| true),
                None => Ok(false),
            },
            Op::Pickup { task, driver } => match pick(task) {
                Some(id) => engine
                    .confirm_pickup(id, self.drivers[driver].id, None)
                    .await
                    .map(|_| true),
                None => Ok(false),
            },
            Op::Weigh {
                task,
                driver,
                amount,
            } => match pick(task) {
                Some(id) => engine
                    .record_weight(id, self.drivers[driver].id, amount)
                    .await
                    .map(|_| true),
                None => Ok(false),
            },
            Op::Deliver {
                task,
                driver,
                warehouse,
                amount,
            } => match pick(task) {
                Some(id) => engine
                    .confirm_delivery(
                        id,
                        self.drivers[driver].id,
                        self.warehouses[warehouse].id,
                        amount,
                        None,
                    )
                    .await
                    .map(|_| true),
                None => Ok(false),
            },
            Op::Cancel { task, with_reason } => match pick(task) {
                Some(id) => {
                    let reason = if with_reason { "customer request" } else { "" };
                    engine.cancel(id, admin, reason).await.map(|_| true)
                }
                None => Ok(false),
            },
            Op::Reopen { task } => match pick(task) {
                Some(id) => engine.reopen(id, admin).await.map(|_| true),
                None => Ok(false),
            },
            Op::Advance { minutes } => {
                self.h.clock.advance(Duration::minutes(minutes));
                Ok(false)
            }
            Op::Rewind { minutes } => {
                self.h.clock.advance(Duration::minutes(-minutes));
                Ok(false)
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_operations_keep_every_invariant(ops in prop::collection::vec(op(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let world = World::new().await;

            for op in &ops {
                let before = world.h.store.snapshot().await;
                let result = world.apply(op).await;
                let after = world.h.store.snapshot().await;

                if result.is_err() {
                    assert_eq!(before, after, "rejected {op:?} changed the store");
                }

                let previous: HashMap<_, _> =
                    before.tasks.iter().map(|t| (t.id, t)).collect();
                for task in &after.tasks {
                    check_task_step(previous.get(&task.id).copied(), task);
                    check_timestamps_ordered(task);
                }
                check_containers(&after);
                check_single_active_task(&after.tasks);
                assert!(after.activity.len() >= before.activity.len());
                assert!(after.fill_history.len() >= before.fill_history.len());
            }
        });
    }
}
