//! Delivery check - 倉庫コンテナへの投入可否を判定する純粋関数
//!
//! 副作用なし。Engine はロック内で最新の container を読み直してから呼び出します。
//!
//! # 判定順（最初の失敗で確定）
//! 1. container が active であること
//! 2. material type の一致
//! 3. task の target container 指定との一致
//! 4. 数量の決定（明示 > 記録済み actual > planned）と 0 の拒否
//! 5. 残容量

use super::container::{MaterialType, WarehouseContainer};
use super::ids::WarehouseContainerId;
use super::task::Task;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryRejection {
    #[error("warehouse container {0} is inactive")]
    InactiveContainer(WarehouseContainerId),

    #[error("material mismatch: task carries {expected}, container holds {actual}")]
    MaterialMismatch {
        expected: MaterialType,
        actual: MaterialType,
    },

    #[error("wrong target container: expected {expected}, scanned {actual}")]
    WrongTargetContainer {
        expected: WarehouseContainerId,
        actual: WarehouseContainerId,
    },

    #[error("delivery amount must be greater than zero")]
    InvalidAmount,

    #[error("insufficient capacity: {available} available, {requested} requested")]
    InsufficientCapacity { available: u64, requested: u64 },
}

/// Validate a proposed delivery and return the amount to commit.
pub fn validate_delivery(
    task: &Task,
    container: &WarehouseContainer,
    proposed_amount: Option<u64>,
) -> Result<u64, DeliveryRejection> {
    if !container.active {
        return Err(DeliveryRejection::InactiveContainer(container.id));
    }

    if container.material_type != task.material_type {
        return Err(DeliveryRejection::MaterialMismatch {
            expected: task.material_type.clone(),
            actual: container.material_type.clone(),
        });
    }

    if let Some(expected) = task.target_warehouse_id
        && expected != container.id
    {
        return Err(DeliveryRejection::WrongTargetContainer {
            expected,
            actual: container.id,
        });
    }

    let amount = proposed_amount
        .or(task.actual_quantity)
        .unwrap_or(task.planned_quantity);
    if amount == 0 {
        return Err(DeliveryRejection::InvalidAmount);
    }

    let available = container.available();
    if amount > available {
        return Err(DeliveryRejection::InsufficientCapacity {
            available,
            requested: amount,
        });
    }

    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{CustomerContainerId, TaskId, UserId};
    use crate::domain::task::{NewTask, Priority};
    use chrono::Utc;
    use rstest::rstest;
    use ulid::Ulid;

    fn task(material: &str, planned: u64, target: Option<WarehouseContainerId>) -> Task {
        Task::new(
            TaskId::from_ulid(Ulid::new()),
            NewTask {
                customer_container_id: CustomerContainerId::from_ulid(Ulid::new()),
                target_warehouse_id: target,
                scheduled_for: None,
                planned_quantity: planned,
                unit: "kg".to_string(),
                priority: Priority::Normal,
                material_type: MaterialType::new(material),
            },
            UserId::from_ulid(Ulid::new()),
            Utc::now(),
        )
    }

    fn container(material: &str, current: u64, max: u64) -> WarehouseContainer {
        WarehouseContainer::new(
            WarehouseContainerId::from_ulid(Ulid::new()),
            "Dock A",
            MaterialType::new(material),
            format!("WH-{}", Ulid::new()),
            max,
        )
        .with_current_amount(current)
    }

    #[rstest]
    #[case::explicit_amount(Some(500), None, 500)]
    #[case::recorded_weight(None, Some(320), 320)]
    #[case::explicit_beats_recorded(Some(100), Some(320), 100)]
    #[case::falls_back_to_planned(None, None, 250)]
    fn amount_resolution(
        #[case] proposed: Option<u64>,
        #[case] recorded: Option<u64>,
        #[case] expected: u64,
    ) {
        let mut t = task("Cardboard", 250, None);
        t.actual_quantity = recorded;
        let wh = container("Cardboard", 400, 1000);
        assert_eq!(validate_delivery(&t, &wh, proposed), Ok(expected));
    }

    #[test]
    fn exact_fit_is_accepted() {
        let t = task("Cardboard", 600, None);
        let wh = container("Cardboard", 400, 1000);
        assert_eq!(validate_delivery(&t, &wh, None), Ok(600));
    }

    #[test]
    fn insufficient_capacity_reports_available_and_requested() {
        let t = task("Cardboard", 500, None);
        let wh = container("Cardboard", 950, 1000);
        assert_eq!(
            validate_delivery(&t, &wh, Some(500)),
            Err(DeliveryRejection::InsufficientCapacity {
                available: 50,
                requested: 500
            })
        );
    }

    #[test]
    fn material_mismatch_wins_over_capacity() {
        let t = task("Metal", 5000, None);
        let wh = container("Plastic", 950, 1000);
        assert_eq!(
            validate_delivery(&t, &wh, None),
            Err(DeliveryRejection::MaterialMismatch {
                expected: MaterialType::new("Metal"),
                actual: MaterialType::new("Plastic"),
            })
        );
    }

    #[test]
    fn wrong_target_wins_over_capacity() {
        let intended = WarehouseContainerId::from_ulid(Ulid::new());
        let t = task("Metal", 5000, Some(intended));
        let wh = container("Metal", 950, 1000);
        assert_eq!(
            validate_delivery(&t, &wh, None),
            Err(DeliveryRejection::WrongTargetContainer {
                expected: intended,
                actual: wh.id,
            })
        );
    }

    #[test]
    fn zero_amount_is_rejected() {
        let t = task("Metal", 10, None);
        let wh = container("Metal", 0, 1000);
        assert_eq!(
            validate_delivery(&t, &wh, Some(0)),
            Err(DeliveryRejection::InvalidAmount)
        );
    }

    #[test]
    fn inactive_container_is_rejected_first() {
        let t = task("Metal", 10, None);
        let mut wh = container("Plastic", 0, 1000);
        wh.active = false;
        assert_eq!(
            validate_delivery(&t, &wh, None),
            Err(DeliveryRejection::InactiveContainer(wh.id))
        );
    }
}
