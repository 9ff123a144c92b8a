//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: Clock の時刻を先頭に持つ ULID（本番用・テスト用どちらも）

use crate::domain::ids::{
    ActivityId, CustomerContainerId, FillEntryId, ScanEventId, TaskId, UserId,
    WarehouseContainerId,
};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は ID を生成
///
/// 型ごとのメソッドは `next_ulid` の上に載った provided method なので、
/// 実装側は 1 つだけ書けば足ります。`dyn IdGenerator` としても使えます。
pub trait IdGenerator: Send + Sync {
    fn next_ulid(&self) -> Ulid;

    fn generate_task_id(&self) -> TaskId {
        TaskId::from_ulid(self.next_ulid())
    }

    fn generate_user_id(&self) -> UserId {
        UserId::from_ulid(self.next_ulid())
    }

    fn generate_customer_container_id(&self) -> CustomerContainerId {
        CustomerContainerId::from_ulid(self.next_ulid())
    }

    fn generate_warehouse_container_id(&self) -> WarehouseContainerId {
        WarehouseContainerId::from_ulid(self.next_ulid())
    }

    fn generate_scan_event_id(&self) -> ScanEventId {
        ScanEventId::from_ulid(self.next_ulid())
    }

    fn generate_fill_entry_id(&self) -> FillEntryId {
        FillEntryId::from_ulid(self.next_ulid())
    }

    fn generate_activity_id(&self) -> ActivityId {
        ActivityId::from_ulid(self.next_ulid())
    }
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}
