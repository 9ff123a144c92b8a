//! EventSink port - コミット済み監査ログの通知
//!
//! Activity log の正本はストアです。EventSink はコミット後に呼ばれる
//! 通知口で、失敗してもトランザクションには影響しません。
//!
//! - **NoopEventSink**: 何もしない
//! - **TracingEventSink**: `tracing` に構造化ログとして流す

use crate::domain::ActivityLogEntry;

pub trait EventSink: Send + Sync {
    fn publish(&self, entry: &ActivityLogEntry);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _entry: &ActivityLogEntry) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, entry: &ActivityLogEntry) {
        tracing::info!(
            target: "haul::activity",
            kind = %entry.kind,
            task_id = ?entry.task_id.map(|id| id.to_string()),
            user_id = ?entry.user_id.map(|id| id.to_string()),
            "{}",
            entry.message
        );
    }
}
