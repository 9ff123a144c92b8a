//! LockTable - エンティティ単位の直列化
//!
//! 同じ task / driver / warehouse container に触れる操作を 1 本ずつ流します。
//!
//! # ルール
//! - 取得順は常に task → driver → warehouse container（`LockKey` の `Ord` 順）
//! - 待ち時間は `timeout` で打ち切り、呼び出し側は ConcurrentModification を返す
//! - 誰も握っていないエントリは次の取得時に掃除する

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::{TaskId, UserId, WarehouseContainerId};

/// Variant order is the acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Task(TaskId),
    Driver(UserId),
    Warehouse(WarehouseContainerId),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task(id) => id.fmt(f),
            Self::Driver(id) => id.fmt(f),
            Self::Warehouse(id) => id.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timed out waiting for lock on {0}")]
pub struct LockTimeout(pub LockKey);

/// Held locks; released on drop.
#[must_use]
pub struct LockGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

pub struct LockTable {
    entries: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
    timeout: Duration,
}

impl LockTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn entry(&self, key: LockKey) -> Arc<AsyncMutex<()>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|k, m| *k == key || Arc::strong_count(m) > 1);
        entries.entry(key).or_default().clone()
    }

    /// Acquire every key in canonical order.
    pub async fn acquire(&self, keys: &[LockKey]) -> Result<LockGuard, LockTimeout> {
        let mut ordered = keys.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for key in ordered {
            let mutex = self.entry(key);
            let guard = tokio::time::timeout(self.timeout, mutex.lock_owned())
                .await
                .map_err(|_| LockTimeout(key))?;
            tracing::debug!(lock = %key, "lock acquired");
            guards.push(guard);
        }
        Ok(LockGuard { _guards: guards })
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
