//! Errors - エラー型と分類
//!
//! すべての拒否は型付きの値として返します。UI 側は variant ごとに固有の
//! メッセージを表示し、汎用の「失敗しました」には落としません。
//!
//! # 分類（ErrorKind）
//! - Validation: 入力・状態に起因（再スキャンや別コンテナで回復可能）
//! - Conflict: 同時更新の衝突（Engine が 1 回だけ自動リトライ）
//! - Infrastructure: ストアの障害（リトライしない）

use std::fmt;

use super::container::{ContainerRef, MaterialType};
use super::delivery::DeliveryRejection;
use super::ids::{CustomerContainerId, TaskId, UserId, WarehouseContainerId};
use super::state::{InvalidTransition, TaskStatus};

/// ErrorKind は運用上の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Infrastructure,
}

/// Which table a missing id was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    User,
    CustomerContainer,
    WarehouseContainer,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Task => "task",
            Self::User => "user",
            Self::CustomerContainer => "customer container",
            Self::WarehouseContainer => "warehouse container",
        })
    }
}

/// StoreError は Entity Store 実装が返すエラー
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Optimistic version check failed at commit time.
    #[error("version conflict on {entity}")]
    Conflict { entity: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("duplicate {what}")]
    Duplicate { what: String },

    /// A commit would break a stored invariant (capacity bound, dangling reference).
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("snapshot encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// EngineError は Task Transition Engine の公開エラー
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid transition {current} -> {requested}")]
    InvalidTransition {
        current: TaskStatus,
        requested: TaskStatus,
    },

    #[error("cancellation requires a reason")]
    MissingCancellationReason,

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

    #[error("insufficient capacity: {available} available, {requested} requested")]
    InsufficientCapacity { available: u64, requested: u64 },

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("container {0} is inactive")]
    InactiveContainer(ContainerRef),

    #[error("QR code {payload:?} does not belong to any container")]
    UnknownContainer { payload: String },

    #[error("driver {driver} has no task for container {container}")]
    NoTaskForContainer {
        container: CustomerContainerId,
        driver: UserId,
    },

    #[error("driver {driver} has no task in progress")]
    NoActiveTask { driver: UserId },

    #[error("task {task} is not assigned to driver {actual}")]
    DriverMismatch {
        task: TaskId,
        expected: Option<UserId>,
        actual: UserId,
    },

    #[error("driver {driver} already has task {active_task} in progress")]
    DriverBusy { driver: UserId, active_task: TaskId },

    #[error("user {0} cannot be assigned tasks")]
    NotADriver(UserId),

    #[error("concurrent modification of {entity}; retry the operation")]
    ConcurrentModification { entity: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error(transparent)]
    Store(StoreError),
}

impl EngineError {
    pub fn not_found(entity: EntityKind, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConcurrentModification { .. } => ErrorKind::Conflict,
            Self::Store(_) => ErrorKind::Infrastructure,
            _ => ErrorKind::Validation,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Stable code identifier (`E####`) for machine parsing at the UI boundary.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "E1001",
            Self::MissingCancellationReason => "E1002",
            Self::MaterialMismatch { .. } => "E2001",
            Self::WrongTargetContainer { .. } => "E2002",
            Self::InsufficientCapacity { .. } => "E2003",
            Self::InvalidAmount => "E2004",
            Self::InactiveContainer(_) => "E2005",
            Self::UnknownContainer { .. } => "E3001",
            Self::NoTaskForContainer { .. } => "E3002",
            Self::NoActiveTask { .. } => "E3003",
            Self::DriverMismatch { .. } => "E4001",
            Self::DriverBusy { .. } => "E4002",
            Self::NotADriver(_) => "E4003",
            Self::ConcurrentModification { .. } => "E5001",
            Self::NotFound { .. } => "E6001",
            Self::Store(_) => "E9001",
        }
    }
}

impl From<InvalidTransition> for EngineError {
    fn from(err: InvalidTransition) -> Self {
        Self::InvalidTransition {
            current: err.current,
            requested: err.requested,
        }
    }
}

impl From<DeliveryRejection> for EngineError {
    fn from(err: DeliveryRejection) -> Self {
        match err {
            DeliveryRejection::InactiveContainer(id) => {
                Self::InactiveContainer(ContainerRef::Warehouse(id))
            }
            DeliveryRejection::MaterialMismatch { expected, actual } => {
                Self::MaterialMismatch { expected, actual }
            }
            DeliveryRejection::WrongTargetContainer { expected, actual } => {
                Self::WrongTargetContainer { expected, actual }
            }
            DeliveryRejection::InvalidAmount => Self::InvalidAmount,
            DeliveryRejection::InsufficientCapacity {
                available,
                requested,
            } => Self::InsufficientCapacity {
                available,
                requested,
            },
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { entity } => Self::ConcurrentModification { entity },
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Store(other),
        }
    }
}
