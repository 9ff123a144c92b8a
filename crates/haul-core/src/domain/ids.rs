//! Domain identifiers (strongly-typed IDs).
//!
//! ULID ベースの ID を Phantom type で型付けしています。
//! `TaskId` と `WarehouseContainerId` は同じ 128-bit 値を持てますが、
//! コンパイル時に混同できません。
//!
//! ## 表記
//! - Display: `<prefix><ULID>`（例: `task-01HZX...`）
//! - FromStr: プレフィックス付き・なしの両方を受け付ける

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// Display で使うプレフィックス（例: "task-", "wh-"）
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しません。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// IdParseError は文字列から ID を復元できなかったときのエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {expected_prefix}id: {input:?}")]
pub struct IdParseError {
    pub expected_prefix: &'static str,
    pub input: String,
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self::from_ulid)
            .map_err(|_| IdParseError {
                expected_prefix: T::prefix(),
                input: s.to_string(),
            })
    }
}

// ========================================
// マーカー型の定義
// ========================================

macro_rules! id_marker {
    ($(#[$doc:meta])* $marker:ident => $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn prefix() -> &'static str {
                $prefix
            }
        }
    };
}

id_marker!(
    /// Task のマーカー型
    Task => "task-"
);
id_marker!(
    /// User（admin / driver / customer）のマーカー型
    User => "user-"
);
id_marker!(
    /// 顧客側コンテナのマーカー型
    CustomerContainer => "cc-"
);
id_marker!(
    /// 倉庫側コンテナのマーカー型
    WarehouseContainer => "wh-"
);
id_marker!(
    /// Scan event のマーカー型
    ScanEvent => "scan-"
);
id_marker!(
    /// Fill history entry のマーカー型
    FillEntry => "fill-"
);
id_marker!(
    /// Activity log entry のマーカー型
    Activity => "act-"
);

// ========================================
// Type Alias
// ========================================

/// Identifier of a pickup-and-deliver task.
pub type TaskId = Id<Task>;

/// Identifier of a user (admin, driver or customer).
pub type UserId = Id<User>;

/// Identifier of a container at a customer site.
pub type CustomerContainerId = Id<CustomerContainer>;

/// Identifier of a container at the warehouse.
pub type WarehouseContainerId = Id<WarehouseContainer>;

/// Identifier of a recorded QR scan.
pub type ScanEventId = Id<ScanEvent>;

/// Identifier of one fill history ledger row.
pub type FillEntryId = Id<FillEntry>;

/// Identifier of one activity log entry.
pub type ActivityId = Id<Activity>;
