//! App - アプリケーション層
//!
//! ports を組み合わせてタスク遷移のロジックを実装します。
//!
//! # 主要コンポーネント
//! - **TaskEngine**: 遷移操作と読み取り projection
//! - **EngineBuilder**: 依存の注入と起動時検証
//! - **resolver**: QR スキャンの分類（純粋関数）
//! - **AuditEmitter**: Activity log の組み立て
//! - **LockTable** / **RetryPolicy**: 直列化と conflict 時の再試行

pub mod audit;
pub mod builder;
pub mod engine;
pub mod locks;
pub mod resolver;
pub mod retry;
pub mod status;

pub use self::audit::{AuditEmitter, AuditRefs};
pub use self::builder::{BuildError, EngineBuilder};
pub use self::engine::{DeliveryReceipt, TaskEngine};
pub use self::locks::{LockKey, LockTable};
pub use self::resolver::{ScanResolution, ScannedContainer};
pub use self::retry::RetryPolicy;
pub use self::status::{Reconciliation, StatusCounts};
