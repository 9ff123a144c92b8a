//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。Engine はここに並ぶ
//! trait だけに依存し、ストアや時計の実装を知りません。
//!
//! # 設計原則
//! - EntityStore が source of truth（正本）
//! - 時刻と ID は注入する（テストで固定できるように）
//! - EventSink はコミット後の通知であり、正本ではない

pub mod clock;
pub mod entity_store;
pub mod event_sink;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::entity_store::{ActivityFilter, EntityStore, TaskFilter, UnitOfWork};
pub use self::event_sink::{EventSink, NoopEventSink, TracingEventSink};
pub use self::id_generator::{IdGenerator, UlidGenerator};
