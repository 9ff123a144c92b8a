//! haul-core
//!
//! Task lifecycle state machine and scan-driven transition engine for
//! container pickup and warehouse delivery.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, task, container, scan, events, delivery, errors）
//! - **ports**: 抽象化レイヤー（EntityStore, Clock, IdGenerator, EventSink）
//! - **app**: TaskEngine とその部品（resolver, audit, locks, retry, builder）
//! - **impls**: 実装（InMemoryEntityStore）
//! - **config**: EngineConfig（TOML）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{EngineBuilder, ScanResolution, TaskEngine};
pub use config::{EngineConfig, load_config};
pub use domain::{EngineError, TaskStatus};
