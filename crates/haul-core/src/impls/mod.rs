//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryEntityStore**: 開発・テスト用の正本（JSON スナップショット対応）
//!
//! 永続ストア（Postgres など）は別クレートで `EntityStore` を実装します。

pub mod inmem_store;

pub use self::inmem_store::{InMemoryEntityStore, StoreSnapshot};
