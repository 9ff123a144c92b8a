//! EngineBuilder - TaskEngine の構築とワイヤリング
//!
//! # 既定値
//! - store: `InMemoryEntityStore`
//! - clock: `SystemClock`
//! - ids: 設定された clock を使う `UlidGenerator`
//! - sink: `TracingEventSink`
//! - config: `EngineConfig::default()`
//!
//! # Fail-fast 設計
//! build() 時に config を検証し、不正なら BuildError を返します。

use std::sync::Arc;

use crate::app::engine::TaskEngine;
use crate::config::{ConfigError, EngineConfig};
use crate::impls::InMemoryEntityStore;
use crate::ports::{Clock, EntityStore, EventSink, IdGenerator, SystemClock, TracingEventSink, UlidGenerator};

/// # 使用例
/// ```ignore
/// let engine = EngineBuilder::new()
///     .store(Arc::new(store.clone()))
///     .clock(Arc::new(FixedClock::new(t0)))
///     .build()?;
/// ```
#[derive(Default)]
pub struct EngineBuilder {
    store: Option<Arc<dyn EntityStore>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    sink: Option<Arc<dyn EventSink>>,
    config: EngineConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, store: Arc<dyn EntityStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<TaskEngine, BuildError> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryEntityStore::new()));
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingEventSink));

        Ok(TaskEngine::new(store, clock, ids, sink, &self.config))
    }
}
