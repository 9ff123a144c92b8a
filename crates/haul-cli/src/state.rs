//! State file: the JSON snapshot the CLI loads before and saves after a command.
//!
//! A run holds `<state>.lock` from `open` until the `Workspace` is dropped, so
//! concurrent runs see each other's commits instead of overwriting them.
//! Saves go through a temp file renamed over the state file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use haul_core::config::EngineConfig;
use haul_core::domain::{CustomerContainer, User, WarehouseContainer};
use haul_core::impls::{InMemoryEntityStore, StoreSnapshot};
use haul_core::{EngineBuilder, TaskEngine};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::lock::StateLock;

/// An engine backed by an in-memory store restored from `path`.
pub struct Workspace {
    path: PathBuf,
    pub store: InMemoryEntityStore,
    pub engine: TaskEngine,
    _lock: StateLock,
}

impl Workspace {
    /// Open the state file, or start empty when it does not exist yet.
    ///
    /// Waits up to the configured lock timeout for another run to finish.
    pub fn open(path: &Path, config: EngineConfig) -> Result<Self> {
        let lock = StateLock::acquire(path, config.lock_timeout())
            .with_context(|| format!("failed to lock state file {}", path.display()))?;
        debug!(lock = %lock.path().display(), "state locked");

        let snapshot = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read state file {}", path.display()))?;
            StoreSnapshot::from_json(&raw)
                .with_context(|| format!("failed to parse state file {}", path.display()))?
        } else {
            debug!(path = %path.display(), "state file missing, starting empty");
            StoreSnapshot::default()
        };

        let store = InMemoryEntityStore::from_snapshot(snapshot);
        let engine = EngineBuilder::new()
            .store(Arc::new(store.clone()))
            .config(config)
            .build()
            .context("invalid engine configuration")?;

        Ok(Self {
            path: path.to_path_buf(),
            store,
            engine,
            _lock: lock,
        })
    }

    /// Write the store back; called only after a command succeeded.
    pub async fn save(&self) -> Result<()> {
        let json = self
            .store
            .snapshot()
            .await
            .to_json()
            .context("failed to encode state")?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to stage state in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .context("failed to write staged state")?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to write state file {}", self.path.display()))?;
        debug!(path = %self.path.display(), "state saved");
        Ok(())
    }

    /// Look a user up by id or by exact name.
    pub async fn user(&self, reference: &str) -> Result<User> {
        let users = self.store.users().await;
        if let Ok(id) = reference.parse() {
            if let Some(user) = users.iter().find(|u| u.id == id) {
                return Ok(user.clone());
            }
        }
        let mut named = users.into_iter().filter(|u| u.name == reference);
        match (named.next(), named.next()) {
            (Some(user), None) => Ok(user),
            (Some(_), Some(_)) => bail!("user name {reference:?} is ambiguous; use the id"),
            (None, _) => Err(anyhow!("no user {reference:?}")),
        }
    }

    /// Look a customer container up by QR code or id.
    pub async fn customer_container(&self, reference: &str) -> Result<CustomerContainer> {
        let id = reference.parse().ok();
        self.store
            .customer_containers()
            .await
            .into_iter()
            .find(|c| c.qr_code == reference || Some(c.id) == id)
            .ok_or_else(|| anyhow!("no customer container {reference:?}"))
    }

    /// Look a warehouse container up by QR code or id.
    pub async fn warehouse_container(&self, reference: &str) -> Result<WarehouseContainer> {
        let id = reference.parse().ok();
        self.store
            .warehouse_containers()
            .await
            .into_iter()
            .find(|c| c.qr_code == reference || Some(c.id) == id)
            .ok_or_else(|| anyhow!("no warehouse container {reference:?}"))
    }
}
