//! Seed fixture - TOML で書いたユーザーとコンテナを一括登録する
//!
//! ```toml
//! [[users]]
//! name = "Dana"
//! role = "driver"
//!
//! [[customer_containers]]
//! qr_code = "CC-1"
//! location = "Harbour St 4"
//! material = "Cardboard"
//!
//! [[warehouse_containers]]
//! qr_code = "WH-1"
//! location = "Bay 1"
//! material = "Cardboard"
//! max_capacity = 1000
//! current_amount = 0
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use haul_core::domain::{CustomerContainer, MaterialType, Role, User, WarehouseContainer};
use haul_core::ports::{EntityStore, IdGenerator, SystemClock, UlidGenerator};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    #[serde(default)]
    pub users: Vec<UserSeed>,
    #[serde(default)]
    pub customer_containers: Vec<CustomerSeed>,
    #[serde(default)]
    pub warehouse_containers: Vec<WarehouseSeed>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserSeed {
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomerSeed {
    pub qr_code: String,
    pub location: String,
    pub material: String,
    #[serde(default = "active")]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WarehouseSeed {
    pub qr_code: String,
    pub location: String,
    pub material: String,
    pub max_capacity: u64,
    #[serde(default)]
    pub current_amount: u64,
    #[serde(default = "active")]
    pub active: bool,
}

fn active() -> bool {
    true
}

/// What `seed` registered, in fixture order.
#[derive(Debug, Default, Serialize)]
pub struct Seeded {
    pub users: Vec<User>,
    pub customer_containers: Vec<CustomerContainer>,
    pub warehouse_containers: Vec<WarehouseContainer>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse fixture {}", path.display()))
    }

    /// Register everything; the store rejects duplicate QR codes and over-full bins.
    pub async fn apply(self, store: &dyn EntityStore) -> Result<Seeded> {
        let ids = UlidGenerator::new(SystemClock);
        let mut seeded = Seeded::default();

        for seed in self.users {
            let user = User::new(ids.generate_user_id(), seed.name, seed.role);
            store
                .insert_user(user.clone())
                .await
                .with_context(|| format!("failed to add user {}", user.name))?;
            seeded.users.push(user);
        }

        for seed in self.customer_containers {
            let mut container = CustomerContainer::new(
                ids.generate_customer_container_id(),
                seed.location,
                MaterialType::new(seed.material),
                seed.qr_code,
            );
            container.active = seed.active;
            store
                .insert_customer_container(container.clone())
                .await
                .with_context(|| format!("failed to add container {}", container.qr_code))?;
            seeded.customer_containers.push(container);
        }

        for seed in self.warehouse_containers {
            let mut container = WarehouseContainer::new(
                ids.generate_warehouse_container_id(),
                seed.location,
                MaterialType::new(seed.material),
                seed.qr_code,
                seed.max_capacity,
            )
            .with_current_amount(seed.current_amount);
            container.active = seed.active;
            store
                .insert_warehouse_container(container.clone())
                .await
                .with_context(|| format!("failed to add container {}", container.qr_code))?;
            seeded.warehouse_containers.push(container);
        }

        info!(
            users = seeded.users.len(),
            customer_containers = seeded.customer_containers.len(),
            warehouse_containers = seeded.warehouse_containers.len(),
            "fixture applied"
        );
        Ok(seeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haul_core::impls::InMemoryEntityStore;

    const FIXTURE: &str = r#"
        [[users]]
        name = "Dana"
        role = "driver"

        [[customer_containers]]
        qr_code = "CC-1"
        location = "Harbour St 4"
        material = "Cardboard"

        [[warehouse_containers]]
        qr_code = "WH-1"
        location = "Bay 1"
        material = "Cardboard"
        max_capacity = 1000
        current_amount = 250
    "#;

    #[tokio::test]
    async fn fixture_registers_everything() {
        let fixture: Fixture = toml::from_str(FIXTURE).unwrap();
        let store = InMemoryEntityStore::new();
        let seeded = fixture.apply(&store).await.unwrap();

        assert_eq!(seeded.users[0].role, Role::Driver);
        let bin = &seeded.warehouse_containers[0];
        assert_eq!(bin.current_amount, 250);
        assert_eq!(store.warehouse_baseline(bin.id).await.unwrap(), 250);
        assert!(seeded.customer_containers[0].active);
    }

    #[tokio::test]
    async fn duplicate_qr_codes_are_rejected() {
        let fixture: Fixture = toml::from_str(
            r#"
            [[customer_containers]]
            qr_code = "X"
            location = "a"
            material = "Glass"

            [[warehouse_containers]]
            qr_code = "X"
            location = "b"
            material = "Glass"
            max_capacity = 10
            "#,
        )
        .unwrap();
        let err = fixture.apply(&InMemoryEntityStore::new()).await.unwrap_err();
        assert!(format!("{err:#}").contains("duplicate"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Fixture>("[[users]]\nname = \"a\"\nrole = \"driver\"\nage = 3").is_err());
    }
}
