//! Container records: customer-side sources and warehouse-side sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{CustomerContainerId, UserId, WarehouseContainerId};

/// Material carried by a container ("Cardboard", "Metal", ...).
///
/// Comparison is exact on the trimmed name; the catalogue of materials is owned
/// by the admin tooling, not by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialType(String);

impl MaterialType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaterialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for MaterialType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A container at a customer site.
///
/// Read-mostly from the engine's point of view: only `last_emptied` is written,
/// when a delivery of its contents completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerContainer {
    pub id: CustomerContainerId,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub material_type: MaterialType,
    pub qr_code: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<UserId>,
    #[serde(default)]
    pub last_emptied: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl CustomerContainer {
    pub fn new(
        id: CustomerContainerId,
        location: impl Into<String>,
        material_type: MaterialType,
        qr_code: impl Into<String>,
    ) -> Self {
        Self {
            id,
            location: location.into(),
            coordinates: None,
            material_type,
            qr_code: qr_code.into(),
            active: true,
            customer_id: None,
            last_emptied: None,
            version: 0,
        }
    }
}

/// A container at the warehouse accumulating one material type.
///
/// Invariant: `current_amount <= max_capacity`. The engine is the only writer of
/// `current_amount`, and the store refuses commits that would break the bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseContainer {
    pub id: WarehouseContainerId,
    pub location: String,
    pub material_type: MaterialType,
    pub qr_code: String,
    pub current_amount: u64,
    pub max_capacity: u64,
    pub active: bool,
    #[serde(default)]
    pub version: u64,
}

impl WarehouseContainer {
    pub fn new(
        id: WarehouseContainerId,
        location: impl Into<String>,
        material_type: MaterialType,
        qr_code: impl Into<String>,
        max_capacity: u64,
    ) -> Self {
        Self {
            id,
            location: location.into(),
            material_type,
            qr_code: qr_code.into(),
            current_amount: 0,
            max_capacity,
            active: true,
            version: 0,
        }
    }

    pub fn with_current_amount(mut self, amount: u64) -> Self {
        self.current_amount = amount;
        self
    }

    /// Remaining room before `max_capacity`.
    pub fn available(&self) -> u64 {
        self.max_capacity.saturating_sub(self.current_amount)
    }

    pub fn is_within_capacity(&self) -> bool {
        self.current_amount <= self.max_capacity
    }
}

/// Reference to either kind of container (scan events, activity log).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ContainerRef {
    Customer(CustomerContainerId),
    Warehouse(WarehouseContainerId),
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer(id) => id.fmt(f),
            Self::Warehouse(id) => id.fmt(f),
        }
    }
}
