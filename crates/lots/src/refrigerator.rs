//! Cold-storage context types.
//!
//! The ledger never mutates refrigerators; equipment management owns them.
//! These types exist so the service boundary can validate that a referenced
//! storage unit actually exists before touching any stock.

use serde::{Deserialize, Serialize};

use vaxledger_core::{Entity, RefrigeratorId, ValueObject};

/// Operating temperature band of a storage unit, in degrees Celsius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRange {
    pub min_celsius: f64,
    pub max_celsius: f64,
}

impl TemperatureRange {
    pub fn contains(&self, celsius: f64) -> bool {
        celsius >= self.min_celsius && celsius <= self.max_celsius
    }
}

impl ValueObject for TemperatureRange {}

/// An independently tracked cold-storage location belonging to a tenant's unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refrigerator {
    pub id: RefrigeratorId,
    pub unit_id: String,
    pub temperature_range: TemperatureRange,
}

impl Entity for Refrigerator {
    type Id = RefrigeratorId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
