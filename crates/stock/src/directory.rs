//! Read-only seam to the equipment collaborator that owns refrigerators.

use std::collections::HashMap;
use std::sync::RwLock;

use vaxledger_core::RefrigeratorId;
use vaxledger_lots::Refrigerator;

/// Lookup of cold-storage units. The ledger only reads; equipment management
/// owns the data.
pub trait RefrigeratorDirectory: Send + Sync {
    fn get(&self, id: RefrigeratorId) -> Option<Refrigerator>;

    fn exists(&self, id: RefrigeratorId) -> bool {
        self.get(id).is_some()
    }
}

/// Directory backed by a plain in-memory map.
#[derive(Debug, Default)]
pub struct InMemoryRefrigeratorDirectory {
    units: RwLock<HashMap<RefrigeratorId, Refrigerator>>,
}

impl InMemoryRefrigeratorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, refrigerator: Refrigerator) {
        if let Ok(mut units) = self.units.write() {
            units.insert(refrigerator.id, refrigerator);
        }
    }
}

impl RefrigeratorDirectory for InMemoryRefrigeratorDirectory {
    fn get(&self, id: RefrigeratorId) -> Option<Refrigerator> {
        self.units.read().ok()?.get(&id).cloned()
    }
}

/// Directory that accepts any refrigerator id.
///
/// For embedders that validate equipment upstream and only want the ledger's
/// stock semantics.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveDirectory;

impl RefrigeratorDirectory for PermissiveDirectory {
    fn get(&self, _id: RefrigeratorId) -> Option<Refrigerator> {
        None
    }

    fn exists(&self, _id: RefrigeratorId) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaxledger_lots::TemperatureRange;

    #[test]
    fn in_memory_directory_round_trips() {
        let directory = InMemoryRefrigeratorDirectory::new();
        let id = RefrigeratorId::new();
        directory.register(Refrigerator {
            id,
            unit_id: "unit-centro".to_string(),
            temperature_range: TemperatureRange {
                min_celsius: 2.0,
                max_celsius: 8.0,
            },
        });

        assert!(directory.exists(id));
        assert!(!directory.exists(RefrigeratorId::new()));
        assert_eq!(directory.get(id).unwrap().unit_id, "unit-centro");
    }

    #[test]
    fn permissive_directory_accepts_anything() {
        assert!(PermissiveDirectory.exists(RefrigeratorId::new()));
    }
}
