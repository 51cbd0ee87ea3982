//! Immutable transfer audit trail.
//!
//! Append-only, intended for traceability and status reporting. The ledger
//! invariants never depend on it.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vaxledger_core::{RefrigeratorId, TenantId, VaccineId};

/// One committed transfer, as it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferAuditEntry {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub vaccine_id: VaccineId,
    pub lot_number: String,
    pub from_refrigerator_id: RefrigeratorId,
    pub to_refrigerator_id: RefrigeratorId,
    pub quantity: i64,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// In-memory append-only transfer log.
#[derive(Debug, Default)]
pub struct TransferLog {
    entries: RwLock<Vec<TransferAuditEntry>>,
}

impl TransferLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: TransferAuditEntry) {
        if let Ok(mut entries) = self.entries.write() {
            entries.push(entry);
        }
    }

    /// Entries for one tenant, in append order.
    pub fn list_for_tenant(&self, tenant_id: TenantId) -> Vec<TransferAuditEntry> {
        match self.entries.read() {
            Ok(entries) => entries
                .iter()
                .filter(|e| e.tenant_id == tenant_id)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tenant_id: TenantId) -> TransferAuditEntry {
        TransferAuditEntry {
            id: Uuid::now_v7(),
            tenant_id,
            vaccine_id: VaccineId::new(),
            lot_number: "L-1".to_string(),
            from_refrigerator_id: RefrigeratorId::new(),
            to_refrigerator_id: RefrigeratorId::new(),
            quantity: 10,
            notes: None,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn listing_is_tenant_scoped_and_ordered() {
        let log = TransferLog::new();
        let tenant = TenantId::new();
        let other = TenantId::new();

        let first = entry(tenant);
        log.append(first.clone());
        log.append(entry(other));
        let second = entry(tenant);
        log.append(second.clone());

        assert_eq!(log.len(), 3);
        assert_eq!(log.list_for_tenant(tenant), vec![first, second]);
    }
}
