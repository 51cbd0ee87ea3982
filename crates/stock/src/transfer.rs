//! Atomic cross-location movement of lot stock.

use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use vaxledger_core::{LedgerError, LedgerResult, RefrigeratorId, TenantId, VaccineId};
use vaxledger_lots::{LotKey, VaccineLotRecord};

use crate::audit::{TransferAuditEntry, TransferLog};
use crate::registry::LotRegistry;

/// Input of one transfer operation.
///
/// `lot_number` is part of the input: a ledger row is keyed by
/// (tenant, vaccine, lot number, refrigerator), so the source record cannot
/// be identified without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub tenant_id: TenantId,
    pub vaccine_id: VaccineId,
    pub lot_number: String,
    pub from_refrigerator_id: RefrigeratorId,
    pub to_refrigerator_id: RefrigeratorId,
    pub quantity: i64,
    pub notes: Option<String>,
}

/// Post-commit snapshots of both rows touched by a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub source: VaccineLotRecord,
    pub destination: VaccineLotRecord,
    pub quantity: i64,
    pub audit_id: Uuid,
}

/// Moves a quantity of one lot between refrigerators as a single unit of work.
///
/// Transfers draw only from available stock; reserved doses never move.
/// Debit and credit either both take effect or neither does: both rows are
/// locked (ascending id order), mutations are staged and validated, and the
/// commit is plain assignment through locks already held. There is no
/// deduplication key on this operation; a caller retrying after a surfaced
/// `Retryable` must confirm the first attempt did not land.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    registry: Arc<LotRegistry>,
    log: Arc<TransferLog>,
}

impl TransferEngine {
    pub fn new(registry: Arc<LotRegistry>, log: Arc<TransferLog>) -> Self {
        Self { registry, log }
    }

    #[instrument(
        skip(self, request),
        fields(
            tenant_id = %request.tenant_id,
            vaccine_id = %request.vaccine_id,
            lot_number = %request.lot_number,
            quantity = request.quantity,
        ),
        err
    )]
    pub fn transfer(&self, request: &TransferRequest) -> LedgerResult<TransferOutcome> {
        if request.from_refrigerator_id == request.to_refrigerator_id {
            return Err(LedgerError::validation(
                "cannot transfer a lot to its current location",
            ));
        }
        if request.quantity <= 0 {
            return Err(LedgerError::validation("transfer quantity must be positive"));
        }

        let source_key = LotKey {
            tenant_id: request.tenant_id,
            vaccine_id: request.vaccine_id,
            lot_number: request.lot_number.clone(),
            refrigerator_id: request.from_refrigerator_id,
        };
        let source_id = self.registry.resolve(&source_key).ok_or_else(|| {
            LedgerError::not_found("vaccine lot not found at source refrigerator")
        })?;

        // Cheap precondition check before the unit of work opens; the
        // authoritative check happens again under the row locks.
        let source = self.registry.get(source_id)?;
        if request.quantity > source.available_quantity() {
            return Err(LedgerError::insufficient_stock(source.available_quantity()));
        }

        let dest_key = source_key.with_refrigerator(request.to_refrigerator_id);
        let dest_id = self.registry.find_or_create_lot(
            &dest_key,
            source.expiry_date(),
            source.minimum_threshold(),
        )?;

        let quantity = request.quantity;
        let (debited, credited) =
            self.registry
                .in_transaction(&[source_id, dest_id], |txn| {
                    let src = txn.record(source_id)?;
                    if quantity > src.available_quantity() {
                        return Err(LedgerError::insufficient_stock(src.available_quantity()));
                    }
                    let debited = src.with_deltas(-quantity, 0)?;
                    let credited = txn.record(dest_id)?.with_deltas(quantity, 0)?;
                    txn.stage(debited.clone())?;
                    txn.stage(credited.clone())?;
                    Ok((debited, credited))
                })?;

        let entry = TransferAuditEntry {
            id: Uuid::now_v7(),
            tenant_id: request.tenant_id,
            vaccine_id: request.vaccine_id,
            lot_number: request.lot_number.clone(),
            from_refrigerator_id: request.from_refrigerator_id,
            to_refrigerator_id: request.to_refrigerator_id,
            quantity,
            notes: request.notes.clone(),
            occurred_at: chrono::Utc::now(),
        };
        let audit_id = entry.id;
        self.log.append(entry);

        Ok(TransferOutcome {
            source: debited,
            destination: credited,
            quantity,
            audit_id,
        })
    }
}
