//! Reserve/release/consume operations on a single lot record.
//!
//! Per unit of stock the state machine is `Available -> Reserved -> Consumed`,
//! or `Available -> Transferred` (elsewhere). Reserved doses are excluded from
//! `available_quantity()`, which is what makes them untransferable without any
//! extra checks in the transfer engine.

use std::sync::Arc;

use tracing::instrument;

use vaxledger_core::{LedgerError, LedgerResult, LotRecordId};
use vaxledger_lots::VaccineLotRecord;

use crate::registry::LotRegistry;

#[derive(Debug, Clone)]
pub struct ReservationManager {
    registry: Arc<LotRegistry>,
}

impl ReservationManager {
    pub fn new(registry: Arc<LotRegistry>) -> Self {
        Self { registry }
    }

    /// Earmark `quantity` doses for a pending application.
    #[instrument(skip(self), err)]
    pub fn reserve(&self, record_id: LotRecordId, quantity: i64) -> LedgerResult<VaccineLotRecord> {
        if quantity <= 0 {
            return Err(LedgerError::validation("reservation quantity must be positive"));
        }
        self.registry.adjust_quantities(record_id, 0, quantity)
    }

    /// Return previously reserved doses to the available pool.
    #[instrument(skip(self), err)]
    pub fn release(&self, record_id: LotRecordId, quantity: i64) -> LedgerResult<VaccineLotRecord> {
        if quantity <= 0 {
            return Err(LedgerError::validation("release quantity must be positive"));
        }
        self.registry.in_transaction(&[record_id], |txn| {
            let record = txn.record(record_id)?;
            if quantity > record.reserved_quantity() {
                return Err(LedgerError::validation(
                    "cannot release more than is reserved",
                ));
            }
            let next = record.with_deltas(0, -quantity)?;
            txn.stage(next.clone())?;
            Ok(next)
        })
    }

    /// Record `quantity` administered doses.
    ///
    /// Reserved doses are consumed first; any remainder draws directly from
    /// available stock, which must cover it.
    #[instrument(skip(self), err)]
    pub fn consume(&self, record_id: LotRecordId, quantity: i64) -> LedgerResult<VaccineLotRecord> {
        if quantity <= 0 {
            return Err(LedgerError::validation("consume quantity must be positive"));
        }
        self.registry.in_transaction(&[record_id], |txn| {
            let record = txn.record(record_id)?;
            let from_reserved = record.reserved_quantity().min(quantity);
            let next = record.with_deltas(-quantity, -from_reserved)?;
            txn.stage(next.clone())?;
            Ok(next)
        })
    }
}
