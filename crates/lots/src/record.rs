use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vaxledger_core::{
    Entity, LedgerError, LedgerResult, LotRecordId, RefrigeratorId, TenantId, VaccineId,
};

/// Unique key of a ledger row: one physical stock bucket.
///
/// One logical lot (vaccine + lot number) may have one record per
/// refrigerator. Stock is location-bound and never silently merged across
/// locations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LotKey {
    pub tenant_id: TenantId,
    pub vaccine_id: VaccineId,
    pub lot_number: String,
    pub refrigerator_id: RefrigeratorId,
}

impl LotKey {
    /// The same logical lot at a different location.
    pub fn with_refrigerator(&self, refrigerator_id: RefrigeratorId) -> Self {
        Self {
            refrigerator_id,
            ..self.clone()
        }
    }
}

/// One row of the ledger: doses of one vaccine lot in one refrigerator.
///
/// Quantities are only mutated through [`VaccineLotRecord::with_deltas`],
/// which re-validates the invariants:
///
/// 1. `total_quantity >= 0`, `reserved_quantity >= 0`,
///    `reserved_quantity <= total_quantity`.
/// 2. `available_quantity() == total_quantity - reserved_quantity` (derived,
///    never stored).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaccineLotRecord {
    id: LotRecordId,
    key: LotKey,
    total_quantity: i64,
    reserved_quantity: i64,
    expiry_date: DateTime<Utc>,
    minimum_threshold: Option<i64>,
}

impl VaccineLotRecord {
    /// Build a fresh record with no reservations.
    ///
    /// Rejects a negative opening quantity; zero is allowed (a row created by
    /// a transfer credit starts empty and is filled inside the same unit of
    /// work).
    pub fn new(
        id: LotRecordId,
        key: LotKey,
        quantity: i64,
        expiry_date: DateTime<Utc>,
        minimum_threshold: Option<i64>,
    ) -> LedgerResult<Self> {
        if quantity < 0 {
            return Err(LedgerError::validation("quantity cannot be negative"));
        }
        Ok(Self {
            id,
            key,
            total_quantity: quantity,
            reserved_quantity: 0,
            expiry_date,
            minimum_threshold,
        })
    }

    pub fn key(&self) -> &LotKey {
        &self.key
    }

    pub fn tenant_id(&self) -> TenantId {
        self.key.tenant_id
    }

    pub fn total_quantity(&self) -> i64 {
        self.total_quantity
    }

    pub fn reserved_quantity(&self) -> i64 {
        self.reserved_quantity
    }

    /// Doses not yet reserved or consumed; eligible for transfer or reservation.
    pub fn available_quantity(&self) -> i64 {
        self.total_quantity - self.reserved_quantity
    }

    pub fn expiry_date(&self) -> DateTime<Utc> {
        self.expiry_date
    }

    pub fn minimum_threshold(&self) -> Option<i64> {
        self.minimum_threshold
    }

    /// Apply both deltas at once and re-validate.
    ///
    /// Returns the mutated copy; the original is untouched, so a failed
    /// application cannot leave a half-updated row behind.
    ///
    /// - An application that would push `available_quantity()` below zero
    ///   fails with `InsufficientStock` carrying the current available amount.
    /// - Anything else out of bounds (negative reserved, overflow) is an
    ///   `InvariantViolation`: the caller fed the ledger a delta no valid
    ///   operation produces.
    pub fn with_deltas(&self, total_delta: i64, reserved_delta: i64) -> LedgerResult<Self> {
        let total = self
            .total_quantity
            .checked_add(total_delta)
            .ok_or_else(|| LedgerError::invariant("total quantity overflow"))?;
        let reserved = self
            .reserved_quantity
            .checked_add(reserved_delta)
            .ok_or_else(|| LedgerError::invariant("reserved quantity overflow"))?;

        let available = total
            .checked_sub(reserved)
            .ok_or_else(|| LedgerError::invariant("available quantity overflow"))?;
        if available < 0 {
            return Err(LedgerError::insufficient_stock(self.available_quantity()));
        }

        let next = Self {
            total_quantity: total,
            reserved_quantity: reserved,
            ..self.clone()
        };
        next.check_invariants()?;
        Ok(next)
    }

    /// Validate the quantity invariants on this row.
    pub fn check_invariants(&self) -> LedgerResult<()> {
        if self.total_quantity < 0 {
            return Err(LedgerError::invariant(format!(
                "negative total quantity ({}) on record {}",
                self.total_quantity, self.id
            )));
        }
        if self.reserved_quantity < 0 {
            return Err(LedgerError::invariant(format!(
                "negative reserved quantity ({}) on record {}",
                self.reserved_quantity, self.id
            )));
        }
        if self.reserved_quantity > self.total_quantity {
            return Err(LedgerError::invariant(format!(
                "reserved quantity ({}) exceeds total ({}) on record {}",
                self.reserved_quantity, self.total_quantity, self.id
            )));
        }
        Ok(())
    }
}

impl Entity for VaccineLotRecord {
    type Id = LotRecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
