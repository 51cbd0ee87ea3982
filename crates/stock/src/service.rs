//! Inbound operations exposed to the surrounding application.
//!
//! The service composes the registry, transfer engine, and reservation
//! manager, adds the refrigerator-existence checks at the boundary, applies
//! the bounded retry policy for retryable conflicts, and keeps invariant
//! violations opaque to callers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, instrument, warn};

use vaxledger_core::{
    LedgerError, LedgerResult, LotRecordId, RefrigeratorId, TenantId, VaccineId,
};
use vaxledger_lots::{evaluate, LotKey, StatusConfig, StockStatus, VaccineLotRecord};

use crate::audit::{TransferAuditEntry, TransferLog};
use crate::directory::RefrigeratorDirectory;
use crate::registry::{LotRegistry, RegistryConfig};
use crate::reservation::ReservationManager;
use crate::transfer::{TransferEngine, TransferOutcome, TransferRequest};

/// Filters accepted by [`StockService::list_lots`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LotFilter {
    pub refrigerator_id: Option<RefrigeratorId>,
    /// Evaluated against the service's [`StatusConfig`] at call time.
    pub status: Option<StockStatus>,
}

/// Application-facing facade over the ledger.
pub struct StockService<D: RefrigeratorDirectory> {
    registry: Arc<LotRegistry>,
    transfers: TransferEngine,
    reservations: ReservationManager,
    log: Arc<TransferLog>,
    directory: D,
    status_config: StatusConfig,
    max_retries: u32,
}

impl<D: RefrigeratorDirectory> StockService<D> {
    pub fn new(directory: D) -> Self {
        Self::with_config(directory, RegistryConfig::default(), StatusConfig::default())
    }

    pub fn with_config(
        directory: D,
        registry_config: RegistryConfig,
        status_config: StatusConfig,
    ) -> Self {
        let registry = Arc::new(LotRegistry::new(registry_config));
        let log = Arc::new(TransferLog::new());
        Self {
            transfers: TransferEngine::new(registry.clone(), log.clone()),
            reservations: ReservationManager::new(registry.clone()),
            registry,
            log,
            directory,
            status_config,
            max_retries: registry_config.max_retries,
        }
    }

    pub fn status_config(&self) -> &StatusConfig {
        &self.status_config
    }

    /// Register stock received manually at a location.
    #[instrument(
        skip(self),
        fields(tenant_id = %tenant_id, vaccine_id = %vaccine_id, refrigerator_id = %refrigerator_id),
        err
    )]
    pub fn register_lot(
        &self,
        tenant_id: TenantId,
        vaccine_id: VaccineId,
        lot_number: &str,
        refrigerator_id: RefrigeratorId,
        quantity: i64,
        expiry_date: DateTime<Utc>,
        minimum_threshold: Option<i64>,
    ) -> LedgerResult<VaccineLotRecord> {
        if lot_number.trim().is_empty() {
            return Err(LedgerError::validation("lot number cannot be empty"));
        }
        if !self.directory.exists(refrigerator_id) {
            return Err(LedgerError::not_found(format!(
                "refrigerator {refrigerator_id} is not registered"
            )));
        }
        let key = LotKey {
            tenant_id,
            vaccine_id,
            lot_number: lot_number.to_string(),
            refrigerator_id,
        };
        self.surface(
            self.registry
                .insert_new(key, quantity, expiry_date, minimum_threshold),
        )
    }

    /// Tenant-scoped listing with optional location and status filters.
    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    pub fn list_lots(&self, tenant_id: TenantId, filter: &LotFilter) -> Vec<VaccineLotRecord> {
        let now = Utc::now();
        self.registry
            .list(tenant_id)
            .into_iter()
            .filter(|r| match filter.refrigerator_id {
                Some(fridge) => r.key().refrigerator_id == fridge,
                None => true,
            })
            .filter(|r| match filter.status {
                Some(status) => evaluate(r, now, &self.status_config) == status,
                None => true,
            })
            .collect()
    }

    /// Every lot whose status is not `Ok`, paired with that status.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub fn stock_alerts(&self, tenant_id: TenantId) -> Vec<(VaccineLotRecord, StockStatus)> {
        let now = Utc::now();
        self.registry
            .list(tenant_id)
            .into_iter()
            .map(|r| {
                let status = evaluate(&r, now, &self.status_config);
                (r, status)
            })
            .filter(|(_, status)| status.is_alert())
            .collect()
    }

    /// Move stock between refrigerators.
    ///
    /// Retried internally (bounded) on retryable conflicts only; a conflict
    /// always means the prior attempt wrote nothing, so the retry cannot
    /// double-move stock.
    #[instrument(
        skip(self, request),
        fields(tenant_id = %request.tenant_id, quantity = request.quantity),
        err
    )]
    pub fn transfer(&self, request: &TransferRequest) -> LedgerResult<TransferOutcome> {
        if !self.directory.exists(request.from_refrigerator_id) {
            return Err(LedgerError::not_found(format!(
                "refrigerator {} is not registered",
                request.from_refrigerator_id
            )));
        }
        if !self.directory.exists(request.to_refrigerator_id) {
            return Err(LedgerError::not_found(format!(
                "refrigerator {} is not registered",
                request.to_refrigerator_id
            )));
        }
        self.with_retries("transfer", || self.transfers.transfer(request))
    }

    #[instrument(skip(self), err)]
    pub fn reserve(&self, record_id: LotRecordId, quantity: i64) -> LedgerResult<VaccineLotRecord> {
        self.with_retries("reserve", || self.reservations.reserve(record_id, quantity))
    }

    #[instrument(skip(self), err)]
    pub fn release(&self, record_id: LotRecordId, quantity: i64) -> LedgerResult<VaccineLotRecord> {
        self.with_retries("release", || self.reservations.release(record_id, quantity))
    }

    #[instrument(skip(self), err)]
    pub fn consume(&self, record_id: LotRecordId, quantity: i64) -> LedgerResult<VaccineLotRecord> {
        self.with_retries("consume", || self.reservations.consume(record_id, quantity))
    }

    /// Snapshot of one ledger row.
    pub fn get_lot(&self, record_id: LotRecordId) -> LedgerResult<VaccineLotRecord> {
        self.surface(self.registry.get(record_id))
    }

    /// Committed transfers for a tenant, in commit order.
    pub fn transfer_history(&self, tenant_id: TenantId) -> Vec<TransferAuditEntry> {
        self.log.list_for_tenant(tenant_id)
    }

    fn with_retries<T>(&self, operation: &str, op: impl Fn() -> LedgerResult<T>) -> LedgerResult<T> {
        let mut attempt = 0;
        loop {
            match op() {
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(operation, attempt, "retrying after transactional conflict");
                }
                other => return self.surface(other),
            }
        }
    }

    /// Invariant violations indicate a bug in the ledger itself. They are
    /// logged at error severity and replaced by an opaque failure; callers
    /// never see the raw message.
    fn surface<T>(&self, result: LedgerResult<T>) -> LedgerResult<T> {
        match result {
            Err(LedgerError::InvariantViolation(msg)) => {
                error!(%msg, "ledger invariant violated");
                Err(LedgerError::Internal)
            }
            other => other,
        }
    }
}
