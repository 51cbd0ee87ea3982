//! `vaxledger-stock` — the transactional ledger engine.
//!
//! Everything that mutates a [`vaxledger_lots::VaccineLotRecord`] lives here
//! and goes through [`registry::LotRegistry`]'s transactional primitives:
//! row-level locks with bounded waits, ascending-id lock ordering for two-row
//! units of work, and all-or-nothing commit of staged rows.

pub mod audit;
pub mod directory;
pub mod registry;
pub mod reservation;
pub mod service;
pub mod transfer;

pub use audit::{TransferAuditEntry, TransferLog};
pub use directory::{InMemoryRefrigeratorDirectory, PermissiveDirectory, RefrigeratorDirectory};
pub use registry::{LedgerTxn, LotRegistry, RegistryConfig};
pub use reservation::ReservationManager;
pub use service::{LotFilter, StockService};
pub use transfer::{TransferEngine, TransferOutcome, TransferRequest};
