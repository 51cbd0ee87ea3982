//! `vaxledger-lots` — pure vaccine-lot domain model.
//!
//! The mutable entity (`VaccineLotRecord`), its quantity invariants, the pure
//! stock-health evaluator, and read-only cold-storage context types. No I/O
//! and no locking here; the transactional machinery lives in `vaxledger-stock`.

pub mod record;
pub mod refrigerator;
pub mod status;

pub use record::{LotKey, VaccineLotRecord};
pub use refrigerator::{Refrigerator, TemperatureRange};
pub use status::{evaluate, StatusConfig, StockStatus};
