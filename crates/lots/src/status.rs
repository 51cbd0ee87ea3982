//! Pure stock-health classification.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::record::VaccineLotRecord;

/// Health status of one ledger row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Expired,
    ExpiringSoon,
    OutOfStock,
    LowStock,
    Ok,
}

impl StockStatus {
    pub fn is_alert(&self) -> bool {
        !matches!(self, StockStatus::Ok)
    }
}

/// Evaluation knobs, owned by the embedding application.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConfig {
    /// A lot expiring within this many days of `now` reports `ExpiringSoon`.
    pub expiring_soon_window_days: i64,
    /// Threshold used when the record carries none of its own.
    pub default_minimum_threshold: i64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            expiring_soon_window_days: 30,
            default_minimum_threshold: 10,
        }
    }
}

/// Classify a row's health at `now`. First match wins; the precedence
/// (expiry conditions before quantity conditions) is load-bearing: an expired
/// empty lot reports `Expired`, not `OutOfStock`.
///
/// No I/O; callable over already-loaded snapshots for dashboards and alerts.
pub fn evaluate(record: &VaccineLotRecord, now: DateTime<Utc>, config: &StatusConfig) -> StockStatus {
    if record.expiry_date() < now {
        return StockStatus::Expired;
    }
    if record.expiry_date() <= now + Duration::days(config.expiring_soon_window_days) {
        return StockStatus::ExpiringSoon;
    }
    let available = record.available_quantity();
    if available <= 0 {
        return StockStatus::OutOfStock;
    }
    let threshold = record
        .minimum_threshold()
        .unwrap_or(config.default_minimum_threshold);
    if available <= threshold {
        return StockStatus::LowStock;
    }
    StockStatus::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LotKey;
    use vaxledger_core::{LotRecordId, RefrigeratorId, TenantId, VaccineId};

    fn record(quantity: i64, reserved: i64, expiry: DateTime<Utc>, threshold: Option<i64>) -> VaccineLotRecord {
        let key = LotKey {
            tenant_id: TenantId::new(),
            vaccine_id: VaccineId::new(),
            lot_number: "L-1".to_string(),
            refrigerator_id: RefrigeratorId::new(),
        };
        VaccineLotRecord::new(LotRecordId::new(1), key, quantity, expiry, threshold)
            .unwrap()
            .with_deltas(0, reserved)
            .unwrap()
    }

    fn cfg() -> StatusConfig {
        StatusConfig::default()
    }

    #[test]
    fn healthy_lot_is_ok() {
        let now = Utc::now();
        let rec = record(100, 0, now + Duration::days(180), Some(10));
        assert_eq!(evaluate(&rec, now, &cfg()), StockStatus::Ok);
    }

    #[test]
    fn expired_wins_over_out_of_stock() {
        let now = Utc::now();
        let rec = record(0, 0, now - Duration::days(1), Some(10));
        assert_eq!(evaluate(&rec, now, &cfg()), StockStatus::Expired);
    }

    #[test]
    fn expiring_soon_wins_over_low_stock() {
        let now = Utc::now();
        let rec = record(3, 0, now + Duration::days(7), Some(10));
        assert_eq!(evaluate(&rec, now, &cfg()), StockStatus::ExpiringSoon);
    }

    #[test]
    fn out_of_stock_counts_reservations() {
        let now = Utc::now();
        // 20 doses all reserved: nothing available.
        let rec = record(20, 20, now + Duration::days(180), Some(10));
        assert_eq!(evaluate(&rec, now, &cfg()), StockStatus::OutOfStock);
    }

    #[test]
    fn low_stock_respects_per_lot_threshold() {
        let now = Utc::now();
        let rec = record(15, 0, now + Duration::days(180), Some(20));
        assert_eq!(evaluate(&rec, now, &cfg()), StockStatus::LowStock);
    }

    #[test]
    fn missing_threshold_falls_back_to_default_of_ten() {
        let now = Utc::now();
        let at_default = record(10, 0, now + Duration::days(180), None);
        assert_eq!(evaluate(&at_default, now, &cfg()), StockStatus::LowStock);

        let above_default = record(11, 0, now + Duration::days(180), None);
        assert_eq!(evaluate(&above_default, now, &cfg()), StockStatus::Ok);
    }

    #[test]
    fn window_is_configurable() {
        let now = Utc::now();
        let rec = record(100, 0, now + Duration::days(45), Some(10));
        assert_eq!(evaluate(&rec, now, &cfg()), StockStatus::Ok);

        let wide = StatusConfig {
            expiring_soon_window_days: 60,
            ..StatusConfig::default()
        };
        assert_eq!(evaluate(&rec, now, &wide), StockStatus::ExpiringSoon);
    }
}
