use crate::models::{ActivePosition, Position};
use crate::performance::round_cents;
use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub price: f64,
    pub date: NaiveDate,
}

/// Market price lookup supplied by the caller. Used only to value positions
/// that are still open at simulation end; the engine performs no other
/// market-data access.
pub trait PriceSource {
    /// Most recent available price for `symbol` at or before `as_of`.
    fn latest_price(&self, symbol: &str, as_of: NaiveDate) -> Option<PriceQuote>;
}

/// Price source with no data; every still-active position falls back to its
/// entry price.
pub struct NoPrices;

impl PriceSource for NoPrices {
    fn latest_price(&self, _symbol: &str, _as_of: NaiveDate) -> Option<PriceQuote> {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// In-memory per-symbol price series with latest-at-or-before lookup.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    series: HashMap<String, Vec<PricePoint>>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_series(raw: HashMap<String, Vec<PricePoint>>) -> Self {
        let mut series = raw;
        for points in series.values_mut() {
            points.sort_by_key(|point| point.date);
            points.retain(|point| point.close.is_finite() && point.close > 0.0);
        }
        Self { series }
    }

    pub fn insert(&mut self, symbol: &str, date: NaiveDate, close: f64) {
        let points = self.series.entry(symbol.to_string()).or_default();
        points.push(PricePoint { date, close });
        points.sort_by_key(|point| point.date);
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl PriceSource for PriceTable {
    fn latest_price(&self, symbol: &str, as_of: NaiveDate) -> Option<PriceQuote> {
        let points = self.series.get(symbol)?;
        let idx = points.partition_point(|point| point.date <= as_of);
        if idx == 0 {
            return None;
        }
        let point = &points[idx - 1];
        Some(PriceQuote {
            price: point.close,
            date: point.date,
        })
    }
}

/// Mark a still-open position to market as of `as_of`. A price-lookup miss is
/// non-fatal: the position is valued at its entry price and annotated with
/// `price_date = entry_date` so the caller can tell the valuation is stale.
/// The cash ledger is not touched; the capital stays notionally committed.
pub fn value_position(
    position: &Position,
    as_of: NaiveDate,
    prices: &dyn PriceSource,
) -> ActivePosition {
    let quote = prices.latest_price(&position.symbol, as_of);
    let (current_price, price_date) = match quote {
        Some(quote) => (quote.price, quote.date),
        None => {
            warn!(
                "No price for {} at or before {}; valuing at entry price",
                position.symbol, as_of
            );
            (position.entry_price, position.entry_date)
        }
    };

    let current_value = round_cents(position.shares as f64 * current_price);
    let unrealized_pnl =
        round_cents(position.shares as f64 * (current_price - position.entry_price));
    let unrealized_return_pct =
        round_cents((current_price - position.entry_price) / position.entry_price * 100.0);

    ActivePosition {
        symbol: position.symbol.clone(),
        shares: position.shares,
        entry_date: position.entry_date,
        entry_price: position.entry_price,
        current_price,
        price_date,
        current_value,
        unrealized_pnl,
        unrealized_return_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PositionStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn open_position(symbol: &str, shares: i64, entry_price: f64) -> Position {
        Position {
            symbol: symbol.to_string(),
            shares,
            entry_date: date(2024, 2, 1),
            entry_price,
            cost: shares as f64 * entry_price,
            status: PositionStatus::StillActive,
            scheduled_exit: None,
        }
    }

    #[test]
    fn looks_up_latest_price_at_or_before_date() {
        let mut table = PriceTable::new();
        table.insert("INFY", date(2024, 3, 1), 105.0);
        table.insert("INFY", date(2024, 3, 8), 112.0);
        table.insert("INFY", date(2024, 3, 15), 118.0);

        let quote = table.latest_price("INFY", date(2024, 3, 10)).unwrap();
        assert_eq!(quote.price, 112.0);
        assert_eq!(quote.date, date(2024, 3, 8));

        let quote = table.latest_price("INFY", date(2024, 3, 15)).unwrap();
        assert_eq!(quote.price, 118.0);

        assert!(table.latest_price("INFY", date(2024, 2, 28)).is_none());
        assert!(table.latest_price("TCS", date(2024, 3, 10)).is_none());
    }

    #[test]
    fn values_position_at_market() {
        let mut table = PriceTable::new();
        table.insert("INFY", date(2024, 3, 8), 110.0);

        let report = value_position(&open_position("INFY", 40, 100.0), date(2024, 3, 31), &table);
        assert_eq!(report.current_price, 110.0);
        assert_eq!(report.price_date, date(2024, 3, 8));
        assert!((report.current_value - 4_400.0).abs() < 1e-9);
        assert!((report.unrealized_pnl - 400.0).abs() < 1e-9);
        assert!((report.unrealized_return_pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_entry_price_on_lookup_miss() {
        let report =
            value_position(&open_position("TCS", 10, 250.0), date(2024, 3, 31), &NoPrices);
        assert_eq!(report.current_price, 250.0);
        assert_eq!(report.price_date, date(2024, 2, 1));
        assert!((report.unrealized_pnl).abs() < 1e-9);
        assert!((report.unrealized_return_pct).abs() < 1e-9);
    }
}
