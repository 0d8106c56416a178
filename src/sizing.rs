use crate::config::{PositionSizingMethod, SimulationConfig};

/// Nominal cash allocation for a new position, capped at available cash.
///
/// EQUAL_WEIGHT splits the initial capital evenly across the concurrency
/// limit regardless of how many positions are presently open; PERCENTAGE is
/// a share of the initial capital, not of the running portfolio value. Pure
/// function, no side effects; the sizing parameter is validated with the
/// rest of the configuration before the run starts.
pub fn allocation_for(config: &SimulationConfig, cash_available: f64) -> f64 {
    let nominal = match config.position_sizing_method {
        PositionSizingMethod::FixedAmount => config.position_size_value,
        PositionSizingMethod::EqualWeight => {
            config.initial_capital / config.max_concurrent_positions as f64
        }
        PositionSizingMethod::Percentage => {
            config.initial_capital * (config.position_size_value / 100.0)
        }
    };
    nominal.min(cash_available)
}

/// Whole-share flooring: fractional shares are disallowed, so the actually
/// spent amount is `shares * entry_price`. Returns zero shares when the
/// allocation cannot buy one share or the price is unusable.
pub fn shares_for_allocation(allocation: f64, entry_price: f64) -> i64 {
    if entry_price <= 0.0 || !entry_price.is_finite() || !allocation.is_finite() {
        return 0;
    }
    let shares = (allocation / entry_price).floor();
    if shares < 1.0 {
        0
    } else {
        shares as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config(method: PositionSizingMethod, value: f64) -> SimulationConfig {
        SimulationConfig {
            initial_capital: 100_000.0,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            position_sizing_method: method,
            position_size_value: value,
            max_concurrent_positions: 10,
        }
    }

    #[test]
    fn fixed_amount_is_capped_at_available_cash() {
        let config = config(PositionSizingMethod::FixedAmount, 6_000.0);
        assert_eq!(allocation_for(&config, 50_000.0), 6_000.0);
        assert_eq!(allocation_for(&config, 4_000.0), 4_000.0);
    }

    #[test]
    fn equal_weight_splits_initial_capital_across_limit() {
        let config = config(PositionSizingMethod::EqualWeight, 1.0);
        assert_eq!(allocation_for(&config, 100_000.0), 10_000.0);
        // Independent of open count, but never more than cash on hand.
        assert_eq!(allocation_for(&config, 2_500.0), 2_500.0);
    }

    #[test]
    fn percentage_uses_initial_capital() {
        let config = config(PositionSizingMethod::Percentage, 15.0);
        assert_eq!(allocation_for(&config, 100_000.0), 15_000.0);
        assert_eq!(allocation_for(&config, 9_000.0), 9_000.0);
    }

    #[test]
    fn floors_to_whole_shares() {
        assert_eq!(shares_for_allocation(6_000.0, 100.0), 60);
        assert_eq!(shares_for_allocation(6_050.0, 100.0), 60);
        assert_eq!(shares_for_allocation(99.99, 100.0), 0);
        assert_eq!(shares_for_allocation(100.0, 100.0), 1);
    }

    #[test]
    fn rejects_unusable_prices() {
        assert_eq!(shares_for_allocation(10_000.0, 0.0), 0);
        assert_eq!(shares_for_allocation(10_000.0, -5.0), 0);
        assert_eq!(shares_for_allocation(10_000.0, f64::NAN), 0);
    }
}
