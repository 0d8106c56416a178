use crate::config::SimulationConfig;
use crate::models::{
    ActivePosition, CandidateSkip, CashFlowEvent, SimulationResult, TradeLogEntry,
};
use crate::xirr::calculate_xirr;
use statrs::statistics::Statistics;

/// Round a money or percentage value to two decimals for reporting.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to one decimal; used for the win rate.
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Assemble the immutable run report from the event loop's outputs.
///
/// A trade counts as winning only with strictly positive realized P&L;
/// break-even closes (including EXPIRED outcomes with no net movement) land
/// in `losing_trades`. The win rate denominator is closed trades only.
pub fn assemble_result(
    config: &SimulationConfig,
    cash_on_hand: f64,
    trade_log: Vec<TradeLogEntry>,
    active_positions: Vec<ActivePosition>,
    cash_flows: Vec<CashFlowEvent>,
    skips: Vec<CandidateSkip>,
) -> SimulationResult {
    let closed_trades = trade_log.len() as i32;
    let winning_trades = trade_log.iter().filter(|entry| entry.pnl > 0.0).count() as i32;
    let losing_trades = closed_trades - winning_trades;
    let active_trades = active_positions.len() as i32;

    let win_rate = if closed_trades > 0 {
        Some(round_tenth(
            winning_trades as f64 / closed_trades as f64 * 100.0,
        ))
    } else {
        None
    };

    let avg_return_per_trade = if closed_trades > 0 {
        let returns: Vec<f64> = trade_log.iter().map(|entry| entry.return_pct).collect();
        Some(round_cents(returns.mean()))
    } else {
        None
    };

    let active_value: f64 = active_positions
        .iter()
        .map(|position| position.current_value)
        .sum();
    let final_value = round_cents(cash_on_hand + active_value);
    let total_return_pct = round_cents(
        (final_value - config.initial_capital) / config.initial_capital * 100.0,
    );

    let xirr = calculate_xirr(&cash_flows);

    SimulationResult {
        initial_capital: config.initial_capital,
        final_value,
        total_return_pct,
        xirr,
        total_trades: closed_trades + active_trades,
        winning_trades,
        losing_trades,
        active_trades,
        skipped_candidates: skips.len() as i32,
        win_rate,
        avg_return_per_trade,
        active_positions,
        trade_log,
        cash_flows,
        skips,
    }
}
