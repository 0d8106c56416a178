use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::ledger::CashLedger;
use crate::models::{
    CandidateSkip, CashFlowEvent, CashFlowKind, Position, PositionStatus, SimulationResult,
    SkipReason, TradeAction, TradeCandidate, TradeLogEntry,
};
use crate::performance::{assemble_result, round_cents};
use crate::sizing::{allocation_for, shares_for_allocation};
use crate::valuation::{value_position, PriceSource};
use chrono::NaiveDate;
use log::info;

/// Replays one expert's recommendation stream against a virtual portfolio.
///
/// A run is a purely sequential computation over candidates in ascending
/// recommendation-date order (ties broken by input order). Scheduled exits
/// are applied before any admission on or after their date, so capital and
/// concurrency slots released by a close are available to a same-day
/// candidate. For identical inputs the output is byte-identical; nothing in
/// the run reads the clock or a random source.
pub struct Engine {
    config: SimulationConfig,
}

struct RunState {
    ledger: CashLedger,
    open_positions: Vec<Position>,
    trade_log: Vec<TradeLogEntry>,
    cash_flows: Vec<CashFlowEvent>,
    skips: Vec<CandidateSkip>,
}

impl Engine {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run the full simulation. Fails only on invalid configuration; every
    /// other irregularity (no candidates, valuation misses, non-convergent
    /// XIRR) is absorbed into the result.
    pub fn run(
        &self,
        candidates: &[TradeCandidate],
        prices: &dyn PriceSource,
    ) -> Result<SimulationResult, SimulationError> {
        self.run_cancellable(candidates, prices, || false)
    }

    /// Same as `run`, with a cancellation check evaluated between successive
    /// candidates. No single step is unbounded, so this is the only
    /// interruption point a caller-supplied deadline needs.
    pub fn run_cancellable<F>(
        &self,
        candidates: &[TradeCandidate],
        prices: &dyn PriceSource,
        should_cancel: F,
    ) -> Result<SimulationResult, SimulationError>
    where
        F: Fn() -> bool,
    {
        self.config.validate()?;

        // Stable sort: candidates sharing a date keep their input order.
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by_key(|&idx| candidates[idx].recommendation_date);

        let mut state = RunState {
            ledger: CashLedger::new(self.config.initial_capital),
            open_positions: Vec::new(),
            trade_log: Vec::new(),
            cash_flows: Vec::new(),
            skips: Vec::new(),
        };

        for &idx in &order {
            if should_cancel() {
                return Err(SimulationError::Cancelled);
            }
            let candidate = &candidates[idx];
            Self::apply_exits_through(candidate.recommendation_date, &mut state);
            self.admit(candidate, &mut state);
        }

        Self::apply_exits_through(self.config.end_date, &mut state);
        debug_assert!(state.ledger.is_balanced());

        // Whatever is still open at the end of the window stays open; it is
        // marked STILL_ACTIVE and valued, never force-closed.
        for position in &mut state.open_positions {
            position.status = PositionStatus::StillActive;
        }
        let active_positions: Vec<_> = state
            .open_positions
            .iter()
            .map(|position| value_position(position, self.config.end_date, prices))
            .collect();

        let active_value: f64 = active_positions
            .iter()
            .map(|position| position.current_value)
            .sum();
        if !active_positions.is_empty() {
            state.cash_flows.push(CashFlowEvent::new(
                self.config.end_date,
                round_cents(active_value),
                CashFlowKind::FinalValuation,
            ));
        }

        let result = assemble_result(
            &self.config,
            state.ledger.cash_on_hand(),
            state.trade_log,
            active_positions,
            state.cash_flows,
            state.skips,
        );
        info!(
            "Simulation complete: {} closed, {} active, {} skipped, final value {:.2}",
            result.total_trades - result.active_trades,
            result.active_trades,
            result.skipped_candidates,
            result.final_value
        );
        Ok(result)
    }

    /// Online greedy admission: a rejected candidate is never reconsidered
    /// and an open position is never preempted for a later candidate.
    fn admit(&self, candidate: &TradeCandidate, state: &mut RunState) {
        if let Some(reason) = self.rejection_reason(candidate, state) {
            state.skips.push(CandidateSkip {
                symbol: candidate.symbol.clone(),
                recommendation_date: candidate.recommendation_date,
                reason,
            });
            return;
        }

        let allocation = allocation_for(&self.config, state.ledger.cash_on_hand());
        let shares = shares_for_allocation(allocation, candidate.entry_price);
        if shares == 0 {
            state.skips.push(CandidateSkip {
                symbol: candidate.symbol.clone(),
                recommendation_date: candidate.recommendation_date,
                reason: SkipReason::AllocationTooSmall,
            });
            return;
        }

        let cost = shares as f64 * candidate.entry_price;
        if !state.ledger.open_position(cost) {
            state.skips.push(CandidateSkip {
                symbol: candidate.symbol.clone(),
                recommendation_date: candidate.recommendation_date,
                reason: SkipReason::CashExhausted,
            });
            return;
        }

        state.cash_flows.push(CashFlowEvent::new(
            candidate.recommendation_date,
            -round_cents(cost),
            CashFlowKind::Entry,
        ));

        // An exit resolving after the window end leaves the position open as
        // of endDate; it goes to valuation instead.
        let scheduled_exit = candidate
            .resolved_exit()
            .map(|mut exit| {
                // Tolerate source rows whose exit predates the entry.
                if exit.date < candidate.recommendation_date {
                    exit.date = candidate.recommendation_date;
                }
                exit
            })
            .filter(|exit| exit.date <= self.config.end_date);

        state.open_positions.push(Position {
            symbol: candidate.symbol.clone(),
            shares,
            entry_date: candidate.recommendation_date,
            entry_price: candidate.entry_price,
            cost,
            status: PositionStatus::Open,
            scheduled_exit,
        });
    }

    fn rejection_reason(&self, candidate: &TradeCandidate, state: &RunState) -> Option<SkipReason> {
        if candidate.action != TradeAction::Buy {
            return Some(SkipReason::NotBuy);
        }
        if candidate.recommendation_date < self.config.start_date
            || candidate.recommendation_date > self.config.end_date
        {
            return Some(SkipReason::OutsideWindow);
        }
        if !candidate.entry_price.is_finite() || candidate.entry_price <= 0.0 {
            return Some(SkipReason::InvalidEntryPrice);
        }
        if state.open_positions.len() >= self.config.max_concurrent_positions {
            return Some(SkipReason::MaxPositions);
        }
        if state.ledger.cash_on_hand() <= 0.0 {
            return Some(SkipReason::CashExhausted);
        }
        None
    }

    /// Apply every scheduled exit dated at or before `through`, earliest
    /// first (ties by opening order). Each position leaves the open set
    /// exactly once, so re-running the same stream cannot double-close or
    /// double-credit.
    fn apply_exits_through(through: NaiveDate, state: &mut RunState) {
        loop {
            let next = state
                .open_positions
                .iter()
                .enumerate()
                .filter_map(|(idx, position)| {
                    position.scheduled_exit.map(|exit| (exit.date, idx))
                })
                .filter(|(date, _)| *date <= through)
                .min();
            let Some((_, idx)) = next else {
                break;
            };

            let mut position = state.open_positions.remove(idx);
            let Some(exit) = position.scheduled_exit.take() else {
                // The scan above only selects positions with a scheduled exit.
                break;
            };

            let proceeds = position.shares as f64 * exit.price;
            state.ledger.close_position(position.cost, proceeds);
            position.status = PositionStatus::from_outcome(exit.outcome);

            state.cash_flows.push(CashFlowEvent::new(
                exit.date,
                round_cents(proceeds),
                CashFlowKind::Exit,
            ));
            state.trade_log.push(TradeLogEntry {
                symbol: position.symbol,
                action: TradeAction::Buy,
                entry_date: position.entry_date,
                exit_date: exit.date,
                entry_price: position.entry_price,
                exit_price: exit.price,
                shares: position.shares,
                pnl: round_cents(position.shares as f64 * (exit.price - position.entry_price)),
                return_pct: round_cents(
                    (exit.price - position.entry_price) / position.entry_price * 100.0,
                ),
                outcome: exit.outcome,
                days_held: (exit.date - position.entry_date).num_days(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PositionSizingMethod;
    use crate::models::{OutcomeType, TradeOutcome};
    use crate::valuation::{NoPrices, PriceTable};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            initial_capital: 10_000.0,
            start_date: date(2024, 1, 1),
            end_date: date(2024, 12, 31),
            position_sizing_method: PositionSizingMethod::FixedAmount,
            position_size_value: 6_000.0,
            max_concurrent_positions: 5,
        }
    }

    fn buy(symbol: &str, on: NaiveDate, entry: f64) -> TradeCandidate {
        TradeCandidate {
            symbol: symbol.to_string(),
            action: TradeAction::Buy,
            recommendation_date: on,
            entry_price: entry,
            target_price: None,
            stop_loss: None,
            outcome: None,
        }
    }

    fn buy_closed(
        symbol: &str,
        on: NaiveDate,
        entry: f64,
        outcome: OutcomeType,
        exit_date: NaiveDate,
        exit_price: f64,
    ) -> TradeCandidate {
        TradeCandidate {
            outcome: Some(TradeOutcome {
                outcome_type: outcome,
                exit_price: Some(exit_price),
                exit_date: Some(exit_date),
            }),
            ..buy(symbol, on, entry)
        }
    }

    #[test]
    fn capital_exhaustion_admits_two_of_three() {
        let engine = Engine::new(config());
        let candidates = vec![
            buy("AAA", date(2024, 2, 1), 100.0),
            buy("BBB", date(2024, 2, 5), 100.0),
            buy("CCC", date(2024, 2, 10), 100.0),
        ];
        let result = engine.run(&candidates, &NoPrices).unwrap();

        // 60 shares, then 40 undersized shares, then cash is exhausted.
        assert_eq!(result.total_trades, 2);
        assert_eq!(result.active_trades, 2);
        assert_eq!(result.skipped_candidates, 1);
        assert_eq!(result.skips[0].reason, SkipReason::CashExhausted);
        assert_eq!(result.active_positions[0].shares, 60);
        assert_eq!(result.active_positions[1].shares, 40);
    }

    #[test]
    fn ignores_non_buy_and_out_of_window_candidates() {
        let engine = Engine::new(config());
        let mut sell = buy("AAA", date(2024, 2, 1), 100.0);
        sell.action = TradeAction::Sell;
        let candidates = vec![
            sell,
            buy("BBB", date(2023, 12, 31), 100.0),
            buy("CCC", date(2025, 1, 1), 100.0),
        ];
        let result = engine.run(&candidates, &NoPrices).unwrap();

        assert_eq!(result.total_trades, 0);
        assert_eq!(result.skipped_candidates, 3);
        assert_eq!(result.skips[0].reason, SkipReason::NotBuy);
        assert_eq!(result.skips[1].reason, SkipReason::OutsideWindow);
        assert_eq!(result.skips[2].reason, SkipReason::OutsideWindow);
        assert_eq!(result.final_value, 10_000.0);
    }

    #[test]
    fn enforces_concurrency_bound() {
        let mut cfg = config();
        cfg.position_size_value = 1_000.0;
        cfg.max_concurrent_positions = 2;
        let engine = Engine::new(cfg);
        let candidates: Vec<_> = (0..4)
            .map(|i| buy(&format!("S{}", i), date(2024, 3, 1 + i), 10.0))
            .collect();
        let result = engine.run(&candidates, &NoPrices).unwrap();

        assert_eq!(result.active_trades, 2);
        assert_eq!(result.skipped_candidates, 2);
        assert!(result
            .skips
            .iter()
            .all(|skip| skip.reason == SkipReason::MaxPositions));
    }

    #[test]
    fn same_day_exit_frees_slot_and_cash() {
        let mut cfg = config();
        cfg.max_concurrent_positions = 1;
        cfg.position_size_value = 10_000.0;
        let engine = Engine::new(cfg);
        let candidates = vec![
            buy_closed(
                "AAA",
                date(2024, 2, 1),
                100.0,
                OutcomeType::TargetHit,
                date(2024, 3, 1),
                120.0,
            ),
            buy("BBB", date(2024, 3, 1), 100.0),
        ];
        let result = engine.run(&candidates, &NoPrices).unwrap();

        assert_eq!(result.total_trades, 2);
        assert_eq!(result.winning_trades, 1);
        assert_eq!(result.active_trades, 1);
        assert_eq!(result.skipped_candidates, 0);
        // Exit proceeds (12_000) fund the second entry in full.
        assert_eq!(result.active_positions[0].shares, 100);
    }

    #[test]
    fn closes_positions_with_resolved_outcomes() {
        let engine = Engine::new(config());
        let candidates = vec![buy_closed(
            "AAA",
            date(2024, 2, 1),
            100.0,
            OutcomeType::StopLossHit,
            date(2024, 2, 20),
            90.0,
        )];
        let result = engine.run(&candidates, &NoPrices).unwrap();

        assert_eq!(result.total_trades, 1);
        assert_eq!(result.losing_trades, 1);
        let entry = &result.trade_log[0];
        assert_eq!(entry.outcome, OutcomeType::StopLossHit);
        assert_eq!(entry.shares, 60);
        assert!((entry.pnl - (-600.0)).abs() < 1e-9);
        assert!((entry.return_pct - (-10.0)).abs() < 1e-9);
        assert_eq!(entry.days_held, 19);
        // 10_000 - 6_000 + 5_400 committed back as cash.
        assert!((result.final_value - 9_400.0).abs() < 1e-9);
    }

    #[test]
    fn outcome_resolving_after_window_end_stays_active() {
        let engine = Engine::new(config());
        let candidates = vec![buy_closed(
            "AAA",
            date(2024, 11, 1),
            100.0,
            OutcomeType::TargetHit,
            date(2025, 2, 1),
            130.0,
        )];
        let mut prices = PriceTable::new();
        prices.insert("AAA", date(2024, 12, 20), 110.0);
        let result = engine.run(&candidates, &prices).unwrap();

        assert_eq!(result.total_trades, 1);
        assert_eq!(result.active_trades, 1);
        assert!(result.trade_log.is_empty());
        let position = &result.active_positions[0];
        assert_eq!(position.current_price, 110.0);
        assert_eq!(position.price_date, date(2024, 12, 20));
    }

    #[test]
    fn expired_with_zero_movement_counts_as_loss() {
        let engine = Engine::new(config());
        let candidates = vec![buy_closed(
            "AAA",
            date(2024, 2, 1),
            100.0,
            OutcomeType::Expired,
            date(2024, 5, 1),
            100.0,
        )];
        let result = engine.run(&candidates, &NoPrices).unwrap();

        assert_eq!(result.winning_trades, 0);
        assert_eq!(result.losing_trades, 1);
        assert_eq!(result.win_rate, Some(0.0));
    }

    #[test]
    fn cancellation_interrupts_between_candidates() {
        let engine = Engine::new(config());
        let candidates = vec![buy("AAA", date(2024, 2, 1), 100.0)];
        let result = engine.run_cancellable(&candidates, &NoPrices, || true);
        assert!(matches!(result, Err(SimulationError::Cancelled)));
    }

    #[test]
    fn invalid_config_fails_before_processing() {
        let mut cfg = config();
        cfg.initial_capital = -1.0;
        let engine = Engine::new(cfg);
        let result = engine.run(&[], &NoPrices);
        assert!(matches!(
            result,
            Err(SimulationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn empty_candidate_list_is_a_valid_run() {
        let engine = Engine::new(config());
        let result = engine.run(&[], &NoPrices).unwrap();
        assert_eq!(result.total_trades, 0);
        assert_eq!(result.xirr, None);
        assert_eq!(result.win_rate, None);
        assert_eq!(result.final_value, 10_000.0);
        assert_eq!(result.total_return_pct, 0.0);
    }

    #[test]
    fn resolved_outcome_without_exit_fields_stays_active() {
        let engine = Engine::new(config());
        let mut candidate = buy("AAA", date(2024, 2, 1), 100.0);
        candidate.outcome = Some(TradeOutcome {
            outcome_type: OutcomeType::TargetHit,
            exit_price: None,
            exit_date: None,
        });
        let result = engine.run(&[candidate], &NoPrices).unwrap();
        assert_eq!(result.active_trades, 1);
        assert!(result.trade_log.is_empty());
    }

    #[test]
    fn same_date_candidates_keep_input_order() {
        let mut cfg = config();
        cfg.max_concurrent_positions = 1;
        let engine = Engine::new(cfg);
        let candidates = vec![
            buy("FIRST", date(2024, 2, 1), 100.0),
            buy("SECOND", date(2024, 2, 1), 100.0),
        ];
        let result = engine.run(&candidates, &NoPrices).unwrap();
        assert_eq!(result.active_positions[0].symbol, "FIRST");
        assert_eq!(result.skips[0].symbol, "SECOND");
    }
}
