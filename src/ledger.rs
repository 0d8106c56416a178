pub const CASH_EPSILON: f64 = 1e-6;

/// Single source of truth for available cash during a run. Every position
/// open is an atomic debit, every close an atomic credit. Invariant:
/// `cash_on_hand + committed == initial_capital + realized_pnl`, and cash
/// never goes negative.
#[derive(Debug, Clone)]
pub struct CashLedger {
    initial_capital: f64,
    cash_on_hand: f64,
    committed: f64,
    realized_pnl: f64,
}

impl CashLedger {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash_on_hand: initial_capital,
            committed: 0.0,
            realized_pnl: 0.0,
        }
    }

    pub fn cash_on_hand(&self) -> f64 {
        self.cash_on_hand
    }

    pub fn can_afford(&self, amount: f64) -> bool {
        amount <= self.cash_on_hand + CASH_EPSILON
    }

    /// Debit cash for a position entry. Callers check `can_afford` first;
    /// returns false (and leaves the ledger untouched) if they did not.
    pub fn open_position(&mut self, cost: f64) -> bool {
        if !self.can_afford(cost) || cost < 0.0 {
            return false;
        }
        self.cash_on_hand -= cost;
        self.committed += cost;
        true
    }

    /// Credit exit proceeds for a position entered at `cost`.
    pub fn close_position(&mut self, cost: f64, proceeds: f64) {
        self.cash_on_hand += proceeds;
        self.committed -= cost;
        self.realized_pnl += proceeds - cost;
    }

    /// Cash-conservation check: cash plus committed capital must equal the
    /// initial capital adjusted by realized P&L.
    pub fn is_balanced(&self) -> bool {
        let expected = self.initial_capital + self.realized_pnl;
        (self.cash_on_hand + self.committed - expected).abs() <= CASH_EPSILON
            && self.cash_on_hand >= -CASH_EPSILON
    }
}
