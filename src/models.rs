use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Hold => "HOLD",
        }
    }
}

impl FromStr for TradeAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(TradeAction::Buy),
            "SELL" => Ok(TradeAction::Sell),
            "HOLD" => Ok(TradeAction::Hold),
            other => Err(anyhow!("Unknown trade action '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeType {
    TargetHit,
    StopLossHit,
    Expired,
    Pending,
}

impl OutcomeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeType::TargetHit => "TARGET_HIT",
            OutcomeType::StopLossHit => "STOP_LOSS_HIT",
            OutcomeType::Expired => "EXPIRED",
            OutcomeType::Pending => "PENDING",
        }
    }
}

/// Resolved or pending exit information attached to a candidate by the
/// outcome-tracking collaborator. The engine never re-derives target or
/// stop-loss hits from price history; it trusts this descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeOutcome {
    #[serde(rename = "type")]
    pub outcome_type: OutcomeType,
    pub exit_price: Option<f64>,
    pub exit_date: Option<NaiveDate>,
}

/// One recommendation eligible for simulation. Immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeCandidate {
    pub symbol: String,
    pub action: TradeAction,
    pub recommendation_date: NaiveDate,
    pub entry_price: f64,
    #[serde(default)]
    pub target_price: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub outcome: Option<TradeOutcome>,
}

impl TradeCandidate {
    /// The exit the admission loop should schedule for this candidate, if its
    /// outcome is already resolved with a usable price and date. Anything else
    /// (no outcome, PENDING, or missing exit fields) leaves the position
    /// unresolved.
    pub fn resolved_exit(&self) -> Option<ScheduledExit> {
        let outcome = self.outcome.as_ref()?;
        if outcome.outcome_type == OutcomeType::Pending {
            return None;
        }
        match (outcome.exit_date, outcome.exit_price) {
            (Some(date), Some(price)) if price > 0.0 => Some(ScheduledExit {
                date,
                price,
                outcome: outcome.outcome_type,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Open,
    ClosedTarget,
    ClosedStoploss,
    ClosedExpired,
    StillActive,
}

impl PositionStatus {
    pub fn from_outcome(outcome: OutcomeType) -> Self {
        match outcome {
            OutcomeType::TargetHit => PositionStatus::ClosedTarget,
            OutcomeType::StopLossHit => PositionStatus::ClosedStoploss,
            OutcomeType::Expired => PositionStatus::ClosedExpired,
            OutcomeType::Pending => PositionStatus::StillActive,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            PositionStatus::ClosedTarget
                | PositionStatus::ClosedStoploss
                | PositionStatus::ClosedExpired
        )
    }
}

/// An open position owned by the event loop. Once closed it is snapshotted
/// into an immutable `TradeLogEntry` and removed from the open set.
#[derive(Debug, Clone)]
pub struct Position {
    pub symbol: String,
    pub shares: i64,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    /// Cash actually debited at entry: `shares * entry_price`, which may be
    /// below the nominal allocation due to whole-share flooring.
    pub cost: f64,
    pub status: PositionStatus,
    /// Exit already known at admission time, applied when the event loop
    /// reaches its date.
    pub scheduled_exit: Option<ScheduledExit>,
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduledExit {
    pub date: NaiveDate,
    pub price: f64,
    pub outcome: OutcomeType,
}

/// Immutable record of a completed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeLogEntry {
    pub symbol: String,
    pub action: TradeAction,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub shares: i64,
    pub pnl: f64,
    pub return_pct: f64,
    pub outcome: OutcomeType,
    pub days_held: i64,
}

/// A still-open position valued at simulation end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePosition {
    pub symbol: String,
    pub shares: i64,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub current_price: f64,
    /// Date the valuation price was observed. Equals `entry_date` when the
    /// price lookup missed and the entry price was used as a fallback.
    pub price_date: NaiveDate,
    pub current_value: f64,
    #[serde(rename = "unrealizedPnL")]
    pub unrealized_pnl: f64,
    pub unrealized_return_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashFlowKind {
    Entry,
    Exit,
    FinalValuation,
}

/// (date, signed amount) pair feeding the XIRR solver. Never mutated after
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowEvent {
    pub date: NaiveDate,
    pub amount: f64,
    pub kind: CashFlowKind,
}

impl CashFlowEvent {
    pub fn new(date: NaiveDate, amount: f64, kind: CashFlowKind) -> Self {
        Self { date, amount, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    NotBuy,
    OutsideWindow,
    MaxPositions,
    CashExhausted,
    AllocationTooSmall,
    InvalidEntryPrice,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotBuy => "NOT_BUY",
            SkipReason::OutsideWindow => "OUTSIDE_WINDOW",
            SkipReason::MaxPositions => "MAX_POSITIONS",
            SkipReason::CashExhausted => "CASH_EXHAUSTED",
            SkipReason::AllocationTooSmall => "ALLOCATION_TOO_SMALL",
            SkipReason::InvalidEntryPrice => "INVALID_ENTRY_PRICE",
        }
    }
}

/// A rejected candidate. Rejections are normal admission outcomes, not
/// errors, but every one of them is accounted for in the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSkip {
    pub symbol: String,
    pub recommendation_date: NaiveDate,
    pub reason: SkipReason,
}

/// Final report for one simulation run. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub initial_capital: f64,
    pub final_value: f64,
    pub total_return_pct: f64,
    /// Annualized money-weighted rate of return as a decimal (0.10 = 10%),
    /// or null when undefined or not convergent.
    pub xirr: Option<f64>,
    pub total_trades: i32,
    pub winning_trades: i32,
    pub losing_trades: i32,
    pub active_trades: i32,
    pub skipped_candidates: i32,
    pub win_rate: Option<f64>,
    pub avg_return_per_trade: Option<f64>,
    pub active_positions: Vec<ActivePosition>,
    pub trade_log: Vec<TradeLogEntry>,
    pub cash_flows: Vec<CashFlowEvent>,
    pub skips: Vec<CandidateSkip>,
}
