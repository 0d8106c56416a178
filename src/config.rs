use crate::error::SimulationError;
use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000.0;
pub const DEFAULT_POSITION_SIZE_VALUE: f64 = 10_000.0;
pub const DEFAULT_MAX_CONCURRENT_POSITIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSizingMethod {
    FixedAmount,
    EqualWeight,
    Percentage,
}

impl PositionSizingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSizingMethod::FixedAmount => "FIXED_AMOUNT",
            PositionSizingMethod::EqualWeight => "EQUAL_WEIGHT",
            PositionSizingMethod::Percentage => "PERCENTAGE",
        }
    }

    /// Parser usable as a clap `value_parser`.
    pub fn parse_arg(raw: &str) -> Result<Self, String> {
        Self::from_str(raw).map_err(|err| err.to_string())
    }
}

impl FromStr for PositionSizingMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "FIXED_AMOUNT" => Ok(PositionSizingMethod::FixedAmount),
            "EQUAL_WEIGHT" => Ok(PositionSizingMethod::EqualWeight),
            "PERCENTAGE" => Ok(PositionSizingMethod::Percentage),
            other => Err(anyhow!("Unknown position sizing method '{}'", other)),
        }
    }
}

/// Parameters for one simulation run. Validated as a whole before any
/// candidate is processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    pub initial_capital: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub position_sizing_method: PositionSizingMethod,
    /// Amount for FIXED_AMOUNT, percentage of initial capital for PERCENTAGE.
    /// Ignored by EQUAL_WEIGHT but still required to be positive.
    pub position_size_value: f64,
    pub max_concurrent_positions: usize,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(SimulationError::InvalidConfiguration(format!(
                "initialCapital must be positive (value: {})",
                self.initial_capital
            )));
        }
        if self.start_date > self.end_date {
            return Err(SimulationError::InvalidConfiguration(format!(
                "startDate {} must not be after endDate {}",
                self.start_date, self.end_date
            )));
        }
        if !self.position_size_value.is_finite() || self.position_size_value <= 0.0 {
            return Err(SimulationError::InvalidConfiguration(format!(
                "positionSizeValue must be positive (value: {})",
                self.position_size_value
            )));
        }
        if self.max_concurrent_positions == 0 {
            return Err(SimulationError::InvalidConfiguration(
                "maxConcurrentPositions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            start_date: NaiveDate::MIN,
            end_date: NaiveDate::MAX,
            position_sizing_method: PositionSizingMethod::FixedAmount,
            position_size_value: DEFAULT_POSITION_SIZE_VALUE,
            max_concurrent_positions: DEFAULT_MAX_CONCURRENT_POSITIONS,
        }
    }
}
