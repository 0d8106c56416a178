pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod models;
pub mod performance;
pub mod runner;
pub mod sizing;
pub mod valuation;
pub mod xirr;

pub use config::{PositionSizingMethod, SimulationConfig};
pub use engine::Engine;
pub use error::SimulationError;
pub use models::SimulationResult;
pub use valuation::{NoPrices, PriceSource, PriceTable};
