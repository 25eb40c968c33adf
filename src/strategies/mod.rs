//! Trading strategies - Strategy framework

pub mod traits;
pub mod sma;

pub use traits::{Dispatch, Strategy, StrategyIntent, StrategyRunner};
pub use sma::{SimpleMovingAverageStrategy, SmaParams};

use crate::core::StrategyConfig;

/// Build strategies in configuration order.
pub fn from_config(configs: &[StrategyConfig]) -> Vec<Box<dyn Strategy>> {
    configs
        .iter()
        .map(|config| -> Box<dyn Strategy> {
            match config {
                StrategyConfig::SimpleMovingAverage { threshold, quantity } => {
                    Box::new(SimpleMovingAverageStrategy::new(SmaParams {
                        threshold: *threshold,
                        quantity: *quantity,
                    }))
                }
            }
        })
        .collect()
}
