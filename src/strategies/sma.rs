//! Simple moving average reference strategy
//!
//! Despite the name this is a single-tick threshold rule: BUY when the tick
//! price is strictly above the threshold, SELL otherwise. Existing callers
//! depend on exactly this behaviour.

use rust_decimal::Decimal;

use crate::core::{MarketData, OrderIntent, Result, Side};

use super::Strategy;

/// Threshold parameters
#[derive(Debug, Clone)]
pub struct SmaParams {
    /// Prices strictly above this buy
    pub threshold: Decimal,
    /// Quantity per intent
    pub quantity: Decimal,
}

impl Default for SmaParams {
    fn default() -> Self {
        Self {
            threshold: Decimal::from(150),
            quantity: Decimal::from(100),
        }
    }
}

/// Simple moving average strategy
pub struct SimpleMovingAverageStrategy {
    params: SmaParams,
}

impl SimpleMovingAverageStrategy {
    pub fn new(params: SmaParams) -> Self {
        tracing::info!(
            "Initializing simple_moving_average: threshold {}, quantity {}",
            params.threshold,
            params.quantity
        );
        Self { params }
    }

    pub fn params(&self) -> &SmaParams {
        &self.params
    }
}

impl Default for SimpleMovingAverageStrategy {
    fn default() -> Self {
        Self::new(SmaParams::default())
    }
}

impl Strategy for SimpleMovingAverageStrategy {
    fn name(&self) -> &str {
        "simple_moving_average"
    }

    fn execute(&self, data: &MarketData) -> Result<Vec<OrderIntent>> {
        let side = if data.price() > self.params.threshold {
            Side::Buy
        } else {
            Side::Sell
        };

        Ok(vec![OrderIntent::market(
            data.symbol().clone(),
            side,
            self.params.quantity,
            data.price(),
        )])
    }
}
