//! Trading engine - market data -> strategies -> risk -> order book
//!
//! The engine is `Sync`: live feeds may call [`TradingEngine::on_market_data`]
//! from several tasks at once. All shared state sits in the risk engine and
//! order book, which serialize mutations per symbol and per order.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::{Config, Error, MarketData, Order, OrderId, OrderIntent, Result, Symbol};
use crate::dashboard::DashboardSnapshot;
use crate::execution::OrderBook;
use crate::risk::RiskEngine;
use crate::strategies::{self, Strategy, StrategyRunner};

/// Outcome of submitting one intent.
#[derive(Debug)]
pub struct Placement {
    pub strategy: String,
    pub intent: OrderIntent,
    pub result: Result<OrderId>,
}

impl Placement {
    pub fn order_id(&self) -> Option<OrderId> {
        self.result.as_ref().ok().copied()
    }

    pub fn is_accepted(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything that happened for one tick.
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// One entry per emitted intent, in emission order
    pub placements: Vec<Placement>,
    /// Strategies that failed on this tick
    pub faults: Vec<Error>,
}

impl TickOutcome {
    pub fn accepted(&self) -> impl Iterator<Item = OrderId> + '_ {
        self.placements.iter().filter_map(Placement::order_id)
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted().count()
    }

    pub fn rejected_count(&self) -> usize {
        self.placements.len() - self.accepted_count()
    }
}

/// Trading engine
pub struct TradingEngine {
    risk: Arc<RiskEngine>,
    book: OrderBook,
    runner: StrategyRunner,
}

impl TradingEngine {
    /// Engine with empty limits and book around `runner`.
    pub fn new(runner: StrategyRunner) -> Self {
        let risk = Arc::new(RiskEngine::new());
        Self {
            book: OrderBook::new(Arc::clone(&risk)),
            risk,
            runner,
        }
    }

    /// Engine wired from configuration: dispatch mode, strategies, limits.
    pub fn from_config(config: &Config) -> Self {
        let runner = StrategyRunner::with_strategies(
            config.engine.dispatch,
            strategies::from_config(&config.strategies),
        );
        let engine = Self::new(runner);
        for (symbol, limit) in config.exposure_limits() {
            engine.set_exposure_limit(symbol, limit);
        }
        info!(
            "Engine ready: {} strategies ({:?} dispatch), {} limits",
            engine.runner.len(),
            engine.runner.mode(),
            engine.risk.limits().len()
        );
        engine
    }

    pub fn add_strategy(&mut self, strategy: impl Strategy + 'static) {
        self.runner.add_strategy(strategy);
    }

    /// Sole external mutator of risk parameters.
    pub fn set_exposure_limit(&self, symbol: impl Into<Symbol>, limit: Decimal) {
        self.risk.set_exposure_limit(symbol, limit);
    }

    /// Run one tick through the pipeline. Every emitted intent is attempted;
    /// a failed placement never hides the others.
    pub fn on_market_data(&self, data: &MarketData) -> TickOutcome {
        let dispatch = self.runner.dispatch(data);

        let placements: Vec<Placement> = dispatch
            .intents
            .into_iter()
            .map(|tagged| {
                let result = self.book.place_order(&tagged.intent);
                Placement {
                    strategy: tagged.strategy,
                    intent: tagged.intent,
                    result,
                }
            })
            .collect();

        let outcome = TickOutcome {
            placements,
            faults: dispatch.faults,
        };
        debug!(
            "Tick {} @ {}: {} accepted, {} rejected, {} faults",
            data.symbol(),
            data.price(),
            outcome.accepted_count(),
            outcome.rejected_count(),
            outcome.faults.len()
        );
        outcome
    }

    /// Execution event (simulated fill or external ack).
    pub fn execute_order(&self, order_id: &OrderId) -> Result<Order> {
        self.book.execute_order(order_id)
    }

    pub fn cancel_order(&self, order_id: &OrderId) -> Result<Order> {
        self.book.cancel_order(order_id)
    }

    pub fn get_order(&self, order_id: &OrderId) -> Result<Order> {
        self.book.get_order(order_id)
    }

    pub fn risk(&self) -> &RiskEngine {
        &self.risk
    }

    pub fn order_book(&self) -> &OrderBook {
        &self.book
    }

    pub fn strategies(&self) -> &StrategyRunner {
        &self.runner
    }

    /// Read-only view for the dashboard.
    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot::capture(&self.book, &self.risk)
    }
}
