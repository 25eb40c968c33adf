//! Backtest runner - deterministic replay through the live pipeline
//!
//! Ticks are fed in order, synchronously, with no time-based delay. With
//! `auto_execute` every accepted order is filled immediately as a simulated
//! execution event.

use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::core::{Config, DispatchMode, MarketData, OrderIntent, Result};
use crate::engine::TradingEngine;
use crate::feeds::decode_record;

/// What the pipeline decided for one intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Accepted,
    Executed,
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    /// Index of the tick in the replayed sequence
    pub tick: usize,
    pub strategy: String,
    pub intent: OrderIntent,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultRecord {
    pub tick: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestReport {
    pub ticks: usize,
    pub decisions: Vec<Decision>,
    pub faults: Vec<FaultRecord>,
}

impl BacktestReport {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.decisions.iter().filter(|d| pred(&d.outcome)).count()
    }

    /// Accepted orders, executed or not
    pub fn accepted(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Accepted | Outcome::Executed))
    }

    pub fn executed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Executed))
    }

    pub fn rejected(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Rejected(_)))
    }
}

/// Backtest runner
pub struct BacktestRunner {
    engine: TradingEngine,
    auto_execute: bool,
}

impl BacktestRunner {
    pub fn new(engine: TradingEngine) -> Self {
        Self {
            engine,
            auto_execute: true,
        }
    }

    /// Fresh engine from `config`, always with sequential dispatch.
    pub fn from_config(config: &Config) -> Self {
        let mut config = config.clone();
        config.engine.dispatch = DispatchMode::Sequential;
        Self::new(TradingEngine::from_config(&config)).with_auto_execute(config.backtest.auto_execute)
    }

    pub fn with_auto_execute(mut self, auto_execute: bool) -> Self {
        self.auto_execute = auto_execute;
        self
    }

    pub fn engine(&self) -> &TradingEngine {
        &self.engine
    }

    pub fn into_engine(self) -> TradingEngine {
        self.engine
    }

    /// Replay `history` in order.
    pub fn run(&self, history: impl IntoIterator<Item = MarketData>) -> BacktestReport {
        let mut report = BacktestReport::default();

        for (tick, data) in history.into_iter().enumerate() {
            let outcome = self.engine.on_market_data(&data);
            report.ticks += 1;

            report.faults.extend(outcome.faults.iter().map(|f| FaultRecord {
                tick,
                message: f.to_string(),
            }));

            for placement in outcome.placements {
                let outcome = match &placement.result {
                    Ok(id) if self.auto_execute => match self.engine.execute_order(id) {
                        Ok(_) => Outcome::Executed,
                        Err(e) => {
                            warn!("Simulated fill failed for {}: {}", id, e);
                            Outcome::Accepted
                        }
                    },
                    Ok(_) => Outcome::Accepted,
                    Err(e) => Outcome::Rejected(e.to_string()),
                };
                report.decisions.push(Decision {
                    tick,
                    strategy: placement.strategy,
                    intent: placement.intent,
                    outcome,
                });
            }
        }

        info!(
            "Backtest done: {} ticks, {} accepted, {} executed, {} rejected, {} faults",
            report.ticks,
            report.accepted(),
            report.executed(),
            report.rejected(),
            report.faults.len()
        );
        report
    }
}

/// Load a JSON-lines history file of `{symbol, price, volume}` records.
/// Blank lines are skipped; a malformed line fails the load.
pub fn load_history(path: &Path) -> Result<Vec<MarketData>> {
    let content = std::fs::read_to_string(path)?;
    parse_history(&content)
}

pub fn parse_history(content: &str) -> Result<Vec<MarketData>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            decode_record(line).map_err(|e| crate::core::Error::Feed(format!("line {}: {}", n + 1, e)))
        })
        .collect()
}
