//! Strategy traits and runner

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::core::{DispatchMode, Error, MarketData, OrderIntent, Result};

/// Base strategy trait
///
/// `execute` must return in bounded time; it runs on the market data path.
pub trait Strategy: Send + Sync {
    /// Strategy name
    fn name(&self) -> &str;

    /// Process one tick and propose zero or more trades
    fn execute(&self, data: &MarketData) -> Result<Vec<OrderIntent>>;
}

/// An intent tagged with the strategy that emitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyIntent {
    pub strategy: String,
    pub intent: OrderIntent,
}

/// Everything the registered strategies produced for one tick.
#[derive(Debug, Default)]
pub struct Dispatch {
    /// Intents in registration order, then emission order
    pub intents: Vec<StrategyIntent>,
    /// One [`Error::StrategyFault`] per strategy that failed
    pub faults: Vec<Error>,
}

const SLOW_STRATEGY: Duration = Duration::from_millis(50);

/// Strategy runner - dispatches ticks to every registered strategy
pub struct StrategyRunner {
    strategies: Vec<Box<dyn Strategy>>,
    mode: DispatchMode,
}

impl StrategyRunner {
    pub fn new(mode: DispatchMode) -> Self {
        Self {
            strategies: vec![],
            mode,
        }
    }

    pub fn with_strategies(mode: DispatchMode, strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies, mode }
    }

    pub fn add_strategy(&mut self, strategy: impl Strategy + 'static) {
        self.strategies.push(Box::new(strategy));
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Deliver `data` to all strategies. A failing strategy is reported in
    /// [`Dispatch::faults`] and never stops the others.
    pub fn dispatch(&self, data: &MarketData) -> Dispatch {
        debug!(
            "Dispatching {} @ {} to {} strategies",
            data.symbol(),
            data.price(),
            self.strategies.len()
        );

        let results: Vec<Result<Vec<OrderIntent>>> = match self.mode {
            DispatchMode::Sequential => self
                .strategies
                .iter()
                .map(|s| run_isolated(s.as_ref(), data))
                .collect(),
            DispatchMode::Parallel => self.dispatch_parallel(data),
        };

        let mut dispatch = Dispatch::default();
        for (strategy, result) in self.strategies.iter().zip(results) {
            match result {
                Ok(intents) => dispatch.intents.extend(intents.into_iter().map(|intent| StrategyIntent {
                    strategy: strategy.name().to_string(),
                    intent,
                })),
                Err(fault) => {
                    warn!("{}", fault);
                    dispatch.faults.push(fault);
                }
            }
        }
        dispatch
    }

    fn dispatch_parallel(&self, data: &MarketData) -> Vec<Result<Vec<OrderIntent>>> {
        let scoped = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = self
                .strategies
                .iter()
                .map(|s| scope.spawn(move |_| run_isolated(s.as_ref(), data)))
                .collect();

            handles
                .into_iter()
                .zip(&self.strategies)
                .map(|(handle, s)| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| Err(fault(s.name(), panic_message(payload.as_ref()))))
                })
                .collect::<Vec<_>>()
        });

        scoped.unwrap_or_else(|payload| {
            let reason = panic_message(payload.as_ref());
            self.strategies
                .iter()
                .map(|s| Err(fault(s.name(), reason.clone())))
                .collect()
        })
    }
}

impl Default for StrategyRunner {
    fn default() -> Self {
        Self::new(DispatchMode::default())
    }
}

fn run_isolated(strategy: &dyn Strategy, data: &MarketData) -> Result<Vec<OrderIntent>> {
    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| strategy.execute(data)));

    let elapsed = started.elapsed();
    if elapsed > SLOW_STRATEGY {
        warn!("Strategy {} took {:?} on {}", strategy.name(), elapsed, data.symbol());
    }

    match outcome {
        Ok(Ok(intents)) => Ok(intents),
        Ok(Err(e)) => Err(fault(strategy.name(), e.to_string())),
        Err(payload) => Err(fault(strategy.name(), format!("panicked: {}", panic_message(payload.as_ref())))),
    }
}

fn fault(strategy: &str, reason: String) -> Error {
    Error::StrategyFault {
        strategy: strategy.to_string(),
        reason,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
