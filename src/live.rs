//! Live session - drives a market data feed into a shared engine
//!
//! Stopping the session stops delivery between ticks: a tick already handed
//! to the engine is always processed to completion, so order state is never
//! left half-updated.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::core::{Error, MarketFeed, Result};
use crate::engine::TradingEngine;

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub ticks: u64,
    pub malformed: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub faults: u64,
}

pub struct LiveSession {
    name: String,
    stop: watch::Sender<bool>,
    handle: JoinHandle<SessionStats>,
}

impl LiveSession {
    /// Start pumping `feed` into `engine` on the current tokio runtime.
    pub fn spawn<F>(engine: Arc<TradingEngine>, mut feed: F) -> Self
    where
        F: MarketFeed + 'static,
    {
        let name = feed.name().to_string();
        let (stop, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut stats = SessionStats::default();
            info!("Live session {} started", feed.name());

            loop {
                tokio::select! {
                    biased;
                    _ = stopped.changed() => break,
                    next = feed.next_tick() => match next {
                        None => break,
                        Some(Ok(data)) => {
                            // strategies may block, keep them off the async workers
                            let engine = Arc::clone(&engine);
                            let tick = tokio::task::spawn_blocking(move || engine.on_market_data(&data));
                            stats.ticks += 1;
                            match tick.await {
                                Ok(outcome) => {
                                    stats.accepted += outcome.accepted_count() as u64;
                                    stats.rejected += outcome.rejected_count() as u64;
                                    stats.faults += outcome.faults.len() as u64;
                                }
                                Err(e) => {
                                    error!("Tick processing on {} failed: {}", feed.name(), e);
                                    stats.faults += 1;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            warn!("Skipping malformed record on {}: {}", feed.name(), e);
                            stats.malformed += 1;
                        }
                    }
                }
            }

            info!("Live session {} finished: {:?}", feed.name(), stats);
            stats
        });

        Self { name, stop, handle }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop delivery and wait for the in-flight tick, if any.
    pub async fn stop(self) -> Result<SessionStats> {
        let _ = self.stop.send(true);
        self.join().await
    }

    /// Run until the feed ends or `shutdown` resolves, whichever comes first.
    pub async fn until<S: Future>(mut self, shutdown: S) -> Result<SessionStats> {
        tokio::select! {
            joined = &mut self.handle => {
                joined.map_err(|e| Error::Feed(format!("session {} failed: {}", self.name, e)))
            }
            _ = shutdown => {
                info!("Shutdown requested for {}", self.name);
                self.stop().await
            }
        }
    }

    /// Wait for the feed to end on its own.
    pub async fn join(self) -> Result<SessionStats> {
        self.handle
            .await
            .map_err(|e| Error::Feed(format!("session {} failed: {}", self.name, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MarketData, Symbol};
    use crate::feeds::{JsonLinesFeed, MarketDataBus};
    use crate::strategies::{SimpleMovingAverageStrategy, StrategyRunner};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn engine() -> Arc<TradingEngine> {
        let mut engine = TradingEngine::new(StrategyRunner::default());
        engine.set_exposure_limit("AAPL", dec!(10000));
        engine.add_strategy(SimpleMovingAverageStrategy::default());
        Arc::new(engine)
    }

    #[tokio::test]
    async fn test_session_counts_and_skips_malformed() {
        let input: &[u8] = b"{\"symbol\":\"AAPL\",\"price\":155}\nbroken\n{\"symbol\":\"AAPL\",\"price\":155}\n";
        let engine = engine();

        let stats = LiveSession::spawn(Arc::clone(&engine), JsonLinesFeed::new("stdin", input))
            .join()
            .await
            .unwrap();

        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.accepted, 2);
        assert_eq!(engine.risk().position(&Symbol::new("AAPL")), dec!(200));
    }

    #[tokio::test]
    async fn test_duplicates_are_not_deduplicated() {
        let bus = MarketDataBus::new("market-data", 16);
        let engine = engine();
        let session = LiveSession::spawn(Arc::clone(&engine), bus.subscribe());

        let tick = MarketData::now("AAPL", dec!(160));
        bus.publish(tick.clone());
        bus.publish(tick);
        bus.close();

        let stats = session.join().await.unwrap();
        assert_eq!(stats.ticks, 2);
        assert_eq!(engine.order_book().len(), 2);
    }

    #[tokio::test]
    async fn test_forwarded_feed_drives_session() {
        let input: &[u8] = b"{\"symbol\":\"AAPL\",\"price\":155}\n{\"symbol\":\"AAPL\"}\n{\"symbol\":\"AAPL\",\"price\":140}\n";
        let engine = engine();
        let bus = MarketDataBus::new("market-data", 16);
        let session = LiveSession::spawn(Arc::clone(&engine), bus.subscribe());

        let forwarded = bus.forward(JsonLinesFeed::new("stdin", input)).await;
        let stats = session.join().await.unwrap();

        assert_eq!(forwarded.published, 2);
        assert_eq!(forwarded.malformed, 1);
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.accepted, 2);
        assert_eq!(engine.risk().position(&Symbol::new("AAPL")), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_stop_halts_delivery() {
        let bus = MarketDataBus::new("market-data", 16);
        let engine = engine();
        let session = LiveSession::spawn(Arc::clone(&engine), bus.subscribe());

        let stats = session.stop().await.unwrap();
        assert_eq!(stats.ticks, 0);

        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(MarketData::now("AAPL", dec!(160))), 0);
        assert!(engine.order_book().is_empty());
    }

    #[tokio::test]
    async fn test_until_returns_when_feed_ends() {
        let input: &[u8] = b"{\"symbol\":\"AAPL\",\"price\":100}\n";
        let stats = LiveSession::spawn(engine(), JsonLinesFeed::new("stdin", input))
            .until(std::future::pending::<()>())
            .await
            .unwrap();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.accepted, 1);
    }

    #[tokio::test]
    async fn test_until_stops_on_shutdown() {
        let bus = MarketDataBus::new("market-data", 16);
        let stats = LiveSession::spawn(engine(), bus.subscribe())
            .until(async {})
            .await
            .unwrap();
        assert_eq!(stats, SessionStats::default());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_blocking_strategy_does_not_stall_runtime() {
        use crate::core::OrderIntent;
        use crate::core::Side;
        use crate::strategies::Strategy;
        use std::sync::mpsc;
        use std::time::Duration;

        /// Buys only if released by the test before timing out.
        struct Gated {
            release: parking_lot::Mutex<mpsc::Receiver<()>>,
        }

        impl Strategy for Gated {
            fn name(&self) -> &str {
                "gated"
            }

            fn execute(&self, data: &MarketData) -> Result<Vec<OrderIntent>> {
                match self.release.lock().recv_timeout(Duration::from_secs(2)) {
                    Ok(()) => Ok(vec![OrderIntent::market(data.symbol().clone(), Side::Buy, dec!(1), data.price())]),
                    Err(_) => Ok(vec![]),
                }
            }
        }

        let (tx, rx) = mpsc::channel();
        let mut engine = TradingEngine::new(StrategyRunner::default());
        engine.set_exposure_limit("AAPL", dec!(10));
        engine.add_strategy(Gated {
            release: parking_lot::Mutex::new(rx),
        });

        let bus = MarketDataBus::new("market-data", 4);
        let session = LiveSession::spawn(Arc::new(engine), bus.subscribe());
        assert_eq!(bus.publish(MarketData::now("AAPL", dec!(100))), 1);

        // the session task picks the tick up while this one sleeps
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        bus.close();

        let stats = session.join().await.unwrap();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.accepted, 1);
    }
}
