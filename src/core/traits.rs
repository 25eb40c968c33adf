//! Core traits - Seams to external collaborators

use async_trait::async_trait;
use crate::core::{Result, types::MarketData};

/// Inbound market data feed.
///
/// Implementations deliver ticks in whatever order the transport provides;
/// duplicates and out-of-order delivery are passed through untouched.
#[async_trait]
pub trait MarketFeed: Send {
    /// Next tick, `Some(Err(_))` for a record that could not be decoded,
    /// `None` once the feed is closed or unsubscribed.
    async fn next_tick(&mut self) -> Option<Result<MarketData>>;

    /// Feed name for logging
    fn name(&self) -> &str;
}
