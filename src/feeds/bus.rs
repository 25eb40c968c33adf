//! In-process publish/subscribe bus standing in for the broker topic

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::config::FeedConfig;
use crate::core::{MarketData, MarketFeed, Result};

use super::decode_record;

/// Counters for one forwarded feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    pub published: u64,
    /// Ticks no subscriber received (none attached, or all full)
    pub undelivered: u64,
    pub malformed: u64,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    senders: HashMap<u64, flume::Sender<MarketData>>,
}

/// Market data bus
///
/// Publishing never blocks: a subscriber whose buffer is full misses the tick.
#[derive(Clone)]
pub struct MarketDataBus {
    topic: String,
    capacity: usize,
    subscribers: Arc<Mutex<Subscribers>>,
}

impl MarketDataBus {
    pub fn new(topic: impl Into<String>, capacity: usize) -> Self {
        Self {
            topic: topic.into(),
            capacity: capacity.max(1),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.topic.clone(), config.capacity)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().senders.len()
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = flume::bounded(self.capacity);
        let mut subs = self.subscribers.lock();
        subs.next_id += 1;
        let id = subs.next_id;
        subs.senders.insert(id, tx);
        info!("Subscribed #{} to {}", id, self.topic);

        Subscription {
            id,
            name: format!("{}#{}", self.topic, id),
            rx,
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    /// Deliver `data` to every subscriber. Returns how many received it.
    pub fn publish(&self, data: MarketData) -> usize {
        let mut subs = self.subscribers.lock();
        let mut delivered = 0;
        subs.senders.retain(|id, tx| match tx.try_send(data.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(flume::TrySendError::Full(_)) => {
                warn!("Subscriber #{} on {} is full, dropping {} tick", id, self.topic, data.symbol());
                true
            }
            Err(flume::TrySendError::Disconnected(_)) => {
                debug!("Subscriber #{} on {} went away", id, self.topic);
                false
            }
        });
        delivered
    }

    /// Decode a raw wire record and publish it.
    pub fn publish_raw(&self, payload: &str) -> Result<usize> {
        Ok(self.publish(decode_record(payload)?))
    }

    /// Publish every tick from `feed` until it ends, then close the bus.
    /// Malformed records are logged and skipped.
    pub async fn forward<F: MarketFeed>(&self, mut feed: F) -> ForwardStats {
        let mut stats = ForwardStats::default();
        info!("Forwarding {} onto {}", feed.name(), self.topic);

        while let Some(next) = feed.next_tick().await {
            match next {
                Ok(data) => {
                    stats.published += 1;
                    if self.publish(data) == 0 {
                        stats.undelivered += 1;
                    }
                }
                Err(e) => {
                    warn!("Skipping malformed record on {}: {}", feed.name(), e);
                    stats.malformed += 1;
                }
            }
        }

        self.close();
        stats
    }

    /// Disconnect every subscriber; their feeds end after draining.
    pub fn close(&self) {
        let dropped = std::mem::take(&mut self.subscribers.lock().senders);
        info!("Closed {} ({} subscribers)", self.topic, dropped.len());
    }
}

/// One subscriber's view of the bus. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    name: String,
    rx: flume::Receiver<MarketData>,
    subscribers: Arc<Mutex<Subscribers>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop receiving. Ticks already buffered are discarded.
    pub fn unsubscribe(self) {}

    pub fn try_recv(&self) -> Option<MarketData> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.subscribers.lock().senders.remove(&self.id).is_some() {
            info!("Unsubscribed {}", self.name);
        }
    }
}

#[async_trait]
impl MarketFeed for Subscription {
    async fn next_tick(&mut self) -> Option<Result<MarketData>> {
        self.rx.recv_async().await.ok().map(Ok)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
