//! Execution layer - Order book and order lifecycle
//!
//! The book is the only owner of placed orders. Every order sits behind its
//! own mutex: execute and cancel on one order are mutually exclusive, while
//! operations on different orders only share the map's read lock.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

use crate::core::{Error, Order, OrderId, OrderIntent, OrderStatus, Result};
use crate::risk::RiskEngine;

/// Order book - authoritative set of orders
pub struct OrderBook {
    risk: Arc<RiskEngine>,
    orders: RwLock<HashMap<OrderId, Arc<Mutex<Order>>>>,
    sequence: AtomicU64,
}

impl OrderBook {
    pub fn new(risk: Arc<RiskEngine>) -> Self {
        Self {
            risk,
            orders: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn risk(&self) -> &Arc<RiskEngine> {
        &self.risk
    }

    /// Validate the intent against risk and, on approval, insert an ACCEPTED order.
    ///
    /// Denied intents never enter the book.
    pub fn place_order(&self, intent: &OrderIntent) -> Result<OrderId> {
        intent.validate()?;

        let mut order = Order::from_intent(OrderId::new(), 0, intent);
        let projected = match self.risk.reserve(&intent.symbol, intent.position_delta()) {
            Ok(projected) => projected,
            Err(e) => {
                order.reject()?;
                warn!(
                    "Order rejected: {} {} {} @ {} ({})",
                    intent.side, intent.quantity, intent.symbol, intent.price, e
                );
                return Err(e);
            }
        };

        order.accept()?;
        order.sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;

        let mut orders = self.orders.write();
        while orders.contains_key(&order.id) {
            order.id = OrderId::new();
        }
        let id = order.id;
        info!(
            "Order accepted: {} #{} {} {} {} @ {} (projected position {})",
            id, order.sequence, order.side, order.quantity, order.symbol, order.price, projected
        );
        orders.insert(id, Arc::new(Mutex::new(order)));
        Ok(id)
    }

    /// ACCEPTED -> EXECUTED; the reservation becomes filled position.
    pub fn execute_order(&self, order_id: &OrderId) -> Result<Order> {
        let slot = self.slot(order_id)?;
        let mut order = slot.lock();
        order.ensure_transition(OrderStatus::Executed)?;

        self.risk.fill(&order.symbol, order.position_delta())?;
        order.execute()?;
        info!("Order executed: {} {} {} {}", order.id, order.side, order.quantity, order.symbol);
        Ok(order.clone())
    }

    /// ACCEPTED -> CANCELLED; the reservation is released.
    pub fn cancel_order(&self, order_id: &OrderId) -> Result<Order> {
        let slot = self.slot(order_id)?;
        let mut order = slot.lock();
        order.ensure_transition(OrderStatus::Cancelled)?;

        self.risk.release(&order.symbol, order.position_delta())?;
        order.cancel()?;
        info!("Order cancelled: {} {}", order.id, order.symbol);
        Ok(order.clone())
    }

    /// Snapshot of one order
    pub fn get_order(&self, order_id: &OrderId) -> Result<Order> {
        Ok(self.slot(order_id)?.lock().clone())
    }

    /// All orders in placement order
    pub fn orders(&self) -> Vec<Order> {
        let mut all: Vec<Order> = self
            .orders
            .read()
            .values()
            .map(|slot| slot.lock().clone())
            .collect();
        all.sort_by_key(|o| o.sequence);
        all
    }

    /// Orders still awaiting execution or cancellation
    pub fn open_orders(&self) -> Vec<Order> {
        self.orders().into_iter().filter(Order::is_open).collect()
    }

    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, order_id: &OrderId) -> Result<Arc<Mutex<Order>>> {
        self.orders
            .read()
            .get(order_id)
            .cloned()
            .ok_or(Error::NotFound(*order_id))
    }
}
