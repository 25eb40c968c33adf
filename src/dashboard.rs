//! Read-only snapshot for the dashboard. There is no mutation path from here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::{Order, OrderStatus, Result, Symbol};
use crate::execution::OrderBook;
use crate::risk::{PositionView, RiskEngine};

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub taken_at: DateTime<Utc>,
    /// Orders in placement order
    pub orders: Vec<Order>,
    pub limits: BTreeMap<Symbol, Decimal>,
    pub positions: Vec<PositionView>,
}

impl DashboardSnapshot {
    pub fn capture(book: &OrderBook, risk: &RiskEngine) -> Self {
        Self {
            taken_at: Utc::now(),
            orders: book.orders(),
            limits: risk.limits(),
            positions: risk.positions(),
        }
    }

    pub fn count(&self, status: OrderStatus) -> usize {
        self.orders.iter().filter(|o| o.status() == status).count()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
