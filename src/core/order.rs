//! Order record and lifecycle state machine
//!
//! ```text
//! NEW ──► ACCEPTED ──► EXECUTED
//!  │          │
//!  ▼          ▼
//! REJECTED  CANCELLED
//! ```
//!
//! EXECUTED, REJECTED and CANCELLED are terminal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::types::{OrderId, OrderIntent, OrderType, Side, Symbol};
use crate::core::{Error, Result};

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Accepted,
    Rejected,
    Executed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Rejected | OrderStatus::Executed | OrderStatus::Cancelled
        )
    }

    /// Edges of the lifecycle graph.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (New, Accepted) | (New, Rejected) | (Accepted, Executed) | (Accepted, Cancelled)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::New => "NEW",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Executed => "EXECUTED",
            OrderStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Decimal,
    status: OrderStatus,
    /// Placement sequence within the book, for audit ordering
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Fresh order in NEW built from an intent.
    pub fn from_intent(id: OrderId, sequence: u64, intent: &OrderIntent) -> Self {
        let now = Utc::now();
        Self {
            id,
            symbol: intent.symbol.clone(),
            side: intent.side,
            order_type: intent.order_type,
            quantity: intent.quantity,
            price: intent.price,
            status: OrderStatus::New,
            sequence,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Accepted
    }

    /// Signed position change once this order executes.
    pub fn position_delta(&self) -> Decimal {
        self.side.signed(self.quantity)
    }

    /// Check a transition without applying it.
    pub fn ensure_transition(&self, next: OrderStatus) -> Result<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                order_id: self.id,
                from: self.status,
                to: next,
            })
        }
    }

    /// Apply a transition. On error the status is unchanged.
    pub fn transition(&mut self, next: OrderStatus) -> Result<()> {
        self.ensure_transition(next)?;
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn accept(&mut self) -> Result<()> {
        self.transition(OrderStatus::Accepted)
    }

    pub fn reject(&mut self) -> Result<()> {
        self.transition(OrderStatus::Rejected)
    }

    pub fn execute(&mut self) -> Result<()> {
        self.transition(OrderStatus::Executed)
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.transition(OrderStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_order() -> Order {
        let intent = OrderIntent::market("AAPL", Side::Buy, dec!(10), dec!(150));
        Order::from_intent(OrderId::new(), 1, &intent)
    }

    #[test]
    fn test_happy_path() {
        let mut order = new_order();
        assert_eq!(order.status(), OrderStatus::New);
        order.accept().unwrap();
        assert!(order.is_open());
        order.execute().unwrap();
        assert_eq!(order.status(), OrderStatus::Executed);
    }

    #[test]
    fn test_cancel_new_is_invalid() {
        let mut order = new_order();
        let err = order.cancel().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition { from: OrderStatus::New, to: OrderStatus::Cancelled, .. }
        ));
        assert_eq!(order.status(), OrderStatus::New);
    }

    #[test]
    fn test_terminal_states_are_final() {
        use OrderStatus::*;
        let all = [New, Accepted, Rejected, Executed, Cancelled];
        for terminal in [Rejected, Executed, Cancelled] {
            assert!(terminal.is_terminal());
            for next in all {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_no_transition_applies_twice() {
        let mut order = new_order();
        order.accept().unwrap();
        assert!(order.accept().is_err());
        order.cancel().unwrap();
        assert!(order.cancel().is_err());
        assert!(order.execute().is_err());
        assert_eq!(order.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn test_rejected_only_from_new() {
        let mut order = new_order();
        order.accept().unwrap();
        assert!(order.reject().is_err());

        let mut order = new_order();
        order.reject().unwrap();
        assert!(order.accept().is_err());
    }

    #[test]
    fn test_serializes_status_read_only() {
        let mut order = new_order();
        order.accept().unwrap();

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["status"], "ACCEPTED");
        assert_eq!(json["sequence"], 1);
        assert_eq!(json["side"], "BUY");
    }
}
