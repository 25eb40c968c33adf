//! Error handling - Flat, recoverable errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::core::order::OrderStatus;
use crate::core::types::{OrderId, Symbol};

pub type Result<T> = std::result::Result<T, Error>;

/// Why the risk engine refused an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// No exposure limit configured for the symbol. Fails closed.
    ConfigurationMissing,
    /// Projected position would exceed the configured limit.
    LimitExceeded { proposed: Decimal, limit: Decimal },
    /// Position arithmetic would leave the representable range.
    PositionOverflow,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::ConfigurationMissing => write!(f, "no exposure limit configured"),
            RejectReason::LimitExceeded { proposed, limit } => {
                write!(f, "position {} exceeds limit {}", proposed, limit)
            }
            RejectReason::PositionOverflow => write!(f, "position out of range"),
        }
    }
}

/// Trading core error hierarchy
#[derive(Debug, Error)]
pub enum Error {
    /// Intent denied by exposure limits; no order was created
    #[error("Risk rejected {symbol}: {reason}")]
    RiskRejected { symbol: Symbol, reason: RejectReason },

    /// Unknown order id
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// Lifecycle transition not allowed from the current status
    #[error("Invalid transition for {order_id}: {from} -> {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// A strategy failed while processing a tick
    #[error("Strategy {strategy} faulted: {reason}")]
    StrategyFault { strategy: String, reason: String },

    /// Malformed intent (non-positive quantity, missing limit price, ...)
    #[error("Invalid intent: {0}")]
    InvalidIntent(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Market data feed errors
    #[error("Feed error: {0}")]
    Feed(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn is_risk_rejection(&self) -> bool {
        matches!(self, Error::RiskRejected { .. })
    }
}
