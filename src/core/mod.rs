//! Core module - Common types, traits, and error handling

pub mod error;
pub mod types;
pub mod order;
pub mod traits;
pub mod config;

pub use error::{Error, RejectReason, Result};
pub use types::*;
pub use order::{Order, OrderStatus};
pub use traits::*;
pub use config::{Config, ConfigSource, DispatchMode, RunMode, StrategyConfig};
