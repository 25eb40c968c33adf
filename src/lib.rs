//! Trading core library
//! Market data -> strategies -> risk checks -> order lifecycle

// Public modules
pub mod core;
pub mod risk;
pub mod execution;
pub mod strategies;
pub mod engine;
pub mod backtest;
pub mod feeds;
pub mod live;
pub mod dashboard;

// Re-exports
pub use core::{Config, Error, Result};
pub use engine::TradingEngine;
