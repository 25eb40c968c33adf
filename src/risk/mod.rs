//! Risk engine - Per-symbol exposure limits and position tracking
//!
//! Limits fail closed: a symbol without a configured limit is never approved.
//! Each symbol's position lives behind its own mutex, so the check and the
//! position update for one symbol form a single critical section while
//! different symbols proceed in parallel.

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::{Error, RejectReason, Result, Symbol};

#[derive(Debug, Default, Clone, Copy)]
struct PositionEntry {
    /// Net quantity from executed orders
    filled: Decimal,
    /// Net quantity reserved by accepted, not yet executed orders
    open: Decimal,
}

impl PositionEntry {
    fn net(&self) -> Decimal {
        self.filled.saturating_add(self.open)
    }

    /// New `(filled, open)` pair, or `None` if any component or the net overflows.
    fn shifted(&self, filled_delta: Decimal, open_delta: Decimal) -> Option<(Decimal, Decimal)> {
        let filled = self.filled.checked_add(filled_delta)?;
        let open = self.open.checked_add(open_delta)?;
        filled.checked_add(open)?;
        Some((filled, open))
    }
}

/// Read-only position snapshot for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionView {
    pub symbol: Symbol,
    pub filled: Decimal,
    pub open: Decimal,
    pub net: Decimal,
}

/// Risk engine - Validates proposed positions against exposure limits
#[derive(Default)]
pub struct RiskEngine {
    limits: RwLock<HashMap<Symbol, Decimal>>,
    positions: RwLock<HashMap<Symbol, Arc<Mutex<PositionEntry>>>>,
}

impl RiskEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: impl IntoIterator<Item = (Symbol, Decimal)>) -> Self {
        let engine = Self::new();
        for (symbol, limit) in limits {
            engine.set_exposure_limit(symbol, limit);
        }
        engine
    }

    /// Upsert the max position for `symbol`. Applies to subsequent checks only.
    pub fn set_exposure_limit(&self, symbol: impl Into<Symbol>, limit: Decimal) {
        let symbol = symbol.into();
        info!("Exposure limit {} = {}", symbol, limit);
        self.limits.write().insert(symbol, limit);
    }

    pub fn exposure_limit(&self, symbol: &Symbol) -> Option<Decimal> {
        self.limits.read().get(symbol).copied()
    }

    /// True iff a limit exists for `symbol` and `proposed_position <= limit`.
    pub fn check_risk(&self, symbol: &Symbol, proposed_position: Decimal) -> bool {
        self.evaluate(symbol, proposed_position).is_ok()
    }

    /// Same rule as [`check_risk`](Self::check_risk), with the reason on denial.
    pub fn evaluate(&self, symbol: &Symbol, proposed_position: Decimal) -> std::result::Result<(), RejectReason> {
        match self.exposure_limit(symbol) {
            None => Err(RejectReason::ConfigurationMissing),
            Some(limit) if proposed_position <= limit => Ok(()),
            Some(limit) => Err(RejectReason::LimitExceeded {
                proposed: proposed_position,
                limit,
            }),
        }
    }

    /// Net projected position: executed plus open accepted orders.
    pub fn position(&self, symbol: &Symbol) -> Decimal {
        self.entry(symbol).map(|e| e.net()).unwrap_or(Decimal::ZERO)
    }

    /// Net position from executed orders only.
    pub fn filled_position(&self, symbol: &Symbol) -> Decimal {
        self.entry(symbol).map(|e| e.filled).unwrap_or(Decimal::ZERO)
    }

    /// All tracked positions, sorted by symbol.
    pub fn positions(&self) -> Vec<PositionView> {
        let slots = self.positions.read();
        let mut views: Vec<PositionView> = slots
            .iter()
            .map(|(symbol, slot)| {
                let entry = *slot.lock();
                PositionView {
                    symbol: symbol.clone(),
                    filled: entry.filled,
                    open: entry.open,
                    net: entry.net(),
                }
            })
            .collect();
        views.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        views
    }

    pub fn limits(&self) -> BTreeMap<Symbol, Decimal> {
        self.limits
            .read()
            .iter()
            .map(|(s, l)| (s.clone(), *l))
            .collect()
    }

    /// Check `current + delta` and, if approved, reserve `delta` as open
    /// exposure in the same critical section. Returns the new projected position.
    pub(crate) fn reserve(&self, symbol: &Symbol, delta: Decimal) -> Result<Decimal> {
        let slot = self.slot(symbol);
        let mut entry = slot.lock();
        let (filled, open) = entry
            .shifted(Decimal::ZERO, delta)
            .ok_or_else(|| overflow(symbol))?;
        let proposed = filled + open;

        self.evaluate(symbol, proposed).map_err(|reason| Error::RiskRejected {
            symbol: symbol.clone(),
            reason,
        })?;

        entry.open = open;
        debug!("Reserved {} {} -> projected {}", delta, symbol, proposed);
        Ok(proposed)
    }

    /// Move `delta` from open to filled once its order executes.
    /// On error the position is unchanged.
    pub(crate) fn fill(&self, symbol: &Symbol, delta: Decimal) -> Result<()> {
        let slot = self.slot(symbol);
        let mut entry = slot.lock();
        let (filled, open) = entry.shifted(delta, -delta).ok_or_else(|| overflow(symbol))?;
        entry.filled = filled;
        entry.open = open;
        Ok(())
    }

    /// Drop a reservation after its order is cancelled.
    /// On error the position is unchanged.
    pub(crate) fn release(&self, symbol: &Symbol, delta: Decimal) -> Result<()> {
        let slot = self.slot(symbol);
        let mut entry = slot.lock();
        let (_, open) = entry
            .shifted(Decimal::ZERO, -delta)
            .ok_or_else(|| overflow(symbol))?;
        entry.open = open;
        Ok(())
    }

    fn entry(&self, symbol: &Symbol) -> Option<PositionEntry> {
        self.positions.read().get(symbol).map(|slot| *slot.lock())
    }

    fn slot(&self, symbol: &Symbol) -> Arc<Mutex<PositionEntry>> {
        if let Some(slot) = self.positions.read().get(symbol) {
            return Arc::clone(slot);
        }
        Arc::clone(self.positions.write().entry(symbol.clone()).or_default())
    }
}

fn overflow(symbol: &Symbol) -> Error {
    Error::RiskRejected {
        symbol: symbol.clone(),
        reason: RejectReason::PositionOverflow,
    }
}
