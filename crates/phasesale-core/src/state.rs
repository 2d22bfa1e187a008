//! # Sale State
//!
//! The mutable state owned by a `SaleEngine`.
//!
//! `SaleState` is a plain value: the engine stages a copy, mutates the copy
//! while a call is in flight, and replaces its own state only when the call
//! succeeds. It is also the payload of the persisted snapshot.

use crate::{Currency, Phase, SaleError, Tokens};
use serde::{Deserialize, Serialize};

/// Totals for one sale window.
///
/// `raised` is the currency metric reported to observers. `tokens_sold` is
/// the quantity the cap check and the cap-driven transitions compare against
/// the window's token limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowTotals {
    pub raised: Currency,
    pub tokens_sold: Tokens,
}

impl WindowTotals {
    /// Record an accepted purchase.
    pub fn record(&mut self, amount: Currency, tokens: Tokens) -> Result<(), SaleError> {
        let raised = self.raised.checked_add(amount)?;
        let tokens_sold = self.tokens_sold.checked_add(tokens)?;
        self.raised = raised;
        self.tokens_sold = tokens_sold;
        Ok(())
    }
}

/// Which window a payment is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Presale,
    Ico,
}

impl Window {
    /// The window open during `phase`, if any.
    #[must_use]
    pub fn for_phase(phase: Phase) -> Option<Self> {
        match phase {
            Phase::PreSale => Some(Window::Presale),
            Phase::Ico => Some(Window::Ico),
            _ => None,
        }
    }
}

/// Complete mutable state of a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleState {
    pub phase: Phase,
    /// Phase to restore on resume. `Some` only while `phase == Halt`.
    pub saved_phase: Option<Phase>,
    pub presale: WindowTotals,
    pub ico: WindowTotals,
    pub investor_count: u64,
    /// Payments received and not yet released to the beneficiary.
    pub held_funds: Currency,
}

impl Default for SaleState {
    fn default() -> Self {
        Self {
            phase: Phase::Preparing,
            saved_phase: None,
            presale: WindowTotals::default(),
            ico: WindowTotals::default(),
            investor_count: 0,
            held_funds: Currency::ZERO,
        }
    }
}

impl SaleState {
    /// A fresh sale in `Preparing`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.phase == Phase::Halt
    }

    #[must_use]
    pub fn totals(&self, window: Window) -> &WindowTotals {
        match window {
            Window::Presale => &self.presale,
            Window::Ico => &self.ico,
        }
    }

    pub fn totals_mut(&mut self, window: Window) -> &mut WindowTotals {
        match window {
            Window::Presale => &mut self.presale,
            Window::Ico => &mut self.ico,
        }
    }

    /// Check the halt bookkeeping of a state loaded from outside.
    pub fn validate(&self) -> Result<(), SaleError> {
        match (self.phase, self.saved_phase) {
            (Phase::Halt, Some(saved)) if saved != Phase::Halt && !saved.is_terminal() => Ok(()),
            (Phase::Halt, _) => Err(SaleError::Serialization(
                "halted state must carry a non-terminal saved phase".to_string(),
            )),
            (_, None) => Ok(()),
            (_, Some(_)) => Err(SaleError::Serialization(
                "saved phase present while not halted".to_string(),
            )),
        }
    }
}
