//! # Sale Events
//!
//! Observable notifications produced by committed engine calls.
//!
//! Events of a failed call are discarded together with its staged state, so
//! observers only ever see what actually happened.

use crate::machine::Transition;
use crate::{Address, Currency, Phase, Tokens};
use serde::{Deserialize, Serialize};

/// A notification for external observers.
///
/// Externally tagged in JSON (`{"tokens_purchased": {...}}`): the quantities
/// are `u128`, which serde cannot buffer for an internal tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleEvent {
    /// The phase changed.
    PhaseChanged {
        from: Phase,
        to: Phase,
        description: String,
    },
    /// A payment was accepted and tokens were credited.
    TokensPurchased {
        payer: Address,
        amount: Currency,
        tokens: Tokens,
    },
    /// An operator halted the sale.
    SaleHalted { by: Address, saved: Phase },
    /// An operator resumed the sale.
    SaleResumed { by: Address, restored: Phase },
    /// The held funds were released on conclusion.
    FundsReleased {
        beneficiary: Address,
        amount: Currency,
    },
}

impl From<Transition> for SaleEvent {
    fn from(t: Transition) -> Self {
        SaleEvent::PhaseChanged {
            from: t.from,
            to: t.to,
            description: t.description().to_string(),
        }
    }
}

impl SaleEvent {
    /// Short machine-friendly name, used as a log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SaleEvent::PhaseChanged { .. } => "phase_changed",
            SaleEvent::TokensPurchased { .. } => "tokens_purchased",
            SaleEvent::SaleHalted { .. } => "sale_halted",
            SaleEvent::SaleResumed { .. } => "sale_resumed",
            SaleEvent::FundsReleased { .. } => "funds_released",
        }
    }
}
