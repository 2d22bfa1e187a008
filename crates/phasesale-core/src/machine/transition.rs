//! # Phase Transitions
//!
//! ## Rules
//!
//! | From | To | Condition |
//! |------|----|-----------|
//! | Preparing | PreSale | `presale_start <= now < presale_end` and pre-sale tokens below limit |
//! | Preparing | PresaleFinalized | `now >= presale_end` (window passed unobserved) |
//! | PreSale | PresaleFinalized | pre-sale tokens at limit, or `now >= presale_end` |
//! | PresaleFinalized | Ico | `ico_start <= now < ico_end` and ICO tokens below limit |
//! | PresaleFinalized | IcoFinalized | `now >= ico_end`, or ICO tokens at limit |
//! | Ico | IcoFinalized | ICO tokens at limit, or `now >= ico_end` |
//!
//! Entering `PresaleFinalized` seeds the ICO totals with the pre-sale totals.
//! `Halt`, `Success` and `Aborted` are never left by evaluation.

use crate::config::{SaleSchedule, SaleTerms};
use crate::state::SaleState;
use crate::{Phase, SaleError, Timestamp};
use serde::{Deserialize, Serialize};

/// A single phase change discovered by evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
}

impl Transition {
    #[must_use]
    pub const fn new(from: Phase, to: Phase) -> Self {
        Self { from, to }
    }

    /// Human-readable description of the phase entered.
    #[must_use]
    pub fn description(&self) -> &'static str {
        self.to.description()
    }
}

/// Result of evaluating a state at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub state: SaleState,
    pub transitions: Vec<Transition>,
}

impl Evaluation {
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.transitions.is_empty()
    }
}

/// Window boundaries resolved once per evaluation.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    presale_start: Timestamp,
    presale_end: Timestamp,
    ico_start: Timestamp,
    ico_end: Timestamp,
}

impl Bounds {
    fn resolve(schedule: &SaleSchedule) -> Result<Self, SaleError> {
        Ok(Self {
            presale_start: schedule.presale_start,
            presale_end: schedule.presale_end()?,
            ico_start: schedule.ico_start,
            ico_end: schedule.ico_end()?,
        })
    }
}

/// Decide the next phase from `state`, or `None` at a fixed point.
fn next_phase(state: &SaleState, bounds: &Bounds, terms: &SaleTerms, now: Timestamp) -> Option<Phase> {
    let presale_full = state.presale.tokens_sold >= terms.presale_token_limit;
    let ico_full = state.ico.tokens_sold >= terms.ico_token_limit;

    match state.phase {
        Phase::Preparing => {
            if now >= bounds.presale_end {
                Some(Phase::PresaleFinalized)
            } else if now >= bounds.presale_start && !presale_full {
                Some(Phase::PreSale)
            } else {
                None
            }
        }
        Phase::PreSale => {
            (presale_full || now >= bounds.presale_end).then_some(Phase::PresaleFinalized)
        }
        Phase::PresaleFinalized => {
            if now >= bounds.ico_end || ico_full {
                Some(Phase::IcoFinalized)
            } else if now >= bounds.ico_start {
                Some(Phase::Ico)
            } else {
                None
            }
        }
        Phase::Ico => (ico_full || now >= bounds.ico_end).then_some(Phase::IcoFinalized),
        Phase::IcoFinalized | Phase::Success | Phase::Aborted | Phase::Halt => None,
    }
}

/// Evaluate `state` at `now`, applying transitions until a fixed point.
///
/// The input is not modified. Every phase entered along the way is reported
/// in order, so a call arriving long after the last one may yield several
/// transitions at once.
pub fn evaluate_phase(
    state: &SaleState,
    schedule: &SaleSchedule,
    terms: &SaleTerms,
    now: Timestamp,
) -> Result<Evaluation, SaleError> {
    let bounds = Bounds::resolve(schedule)?;
    let mut next = state.clone();
    let mut transitions = Vec::new();

    while let Some(to) = next_phase(&next, &bounds, terms, now) {
        if to == Phase::PresaleFinalized {
            next.ico = next.presale;
        }
        transitions.push(Transition::new(next.phase, to));
        next.phase = to;
    }

    Ok(Evaluation {
        state: next,
        transitions,
    })
}

/// Whether the sale may be concluded at `now`.
///
/// Eligible once the main sale window has passed, once its token limit is
/// reached, or at any time while halted. Never eligible twice.
pub fn conclusion_eligible(
    state: &SaleState,
    schedule: &SaleSchedule,
    terms: &SaleTerms,
    now: Timestamp,
) -> Result<bool, SaleError> {
    if state.phase.is_terminal() {
        return Ok(false);
    }
    Ok(state.is_halted()
        || now >= schedule.ico_end()?
        || state.ico.tokens_sold >= terms.ico_token_limit)
}

// =============================================================================
// TESTS
// =============================================================================
