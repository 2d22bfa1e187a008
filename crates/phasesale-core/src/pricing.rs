//! # Pricing
//!
//! Converts a payment into a token quantity and applies the window cap check.
//!
//! ## Rounding
//!
//! The pre-sale bonus is applied to the rate, not to the product:
//! `bonus_rate = rate * bonus_percent / 100`, truncated toward zero. Tokens
//! owed are then `amount * bonus_rate`. Two payments of the same amount
//! always receive the same rate, and the truncation loss is bounded by one
//! rate unit per currency unit.

use crate::config::{CapPolicy, SaleTerms};
use crate::primitives::PERCENT_DENOMINATOR;
use crate::state::{Window, WindowTotals};
use crate::{Currency, SaleError, Tokens};
use serde::{Deserialize, Serialize};

/// Outcome of pricing a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub window: Window,
    /// Tokens per currency unit actually applied.
    pub rate: u128,
    pub bonus_applied: bool,
    pub tokens: Tokens,
    /// Window capacity before this purchase.
    pub remaining: Tokens,
}

/// Rate applied to `amount` in `window`.
pub fn effective_rate(terms: &SaleTerms, window: Window, amount: Currency) -> Result<u128, SaleError> {
    match window {
        Window::Presale if amount >= terms.bonus_threshold => terms
            .presale_rate
            .checked_mul(terms.bonus_percent)
            .map(|scaled| scaled / PERCENT_DENOMINATOR)
            .ok_or(SaleError::Overflow),
        Window::Presale => Ok(terms.presale_rate),
        Window::Ico => Ok(terms.ico_rate),
    }
}

/// Token limit of `window`.
#[must_use]
pub fn window_limit(terms: &SaleTerms, window: Window) -> Tokens {
    match window {
        Window::Presale => terms.presale_token_limit,
        Window::Ico => terms.ico_token_limit,
    }
}

/// Price `amount` against the current totals of `window`.
///
/// Fails with `CapExceeded` when the cap policy rejects the purchase.
pub fn quote(
    terms: &SaleTerms,
    window: Window,
    totals: &WindowTotals,
    amount: Currency,
) -> Result<Quote, SaleError> {
    if amount.is_zero() {
        return Err(SaleError::ZeroAmount);
    }

    let rate = effective_rate(terms, window, amount)?;
    let tokens = amount
        .value()
        .checked_mul(rate)
        .map(Tokens)
        .ok_or(SaleError::Overflow)?;
    let remaining = window_limit(terms, window).saturating_sub(totals.tokens_sold);

    let rejected = match terms.cap_policy {
        CapPolicy::RejectOverflow => tokens > remaining,
        CapPolicy::RejectUnderflow => tokens < remaining,
    };
    if rejected {
        return Err(SaleError::CapExceeded {
            requested: tokens,
            remaining,
        });
    }

    Ok(Quote {
        window,
        rate,
        bonus_applied: window == Window::Presale && amount >= terms.bonus_threshold,
        tokens,
        remaining,
    })
}

// =============================================================================
// TESTS
// =============================================================================
