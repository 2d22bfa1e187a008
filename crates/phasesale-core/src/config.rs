//! # Sale Configuration
//!
//! Immutable parameters of a sale: the two-window schedule, the pricing and
//! cap terms, and the beneficiary of the final withdrawal.
//!
//! A configuration is validated once, at engine construction, against the
//! creation time read from the clock.

use crate::primitives::{
    ICO_BASE_RATE, ICO_MONETARY_CAP, ICO_TOKEN_LIMIT, LARGE_PURCHASE_THRESHOLD,
    PERCENT_DENOMINATOR, PRESALE_BASE_RATE, PRESALE_BONUS_PERCENT, PRESALE_MONETARY_CAP,
    PRESALE_TOKEN_LIMIT, SECONDS_PER_DAY,
};
use crate::{Address, Currency, SaleError, Timestamp, Tokens};
use serde::{Deserialize, Serialize};

// =============================================================================
// SCHEDULE
// =============================================================================

/// Start times and durations of the two sale windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleSchedule {
    pub presale_start: Timestamp,
    pub presale_days: u64,
    pub ico_start: Timestamp,
    pub ico_days: u64,
}

impl SaleSchedule {
    #[must_use]
    pub const fn new(
        presale_start: Timestamp,
        presale_days: u64,
        ico_start: Timestamp,
        ico_days: u64,
    ) -> Self {
        Self {
            presale_start,
            presale_days,
            ico_start,
            ico_days,
        }
    }

    /// End of the pre-sale window (exclusive).
    pub fn presale_end(&self) -> Result<Timestamp, SaleError> {
        window_end(self.presale_start, self.presale_days)
    }

    /// End of the main sale window (exclusive).
    pub fn ico_end(&self) -> Result<Timestamp, SaleError> {
        window_end(self.ico_start, self.ico_days)
    }

    /// Check window ordering only: positive durations, strictly ordered,
    /// non-overlapping.
    pub fn validate_ordering(&self) -> Result<(), SaleError> {
        if self.presale_days == 0 {
            return Err(SaleError::Configuration(
                "pre-sale duration must be at least one day".to_string(),
            ));
        }
        if self.ico_days == 0 {
            return Err(SaleError::Configuration(
                "main sale duration must be at least one day".to_string(),
            ));
        }
        if self.ico_start <= self.presale_start {
            return Err(SaleError::Configuration(
                "main sale must start after the pre-sale starts".to_string(),
            ));
        }
        let presale_end = self.presale_end().map_err(|_| {
            SaleError::Configuration("pre-sale end overflows the timestamp range".to_string())
        })?;
        if self.ico_start <= presale_end {
            return Err(SaleError::Configuration(format!(
                "main sale start {} must be after pre-sale end {}",
                self.ico_start.secs(),
                presale_end.secs()
            )));
        }
        self.ico_end().map_err(|_| {
            SaleError::Configuration("main sale end overflows the timestamp range".to_string())
        })?;
        Ok(())
    }

    /// Full validation against the creation time.
    pub fn validate(&self, created_at: Timestamp) -> Result<(), SaleError> {
        if self.presale_start <= created_at {
            return Err(SaleError::Configuration(format!(
                "pre-sale start {} must be after creation time {}",
                self.presale_start.secs(),
                created_at.secs()
            )));
        }
        self.validate_ordering()
    }
}

fn window_end(start: Timestamp, days: u64) -> Result<Timestamp, SaleError> {
    let secs = days.checked_mul(SECONDS_PER_DAY).ok_or(SaleError::Overflow)?;
    start.checked_add_secs(secs)
}

// =============================================================================
// TERMS
// =============================================================================

/// Direction of the token capacity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapPolicy {
    /// Reject when the tokens owed exceed the remaining capacity.
    #[default]
    RejectOverflow,
    /// Reject when the tokens owed are below the remaining capacity.
    ///
    /// Purchases are then only accepted once they fill or overshoot the
    /// window.
    RejectUnderflow,
}

/// Pricing and cap terms of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleTerms {
    pub presale_rate: u128,
    pub ico_rate: u128,
    pub bonus_threshold: Currency,
    pub bonus_percent: u128,
    pub presale_token_limit: Tokens,
    pub ico_token_limit: Tokens,
    pub presale_monetary_cap: Currency,
    pub ico_monetary_cap: Currency,
    pub cap_policy: CapPolicy,
}

impl Default for SaleTerms {
    fn default() -> Self {
        Self {
            presale_rate: PRESALE_BASE_RATE,
            ico_rate: ICO_BASE_RATE,
            bonus_threshold: Currency(LARGE_PURCHASE_THRESHOLD),
            bonus_percent: PRESALE_BONUS_PERCENT,
            presale_token_limit: Tokens(PRESALE_TOKEN_LIMIT),
            ico_token_limit: Tokens(ICO_TOKEN_LIMIT),
            presale_monetary_cap: Currency(PRESALE_MONETARY_CAP),
            ico_monetary_cap: Currency(ICO_MONETARY_CAP),
            cap_policy: CapPolicy::default(),
        }
    }
}

impl SaleTerms {
    pub fn validate(&self) -> Result<(), SaleError> {
        if self.presale_rate == 0 || self.ico_rate == 0 {
            return Err(SaleError::Configuration(
                "exchange rates must be non-zero".to_string(),
            ));
        }
        if self.bonus_percent < PERCENT_DENOMINATOR {
            return Err(SaleError::Configuration(format!(
                "bonus percent {} would reduce the rate",
                self.bonus_percent
            )));
        }
        if self.presale_token_limit.is_zero() || self.ico_token_limit.is_zero() {
            return Err(SaleError::Configuration(
                "token limits must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Everything the engine needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleConfiguration {
    pub schedule: SaleSchedule,
    pub terms: SaleTerms,
    pub beneficiary: Address,
}

impl SaleConfiguration {
    #[must_use]
    pub fn new(schedule: SaleSchedule, terms: SaleTerms, beneficiary: Address) -> Self {
        Self {
            schedule,
            terms,
            beneficiary,
        }
    }

    /// Validate everything except the creation-time rule.
    pub fn validate_static(&self) -> Result<(), SaleError> {
        if self.beneficiary.is_empty() {
            return Err(SaleError::Configuration(
                "beneficiary address must not be empty".to_string(),
            ));
        }
        self.schedule.validate_ordering()?;
        self.terms.validate()
    }

    /// Validate for a fresh sale created at `created_at`.
    pub fn validate(&self, created_at: Timestamp) -> Result<(), SaleError> {
        self.validate_static()?;
        self.schedule.validate(created_at)
    }
}

// =============================================================================
// TESTS
// =============================================================================
