//! # Core Type Definitions
//!
//! This module contains all core types for the phasesale engine:
//! - Identity and quantity newtypes (`Address`, `Currency`, `Tokens`, `Timestamp`)
//! - The sale `Phase` enumeration
//! - Error types (`SaleError`)
//!
//! ## Unit Separation
//!
//! Currency amounts and token quantities are distinct types. The raised
//! metric is always `Currency`; cap tracking is always `Tokens`. The only
//! bridge between them is a rate multiplication in `pricing`.
//!
//! All arithmetic on these types is checked; overflow is an error, never a wrap.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// ADDRESS
// =============================================================================

/// Identity of a payer, operator or beneficiary.
///
/// The engine treats addresses as opaque; validation of their shape is the
/// host's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    /// Create a new address from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the address is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// QUANTITIES
// =============================================================================

/// An amount in the payment currency's smallest unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Currency(pub u128);

impl Currency {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u128 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Add two amounts, failing on overflow.
    pub fn checked_add(self, other: Self) -> Result<Self, SaleError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(SaleError::Overflow)
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A token quantity, in the ledger's smallest token unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Tokens(pub u128);

impl Tokens {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u128 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Add two quantities, failing on overflow.
    pub fn checked_add(self, other: Self) -> Result<Self, SaleError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(SaleError::Overflow)
    }

    /// Subtract, clamping at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl std::fmt::Display for Tokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point in time, in UNIX seconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    #[must_use]
    pub const fn new(secs: u64) -> Self {
        Self(secs)
    }

    #[must_use]
    pub const fn secs(self) -> u64 {
        self.0
    }

    /// Offset by a number of seconds, failing on overflow.
    pub fn checked_add_secs(self, secs: u64) -> Result<Self, SaleError> {
        self.0
            .checked_add(secs)
            .map(Self)
            .ok_or(SaleError::Overflow)
    }
}

// =============================================================================
// PHASE
// =============================================================================

/// Named stage of the sale state machine.
///
/// Forward order: `Preparing → PreSale → PresaleFinalized → Ico → IcoFinalized
/// → {Success | Aborted}`. `Halt` is orthogonal and only entered or left by an
/// operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Preparing,
    PreSale,
    PresaleFinalized,
    Ico,
    IcoFinalized,
    Success,
    Aborted,
    Halt,
}

impl Phase {
    /// Human-readable description carried by state-change notifications.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Phase::Preparing => "Sale is being prepared",
            Phase::PreSale => "Pre-sale is open",
            Phase::PresaleFinalized => "Pre-sale has ended",
            Phase::Ico => "Main sale is open",
            Phase::IcoFinalized => "Main sale has ended",
            Phase::Success => "Sale concluded successfully",
            Phase::Aborted => "Sale was aborted",
            Phase::Halt => "Sale is halted",
        }
    }

    /// Position along the forward path. `None` for `Halt`.
    ///
    /// `Success` and `Aborted` share the last rank.
    #[must_use]
    pub fn rank(&self) -> Option<u8> {
        match self {
            Phase::Preparing => Some(0),
            Phase::PreSale => Some(1),
            Phase::PresaleFinalized => Some(2),
            Phase::Ico => Some(3),
            Phase::IcoFinalized => Some(4),
            Phase::Success | Phase::Aborted => Some(5),
            Phase::Halt => None,
        }
    }

    /// Payments are accepted only in the two open windows.
    #[must_use]
    pub fn accepts_payments(&self) -> bool {
        matches!(self, Phase::PreSale | Phase::Ico)
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Success | Phase::Aborted)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the sale engine.
///
/// Every error is returned synchronously and leaves the engine state exactly
/// as it was before the failing call. Nothing is retried internally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SaleError {
    /// Constructor parameters violate the schedule or terms invariants.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The operation is not allowed in the current phase.
    #[error("Invalid phase: {0}")]
    InvalidPhase(Phase),

    /// A payment of zero was submitted.
    #[error("Payment amount must be greater than zero")]
    ZeroAmount,

    /// The sale is halted.
    #[error("Sale is halted")]
    Halted,

    /// The window's token capacity check rejected the purchase.
    #[error("Cap exceeded: requested {requested} tokens, remaining {remaining}")]
    CapExceeded { requested: Tokens, remaining: Tokens },

    /// Halt requested while already halted.
    #[error("Sale is already halted")]
    AlreadyHalted,

    /// Resume requested while not halted.
    #[error("Sale is not halted")]
    NotHalted,

    /// Conclusion requested before any termination precondition holds.
    #[error("Sale is not eligible for conclusion")]
    NotEligible,

    /// The caller is not an operator.
    #[error("Unauthorized")]
    Unauthorized,

    /// The ledger refused or failed the token credit.
    #[error("Ledger transfer failed: {0}")]
    LedgerTransferFailed(String),

    /// The fund sink failed to accept a deposit or release the balance.
    #[error("Fund withdrawal failed: {0}")]
    WithdrawalFailed(String),

    /// Checked arithmetic overflowed.
    #[error("Arithmetic overflow")]
    Overflow,

    /// A storage backend error occurred.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

// =============================================================================
// TESTS
// =============================================================================
