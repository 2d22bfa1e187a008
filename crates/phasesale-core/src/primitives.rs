//! # Sale Primitives
//!
//! Hardcoded default constants for the phasesale engine.
//!
//! These values populate `SaleTerms::default()`. Hosts may override any of
//! them through the sale configuration file; the engine never changes them
//! after construction.

/// Seconds in one schedule day. Durations are configured in whole days.
pub const SECONDS_PER_DAY: u64 = 86_400;

// =============================================================================
// RATES
// =============================================================================

/// Tokens credited per currency unit during the pre-sale, before any bonus.
pub const PRESALE_BASE_RATE: u128 = 1_300;

/// Tokens credited per currency unit during the main sale.
pub const ICO_BASE_RATE: u128 = 1_000;

/// Pre-sale payments at or above this amount receive the volume bonus.
pub const LARGE_PURCHASE_THRESHOLD: u128 = 1_000;

/// Volume bonus, as a percentage of the base pre-sale rate.
///
/// The bonus rate is `rate * PRESALE_BONUS_PERCENT / 100`, truncated.
pub const PRESALE_BONUS_PERCENT: u128 = 120;

/// Denominator for percentage arithmetic.
pub const PERCENT_DENOMINATOR: u128 = 100;

// =============================================================================
// CAPS
// =============================================================================

/// Token supply available during the pre-sale.
pub const PRESALE_TOKEN_LIMIT: u128 = 30_000_000_000;

/// Token supply available during the main sale, including pre-sale volume
/// carried over when the pre-sale is finalized.
pub const ICO_TOKEN_LIMIT: u128 = 100_000_000_000;

/// Monetary cap for the pre-sale window. Reported, not enforced.
pub const PRESALE_MONETARY_CAP: u128 = 20_000_000;

/// Monetary cap for the main sale window. Reported, not enforced.
pub const ICO_MONETARY_CAP: u128 = 90_000_000;

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// Magic bytes for the state snapshot header.
pub const MAGIC_BYTES: &[u8; 4] = b"SALE";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to `SaleState`.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum number of committed events buffered before the host drains them.
///
/// Older events are dropped first once the outbox is full.
pub const MAX_PENDING_EVENTS: usize = 1024;
