//! # Collaborators
//!
//! Narrow interfaces the engine consumes, plus in-process implementations.
//!
//! - `Ledger`: token balances and credits
//! - `FundSink`: destination of the held funds when the sale concludes
//! - `AccessControl`: operator check for privileged calls
//! - `Clock`: the single time source, read once per call
//!
//! All collaborators must be `Send + Sync` so an engine can live behind a
//! lock in a multi-threaded host.

use crate::{Address, Currency, SaleError, Timestamp, Tokens};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// TRAITS
// =============================================================================

/// External system of record for token balances.
pub trait Ledger: Send + Sync {
    /// Current token balance of `holder`.
    fn balance_of(&self, holder: &Address) -> Result<Tokens, SaleError>;

    /// Credit `amount` tokens to `to`.
    ///
    /// Must either apply fully or not at all. Failures are reported as
    /// `SaleError::LedgerTransferFailed`.
    fn transfer(&mut self, to: &Address, amount: Tokens) -> Result<(), SaleError>;
}

/// Destination of the funds held by the sale.
///
/// The engine tracks the held balance itself, so a release commits together
/// with the terminal phase change.
pub trait FundSink: Send + Sync {
    /// Forward `amount`, the entire held balance, to `beneficiary`.
    ///
    /// Must either apply fully or not at all. Failures are reported as
    /// `SaleError::WithdrawalFailed`.
    fn withdraw_all(&mut self, beneficiary: &Address, amount: Currency) -> Result<(), SaleError>;
}

/// Operator check for privileged operations.
pub trait AccessControl: Send + Sync {
    fn is_operator(&self, caller: &Address) -> bool;
}

/// Monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The set of collaborators handed to an engine at construction.
pub struct Collaborators {
    pub ledger: Box<dyn Ledger>,
    pub fund_sink: Box<dyn FundSink>,
    pub access: Box<dyn AccessControl>,
    pub clock: Box<dyn Clock>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("now", &self.clock.now())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// SHARED HANDLES
// =============================================================================

// A collaborator behind `Arc<Mutex<_>>` can be handed to an engine while the
// host keeps a handle for inspection.

impl<T: Ledger> Ledger for Arc<Mutex<T>> {
    fn balance_of(&self, holder: &Address) -> Result<Tokens, SaleError> {
        self.lock()
            .map_err(|_| SaleError::Storage("ledger lock poisoned".to_string()))?
            .balance_of(holder)
    }

    fn transfer(&mut self, to: &Address, amount: Tokens) -> Result<(), SaleError> {
        self.lock()
            .map_err(|_| SaleError::LedgerTransferFailed("ledger lock poisoned".to_string()))?
            .transfer(to, amount)
    }
}

impl<T: FundSink> FundSink for Arc<Mutex<T>> {
    fn withdraw_all(&mut self, beneficiary: &Address, amount: Currency) -> Result<(), SaleError> {
        self.lock()
            .map_err(|_| SaleError::WithdrawalFailed("fund sink lock poisoned".to_string()))?
            .withdraw_all(beneficiary, amount)
    }
}

// =============================================================================
// IN-MEMORY LEDGER
// =============================================================================

/// Volatile ledger keyed by address.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    balances: BTreeMap<Address, Tokens>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a balance directly, bypassing the sale. Used to seed holders.
    pub fn set_balance(&mut self, holder: Address, amount: Tokens) {
        if amount.is_zero() {
            self.balances.remove(&holder);
        } else {
            self.balances.insert(holder, amount);
        }
    }

    /// Number of addresses with a non-zero balance.
    #[must_use]
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }
}

impl Ledger for InMemoryLedger {
    fn balance_of(&self, holder: &Address) -> Result<Tokens, SaleError> {
        Ok(self.balances.get(holder).copied().unwrap_or_default())
    }

    fn transfer(&mut self, to: &Address, amount: Tokens) -> Result<(), SaleError> {
        let current = self.balances.get(to).copied().unwrap_or_default();
        let updated = current
            .checked_add(amount)
            .map_err(|_| SaleError::LedgerTransferFailed(format!("balance of {} overflows", to)))?;
        self.balances.insert(to.clone(), updated);
        Ok(())
    }
}

// =============================================================================
// TREASURY
// =============================================================================

/// Volatile fund sink that records every release.
#[derive(Debug, Clone, Default)]
pub struct Treasury {
    releases: Vec<(Address, Currency)>,
}

impl Treasury {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(beneficiary, amount)` released so far, oldest first.
    #[must_use]
    pub fn releases(&self) -> &[(Address, Currency)] {
        &self.releases
    }
}

impl FundSink for Treasury {
    fn withdraw_all(&mut self, beneficiary: &Address, amount: Currency) -> Result<(), SaleError> {
        self.releases.push((beneficiary.clone(), amount));
        Ok(())
    }
}

// =============================================================================
// ACCESS CONTROL
// =============================================================================

/// Fixed set of operator addresses.
#[derive(Debug, Clone, Default)]
pub struct OperatorSet {
    operators: BTreeSet<Address>,
}

impl OperatorSet {
    #[must_use]
    pub fn new(operators: impl IntoIterator<Item = Address>) -> Self {
        Self {
            operators: operators.into_iter().filter(|a| !a.is_empty()).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

impl AccessControl for OperatorSet {
    fn is_operator(&self, caller: &Address) -> bool {
        self.operators.contains(caller)
    }
}

// =============================================================================
// CLOCKS
// =============================================================================

/// Wall-clock time in UNIX seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Timestamp(secs)
    }
}

/// Manually driven clock. Clones share the same time.
///
/// The clock never moves backwards: `set` ignores earlier timestamps.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    secs: Arc<AtomicU64>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            secs: Arc::new(AtomicU64::new(start.secs())),
        }
    }

    /// Move the clock to `at` if it is later than the current time.
    pub fn set(&self, at: Timestamp) {
        self.secs.fetch_max(at.secs(), Ordering::SeqCst);
    }

    /// Advance the clock by `secs` seconds, saturating.
    pub fn advance(&self, secs: u64) {
        let _ = self
            .secs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(secs))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.secs.load(Ordering::SeqCst))
    }
}

// =============================================================================
// TESTS
// =============================================================================
