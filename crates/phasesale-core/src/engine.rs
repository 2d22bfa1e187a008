//! # Sale Engine
//!
//! The single owner of a sale's state.
//!
//! Every state-mutating call follows the same shape:
//! 1. Read the clock once.
//! 2. Stage: evaluate the phase on a copy of the state and apply the call's
//!    own changes to that copy.
//! 3. Perform the one external side effect of the call (ledger credit or
//!    fund release) as the last fallible step.
//! 4. Commit the staged state and publish the staged events.
//!
//! A failure anywhere before step 4 leaves the engine exactly as it was.

use crate::collaborators::{AccessControl, Clock, Collaborators, FundSink, Ledger};
use crate::config::SaleConfiguration;
use crate::events::SaleEvent;
use crate::formats::SaleSnapshot;
use crate::machine::{Evaluation, Transition, conclusion_eligible, evaluate_phase};
use crate::pricing::{self, Quote};
use crate::primitives::MAX_PENDING_EVENTS;
use crate::state::{SaleState, Window};
use crate::{Address, Currency, Phase, SaleError, Timestamp, Tokens};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// =============================================================================
// CALL TYPES
// =============================================================================

/// A payment as delivered by the payment transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payer: Address,
    pub amount: Currency,
}

impl Payment {
    #[must_use]
    pub fn new(payer: Address, amount: Currency) -> Self {
        Self { payer, amount }
    }
}

/// Result of an accepted payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub payer: Address,
    pub amount: Currency,
    pub tokens: Tokens,
    pub rate: u128,
    pub bonus_applied: bool,
    pub window: Window,
    /// Phase after the call.
    pub phase: Phase,
    /// Whether this payment counted a new investor.
    pub new_investor: bool,
}

/// Read-only statistics for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleStats {
    pub phase: Phase,
    pub saved_phase: Option<Phase>,
    pub investor_count: u64,
    pub presale_raised: Currency,
    pub ico_raised: Currency,
    pub presale_tokens_sold: Tokens,
    pub ico_tokens_sold: Tokens,
    pub presale_token_limit: Tokens,
    pub ico_token_limit: Tokens,
    pub presale_monetary_cap: Currency,
    pub ico_monetary_cap: Currency,
    pub held_funds: Currency,
}

// =============================================================================
// ENGINE
// =============================================================================

/// The sale state machine and purchase-accounting engine.
pub struct SaleEngine {
    config: SaleConfiguration,
    state: SaleState,
    ledger: Box<dyn Ledger>,
    fund_sink: Box<dyn FundSink>,
    access: Box<dyn AccessControl>,
    clock: Box<dyn Clock>,
    outbox: VecDeque<SaleEvent>,
}

impl std::fmt::Debug for SaleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaleEngine")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("pending_events", &self.outbox.len())
            .finish_non_exhaustive()
    }
}

impl SaleEngine {
    /// Create a fresh sale in `Preparing`.
    ///
    /// The schedule is validated against the clock's current time.
    pub fn new(config: SaleConfiguration, collaborators: Collaborators) -> Result<Self, SaleError> {
        let created_at = collaborators.clock.now();
        config.validate(created_at)?;
        Ok(Self::assemble(config, SaleState::new(), collaborators))
    }

    /// Rebuild an engine from a previously committed state.
    ///
    /// The creation-time rule is not re-checked: a restored sale may well be
    /// past its pre-sale start.
    pub fn restore(
        config: SaleConfiguration,
        state: SaleState,
        collaborators: Collaborators,
    ) -> Result<Self, SaleError> {
        config.validate_static()?;
        state.validate()?;
        Ok(Self::assemble(config, state, collaborators))
    }

    fn assemble(config: SaleConfiguration, state: SaleState, c: Collaborators) -> Self {
        Self {
            config,
            state,
            ledger: c.ledger,
            fund_sink: c.fund_sink,
            access: c.access,
            clock: c.clock,
            outbox: VecDeque::new(),
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn evaluate(&self, now: Timestamp) -> Result<Evaluation, SaleError> {
        evaluate_phase(
            &self.state,
            &self.config.schedule,
            &self.config.terms,
            now,
        )
    }

    fn authorize(&self, caller: &Address) -> Result<(), SaleError> {
        if self.access.is_operator(caller) {
            Ok(())
        } else {
            Err(SaleError::Unauthorized)
        }
    }

    fn commit(&mut self, state: SaleState, events: Vec<SaleEvent>) {
        self.state = state;
        for event in events {
            if self.outbox.len() >= MAX_PENDING_EVENTS {
                self.outbox.pop_front();
            }
            self.outbox.push_back(event);
        }
    }

    fn phase_events(transitions: Vec<Transition>) -> Vec<SaleEvent> {
        transitions.into_iter().map(SaleEvent::from).collect()
    }

    // =========================================================================
    // PURCHASES
    // =========================================================================

    /// Accept a payment of `amount` from `payer` and credit tokens.
    ///
    /// # Errors
    ///
    /// - `Halted` while the sale is halted
    /// - `ZeroAmount` for an empty payment
    /// - `InvalidPhase` unless the pre-sale or main sale is open after
    ///   re-evaluation
    /// - `CapExceeded` when the window's cap check rejects the purchase
    /// - `LedgerTransferFailed` when the credit fails; nothing is committed
    pub fn submit_payment(&mut self, payer: &Address, amount: Currency) -> Result<Receipt, SaleError> {
        let now = self.clock.now();

        if self.state.is_halted() {
            return Err(SaleError::Halted);
        }
        if amount.is_zero() {
            return Err(SaleError::ZeroAmount);
        }

        let Evaluation {
            state: mut staged,
            transitions,
        } = self.evaluate(now)?;
        let window =
            Window::for_phase(staged.phase).ok_or(SaleError::InvalidPhase(staged.phase))?;
        let quote = pricing::quote(&self.config.terms, window, staged.totals(window), amount)?;

        // Counts holders, not buyers: a payer who sold down to zero counts again.
        let new_investor = self.ledger.balance_of(payer)?.is_zero();
        if new_investor {
            staged.investor_count = staged
                .investor_count
                .checked_add(1)
                .ok_or(SaleError::Overflow)?;
        }
        staged.totals_mut(window).record(amount, quote.tokens)?;
        staged.held_funds = staged.held_funds.checked_add(amount)?;

        self.ledger
            .transfer(payer, quote.tokens)
            .map_err(|e| match e {
                SaleError::LedgerTransferFailed(_) => e,
                other => SaleError::LedgerTransferFailed(other.to_string()),
            })?;

        let phase = staged.phase;
        let mut events = Self::phase_events(transitions);
        events.push(SaleEvent::TokensPurchased {
            payer: payer.clone(),
            amount,
            tokens: quote.tokens,
        });
        self.commit(staged, events);

        Ok(Receipt {
            payer: payer.clone(),
            amount,
            tokens: quote.tokens,
            rate: quote.rate,
            bonus_applied: quote.bonus_applied,
            window,
            phase,
            new_investor,
        })
    }

    /// Default payment entry point: payer and amount arrive together.
    pub fn receive(&mut self, payment: Payment) -> Result<Receipt, SaleError> {
        self.submit_payment(&payment.payer, payment.amount)
    }

    /// Price `amount` as if it were paid now, without changing anything.
    pub fn quote(&self, amount: Currency) -> Result<Quote, SaleError> {
        if self.state.is_halted() {
            return Err(SaleError::Halted);
        }
        let evaluation = self.evaluate(self.clock.now())?;
        let staged = evaluation.state;
        let window =
            Window::for_phase(staged.phase).ok_or(SaleError::InvalidPhase(staged.phase))?;
        pricing::quote(&self.config.terms, window, staged.totals(window), amount)
    }

    // =========================================================================
    // PRIVILEGED OPERATIONS
    // =========================================================================

    /// Re-evaluate and commit the phase. Returns the phase after evaluation.
    pub fn begin_sale(&mut self, caller: &Address) -> Result<Phase, SaleError> {
        self.authorize(caller)?;
        let Evaluation { state, transitions } = self.evaluate(self.clock.now())?;
        let phase = state.phase;
        self.commit(state, Self::phase_events(transitions));
        Ok(phase)
    }

    /// Suspend the sale, remembering the current phase.
    pub fn halt_sale(&mut self, caller: &Address) -> Result<(), SaleError> {
        self.authorize(caller)?;
        if self.state.is_halted() {
            return Err(SaleError::AlreadyHalted);
        }

        let Evaluation {
            state: mut staged,
            transitions,
        } = self.evaluate(self.clock.now())?;
        if staged.phase.is_terminal() {
            return Err(SaleError::InvalidPhase(staged.phase));
        }

        let saved = staged.phase;
        let mut events = Self::phase_events(transitions);
        events.push(SaleEvent::from(Transition::new(saved, Phase::Halt)));
        events.push(SaleEvent::SaleHalted {
            by: caller.clone(),
            saved,
        });
        staged.saved_phase = Some(saved);
        staged.phase = Phase::Halt;
        self.commit(staged, events);
        Ok(())
    }

    /// Restore the phase saved by `halt_sale`, then re-evaluate.
    ///
    /// Returns the phase after evaluation, which may be later than the saved
    /// one if a window ended while the sale was halted.
    pub fn resume_sale(&mut self, caller: &Address) -> Result<Phase, SaleError> {
        self.authorize(caller)?;
        if !self.state.is_halted() {
            return Err(SaleError::NotHalted);
        }
        let restored = self.state.saved_phase.ok_or(SaleError::NotHalted)?;

        let mut resumed = self.state.clone();
        resumed.phase = restored;
        resumed.saved_phase = None;

        let Evaluation { state, transitions } = evaluate_phase(
            &resumed,
            &self.config.schedule,
            &self.config.terms,
            self.clock.now(),
        )?;

        let mut events = vec![
            SaleEvent::from(Transition::new(Phase::Halt, restored)),
            SaleEvent::SaleResumed {
                by: caller.clone(),
                restored,
            },
        ];
        events.extend(Self::phase_events(transitions));
        let phase = state.phase;
        self.commit(state, events);
        Ok(phase)
    }

    /// End the sale and release the held funds to the beneficiary.
    ///
    /// Allowed once the main sale window has passed, once its token limit is
    /// reached, or while halted. A halted sale ends `Aborted`, any other sale
    /// ends `Success`. Returns the amount released.
    pub fn conclude_sale(&mut self, caller: &Address) -> Result<Currency, SaleError> {
        self.authorize(caller)?;
        let now = self.clock.now();

        let Evaluation {
            state: mut staged,
            transitions,
        } = self.evaluate(now)?;
        if !conclusion_eligible(&staged, &self.config.schedule, &self.config.terms, now)? {
            return Err(SaleError::NotEligible);
        }

        let terminal = if staged.is_halted() {
            Phase::Aborted
        } else {
            Phase::Success
        };
        let amount = staged.held_funds;
        let beneficiary = self.config.beneficiary.clone();

        self.fund_sink
            .withdraw_all(&beneficiary, amount)
            .map_err(|e| match e {
                SaleError::WithdrawalFailed(_) => e,
                other => SaleError::WithdrawalFailed(other.to_string()),
            })?;

        let mut events = Self::phase_events(transitions);
        events.push(SaleEvent::from(Transition::new(staged.phase, terminal)));
        events.push(SaleEvent::FundsReleased {
            beneficiary,
            amount,
        });
        staged.phase = terminal;
        staged.saved_phase = None;
        staged.held_funds = Currency::ZERO;
        self.commit(staged, events);
        Ok(amount)
    }

    // =========================================================================
    // STATISTICS
    // =========================================================================

    /// Number of payers whose ledger balance was zero at purchase time.
    #[must_use]
    pub fn investor_count(&self) -> u64 {
        self.state.investor_count
    }

    #[must_use]
    pub fn presale_raised(&self) -> Currency {
        self.state.presale.raised
    }

    /// Main sale raised total, including the pre-sale seed.
    #[must_use]
    pub fn ico_raised(&self) -> Currency {
        self.state.ico.raised
    }

    #[must_use]
    pub fn presale_tokens_sold(&self) -> Tokens {
        self.state.presale.tokens_sold
    }

    #[must_use]
    pub fn ico_tokens_sold(&self) -> Tokens {
        self.state.ico.tokens_sold
    }

    /// Phase as of the last committed call. Not re-evaluated.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Phase the next call would observe at the current time, without
    /// committing it.
    pub fn current_phase(&self) -> Result<Phase, SaleError> {
        Ok(self.evaluate(self.clock.now())?.state.phase)
    }

    #[must_use]
    pub fn saved_phase(&self) -> Option<Phase> {
        self.state.saved_phase
    }

    #[must_use]
    pub fn held_funds(&self) -> Currency {
        self.state.held_funds
    }

    #[must_use]
    pub fn config(&self) -> &SaleConfiguration {
        &self.config
    }

    /// The committed state, for persistence.
    #[must_use]
    pub fn snapshot(&self) -> &SaleState {
        &self.state
    }

    /// Configuration and committed state, ready for `snapshot_to_bytes`.
    #[must_use]
    pub fn export_snapshot(&self) -> SaleSnapshot {
        SaleSnapshot {
            config: self.config.clone(),
            state: self.state.clone(),
        }
    }

    /// Token balance of `holder` as reported by the ledger.
    pub fn balance_of(&self, holder: &Address) -> Result<Tokens, SaleError> {
        self.ledger.balance_of(holder)
    }

    #[must_use]
    pub fn stats(&self) -> SaleStats {
        let terms = &self.config.terms;
        SaleStats {
            phase: self.state.phase,
            saved_phase: self.state.saved_phase,
            investor_count: self.state.investor_count,
            presale_raised: self.state.presale.raised,
            ico_raised: self.state.ico.raised,
            presale_tokens_sold: self.state.presale.tokens_sold,
            ico_tokens_sold: self.state.ico.tokens_sold,
            presale_token_limit: terms.presale_token_limit,
            ico_token_limit: terms.ico_token_limit,
            presale_monetary_cap: terms.presale_monetary_cap,
            ico_monetary_cap: terms.ico_monetary_cap,
            held_funds: self.state.held_funds,
        }
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Take every committed event not yet drained, oldest first.
    pub fn drain_events(&mut self) -> Vec<SaleEvent> {
        self.outbox.drain(..).collect()
    }

    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.outbox.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================
