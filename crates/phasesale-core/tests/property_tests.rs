//! # Property-Based Tests
//!
//! Invariants of phase evaluation and pricing under arbitrary inputs.

use phasesale_core::machine::evaluate_phase;
use phasesale_core::pricing::{effective_rate, quote};
use phasesale_core::primitives::SECONDS_PER_DAY;
use phasesale_core::{
    Address, Collaborators, Currency, InMemoryLedger, ManualClock, OperatorSet, Phase,
    SaleConfiguration, SaleEngine, SaleSchedule, SaleState, SaleTerms, Timestamp, Tokens,
    Treasury, Window, WindowTotals,
};
use proptest::collection::vec;
use proptest::prelude::*;

const T: u64 = 1_700_000_000;

fn schedule() -> SaleSchedule {
    SaleSchedule::new(
        Timestamp(T + SECONDS_PER_DAY),
        10,
        Timestamp(T + 20 * SECONDS_PER_DAY),
        30,
    )
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Evaluation never moves a phase backwards, whatever the time and totals.
    #[test]
    fn evaluation_is_monotonic(
        offsets in vec(0u64..(60 * SECONDS_PER_DAY), 1..20),
        presale_sold in 0u128..2_000,
        ico_sold in 0u128..6_000,
    ) {
        let terms = SaleTerms {
            presale_token_limit: Tokens(1_000),
            ico_token_limit: Tokens(5_000),
            ..SaleTerms::default()
        };
        let mut sorted = offsets;
        sorted.sort_unstable();

        let mut state = SaleState::new();
        state.presale.tokens_sold = Tokens(presale_sold);
        for offset in sorted {
            let result = evaluate_phase(&state, &schedule(), &terms, Timestamp(T + offset))
                .expect("evaluate");
            prop_assert!(result.state.phase.rank() >= state.phase.rank());
            for transition in &result.transitions {
                prop_assert!(transition.to.rank() > transition.from.rank());
            }
            state = result.state;
            state.ico.tokens_sold = state.ico.tokens_sold.max(Tokens(ico_sold));
        }
    }

    /// Evaluating an already evaluated state at the same time changes nothing.
    #[test]
    fn evaluation_reaches_a_fixed_point(offset in 0u64..(60 * SECONDS_PER_DAY)) {
        let terms = SaleTerms::default();
        let now = Timestamp(T + offset);
        let first = evaluate_phase(&SaleState::new(), &schedule(), &terms, now).expect("evaluate");
        let second = evaluate_phase(&first.state, &schedule(), &terms, now).expect("evaluate");
        prop_assert!(!second.changed());
        prop_assert_eq!(first.state, second.state);
    }

    /// The bonus rate is the truncated 120% of the base rate.
    #[test]
    fn bonus_rate_matches_formula(rate in 1u128..1_000_000, amount in 1_000u128..1_000_000) {
        let terms = SaleTerms { presale_rate: rate, ..SaleTerms::default() };
        let applied = effective_rate(&terms, Window::Presale, Currency(amount)).expect("rate");
        prop_assert_eq!(applied, rate * 120 / 100);
    }

    /// Under the overflow policy an accepted quote always fits the window.
    #[test]
    fn accepted_quotes_fit_remaining_capacity(
        sold in 0u128..1_000_000,
        amount in 1u128..2_000,
    ) {
        let terms = SaleTerms {
            ico_token_limit: Tokens(1_000_000),
            ..SaleTerms::default()
        };
        let totals = WindowTotals { raised: Currency::ZERO, tokens_sold: Tokens(sold) };
        if let Ok(q) = quote(&terms, Window::Ico, &totals, Currency(amount)) {
            prop_assert!(q.tokens <= q.remaining);
        }
    }

    /// Investor count equals the number of distinct first-time buyers.
    #[test]
    fn investor_count_matches_distinct_buyers(buyers in vec(0u8..8, 1..40)) {
        let clock = ManualClock::new(Timestamp(T));
        let mut engine = SaleEngine::new(
            SaleConfiguration::new(schedule(), SaleTerms::default(), Address::new("vault")),
            Collaborators {
                ledger: Box::new(InMemoryLedger::new()),
                fund_sink: Box::new(Treasury::new()),
                access: Box::new(OperatorSet::new([Address::new("ops")])),
                clock: Box::new(clock.clone()),
            },
        )
        .expect("engine");
        clock.set(Timestamp(T + 2 * SECONDS_PER_DAY));

        let mut distinct = std::collections::BTreeSet::new();
        for buyer in buyers {
            engine
                .submit_payment(&Address::new(format!("buyer-{buyer}")), Currency(1))
                .expect("purchase");
            distinct.insert(buyer);
        }
        prop_assert_eq!(engine.investor_count(), distinct.len() as u64);
        prop_assert_eq!(engine.phase(), Phase::PreSale);
    }
}
