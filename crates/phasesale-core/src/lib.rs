//! # phasesale-core
//!
//! The deterministic sale engine for phasesale.
//!
//! A sale moves through a fixed set of phases driven by a schedule, a token
//! cap per window, and operator commands. Payments arriving during an open
//! window are converted to tokens at the window's rate and credited through
//! an external ledger.
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - Time is read from an injected `Clock`, once per call
//! - Every call either commits fully or leaves the engine untouched
//! - All quantity arithmetic is checked

// =============================================================================
// MODULES
// =============================================================================

pub mod collaborators;
pub mod config;
pub mod engine;
pub mod events;
pub mod formats;
pub mod machine;
pub mod pricing;
pub mod primitives;
pub mod state;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{Address, Currency, Phase, SaleError, Timestamp, Tokens};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use collaborators::{
    AccessControl, Clock, Collaborators, FundSink, InMemoryLedger, Ledger, ManualClock,
    OperatorSet, SystemClock, Treasury,
};
pub use config::{CapPolicy, SaleConfiguration, SaleSchedule, SaleTerms};
pub use engine::{Payment, Receipt, SaleEngine, SaleStats};
pub use events::SaleEvent;
pub use machine::{Evaluation, Transition, conclusion_eligible, evaluate_phase};
pub use pricing::Quote;
pub use state::{SaleState, Window, WindowTotals};

// =============================================================================
// RE-EXPORTS: Persistence
// =============================================================================

pub use formats::{SaleSnapshot, SnapshotHeader, snapshot_from_bytes, snapshot_to_bytes};
pub use storage::{RedbStore, SnapshotStore};
