//! # CLI Command Implementations

use crate::api::{self, AppState};
use crate::config::SaleFile;
use phasesale_core::{
    Clock, Collaborators, Currency, InMemoryLedger, Phase, RedbStore, SaleConfiguration,
    SaleEngine, SaleError, SaleStats, SystemClock, Treasury,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// TARGET
// =============================================================================

/// Storage backend for the hosted sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Ledger, releases and snapshots in a redb file.
    Redb,
    /// Everything in memory, lost on exit.
    Memory,
}

impl Backend {
    pub fn parse(name: &str) -> Result<Self, SaleError> {
        match name {
            "redb" => Ok(Backend::Redb),
            "memory" => Ok(Backend::Memory),
            other => Err(SaleError::Configuration(format!(
                "Unknown backend '{}' (expected 'redb' or 'memory')",
                other
            ))),
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Backend::Redb => "redb",
            Backend::Memory => "memory",
        }
    }
}

/// Where a command finds its sale.
#[derive(Debug, Clone)]
pub struct Target {
    pub config: PathBuf,
    pub database: PathBuf,
    pub backend: Backend,
}

// =============================================================================
// ENGINE LOADING
// =============================================================================

/// Build the engine described by `target`.
///
/// With the redb backend a stored snapshot wins over the sale file: once a
/// sale exists its schedule and terms are fixed. Operators are always taken
/// from the sale file.
pub fn load_engine(target: &Target) -> Result<(SaleEngine, Option<RedbStore>), SaleError> {
    let file = SaleFile::load(&target.config)?;

    match target.backend {
        Backend::Memory => {
            let engine = SaleEngine::new(
                file.configuration(),
                Collaborators {
                    ledger: Box::new(InMemoryLedger::new()),
                    fund_sink: Box::new(Treasury::new()),
                    access: Box::new(file.operator_set()),
                    clock: Box::new(SystemClock),
                },
            )?;
            Ok((engine, None))
        }
        Backend::Redb => {
            let store = RedbStore::open(&target.database)?;
            let collaborators = Collaborators {
                ledger: Box::new(store.clone()),
                fund_sink: Box::new(store.clone()),
                access: Box::new(file.operator_set()),
                clock: Box::new(SystemClock),
            };

            let engine = match store.load_snapshot()? {
                Some(snapshot) => {
                    if snapshot.config != file.configuration() {
                        tracing::warn!(
                            "Sale file {:?} differs from the stored sale; keeping the stored configuration",
                            target.config
                        );
                    }
                    SaleEngine::restore(snapshot.config, snapshot.state, collaborators)?
                }
                None => {
                    let engine = SaleEngine::new(file.configuration(), collaborators)?;
                    store.save_snapshot(&engine.export_snapshot())?;
                    tracing::info!("Created new sale in {:?}", target.database);
                    engine
                }
            };
            Ok((engine, Some(store)))
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

pub async fn cmd_server(target: &Target, host: &str, port: u16) -> Result<(), SaleError> {
    let (engine, store) = load_engine(target)?;
    let phase = engine.phase();

    println!("phasesale server starting...");
    println!();
    println!("Configuration:");
    println!("  Host:      {}", host);
    println!("  Port:      {}", port);
    println!("  Backend:   {}", target.backend.name());
    println!("  Sale file: {:?}", target.config);
    if store.is_some() {
        println!("  Database:  {:?}", target.database);
    }
    println!("  Phase:     {}", phase);
    println!();
    println!("Endpoints:");
    println!("  POST /payment          - Submit a payment");
    println!("  POST /quote            - Price a payment");
    println!("  GET  /status           - Phase and statistics");
    println!("  GET  /events           - Recent sale events");
    println!("  GET  /balance/{{addr}}   - Token balance");
    println!("  POST /admin/<command>  - begin, halt, resume, conclude");
    println!("  GET  /health           - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = match store {
        Some(store) => AppState::with_store(engine, store),
        None => AppState::new(engine),
    };
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

pub fn cmd_init(target: &Target, force: bool) -> Result<(), SaleError> {
    write_template(&target.config, force)?;
    println!("Wrote sale file to {:?}", target.config);

    if target.backend == Backend::Redb {
        let _store = RedbStore::open(&target.database)?;
        println!("Initialized redb database at {:?}", target.database);
    }
    Ok(())
}

fn write_template(path: &Path, force: bool) -> Result<(), SaleError> {
    if path.exists() && !force {
        return Err(SaleError::Configuration(
            "Sale file already exists. Use --force to overwrite.".to_string(),
        ));
    }
    std::fs::write(path, SaleFile::template(SystemClock.now()))
        .map_err(|e| SaleError::Storage(format!("Write sale file: {}", e)))
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

#[derive(Serialize)]
struct StatusReport<'a> {
    backend: &'static str,
    phase: Phase,
    effective_phase: Phase,
    stats: &'a SaleStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    configuration: Option<&'a SaleConfiguration>,
}

pub fn cmd_status(target: &Target, json_mode: bool, verbose: bool) -> Result<(), SaleError> {
    let (engine, _store) = load_engine(target)?;
    let stats = engine.stats();
    let effective = engine.current_phase()?;
    let config = engine.config();

    if json_mode {
        print_json(&StatusReport {
            backend: target.backend.name(),
            phase: stats.phase,
            effective_phase: effective,
            stats: &stats,
            configuration: verbose.then_some(config),
        });
        return Ok(());
    }

    println!("phasesale Status");
    println!("================");
    println!("Backend:         {}", target.backend.name());
    println!("Phase:           {} ({})", effective, effective.description());
    if effective != stats.phase {
        println!("Committed phase: {}", stats.phase);
    }
    if let Some(saved) = stats.saved_phase {
        println!("Saved phase:     {}", saved);
    }
    println!();
    println!("Investors:       {}", stats.investor_count);
    println!(
        "Pre-sale:        {} raised, {} / {} tokens",
        stats.presale_raised, stats.presale_tokens_sold, stats.presale_token_limit
    );
    println!(
        "Main sale:       {} raised, {} / {} tokens",
        stats.ico_raised, stats.ico_tokens_sold, stats.ico_token_limit
    );
    println!("Held funds:      {}", stats.held_funds);

    if verbose {
        println!();
        println!("Beneficiary:     {}", config.beneficiary);
        println!("Pre-sale start:  {}", config.schedule.presale_start.secs());
        println!("Main sale start: {}", config.schedule.ico_start.secs());
        println!("Cap policy:      {:?}", config.terms.cap_policy);
    }

    Ok(())
}

// =============================================================================
// QUOTE COMMAND
// =============================================================================

pub fn cmd_quote(target: &Target, json_mode: bool, amount: u128) -> Result<(), SaleError> {
    let (engine, _store) = load_engine(target)?;
    let quote = engine.quote(Currency(amount))?;

    if json_mode {
        print_json(&quote);
        return Ok(());
    }

    println!("Window:    {:?}", quote.window);
    println!("Rate:      {}", quote.rate);
    println!("Bonus:     {}", if quote.bonus_applied { "yes" } else { "no" });
    println!("Tokens:    {}", quote.tokens);
    println!("Remaining: {}", quote.remaining);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
