//! # phasesale application library
//!
//! HTTP API, CLI and sale-file loading around `phasesale-core`. The binary in
//! `main.rs` only wires tracing and dispatches to [`cli::execute`].

pub mod api;
pub mod cli;
pub mod config;
