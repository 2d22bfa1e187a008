//! # Formats
//!
//! Binary snapshot format for persisted sales. File and database I/O live in
//! `storage` and in the app layer.

mod persistence;

pub use persistence::*;
