//! # Storage
//!
//! Durable collaborators backed by the redb embedded database, and the
//! `SnapshotStore` seam hosts persist committed state through.

mod redb_store;

pub use redb_store::RedbStore;

use crate::SaleError;
use crate::formats::SaleSnapshot;

/// Destination of the committed sale state.
///
/// A host writes a snapshot after every committed call. A failed write
/// leaves the durable state behind the engine.
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot.
    fn save_snapshot(&self, snapshot: &SaleSnapshot) -> Result<(), SaleError>;
}
