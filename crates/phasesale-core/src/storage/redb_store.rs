//! # redb-backed Sale Storage
//!
//! `RedbStore` persists three things in one database file:
//! - token balances, so it can act as the sale's `Ledger`
//! - fund releases, so it can act as the sale's `FundSink`
//! - the latest `SaleSnapshot`
//!
//! Every write is a single redb transaction, so a ledger credit or a release
//! is either fully durable or not applied at all. Clones share the same
//! database handle: one clone can be handed to the engine as ledger, another
//! as fund sink, and a third kept by the host for snapshots.

use crate::collaborators::{FundSink, Ledger};
use super::SnapshotStore;
use crate::formats::{SaleSnapshot, snapshot_from_bytes, snapshot_to_bytes};
use crate::{Address, Currency, SaleError, Tokens};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Token balances: address -> token units.
const BALANCES: TableDefinition<&str, u128> = TableDefinition::new("balances");

/// Fund releases: sequence number -> postcard-serialized `Release`.
const RELEASES: TableDefinition<u64, &[u8]> = TableDefinition::new("releases");

/// Snapshots: slot name -> encoded snapshot bytes.
const SNAPSHOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

const CURRENT_SNAPSHOT: &str = "current";

fn storage_error(e: impl std::fmt::Display) -> SaleError {
    SaleError::Storage(e.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Release {
    beneficiary: Address,
    amount: Currency,
}

/// A disk-backed ledger, fund sink and snapshot store.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a sale database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SaleError> {
        let db = Database::create(path.as_ref()).map_err(storage_error)?;

        let write_txn = db.begin_write().map_err(storage_error)?;
        {
            let _ = write_txn.open_table(BALANCES).map_err(storage_error)?;
            let _ = write_txn.open_table(RELEASES).map_err(storage_error)?;
            let _ = write_txn.open_table(SNAPSHOTS).map_err(storage_error)?;
        }
        write_txn.commit().map_err(storage_error)?;

        Ok(Self { db: Arc::new(db) })
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Replace the stored snapshot.
    pub fn save_snapshot(&self, snapshot: &SaleSnapshot) -> Result<(), SaleError> {
        let bytes = snapshot_to_bytes(snapshot)?;
        let write_txn = self.db.begin_write().map_err(storage_error)?;
        {
            let mut table = write_txn.open_table(SNAPSHOTS).map_err(storage_error)?;
            table
                .insert(CURRENT_SNAPSHOT, bytes.as_slice())
                .map_err(storage_error)?;
        }
        write_txn.commit().map_err(storage_error)
    }

    /// Load the stored snapshot, if one was ever saved.
    pub fn load_snapshot(&self) -> Result<Option<SaleSnapshot>, SaleError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(SNAPSHOTS).map_err(storage_error)?;
        match table.get(CURRENT_SNAPSHOT).map_err(storage_error)? {
            Some(data) => snapshot_from_bytes(data.value()).map(Some),
            None => Ok(None),
        }
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    /// Number of addresses with a recorded balance.
    pub fn holder_count(&self) -> Result<u64, SaleError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(BALANCES).map_err(storage_error)?;
        table.len().map_err(storage_error)
    }

    /// Every `(beneficiary, amount)` released so far, oldest first.
    pub fn releases(&self) -> Result<Vec<(Address, Currency)>, SaleError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(RELEASES).map_err(storage_error)?;

        let mut releases = Vec::new();
        for entry in table.iter().map_err(storage_error)? {
            let (_, value) = entry.map_err(storage_error)?;
            let release: Release = postcard::from_bytes(value.value())
                .map_err(|e| SaleError::Serialization(e.to_string()))?;
            releases.push((release.beneficiary, release.amount));
        }
        Ok(releases)
    }
}

// =============================================================================
// COLLABORATOR IMPLEMENTATIONS
// =============================================================================

impl SnapshotStore for RedbStore {
    fn save_snapshot(&self, snapshot: &SaleSnapshot) -> Result<(), SaleError> {
        RedbStore::save_snapshot(self, snapshot)
    }
}

impl Ledger for RedbStore {
    fn balance_of(&self, holder: &Address) -> Result<Tokens, SaleError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(BALANCES).map_err(storage_error)?;
        let balance = table
            .get(holder.as_str())
            .map_err(storage_error)?
            .map(|v| v.value())
            .unwrap_or(0);
        Ok(Tokens(balance))
    }

    fn transfer(&mut self, to: &Address, amount: Tokens) -> Result<(), SaleError> {
        let failed = |e: SaleError| SaleError::LedgerTransferFailed(e.to_string());

        let write_txn = self.db.begin_write().map_err(storage_error).map_err(failed)?;
        {
            let mut table = write_txn
                .open_table(BALANCES)
                .map_err(storage_error)
                .map_err(failed)?;
            let current = table
                .get(to.as_str())
                .map_err(storage_error)
                .map_err(failed)?
                .map(|v| v.value())
                .unwrap_or(0);
            let updated = current.checked_add(amount.value()).ok_or_else(|| {
                SaleError::LedgerTransferFailed(format!("balance of {} overflows", to))
            })?;
            table
                .insert(to.as_str(), updated)
                .map_err(storage_error)
                .map_err(failed)?;
        }
        write_txn.commit().map_err(storage_error).map_err(failed)
    }
}

impl FundSink for RedbStore {
    fn withdraw_all(&mut self, beneficiary: &Address, amount: Currency) -> Result<(), SaleError> {
        let failed = |e: SaleError| SaleError::WithdrawalFailed(e.to_string());

        let release = Release {
            beneficiary: beneficiary.clone(),
            amount,
        };
        let bytes = postcard::to_stdvec(&release)
            .map_err(|e| SaleError::WithdrawalFailed(e.to_string()))?;

        let write_txn = self.db.begin_write().map_err(storage_error).map_err(failed)?;
        {
            let mut table = write_txn
                .open_table(RELEASES)
                .map_err(storage_error)
                .map_err(failed)?;
            let next = table.len().map_err(storage_error).map_err(failed)?;
            table
                .insert(next, bytes.as_slice())
                .map_err(storage_error)
                .map_err(failed)?;
        }
        write_txn.commit().map_err(storage_error).map_err(failed)
    }
}

// =============================================================================
// TESTS
// =============================================================================
