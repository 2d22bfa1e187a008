//! # Snapshot Format
//!
//! Binary serialization of a sale's configuration and committed state.
//!
//! Format: Header (5 bytes) + postcard-serialized `SaleSnapshot`.
//! - 4 bytes: Magic ("SALE")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is parsed, and a decoded
//! state must pass `SaleState::validate` before it is handed back.

use crate::config::SaleConfiguration;
use crate::state::SaleState;
use crate::{SaleError, primitives};
use serde::{Deserialize, Serialize};

/// Maximum accepted snapshot size.
///
/// A snapshot holds one configuration and one state, so anything near this
/// bound is corrupt.
pub const MAX_SNAPSHOT_SIZE: usize = 64 * 1024;

const HEADER_LEN: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

/// The header preceding every snapshot payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), SaleError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(SaleError::Serialization("Invalid magic bytes".to_string()));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(SaleError::Serialization(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SaleError> {
        if bytes.len() < HEADER_LEN {
            return Err(SaleError::Serialization("Header too short".to_string()));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Everything needed to restore an engine, minus its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleSnapshot {
    pub config: SaleConfiguration,
    pub state: SaleState,
}

/// Serialize a snapshot to bytes (header + payload).
pub fn snapshot_to_bytes(snapshot: &SaleSnapshot) -> Result<Vec<u8>, SaleError> {
    let payload =
        postcard::to_stdvec(snapshot).map_err(|e| SaleError::Serialization(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&SnapshotHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Deserialize a snapshot from bytes.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<SaleSnapshot, SaleError> {
    if bytes.len() < HEADER_LEN {
        return Err(SaleError::Serialization(format!(
            "Data too short: minimum {} bytes required",
            HEADER_LEN
        )));
    }
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(SaleError::Serialization(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    SnapshotHeader::from_bytes(bytes)?.validate()?;

    let snapshot: SaleSnapshot = postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(|e| {
        SaleError::Serialization(format!("Failed to deserialize sale snapshot: {}", e))
    })?;
    snapshot.state.validate()?;
    Ok(snapshot)
}

// =============================================================================
// TESTS
// =============================================================================
