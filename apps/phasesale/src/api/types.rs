//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use phasesale_core::{
    Address, Currency, Payment, Phase, Quote, Receipt, SaleEvent, SaleStats, Tokens, Window,
};
use serde::{Deserialize, Serialize};

/// Maximum accepted address length in bytes.
pub const MAX_ADDRESS_LENGTH: usize = 256;

/// Validate a caller-supplied address.
pub fn parse_address(raw: &str) -> Result<Address, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("address must not be empty".to_string());
    }
    if trimmed.len() > MAX_ADDRESS_LENGTH {
        return Err(format!(
            "Address length {} exceeds maximum {} bytes",
            trimmed.len(),
            MAX_ADDRESS_LENGTH
        ));
    }
    Ok(Address::new(trimmed))
}

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error body for endpoints whose success type has no error field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Sale status response.
///
/// `phase` is the phase committed by the last state-changing call.
/// `effective_phase` is what evaluation at the time of the request yields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub phase: Phase,
    pub effective_phase: Phase,
    pub description: String,
    pub stats: SaleStats,
}

// =============================================================================
// PAYMENT REQUEST/RESPONSE
// =============================================================================

/// Payment submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub payer: String,
    pub amount: u128,
}

impl PaymentRequest {
    /// Convert to a core `Payment`, validating the payer.
    ///
    /// A zero amount is passed through: the engine reports it.
    pub fn to_payment(&self) -> Result<Payment, String> {
        Ok(Payment::new(parse_address(&self.payer)?, Currency(self.amount)))
    }
}

/// Payment outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub success: bool,
    pub tokens: Option<Tokens>,
    pub rate: Option<u128>,
    pub bonus_applied: Option<bool>,
    pub window: Option<Window>,
    pub phase: Option<Phase>,
    pub error: Option<String>,
}

impl PaymentResponse {
    #[must_use]
    pub fn success(receipt: &Receipt) -> Self {
        Self {
            success: true,
            tokens: Some(receipt.tokens),
            rate: Some(receipt.rate),
            bonus_applied: Some(receipt.bonus_applied),
            window: Some(receipt.window),
            phase: Some(receipt.phase),
            error: None,
        }
    }

    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            tokens: None,
            rate: None,
            bonus_applied: None,
            window: None,
            phase: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// QUOTE REQUEST/RESPONSE
// =============================================================================

/// Pricing preview request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub amount: u128,
}

/// Pricing preview response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub success: bool,
    pub quote: Option<Quote>,
    pub error: Option<String>,
}

impl QuoteResponse {
    #[must_use]
    pub fn success(quote: Quote) -> Self {
        Self {
            success: true,
            quote: Some(quote),
            error: None,
        }
    }

    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            quote: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// ADMIN RESPONSE
// =============================================================================

/// Outcome of an operator command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminResponse {
    pub success: bool,
    /// Phase after the command, or the unchanged phase on failure.
    pub phase: Phase,
    /// Amount forwarded to the beneficiary, for `conclude` only.
    pub released: Option<Currency>,
    pub error: Option<String>,
}

impl AdminResponse {
    #[must_use]
    pub fn success(phase: Phase) -> Self {
        Self {
            success: true,
            phase,
            released: None,
            error: None,
        }
    }

    #[must_use]
    pub fn concluded(phase: Phase, released: Currency) -> Self {
        Self {
            released: Some(released),
            ..Self::success(phase)
        }
    }

    #[must_use]
    pub fn error(phase: Phase, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            phase,
            released: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// EVENTS, BALANCE, SNAPSHOT
// =============================================================================

/// Query parameters of `GET /events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// Most recent events, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<SaleEvent>,
}

/// Ledger balance of one holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub success: bool,
    pub address: String,
    pub tokens: Option<Tokens>,
    pub error: Option<String>,
}

impl BalanceResponse {
    #[must_use]
    pub fn success(address: &Address, tokens: Tokens) -> Self {
        Self {
            success: true,
            address: address.to_string(),
            tokens: Some(tokens),
            error: None,
        }
    }

    #[must_use]
    pub fn error(address: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            address: address.into(),
            tokens: None,
            error: Some(msg.into()),
        }
    }
}

/// Binary snapshot of the sale, base64 encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub success: bool,
    pub data: Option<String>,
    pub error: Option<String>,
}

impl SnapshotResponse {
    #[must_use]
    pub fn success(bytes: &[u8]) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                bytes,
            )),
            error: None,
        }
    }

    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
