//! # Sale File
//!
//! TOML description of a sale: who receives the funds, who may operate the
//! sale, the two windows, and optionally the pricing terms.
//!
//! ```toml
//! beneficiary = "treasury"
//! operators = ["ops"]
//!
//! [schedule]
//! presale_start = 1767225600
//! presale_days = 10
//! ico_start = 1768953600
//! ico_days = 30
//!
//! [terms]
//! cap_policy = "reject_overflow"
//! ```
//!
//! Omitted terms take the engine defaults.

use phasesale_core::primitives::SECONDS_PER_DAY;
use phasesale_core::{
    Address, OperatorSet, SaleConfiguration, SaleError, SaleSchedule, SaleTerms, Timestamp,
};
use serde::Deserialize;
use std::path::Path;

/// Maximum sale file size (64 KB).
const MAX_SALE_FILE_SIZE: u64 = 64 * 1024;

/// Parsed sale file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SaleFile {
    pub beneficiary: Address,
    #[serde(default)]
    pub operators: Vec<Address>,
    pub schedule: SaleSchedule,
    #[serde(default)]
    pub terms: SaleTerms,
}

impl SaleFile {
    /// Read and parse a sale file from disk.
    pub fn load(path: &Path) -> Result<Self, SaleError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            SaleError::Storage(format!("Cannot read sale file '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_SALE_FILE_SIZE {
            return Err(SaleError::Configuration(format!(
                "Sale file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_SALE_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| SaleError::Storage(format!("Read sale file: {}", e)))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, SaleError> {
        let file: Self = toml::from_str(text)
            .map_err(|e| SaleError::Configuration(format!("Invalid sale file: {}", e)))?;
        if file.operators.iter().all(Address::is_empty) {
            return Err(SaleError::Configuration(
                "at least one operator is required".to_string(),
            ));
        }
        Ok(file)
    }

    #[must_use]
    pub fn configuration(&self) -> SaleConfiguration {
        SaleConfiguration::new(self.schedule, self.terms, self.beneficiary.clone())
    }

    #[must_use]
    pub fn operator_set(&self) -> OperatorSet {
        OperatorSet::new(self.operators.iter().cloned())
    }

    /// A starter sale file whose pre-sale opens one day after `now`.
    #[must_use]
    pub fn template(now: Timestamp) -> String {
        let presale_start = now.secs().saturating_add(SECONDS_PER_DAY);
        let ico_start = presale_start.saturating_add(20 * SECONDS_PER_DAY);
        let defaults = SaleTerms::default();
        format!(
            r#"# phasesale sale file

beneficiary = "treasury"
operators = ["ops"]

[schedule]
presale_start = {presale_start}
presale_days = 10
ico_start = {ico_start}
ico_days = 30

[terms]
presale_rate = {presale_rate}
ico_rate = {ico_rate}
bonus_threshold = {bonus_threshold}
bonus_percent = {bonus_percent}
presale_token_limit = {presale_limit}
ico_token_limit = {ico_limit}
cap_policy = "reject_overflow"
"#,
            presale_rate = defaults.presale_rate,
            ico_rate = defaults.ico_rate,
            bonus_threshold = defaults.bonus_threshold,
            bonus_percent = defaults.bonus_percent,
            presale_limit = defaults.presale_token_limit,
            ico_limit = defaults.ico_token_limit,
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
