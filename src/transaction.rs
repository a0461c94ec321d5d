//! Transaction types and submission validation.

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::error::{ChainError, Result};

/// A recorded transfer. Created only through the store's admission path and
/// immutable afterwards: the ledger's tamper evidence relies on transactions
/// never being updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
    /// Risk estimate in [0, 1], assigned once at admission.
    pub fraud_score: f64,
    /// Milliseconds since the Unix epoch, UTC.
    pub timestamp: i64,
}

/// Classification derived from `fraud_score` against the configured bands.
/// Never stored; always recomputed at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Clear,
    Review,
    Suspicious,
}

impl TxStatus {
    pub fn from_score(score: f64, config: &ScoringConfig) -> Self {
        if score >= config.suspicious_threshold {
            TxStatus::Suspicious
        } else if score >= config.review_threshold {
            TxStatus::Review
        } else {
            TxStatus::Clear
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Clear => "Clear",
            TxStatus::Review => "Review",
            TxStatus::Suspicious => "Suspicious",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Clear" => Some(TxStatus::Clear),
            "Review" => Some(TxStatus::Review),
            "Suspicious" => Some(TxStatus::Suspicious),
            _ => None,
        }
    }
}

impl Transaction {
    pub fn status(&self, config: &ScoringConfig) -> TxStatus {
        TxStatus::from_score(self.fraud_score, config)
    }
}

/// Gate on the admission path: rejected submissions leave no trace, neither
/// a persisted transaction nor a ledger block.
pub fn validate_submission(sender: &str, receiver: &str, amount: f64) -> Result<()> {
    if sender.trim().is_empty() {
        return Err(ChainError::InvalidTransaction("sender must not be empty".to_string()));
    }
    if receiver.trim().is_empty() {
        return Err(ChainError::InvalidTransaction("receiver must not be empty".to_string()));
    }
    if !amount.is_finite() {
        return Err(ChainError::InvalidTransaction("amount must be a finite number".to_string()));
    }
    if amount <= 0.0 {
        return Err(ChainError::InvalidTransaction("amount must be positive".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bands() {
        let config = ScoringConfig::default();
        assert_eq!(TxStatus::from_score(0.0, &config), TxStatus::Clear);
        assert_eq!(TxStatus::from_score(0.39, &config), TxStatus::Clear);
        assert_eq!(TxStatus::from_score(0.4, &config), TxStatus::Review);
        assert_eq!(TxStatus::from_score(0.69, &config), TxStatus::Review);
        assert_eq!(TxStatus::from_score(0.7, &config), TxStatus::Suspicious);
        assert_eq!(TxStatus::from_score(1.0, &config), TxStatus::Suspicious);
    }

    #[test]
    fn status_round_trips_through_labels() {
        for status in [TxStatus::Clear, TxStatus::Review, TxStatus::Suspicious] {
            assert_eq!(TxStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TxStatus::parse("Pending"), None);
    }

    #[test]
    fn submission_validation() {
        assert!(validate_submission("alice", "bob", 10.0).is_ok());
        assert!(validate_submission("", "bob", 10.0).is_err());
        assert!(validate_submission("  ", "bob", 10.0).is_err());
        assert!(validate_submission("alice", "", 10.0).is_err());
        assert!(validate_submission("alice", "bob", 0.0).is_err());
        assert!(validate_submission("alice", "bob", -5.0).is_err());
        assert!(validate_submission("alice", "bob", f64::NAN).is_err());
    }
}
