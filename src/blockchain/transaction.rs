use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Errors raised when a transaction does not describe a valid transfer
#[derive(Debug, Error, PartialEq)]
pub enum TransactionError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Represents a transfer recorded on the ledger
///
/// Balances are not tracked, so nothing beyond the amount is checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Amount being transferred
    pub amount: f64,

    /// Receiver's identifier
    pub receiver: String,

    /// Sender's identifier
    pub sender: String,

    /// Timestamp supplied by the submitter
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Creates a new transaction
    ///
    /// # Arguments
    ///
    /// * `timestamp` - When the transfer was issued
    /// * `sender` - The sender's identifier
    /// * `receiver` - The receiver's identifier
    /// * `amount` - The amount to transfer
    pub fn new(
        timestamp: DateTime<Utc>,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: f64,
    ) -> Self {
        Transaction {
            amount,
            receiver: receiver.into(),
            sender: sender.into(),
            timestamp,
        }
    }

    /// Checks that the amount is a non-negative, finite decimal
    pub fn validate(&self) -> Result<(), TransactionError> {
        if !self.amount.is_finite() {
            return Err(TransactionError::InvalidAmount(format!(
                "{} is not a finite number",
                self.amount
            )));
        }

        if self.amount < 0.0 {
            return Err(TransactionError::InvalidAmount(format!(
                "{} is negative",
                self.amount
            )));
        }

        Ok(())
    }
}
