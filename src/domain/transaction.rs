//! Transaction domain entity.
//! A transaction only receives its numeric id once the store has persisted it,
//! so the pre-persistence shape is a separate type.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_FAILED: &str = "failed";

/// Acknowledgment returned to the caller once a transaction is in flight.
pub const PROCESSING_MESSAGE: &str = "tx under processing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "deposit" => Some(TransactionType::Deposit),
            "withdrawal" => Some(TransactionType::Withdrawal),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub amount: BigDecimal,
    pub transaction_type: TransactionType,
    pub status: String,
    pub user_id: i64,
    pub gateway_id: i32,
    pub country_id: i32,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    pub fn pending(
        amount: BigDecimal,
        transaction_type: TransactionType,
        user_id: i64,
        gateway_id: i32,
        country_id: i32,
    ) -> Self {
        Self {
            amount,
            transaction_type,
            status: STATUS_PENDING.to_string(),
            user_id,
            gateway_id,
            country_id,
            created_at: Utc::now(),
        }
    }

    /// Attaches the id assigned by the store.
    pub fn persisted(self, id: i64) -> Transaction {
        Transaction {
            id,
            amount: self.amount,
            transaction_type: self.transaction_type,
            status: self.status,
            user_id: self.user_id,
            gateway_id: self.gateway_id,
            country_id: self.country_id,
            created_at: self.created_at,
        }
    }
}

/// Persisted transaction. This is also the wire payload published to the
/// message bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub amount: BigDecimal,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: String,
    pub user_id: i64,
    pub gateway_id: i32,
    pub country_id: i32,
    pub created_at: DateTime<Utc>,
}

/// Inbound deposit/withdrawal request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionRequest {
    pub amount: BigDecimal,
    pub user_id: i64,
    #[serde(default)]
    pub country_id: i32,
    #[serde(default)]
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_id: i64,
    pub gateway_id: i32,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub status_code: u16,
    pub message: String,
    pub data: TransactionReceipt,
}

impl TransactionResponse {
    pub fn accepted(transaction: &Transaction) -> Self {
        Self {
            status_code: 200,
            message: PROCESSING_MESSAGE.to_string(),
            data: TransactionReceipt {
                transaction_id: transaction.id,
                gateway_id: transaction.gateway_id,
                status: transaction.status.clone(),
            },
        }
    }
}
