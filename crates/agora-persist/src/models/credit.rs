use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Per-user balance, in micro-credits (1 credit = 1_000_000).
///
/// Keyed by user id so a conditional update on `_id` + balance is enough to
/// make debits atomic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditAccount {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub balance: i64,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: String,
    /// Positive for grants, negative for debits
    pub amount: i64,
    pub kind: TransactionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub description: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Grant,
    Debit,
}
